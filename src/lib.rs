//! # Axiom Toolkit
//!
//! Client-side windowing core for applications talking to a Wayland-style
//! compositor through shared-memory buffers.
//!
//! ## Architecture
//!
//! - `display`: connection lifecycle, global binding and input routing
//! - `window`: toplevel windows, shm buffers and frame scheduling
//! - `widget`: event hooks attached to windows
//! - `cursor`: themed pointer images
//! - `shm`: shared-memory pools and pixel views
//! - `input`: keymap compilation and key translation (xkbcommon)
//! - `event_loop`: idle queue and the calloop adapter
//! - `protocol`: object handles, events and the [`Transport`] seam
//! - `config`: TOML configuration
//! - `logging`: `env_logger` setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axiom_toolkit::{CallbackWidget, Display, DisplayEvent, ToolkitConfig};
//!
//! let mut display = Display::new(ToolkitConfig::default(), transport, event_loop)?;
//! display.register_listener(|display, event| {
//!     if event == DisplayEvent::Ready {
//!         if let Ok(window) = display.create_window(640, 480) {
//!             let mut widget = CallbackWidget::new();
//!             widget.set_redraw_cb(|ctx| ctx.buffer(None).fill(0xff20_2020));
//!             let _ = display.create_widget(window, Box::new(widget));
//!         }
//!     }
//! });
//! ```

pub mod config;
pub mod cursor;
pub mod display;
pub mod error;
pub mod event_loop;
pub mod input;
pub mod logging;
pub mod protocol;
pub mod shm;
pub mod widget;
pub mod window;

pub use config::ToolkitConfig;
pub use cursor::{CursorKind, CursorSet, CursorTheme};
pub use display::{ConnectionState, Display, DisplayEvent, ListenerId};
pub use error::{Result, ToolkitError};
pub use event_loop::{CalloopEventLoop, EventLoopHandle, IdleQueue};
pub use input::{KeyboardState, KeymapCompiler, Keysym, Modifiers};
pub use protocol::{Transport, TransportEvent};
pub use shm::ShmBuffer;
pub use widget::{CallbackWidget, Widget, WidgetId, WindowContext};
pub use window::WindowId;

/// Version information for Axiom Toolkit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
