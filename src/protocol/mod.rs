//! Display-server protocol seam
//!
//! The toolkit never talks to a socket itself. Everything it needs from the
//! display server goes through the [`Transport`] trait, and everything the
//! server tells it arrives as a [`TransportEvent`]. This keeps the window and
//! input state machines independent of the wire library in use.
//!
//! # Overview
//!
//! - [`Interface`]: closed set of globals the toolkit binds
//! - [`TransportEvent`]: server events the toolkit consumes
//! - [`Transport`]: requests the toolkit issues
//!
//! Object handles are plain [`ObjectId`]s; the transport decides what they
//! map to.

pub mod transport;

use bitflags::bitflags;
use std::fmt;
use std::os::fd::OwnedFd;

pub use transport::Transport;

/// Opaque handle of a server-side object owned by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Globals recognised by the toolkit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Interface {
    Display,
    Compositor,
    Seat,
    Shell,
    Shm,
    Unknown(String),
}

impl Interface {
    /// Map an advertised interface name onto the closed set
    pub fn from_name(name: &str) -> Self {
        match name {
            "wl_display" => Interface::Display,
            "wl_compositor" => Interface::Compositor,
            "wl_seat" => Interface::Seat,
            "wl_shell" => Interface::Shell,
            "wl_shm" => Interface::Shm,
            other => Interface::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Interface::Display => "wl_display",
            Interface::Compositor => "wl_compositor",
            Interface::Seat => "wl_seat",
            Interface::Shell => "wl_shell",
            Interface::Shm => "wl_shm",
            Interface::Unknown(name) => name.as_str(),
        }
    }
}

bitflags! {
    /// Poll interest for the transport file descriptor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Interest: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

bitflags! {
    /// Seat capabilities as advertised by the compositor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
        const TOUCH = 4;
    }
}

bitflags! {
    /// Window edges a resize originates from
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResizeEdges: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
        const TOP_LEFT = Self::TOP.bits() | Self::LEFT.bits();
        const BOTTOM_LEFT = Self::BOTTOM.bits() | Self::LEFT.bits();
        const TOP_RIGHT = Self::TOP.bits() | Self::RIGHT.bits();
        const BOTTOM_RIGHT = Self::BOTTOM.bits() | Self::RIGHT.bits();
    }
}

/// Readiness reported by the event loop for the transport fd
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    /// Hangup or error on the socket; terminal for the connection
    pub hangup: bool,
}

impl Readiness {
    pub fn readable() -> Self {
        Self {
            readable: true,
            ..Self::default()
        }
    }

    pub fn hangup() -> Self {
        Self {
            hangup: true,
            ..Self::default()
        }
    }
}

/// Pixel formats used for shm buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmFormat {
    Argb8888,
}

/// Axis-aligned rectangle in buffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    Pressed,
}

impl From<u32> for ButtonState {
    fn from(raw: u32) -> Self {
        if raw == 0 {
            ButtonState::Released
        } else {
            ButtonState::Pressed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
}

impl From<u32> for KeyState {
    fn from(raw: u32) -> Self {
        if raw == 0 {
            KeyState::Released
        } else {
            KeyState::Pressed
        }
    }
}

/// Keymap encodings a compositor may announce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeymapFormat {
    NoKeymap,
    XkbV1,
    Other(u32),
}

impl From<u32> for KeymapFormat {
    fn from(raw: u32) -> Self {
        match raw {
            0 => KeymapFormat::NoKeymap,
            1 => KeymapFormat::XkbV1,
            other => KeymapFormat::Other(other),
        }
    }
}

/// Server events consumed by the toolkit
///
/// Pointer coordinates are 24.8 signed fixed-point, exactly as sent on
/// the wire. Key codes are evdev codes.
#[derive(Debug)]
pub enum TransportEvent {
    GlobalAdvertised {
        name: u32,
        interface: String,
        version: u32,
    },
    SeatCapabilities(Capabilities),
    ShellPing {
        shell_surface: ObjectId,
        serial: u32,
    },
    ShellConfigure {
        shell_surface: ObjectId,
        edges: ResizeEdges,
        width: i32,
        height: i32,
    },
    FrameDone {
        callback: ObjectId,
        time: u32,
    },
    PointerEnter {
        serial: u32,
        surface: Option<ObjectId>,
        x: i32,
        y: i32,
    },
    PointerLeave {
        serial: u32,
        surface: Option<ObjectId>,
    },
    PointerMotion {
        time: u32,
        x: i32,
        y: i32,
    },
    PointerButton {
        serial: u32,
        time: u32,
        button: u32,
        state: ButtonState,
    },
    PointerAxis {
        time: u32,
        axis: u32,
        value: i32,
    },
    KeyboardKeymap {
        format: KeymapFormat,
        fd: OwnedFd,
        size: u32,
    },
    KeyboardEnter {
        serial: u32,
        surface: Option<ObjectId>,
    },
    KeyboardLeave {
        serial: u32,
        surface: Option<ObjectId>,
    },
    Key {
        serial: u32,
        time: u32,
        key: u32,
        state: KeyState,
    },
    KeyboardModifiers {
        serial: u32,
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    },
}

/// Convert 24.8 fixed-point to whole pixels, rounding toward negative infinity
pub fn fixed_to_pixels(value: i32) -> i32 {
    value >> 8
}
