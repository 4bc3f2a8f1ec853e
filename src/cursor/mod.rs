//! Pointer cursor themes
//!
//! The toolkit knows a small fixed set of cursor roles ([`CursorKind`]).
//! When the display becomes ready every role is resolved once against the
//! compositor-side theme by trying an ordered list of theme names, and the
//! first image that exists wins. Roles without an image hide the pointer.
//!
//! Cursor names follow the usual X11/freedesktop aliases.

use log::{debug, trace, warn};

use crate::config::CursorConfig;
use crate::protocol::{ObjectId, Rect, Transport};

/// Cursor roles a window can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Dragging,
    LeftPtr,
    Ibeam,
}

impl CursorKind {
    pub const COUNT: usize = 12;

    pub const ALL: [CursorKind; Self::COUNT] = [
        CursorKind::None,
        CursorKind::Top,
        CursorKind::Bottom,
        CursorKind::Left,
        CursorKind::Right,
        CursorKind::TopLeft,
        CursorKind::TopRight,
        CursorKind::BottomLeft,
        CursorKind::BottomRight,
        CursorKind::Dragging,
        CursorKind::LeftPtr,
        CursorKind::Ibeam,
    ];

    /// Map a raw role index; anything out of range becomes the arrow pointer
    pub fn from_raw(raw: u32) -> Self {
        Self::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(CursorKind::LeftPtr)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Theme names tried in order when resolving this role
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            CursorKind::None => &[],
            CursorKind::Top => &["top_side", "n-resize"],
            CursorKind::Bottom => &["bottom_side", "s-resize"],
            CursorKind::Left => &["left_side", "w-resize"],
            CursorKind::Right => &["right_side", "e-resize"],
            CursorKind::TopLeft => &["top_left_corner", "nw-resize"],
            CursorKind::TopRight => &["top_right_corner", "ne-resize"],
            CursorKind::BottomLeft => &["bottom_left_corner", "sw-resize"],
            CursorKind::BottomRight => &["bottom_right_corner", "se-resize"],
            CursorKind::Dragging => &["grabbing", "closedhand", "208530c400c041818281048008011002"],
            CursorKind::LeftPtr => &["left_ptr", "default", "top_left_arrow", "left-arrow"],
            CursorKind::Ibeam => &["xterm", "ibeam", "text"],
        }
    }
}

/// First animation frame of a theme cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorImage {
    /// Buffer owned by the theme
    pub buffer: ObjectId,
    pub width: u32,
    pub height: u32,
    pub hotspot_x: i32,
    pub hotspot_y: i32,
}

/// Compositor-side cursor theme loaded by the transport
pub trait CursorTheme {
    /// Resolve a theme cursor name to its first image
    fn cursor(&self, name: &str) -> Option<CursorImage>;
}

/// Resolved cursor images plus the state of the pointer image
pub struct CursorSet {
    surface: Option<ObjectId>,
    theme: Option<Box<dyn CursorTheme>>,
    images: [Option<CursorImage>; CursorKind::COUNT],
    current: CursorKind,
    serial: u32,
}

impl std::fmt::Debug for CursorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorSet")
            .field("surface", &self.surface)
            .field("theme_loaded", &self.theme.is_some())
            .field("current", &self.current)
            .field("serial", &self.serial)
            .finish()
    }
}

impl CursorSet {
    /// Create the cursor surface, load the theme and resolve every role
    pub fn load(
        transport: &mut dyn Transport,
        compositor: ObjectId,
        shm: ObjectId,
        config: &CursorConfig,
    ) -> Self {
        let surface = match transport.create_surface(compositor) {
            Ok(surface) => Some(surface),
            Err(e) => {
                warn!("⚠️ Cannot create cursor surface: {}", e);
                None
            }
        };

        let theme = transport.load_cursor_theme(shm, config.theme.as_deref(), config.size);
        if theme.is_none() {
            warn!(
                "⚠️ Cannot load cursor theme {:?} at size {}",
                config.theme.as_deref().unwrap_or("default"),
                config.size
            );
        }

        let mut images = [None; CursorKind::COUNT];
        if let Some(theme) = theme.as_deref() {
            for kind in CursorKind::ALL {
                let image = kind.candidates().iter().find_map(|name| theme.cursor(name));
                if image.is_none() && kind != CursorKind::None {
                    warn!("⚠️ Cannot load cursor for {:?}", kind);
                }
                images[kind.index()] = image;
            }
        }

        debug!(
            "🖱️ Cursor set loaded: {}/{} roles resolved",
            images.iter().filter(|i| i.is_some()).count(),
            CursorKind::COUNT
        );

        Self {
            surface,
            theme,
            images,
            current: CursorKind::None,
            serial: 0,
        }
    }

    pub fn image(&self, kind: CursorKind) -> Option<CursorImage> {
        self.images[kind.index()]
    }

    pub fn current(&self) -> CursorKind {
        self.current
    }

    /// Show `kind` on `pointer`
    ///
    /// Nothing is sent when `kind` is already shown and the pointer has not
    /// re-entered a surface since (`enter_serial` not newer than the serial
    /// of the last application). Returns whether a request was sent.
    pub fn apply(
        &mut self,
        transport: &mut dyn Transport,
        pointer: ObjectId,
        enter_serial: u32,
        kind: CursorKind,
    ) -> bool {
        let force = enter_serial > self.serial;
        if !force && kind == self.current {
            trace!("cursor {:?} already applied", kind);
            return false;
        }

        self.current = kind;
        self.serial = enter_serial;

        match (self.image(kind), self.surface) {
            (Some(image), Some(surface)) => {
                transport.set_cursor(pointer, enter_serial, Some((surface, image.hotspot_x, image.hotspot_y)));
                transport.attach(surface, Some(image.buffer), 0, 0);
                transport.damage(surface, Rect::from_size(image.width, image.height));
                transport.commit(surface);
            }
            _ => transport.set_cursor(pointer, enter_serial, None),
        }

        true
    }

    /// Drop the theme and destroy the cursor surface
    pub fn unload(mut self, transport: &mut dyn Transport) {
        self.theme = None;
        if let Some(surface) = self.surface.take() {
            transport.destroy_surface(surface);
        }
        debug!("🖱️ Cursor set unloaded");
    }
}
