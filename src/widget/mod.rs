//! Widgets attached to windows
//!
//! A widget is anything implementing [`Widget`]. Every hook has a no-op
//! default, so a widget only overrides the events it cares about. Hooks that
//! may act on the window receive a [`WindowContext`] scoped to the owning
//! window.
//!
//! [`CallbackWidget`] adapts plain closures to the trait for callers that
//! prefer to wire behaviour up after creating the widget.

use crate::display::Display;
use crate::cursor::CursorKind;
use crate::error::Result;
use crate::input::{Keysym, Modifiers};
use crate::protocol::{ButtonState, KeyState, Rect, ResizeEdges};
use crate::shm::ShmBuffer;
use crate::window::WindowId;

/// Handle of a widget owned by a [`Display`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub(crate) u64);

/// Event hooks of a widget
pub trait Widget {
    /// Paint into the window buffer; the buffer was cleared beforehand
    fn redraw(&mut self, _ctx: &mut WindowContext<'_>) {}

    /// Called once, right before the widget is removed
    fn destroy(&mut self) {}

    /// Adjust a proposed window size (e.g. snap to a cell grid)
    fn prepare_resize(&mut self, _width: &mut u32, _height: &mut u32) {}

    /// Allocation rectangle, delivered before every redraw
    fn resize(&mut self, _ctx: &mut WindowContext<'_>, _alloc: Rect) {}

    fn pointer_enter(&mut self, _ctx: &mut WindowContext<'_>, _x: i32, _y: i32) {}

    fn pointer_leave(&mut self, _ctx: &mut WindowContext<'_>) {}

    fn pointer_motion(&mut self, _ctx: &mut WindowContext<'_>, _x: i32, _y: i32) {}

    fn pointer_button(&mut self, _ctx: &mut WindowContext<'_>, _button: u32, _state: ButtonState) {}

    fn keyboard(&mut self, _ctx: &mut WindowContext<'_>, _modifiers: Modifiers, _sym: Keysym, _state: KeyState) {}

    /// Downcast hook used by [`Display::widget_callbacks`]
    fn as_callbacks(&mut self) -> Option<&mut CallbackWidget> {
        None
    }
}

pub(crate) struct WidgetSlot {
    pub(crate) window: WindowId,
    /// `None` while the widget is running one of its own hooks
    pub(crate) handler: Option<Box<dyn Widget>>,
}

/// Window operations available to widget hooks
pub struct WindowContext<'a> {
    display: &'a mut Display,
    window: WindowId,
}

impl<'a> WindowContext<'a> {
    pub(crate) fn new(display: &'a mut Display, window: WindowId) -> Self {
        Self { display, window }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Committed buffer size
    pub fn size(&self) -> (u32, u32) {
        self.display.window_size(self.window).unwrap_or((0, 0))
    }

    /// View of the window buffer, clipped to `rect` when given
    pub fn buffer(&mut self, rect: Option<Rect>) -> ShmBuffer<'_> {
        self.display
            .buffer(self.window, rect)
            .unwrap_or_else(|_| ShmBuffer::empty())
    }

    pub fn damage(&mut self, rect: Rect) {
        let _ = self.display.damage(self.window, rect);
    }

    pub fn schedule_redraw(&mut self) {
        let _ = self.display.schedule_redraw(self.window);
    }

    pub fn set_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.display.set_size(self.window, width, height)
    }

    pub fn set_cursor(&mut self, kind: CursorKind) {
        let _ = self.display.set_cursor(self.window, kind);
    }

    /// Request the window's close handler on the next idle turn
    pub fn close(&mut self) {
        let _ = self.display.close(self.window);
    }

    pub fn start_move(&mut self) {
        let _ = self.display.start_move(self.window);
    }

    pub fn start_resize(&mut self, edges: ResizeEdges) {
        let _ = self.display.start_resize(self.window, edges);
    }
}

type RedrawFn = Box<dyn FnMut(&mut WindowContext<'_>)>;
type DestroyFn = Box<dyn FnMut()>;
type PrepareResizeFn = Box<dyn FnMut(&mut u32, &mut u32)>;
type ResizeFn = Box<dyn FnMut(&mut WindowContext<'_>, Rect)>;
type PointerPosFn = Box<dyn FnMut(&mut WindowContext<'_>, i32, i32)>;
type PointerLeaveFn = Box<dyn FnMut(&mut WindowContext<'_>)>;
type PointerButtonFn = Box<dyn FnMut(&mut WindowContext<'_>, u32, ButtonState)>;
type KeyboardFn = Box<dyn FnMut(&mut WindowContext<'_>, Modifiers, Keysym, KeyState)>;

/// Widget made of optional closures
#[derive(Default)]
pub struct CallbackWidget {
    redraw: Option<RedrawFn>,
    destroy: Option<DestroyFn>,
    prepare_resize: Option<PrepareResizeFn>,
    resize: Option<ResizeFn>,
    pointer_enter: Option<PointerPosFn>,
    pointer_leave: Option<PointerLeaveFn>,
    pointer_motion: Option<PointerPosFn>,
    pointer_button: Option<PointerButtonFn>,
    keyboard: Option<KeyboardFn>,
}

impl CallbackWidget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_redraw_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut(&mut WindowContext<'_>) + 'static,
    {
        self.redraw = Some(Box::new(cb));
        self
    }

    pub fn set_destroy_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut() + 'static,
    {
        self.destroy = Some(Box::new(cb));
        self
    }

    pub fn set_prepare_resize_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut(&mut u32, &mut u32) + 'static,
    {
        self.prepare_resize = Some(Box::new(cb));
        self
    }

    pub fn set_resize_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut(&mut WindowContext<'_>, Rect) + 'static,
    {
        self.resize = Some(Box::new(cb));
        self
    }

    pub fn set_pointer_enter_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut(&mut WindowContext<'_>, i32, i32) + 'static,
    {
        self.pointer_enter = Some(Box::new(cb));
        self
    }

    pub fn set_pointer_leave_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut(&mut WindowContext<'_>) + 'static,
    {
        self.pointer_leave = Some(Box::new(cb));
        self
    }

    pub fn set_pointer_motion_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut(&mut WindowContext<'_>, i32, i32) + 'static,
    {
        self.pointer_motion = Some(Box::new(cb));
        self
    }

    pub fn set_pointer_button_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut(&mut WindowContext<'_>, u32, ButtonState) + 'static,
    {
        self.pointer_button = Some(Box::new(cb));
        self
    }

    pub fn set_keyboard_cb<F>(&mut self, cb: F) -> &mut Self
    where
        F: FnMut(&mut WindowContext<'_>, Modifiers, Keysym, KeyState) + 'static,
    {
        self.keyboard = Some(Box::new(cb));
        self
    }
}

impl Widget for CallbackWidget {
    fn redraw(&mut self, ctx: &mut WindowContext<'_>) {
        if let Some(cb) = self.redraw.as_mut() {
            cb(ctx);
        }
    }

    fn destroy(&mut self) {
        if let Some(cb) = self.destroy.as_mut() {
            cb();
        }
    }

    fn prepare_resize(&mut self, width: &mut u32, height: &mut u32) {
        if let Some(cb) = self.prepare_resize.as_mut() {
            cb(width, height);
        }
    }

    fn resize(&mut self, ctx: &mut WindowContext<'_>, alloc: Rect) {
        if let Some(cb) = self.resize.as_mut() {
            cb(ctx, alloc);
        }
    }

    fn pointer_enter(&mut self, ctx: &mut WindowContext<'_>, x: i32, y: i32) {
        if let Some(cb) = self.pointer_enter.as_mut() {
            cb(ctx, x, y);
        }
    }

    fn pointer_leave(&mut self, ctx: &mut WindowContext<'_>) {
        if let Some(cb) = self.pointer_leave.as_mut() {
            cb(ctx);
        }
    }

    fn pointer_motion(&mut self, ctx: &mut WindowContext<'_>, x: i32, y: i32) {
        if let Some(cb) = self.pointer_motion.as_mut() {
            cb(ctx, x, y);
        }
    }

    fn pointer_button(&mut self, ctx: &mut WindowContext<'_>, button: u32, state: ButtonState) {
        if let Some(cb) = self.pointer_button.as_mut() {
            cb(ctx, button, state);
        }
    }

    fn keyboard(&mut self, ctx: &mut WindowContext<'_>, modifiers: Modifiers, sym: Keysym, state: KeyState) {
        if let Some(cb) = self.keyboard.as_mut() {
            cb(ctx, modifiers, sym, state);
        }
    }

    fn as_callbacks(&mut self) -> Option<&mut CallbackWidget> {
        Some(self)
    }
}
