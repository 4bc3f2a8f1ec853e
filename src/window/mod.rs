//! Toplevel windows and frame scheduling
//!
//! A window owns a compositor surface, its shell role, one ARGB8888 buffer
//! and the shm pool the buffer lives in. Size changes and redraws are never
//! performed inline: they set `need_resize` / `need_redraw` and schedule a
//! frame. A frame runs either from the idle queue or when the compositor's
//! frame callback fires, and at most one idle frame task plus one frame
//! callback are outstanding per window, so any burst of requests between two
//! frames collapses into a single resize or redraw.
//!
//! Windows are addressed by [`WindowId`] and owned by the [`Display`].

use log::{debug, error, info, trace, warn};

use crate::cursor::CursorKind;
use crate::display::{ConnectionState, Display};
use crate::error::{Result, ToolkitError};
use crate::event_loop::{EventLoopHandle, IdleTask, IdleToken};
use crate::protocol::{ObjectId, Rect, ResizeEdges, ShmFormat};
use crate::shm::{BufferRegion, ShmBuffer, ShmPool, BYTES_PER_PIXEL};
use crate::widget::{Widget, WidgetId, WindowContext};

/// Handle of a window owned by a [`Display`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

type CloseHandler = Box<dyn FnMut(&mut Display, WindowId)>;

pub(crate) struct Window {
    pub(crate) surface: ObjectId,
    pub(crate) shell_surface: ObjectId,
    pub(crate) buffer: Option<ObjectId>,
    pub(crate) pool: Option<ShmPool>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) stride: u32,
    /// Widgets in creation order
    pub(crate) widgets: Vec<WidgetId>,

    buffer_attached: bool,
    skip_damage: bool,
    need_resize: bool,
    need_redraw: bool,
    /// A frame callback is pending and will run the next frame
    need_frame: bool,
    new_width: u32,
    new_height: u32,
    /// Edges of an interactive resize, consumed by the next attach
    resize_edges: ResizeEdges,

    pub(crate) frame_callback: Option<ObjectId>,
    idle_token: Option<IdleToken>,
    close_token: Option<IdleToken>,
    close_handler: Option<CloseHandler>,
}

impl Window {
    fn new(surface: ObjectId, shell_surface: ObjectId) -> Self {
        Self {
            surface,
            shell_surface,
            buffer: None,
            pool: None,
            width: 0,
            height: 0,
            stride: 0,
            widgets: Vec::new(),
            buffer_attached: false,
            skip_damage: false,
            need_resize: false,
            need_redraw: false,
            need_frame: false,
            new_width: 0,
            new_height: 0,
            resize_edges: ResizeEdges::empty(),
            frame_callback: None,
            idle_token: None,
            close_token: None,
            close_handler: None,
        }
    }
}

/// Attach offset keeping the edges opposite to `edges` in place
///
/// Growing a window while dragging its left (top) edge moves the origin to
/// the left (up), so the offset is negative; shrinking makes it positive.
pub fn anchor_offset(edges: ResizeEdges, old: (u32, u32), new: (u32, u32)) -> (i32, i32) {
    let dx = if edges.contains(ResizeEdges::LEFT) {
        old.0 as i32 - new.0 as i32
    } else {
        0
    };
    let dy = if edges.contains(ResizeEdges::TOP) {
        old.1 as i32 - new.1 as i32
    } else {
        0
    };
    (dx, dy)
}

/// Snapshot of a window's buffer geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pool_size: usize,
    pub buffer: Option<ObjectId>,
}

impl Display {
    fn window_ref(&self, id: WindowId) -> Result<&Window> {
        self.windows.get(&id).ok_or(ToolkitError::UnknownWindow(id))
    }

    fn window_mut(&mut self, id: WindowId) -> Result<&mut Window> {
        self.windows.get_mut(&id).ok_or(ToolkitError::UnknownWindow(id))
    }

    /// Create a toplevel window with an initial `width` x `height` buffer
    pub fn create_window(&mut self, width: u32, height: u32) -> Result<WindowId> {
        if self.state != ConnectionState::Running {
            error!("❌ Cannot create window: display is {:?}", self.state);
            return Err(ToolkitError::state(format!("display is {:?}", self.state)));
        }
        if width == 0 || height == 0 {
            return Err(ToolkitError::InvalidArgument(format!(
                "window size {}x{} must be non-zero",
                width, height
            )));
        }

        let (Some(compositor), Some(shell)) = (self.globals.compositor, self.globals.shell) else {
            return Err(ToolkitError::state("compositor or shell global missing"));
        };

        let surface = self.transport.create_surface(compositor).map_err(|e| {
            error!("❌ Cannot create surface: {}", e);
            e
        })?;
        let shell_surface = match self.transport.create_shell_surface(shell, surface) {
            Ok(shell_surface) => shell_surface,
            Err(e) => {
                error!("❌ Cannot create shell surface: {}", e);
                self.transport.destroy_surface(surface);
                return Err(e);
            }
        };
        self.transport.set_toplevel(shell_surface);

        let id = WindowId(self.next_window_id);
        self.next_window_id += 1;
        self.windows.insert(id, Window::new(surface, shell_surface));

        if let Err(e) = self.resize_buffer(id, width, height) {
            error!("❌ Cannot allocate buffer for new window: {}", e);
            if let Some(window) = self.windows.remove(&id) {
                self.release_window_resources(window);
            }
            return Err(e);
        }

        self.window_order.push(id);
        info!("🪟 Created window {:?} ({}x{})", id, width, height);
        Ok(id)
    }

    /// Destroy a window, its widgets and every compositor object it owns
    pub fn destroy_window(&mut self, id: WindowId) -> Result<()> {
        let widgets = self.window_ref(id)?.widgets.clone();
        for widget in widgets {
            if let Err(e) = self.destroy_widget(widget) {
                warn!("⚠️ Widget {:?} vanished during window teardown: {}", widget, e);
            }
        }

        let Some(mut window) = self.windows.remove(&id) else {
            return Err(ToolkitError::UnknownWindow(id));
        };

        if let Some(token) = window.close_token.take() {
            self.idle.cancel(token);
        }
        if let Some(token) = window.idle_token.take() {
            self.idle.cancel(token);
        }
        self.window_order.retain(|w| *w != id);
        if self.pointer_focus == Some(id) {
            self.pointer_focus = None;
        }
        if self.keyboard_focus == Some(id) {
            self.keyboard_focus = None;
        }

        self.release_window_resources(window);
        info!("🗑️ Destroyed window {:?}", id);
        Ok(())
    }

    fn release_window_resources(&mut self, mut window: Window) {
        if let Some(callback) = window.frame_callback.take() {
            self.transport.destroy_callback(callback);
        }
        if let Some(buffer) = window.buffer.take() {
            self.transport.destroy_buffer(buffer);
        }
        if let Some(pool) = window.pool.take() {
            pool.release(self.transport.as_mut());
        }
        self.transport.destroy_shell_surface(window.shell_surface);
        self.transport.destroy_surface(window.surface);
    }

    /// Request a new size, applied on the next frame
    ///
    /// Later requests before that frame replace earlier ones.
    pub fn set_size(&mut self, id: WindowId, width: u32, height: u32) -> Result<()> {
        let window = self.window_mut(id)?;
        window.new_width = width;
        window.new_height = height;
        window.need_resize = true;
        trace!("window {:?} resize to {}x{} requested", id, width, height);
        self.schedule_frame(id);
        Ok(())
    }

    /// Request a redraw on the next frame
    pub fn schedule_redraw(&mut self, id: WindowId) -> Result<()> {
        self.window_mut(id)?.need_redraw = true;
        self.schedule_frame(id);
        Ok(())
    }

    /// Show `kind` as the pointer image while the pointer is over the window
    pub fn set_cursor(&mut self, id: WindowId, kind: CursorKind) -> Result<()> {
        self.window_ref(id)?;
        if self.state == ConnectionState::Hup {
            return Ok(());
        }
        let Some(pointer) = self.seat.pointer else {
            return Ok(());
        };
        if let Some(cursors) = self.cursors.as_mut() {
            if cursors.apply(self.transport.as_mut(), pointer, self.pointer_enter_serial, kind) {
                trace!("cursor {:?} applied for window {:?}", kind, id);
            }
        }
        Ok(())
    }

    /// Install the handler run when the window is asked to close
    pub fn set_close_handler<F>(&mut self, id: WindowId, handler: F) -> Result<()>
    where
        F: FnMut(&mut Display, WindowId) + 'static,
    {
        self.window_mut(id)?.close_handler = Some(Box::new(handler));
        Ok(())
    }

    /// Run the close handler on the next idle turn
    ///
    /// Repeated requests before that turn are ignored.
    pub fn close(&mut self, id: WindowId) -> Result<()> {
        let window = self.windows.get_mut(&id).ok_or(ToolkitError::UnknownWindow(id))?;
        if window.close_token.is_some() {
            trace!("close of window {:?} already pending", id);
            return Ok(());
        }
        window.close_token = Some(self.idle.register(IdleTask::Close(id)));
        self.event_loop.request_idle();
        Ok(())
    }

    /// Start an interactive move using the last input serial
    pub fn start_move(&mut self, id: WindowId) -> Result<()> {
        let shell_surface = self.window_ref(id)?.shell_surface;
        if self.state == ConnectionState::Hup {
            return Ok(());
        }
        let Some(seat) = self.globals.seat else {
            return Err(ToolkitError::state("no seat bound"));
        };
        debug!("✋ Interactive move of window {:?}", id);
        self.transport.start_move(shell_surface, seat, self.last_serial);
        Ok(())
    }

    /// Start an interactive resize along `edges` using the last input serial
    pub fn start_resize(&mut self, id: WindowId, edges: ResizeEdges) -> Result<()> {
        let shell_surface = self.window_ref(id)?.shell_surface;
        if self.state == ConnectionState::Hup {
            return Ok(());
        }
        let Some(seat) = self.globals.seat else {
            return Err(ToolkitError::state("no seat bound"));
        };
        debug!("↔️ Interactive resize of window {:?} ({:?})", id, edges);
        self.transport.start_resize(shell_surface, seat, self.last_serial, edges);
        Ok(())
    }

    /// Pixel view of the window buffer, clipped to `rect` when given
    pub fn buffer(&mut self, id: WindowId, rect: Option<Rect>) -> Result<ShmBuffer<'_>> {
        let window = self.window_mut(id)?;
        let region = BufferRegion::clip(window.width, window.height, rect);
        Ok(match window.pool.as_mut() {
            Some(pool) => ShmBuffer::from_region(pool.data_mut(), region),
            None => ShmBuffer::empty(),
        })
    }

    /// Mark `rect` as changed and commit it
    ///
    /// Ignored while widgets are redrawing; a redraw damages the whole
    /// buffer anyway.
    pub fn damage(&mut self, id: WindowId, rect: Rect) -> Result<()> {
        let window = self.window_ref(id)?;
        if window.skip_damage || self.state == ConnectionState::Hup {
            return Ok(());
        }
        let surface = window.surface;
        self.transport.damage(surface, rect);
        self.transport.commit(surface);
        Ok(())
    }

    pub fn window_size(&self, id: WindowId) -> Option<(u32, u32)> {
        self.windows.get(&id).map(|w| (w.width, w.height))
    }

    pub fn buffer_info(&self, id: WindowId) -> Option<BufferInfo> {
        self.windows.get(&id).map(|w| BufferInfo {
            width: w.width,
            height: w.height,
            stride: w.stride,
            pool_size: w.pool.as_ref().map_or(0, ShmPool::size),
            buffer: w.buffer,
        })
    }

    /// Live windows in creation order
    pub fn windows(&self) -> &[WindowId] {
        &self.window_order
    }

    pub fn event_loop_mut(&mut self) -> &mut dyn EventLoopHandle {
        self.event_loop.as_mut()
    }

    pub(crate) fn window_for_surface(&self, surface: ObjectId) -> Option<WindowId> {
        self.window_order
            .iter()
            .copied()
            .find(|id| self.windows.get(id).is_some_and(|w| w.surface == surface))
    }

    /// Run `f` for every widget of `window` in creation order
    ///
    /// Each widget is taken out of its slot while it runs, so `f` may freely
    /// use the display through the context. Widgets created meanwhile are not
    /// visited; widgets destroyed meanwhile are skipped.
    pub(crate) fn for_each_widget<F>(&mut self, window: WindowId, mut f: F)
    where
        F: FnMut(&mut dyn Widget, &mut WindowContext<'_>),
    {
        let Some(ids) = self.windows.get(&window).map(|w| w.widgets.clone()) else {
            return;
        };

        for id in ids {
            let Some(mut handler) = self.widgets.get_mut(&id).and_then(|slot| slot.handler.take()) else {
                continue;
            };
            {
                let mut ctx = WindowContext::new(self, window);
                f(handler.as_mut(), &mut ctx);
            }
            if let Some(slot) = self.widgets.get_mut(&id) {
                slot.handler = Some(handler);
            }
        }
    }

    /// Make sure a frame will run for `id`
    pub(crate) fn schedule_frame(&mut self, id: WindowId) {
        if self.state == ConnectionState::Hup {
            return;
        }
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        if window.frame_callback.is_some() {
            // The pending callback runs the frame.
            return;
        }
        if window.need_frame || window.idle_token.is_some() {
            return;
        }

        window.idle_token = Some(self.idle.register(IdleTask::Frame(id)));
        match self.transport.frame(window.surface) {
            Ok(callback) => window.frame_callback = Some(callback),
            Err(e) => debug!("No frame callback for window {:?}, idle only: {}", id, e),
        }
        self.event_loop.request_idle();
    }

    /// Idle half of a frame
    pub(crate) fn run_idle_frame(&mut self, id: WindowId, token: IdleToken) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        if window.idle_token.as_ref() != Some(&token) {
            return;
        }
        window.need_frame = window.frame_callback.is_some();
        self.do_frame(id);
    }

    pub(crate) fn handle_frame_done(&mut self, callback: ObjectId) {
        let Some(id) = self
            .window_order
            .iter()
            .copied()
            .find(|id| self.windows.get(id).is_some_and(|w| w.frame_callback == Some(callback)))
        else {
            debug!("Frame done for unknown callback {}", callback);
            return;
        };

        self.transport.destroy_callback(callback);
        if let Some(window) = self.windows.get_mut(&id) {
            window.frame_callback = None;
            window.need_frame = false;
        }
        self.do_frame(id);
    }

    fn do_frame(&mut self, id: WindowId) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        if let Some(token) = window.idle_token.take() {
            self.idle.cancel(token);
        }
        if self.state == ConnectionState::Hup {
            trace!("frame of window {:?} dropped after hangup", id);
            return;
        }

        let committed = if window.need_resize {
            window.need_resize = false;
            window.need_redraw = false;
            let (width, height) = (window.new_width, window.new_height);
            match self.resize_buffer(id, width, height) {
                Ok(committed) => committed,
                Err(e) => {
                    error!("❌ Cannot resize window {:?} to {}x{}: {}", id, width, height, e);
                    false
                }
            }
        } else if window.need_redraw {
            window.need_redraw = false;
            let (width, height) = (window.width, window.height);
            self.redraw(id, width, height)
        } else {
            false
        };

        if !committed {
            self.drop_frame_callback(id);
        }
    }

    /// Forget a frame callback that no commit will ever trigger
    fn drop_frame_callback(&mut self, id: WindowId) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        window.need_frame = false;
        if let Some(callback) = window.frame_callback.take() {
            trace!("window {:?} committed nothing, dropping frame callback {}", id, callback);
            self.transport.destroy_callback(callback);
        }
    }

    pub(crate) fn run_close(&mut self, id: WindowId, token: IdleToken) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        if window.close_token.as_ref() != Some(&token) {
            return;
        }
        window.close_token = None;

        let Some(mut handler) = window.close_handler.take() else {
            debug!("Window {:?} has no close handler", id);
            return;
        };
        handler(self, id);
        if let Some(window) = self.windows.get_mut(&id) {
            if window.close_handler.is_none() {
                window.close_handler = Some(handler);
            }
        }
    }

    pub(crate) fn handle_configure(&mut self, shell_surface: ObjectId, edges: ResizeEdges, width: i32, height: i32) {
        let Some(id) = self
            .window_order
            .iter()
            .copied()
            .find(|id| self.windows.get(id).is_some_and(|w| w.shell_surface == shell_surface))
        else {
            debug!("Configure for unknown shell surface {}", shell_surface);
            return;
        };

        let width = width.max(1) as u32;
        let height = height.max(1) as u32;
        if let Some(window) = self.windows.get_mut(&id) {
            window.resize_edges = edges;
        }
        trace!("configure {:?}: {}x{} edges {:?}", id, width, height, edges);
        let _ = self.set_size(id, width, height);
    }

    /// Reallocate the window buffer at the size the widgets agree on
    ///
    /// Returns whether the surface was committed. On failure the previous
    /// buffer stays in place.
    fn resize_buffer(&mut self, id: WindowId, width: u32, height: u32) -> Result<bool> {
        let (mut width, mut height) = (width, height);
        self.for_each_widget(id, |widget, _| widget.prepare_resize(&mut width, &mut height));
        let width = width.max(1);
        let height = height.max(1);

        let window = self.windows.get_mut(&id).ok_or(ToolkitError::UnknownWindow(id))?;
        if window.buffer.is_some() && window.width == width && window.height == height {
            trace!("window {:?} already {}x{}", id, width, height);
            window.resize_edges = ResizeEdges::empty();
            return Ok(false);
        }
        let (old_width, old_height) = (window.width, window.height);

        let stride = width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(|| ToolkitError::InvalidArgument(format!("width {} too large", width)))?;
        let size = (stride as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| ToolkitError::InvalidArgument(format!("size {}x{} too large", width, height)))?;

        let shm = self.globals.shm.ok_or_else(|| ToolkitError::state("shm global missing"))?;
        let reuse = window.pool.as_ref().is_some_and(|pool| pool.size() >= size);
        let replacement = if reuse {
            None
        } else {
            Some(ShmPool::allocate(self.transport.as_mut(), shm, &self.config.shm, size)?)
        };

        let window = self.windows.get_mut(&id).ok_or(ToolkitError::UnknownWindow(id))?;
        let pool_id = match replacement.as_ref().or(window.pool.as_ref()) {
            Some(pool) => pool.id(),
            None => return Err(ToolkitError::state("window has no shm pool")),
        };
        let buffer = match self
            .transport
            .create_buffer(pool_id, 0, width, height, stride, ShmFormat::Argb8888)
        {
            Ok(buffer) => buffer,
            Err(e) => {
                error!("❌ Cannot create {}x{} buffer: {}", width, height, e);
                if let Some(pool) = replacement {
                    pool.release(self.transport.as_mut());
                }
                return Err(e);
            }
        };

        let old_buffer = window.buffer.replace(buffer);
        let old_pool = match replacement {
            Some(pool) => window.pool.replace(pool),
            None => None,
        };
        window.width = width;
        window.height = height;
        window.stride = stride;
        window.buffer_attached = false;
        debug!(
            "📐 Window {:?} resized {}x{} -> {}x{} ({} byte pool)",
            id,
            old_width,
            old_height,
            width,
            height,
            window.pool.as_ref().map_or(0, ShmPool::size)
        );

        let committed = self.redraw(id, old_width, old_height);

        if let Some(buffer) = old_buffer {
            self.transport.destroy_buffer(buffer);
        }
        if let Some(pool) = old_pool {
            pool.release(self.transport.as_mut());
        }
        Ok(committed)
    }

    /// Clear the buffer, let every widget paint, then attach and commit
    ///
    /// `old_width` / `old_height` are the size before the last resize and
    /// only matter for the first attach of a new buffer. Returns whether the
    /// surface was committed.
    fn redraw(&mut self, id: WindowId, old_width: u32, old_height: u32) -> bool {
        let Some(window) = self.windows.get(&id) else {
            return false;
        };
        let alloc = Rect::from_size(window.width, window.height);
        self.for_each_widget(id, |widget, ctx| widget.resize(ctx, alloc));

        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        let len = window.stride as usize * window.height as usize;
        if let Some(pixels) = window.pool.as_mut().and_then(|pool| pool.data_mut().get_mut(..len)) {
            pixels.fill(0);
        }
        window.skip_damage = true;

        self.for_each_widget(id, |widget, ctx| widget.redraw(ctx));

        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        window.skip_damage = false;
        if self.state == ConnectionState::Hup {
            return false;
        }

        let (dx, dy) = if window.buffer_attached {
            (0, 0)
        } else {
            window.buffer_attached = true;
            let offset = anchor_offset(
                window.resize_edges,
                (old_width, old_height),
                (window.width, window.height),
            );
            window.resize_edges = ResizeEdges::empty();
            offset
        };

        self.transport.attach(window.surface, window.buffer, dx, dy);
        self.transport
            .damage(window.surface, Rect::from_size(window.width, window.height));
        self.transport.commit(window.surface);
        true
    }
}
