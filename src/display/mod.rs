//! Display connection
//!
//! [`Display`] owns the transport, every window and widget, the cursor set
//! and the keyboard translation state. It becomes [`ConnectionState::Running`]
//! once the compositor, seat, shell and shm globals are bound and the seat
//! has produced a pointer and a keyboard, in whatever order the compositor
//! announces them. Listeners registered with
//! [`Display::register_listener`] hear about that transition exactly once,
//! and about a hangup.
//!
//! The host event loop drives the display through
//! [`Display::handle_fd_event`] and [`Display::dispatch_idle`].

mod router;

use log::{debug, error, info, trace, warn};
use std::collections::HashMap;

use crate::config::ToolkitConfig;
use crate::cursor::{CursorKind, CursorSet};
use crate::error::{Result, ToolkitError};
use crate::event_loop::{EventLoopHandle, IdleQueue, IdleTask};
use crate::input::{KeyboardState, KeymapCompiler, XkbCompiler};
use crate::protocol::{Capabilities, Interest, Interface, ObjectId, Readiness, Transport, TransportEvent};
use crate::widget::{CallbackWidget, Widget, WidgetId, WidgetSlot};
use crate::window::{Window, WindowId};

/// Lifecycle of the display connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for globals and seat devices
    Init,
    Running,
    /// The connection is gone; only teardown remains
    Hup,
}

/// Notifications delivered to display listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Ready,
    Hangup,
}

/// Handle returned by [`Display::register_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&mut Display, DisplayEvent)>;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Globals {
    pub(crate) compositor: Option<ObjectId>,
    pub(crate) seat: Option<ObjectId>,
    pub(crate) shell: Option<ObjectId>,
    pub(crate) shm: Option<ObjectId>,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SeatDevices {
    pub(crate) pointer: Option<ObjectId>,
    pub(crate) keyboard: Option<ObjectId>,
}

/// Client-side connection to a compositor
pub struct Display {
    pub(crate) config: ToolkitConfig,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) event_loop: Box<dyn EventLoopHandle>,
    pub(crate) keymap_compiler: Box<dyn KeymapCompiler>,
    pub(crate) state: ConnectionState,
    fd_registered: bool,
    fd_interest: Interest,

    pub(crate) globals: Globals,
    pub(crate) seat: SeatDevices,
    seat_caps: Capabilities,
    pub(crate) cursors: Option<CursorSet>,
    pub(crate) keyboard_state: Option<Box<dyn KeyboardState>>,

    /// Serial of the most recent input event
    pub(crate) last_serial: u32,
    /// Serial of the most recent pointer enter, used for cursor changes
    pub(crate) pointer_enter_serial: u32,
    pub(crate) pointer_focus: Option<WindowId>,
    pub(crate) keyboard_focus: Option<WindowId>,

    pub(crate) idle: IdleQueue,
    pub(crate) windows: HashMap<WindowId, Window>,
    pub(crate) window_order: Vec<WindowId>,
    pub(crate) next_window_id: u64,
    pub(crate) widgets: HashMap<WidgetId, WidgetSlot>,
    next_widget_id: u64,

    listeners: Vec<(ListenerId, Listener)>,
    removed_listeners: Vec<ListenerId>,
    next_listener_id: u64,
    broadcasting: bool,
}

impl Display {
    /// Connect the display to `transport` using the xkb keymap compiler
    pub fn new(
        config: ToolkitConfig,
        transport: Box<dyn Transport>,
        event_loop: Box<dyn EventLoopHandle>,
    ) -> Result<Self> {
        Self::with_keymap_compiler(config, transport, event_loop, Box::new(XkbCompiler::new()))
    }

    pub fn with_keymap_compiler(
        config: ToolkitConfig,
        transport: Box<dyn Transport>,
        mut event_loop: Box<dyn EventLoopHandle>,
        keymap_compiler: Box<dyn KeymapCompiler>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ToolkitError::config(e.to_string()))?;

        let fd = transport.fd();
        event_loop.register_fd(fd, Interest::READ).map_err(|e| {
            error!("❌ Cannot watch display fd {}: {}", fd, e);
            e
        })?;
        debug!("🔌 Display fd {} watched, waiting for globals", fd);

        Ok(Self {
            config,
            transport,
            event_loop,
            keymap_compiler,
            state: ConnectionState::Init,
            fd_registered: true,
            fd_interest: Interest::READ,
            globals: Globals::default(),
            seat: SeatDevices::default(),
            seat_caps: Capabilities::empty(),
            cursors: None,
            keyboard_state: None,
            last_serial: 0,
            pointer_enter_serial: 0,
            pointer_focus: None,
            keyboard_focus: None,
            idle: IdleQueue::new(),
            windows: HashMap::new(),
            window_order: Vec::new(),
            next_window_id: 1,
            widgets: HashMap::new(),
            next_widget_id: 1,
            listeners: Vec::new(),
            removed_listeners: Vec::new(),
            next_listener_id: 1,
            broadcasting: false,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    pub fn last_serial(&self) -> u32 {
        self.last_serial
    }

    pub fn pointer_focus(&self) -> Option<WindowId> {
        self.pointer_focus
    }

    pub fn keyboard_focus(&self) -> Option<WindowId> {
        self.keyboard_focus
    }

    pub fn has_keymap(&self) -> bool {
        self.keyboard_state.is_some()
    }

    /// Cursor role currently shown, once the cursor set is loaded
    pub fn current_cursor(&self) -> Option<CursorKind> {
        self.cursors.as_ref().map(CursorSet::current)
    }

    /// Add a listener; it is called for every later [`DisplayEvent`]
    pub fn register_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&mut Display, DisplayEvent) + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; takes effect after any broadcast in progress
    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        if let Some(index) = self.listeners.iter().position(|(l, _)| *l == id) {
            drop(self.listeners.remove(index));
            return true;
        }
        if !self.broadcasting || self.removed_listeners.contains(&id) || id.0 >= self.next_listener_id {
            return false;
        }
        // Owned by the broadcast in progress.
        self.removed_listeners.push(id);
        true
    }

    fn broadcast(&mut self, event: DisplayEvent) {
        let mut listeners = std::mem::take(&mut self.listeners);
        let nested = std::mem::replace(&mut self.broadcasting, true);
        for (_, listener) in listeners.iter_mut() {
            listener(self, event);
        }
        self.broadcasting = nested;

        // Keep listeners registered during the broadcast.
        listeners.append(&mut self.listeners);
        listeners.retain(|(id, _)| !self.removed_listeners.contains(id));
        if !nested {
            self.removed_listeners.clear();
        }
        self.listeners = listeners;
    }

    /// Handle readiness of the transport fd
    pub fn handle_fd_event(&mut self, readiness: Readiness) {
        if self.state == ConnectionState::Hup || !self.fd_registered {
            return;
        }

        if readiness.hangup {
            warn!("💔 Display connection hung up");
            self.hang_up();
            return;
        }

        match self.transport.dispatch(readiness) {
            Ok(events) => {
                for event in events {
                    self.handle_event(event);
                }
            }
            Err(e) => {
                error!("❌ Display dispatch failed: {}", e);
                self.hang_up();
                return;
            }
        }

        self.flush();
    }

    fn hang_up(&mut self) {
        self.state = ConnectionState::Hup;
        self.broadcast(DisplayEvent::Hangup);
        if self.fd_registered {
            self.fd_registered = false;
            self.event_loop.unregister_fd();
        }
    }

    /// Flush queued requests and keep fd interest in sync with the transport
    pub fn flush(&mut self) {
        if self.state == ConnectionState::Hup {
            return;
        }
        if let Err(e) = self.transport.flush() {
            warn!("⚠️ Display flush failed: {}", e);
        }

        let interest = self.transport.interest();
        if interest != self.fd_interest {
            match self.event_loop.update_fd_interest(interest) {
                Ok(()) => {
                    trace!("display fd interest {:?} -> {:?}", self.fd_interest, interest);
                    self.fd_interest = interest;
                }
                Err(e) => warn!("⚠️ Cannot update display fd interest: {}", e),
            }
        }
    }

    /// Run the idle tasks registered before this call
    pub fn dispatch_idle(&mut self) {
        let boundary = self.idle.begin_turn();
        while let Some((token, task)) = self.idle.pop_before(boundary) {
            match task {
                IdleTask::Frame(window) => self.run_idle_frame(window, token),
                IdleTask::Close(window) => self.run_close(window, token),
            }
        }

        if !self.idle.is_empty() {
            self.event_loop.request_idle();
        }
        self.flush();
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::GlobalAdvertised {
                name,
                interface,
                version,
            } => self.handle_global(name, &interface, version),
            TransportEvent::SeatCapabilities(caps) => self.handle_seat_capabilities(caps),
            TransportEvent::ShellPing { shell_surface, serial } => {
                self.transport.pong(shell_surface, serial);
            }
            TransportEvent::ShellConfigure {
                shell_surface,
                edges,
                width,
                height,
            } => self.handle_configure(shell_surface, edges, width, height),
            TransportEvent::FrameDone { callback, .. } => self.handle_frame_done(callback),
            TransportEvent::PointerEnter { serial, surface, x, y } => {
                self.handle_pointer_enter(serial, surface, x, y)
            }
            TransportEvent::PointerLeave { serial, .. } => self.handle_pointer_leave(serial),
            TransportEvent::PointerMotion { x, y, .. } => self.handle_pointer_motion(x, y),
            TransportEvent::PointerButton {
                serial, button, state, ..
            } => self.handle_pointer_button(serial, button, state),
            TransportEvent::PointerAxis { axis, value, .. } => {
                trace!("ignoring pointer axis {} value {}", axis, value);
            }
            TransportEvent::KeyboardKeymap { format, fd, size } => self.handle_keymap(format, fd, size),
            TransportEvent::KeyboardEnter { serial, surface } => self.handle_keyboard_enter(serial, surface),
            TransportEvent::KeyboardLeave { serial, .. } => self.handle_keyboard_leave(serial),
            TransportEvent::Key { serial, key, state, .. } => self.handle_key(serial, key, state),
            TransportEvent::KeyboardModifiers {
                serial,
                depressed,
                latched,
                locked,
                group,
            } => self.handle_modifiers(serial, depressed, latched, locked, group),
        }
    }

    fn handle_global(&mut self, name: u32, interface_name: &str, version: u32) {
        let interface = Interface::from_name(interface_name);
        let slot = match &interface {
            Interface::Compositor => &mut self.globals.compositor,
            Interface::Seat => &mut self.globals.seat,
            Interface::Shell => &mut self.globals.shell,
            Interface::Shm => &mut self.globals.shm,
            Interface::Display | Interface::Unknown(_) => {
                debug!("Ignoring global {} ({} v{})", name, interface_name, version);
                return;
            }
        };

        if slot.is_some() {
            error!("❌ Global {} advertised twice, keeping the first", interface.name());
            return;
        }

        match self.transport.bind(name, &interface) {
            Ok(object) => {
                *slot = Some(object);
                debug!("🔗 Bound {} v{} as {}", interface.name(), version, object);
            }
            Err(e) => {
                error!("❌ Cannot bind {}: {}", interface.name(), e);
                return;
            }
        }

        if interface == Interface::Seat {
            self.acquire_seat_devices();
        }
        self.check_ready();
    }

    /// Record seat capabilities; devices are acquired once the seat is bound
    fn handle_seat_capabilities(&mut self, caps: Capabilities) {
        self.seat_caps |= caps;
        if self.globals.seat.is_none() {
            debug!("Seat capabilities {:?} before the seat global, deferred", caps);
            return;
        }
        self.acquire_seat_devices();
        self.check_ready();
    }

    fn acquire_seat_devices(&mut self) {
        let Some(seat) = self.globals.seat else {
            return;
        };

        if self.seat_caps.contains(Capabilities::POINTER) && self.seat.pointer.is_none() {
            match self.transport.get_pointer(seat) {
                Ok(pointer) => {
                    debug!("🖱️ Pointer {} acquired", pointer);
                    self.seat.pointer = Some(pointer);
                }
                Err(e) => error!("❌ Cannot get pointer: {}", e),
            }
        }

        if self.seat_caps.contains(Capabilities::KEYBOARD) && self.seat.keyboard.is_none() {
            match self.transport.get_keyboard(seat) {
                Ok(keyboard) => {
                    debug!("⌨️ Keyboard {} acquired", keyboard);
                    self.seat.keyboard = Some(keyboard);
                }
                Err(e) => error!("❌ Cannot get keyboard: {}", e),
            }
        }
    }

    /// Enter Running once every global and seat device is present
    fn check_ready(&mut self) {
        if self.state != ConnectionState::Init {
            return;
        }

        let Globals {
            compositor: Some(compositor),
            seat: Some(_),
            shell: Some(_),
            shm: Some(shm),
        } = self.globals
        else {
            return;
        };
        if self.seat.pointer.is_none() || self.seat.keyboard.is_none() {
            return;
        }

        self.cursors = Some(CursorSet::load(
            self.transport.as_mut(),
            compositor,
            shm,
            &self.config.cursor,
        ));
        self.state = ConnectionState::Running;
        info!("✅ Display ready");
        self.broadcast(DisplayEvent::Ready);
    }

    /// Attach `widget` to `window`; the window redraws on its next frame
    pub fn create_widget(&mut self, window: WindowId, widget: Box<dyn Widget>) -> Result<WidgetId> {
        let id = WidgetId(self.next_widget_id);
        let owner = self
            .windows
            .get_mut(&window)
            .ok_or(ToolkitError::UnknownWindow(window))?;
        self.next_widget_id += 1;
        owner.widgets.push(id);
        self.widgets.insert(
            id,
            WidgetSlot {
                window,
                handler: Some(widget),
            },
        );
        debug!("🧩 Widget {:?} added to window {:?}", id, window);
        self.schedule_redraw(window)?;
        Ok(id)
    }

    /// Attach an empty [`CallbackWidget`], to be wired up with [`Display::widget_callbacks`]
    pub fn create_callback_widget(&mut self, window: WindowId) -> Result<WidgetId> {
        self.create_widget(window, Box::new(CallbackWidget::new()))
    }

    /// Callback slots of a widget created from a [`CallbackWidget`]
    pub fn widget_callbacks(&mut self, id: WidgetId) -> Result<&mut CallbackWidget> {
        self.widgets
            .get_mut(&id)
            .and_then(|slot| slot.handler.as_mut())
            .and_then(|handler| handler.as_callbacks())
            .ok_or(ToolkitError::UnknownWidget(id))
    }

    /// Run the widget's destroy hook and detach it from its window
    pub fn destroy_widget(&mut self, id: WidgetId) -> Result<()> {
        let slot = self.widgets.remove(&id).ok_or(ToolkitError::UnknownWidget(id))?;
        if let Some(mut handler) = slot.handler {
            handler.destroy();
        }
        if let Some(window) = self.windows.get_mut(&slot.window) {
            window.widgets.retain(|w| *w != id);
        }
        debug!("🧩 Widget {:?} destroyed", id);
        Ok(())
    }

    pub fn widget_window(&self, id: WidgetId) -> Option<WindowId> {
        self.widgets.get(&id).map(|slot| slot.window)
    }

    /// Widgets of `window` in creation order
    pub fn widgets(&self, window: WindowId) -> Vec<WidgetId> {
        self.windows
            .get(&window)
            .map(|w| w.widgets.clone())
            .unwrap_or_default()
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        for window in self.window_order.clone() {
            if let Err(e) = self.destroy_window(window) {
                warn!("⚠️ Window teardown failed: {}", e);
            }
        }
        if let Some(cursors) = self.cursors.take() {
            cursors.unload(self.transport.as_mut());
        }
        if self.fd_registered {
            self.fd_registered = false;
            self.event_loop.unregister_fd();
        }
        if self.state != ConnectionState::Hup {
            if let Err(e) = self.transport.flush() {
                debug!("Final flush failed: {}", e);
            }
        }
        self.transport.disconnect();
        self.listeners.clear();
        info!("👋 Display disconnected");
    }
}
