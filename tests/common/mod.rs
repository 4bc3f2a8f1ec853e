// Shared fixtures for the toolkit integration tests
//
// MockTransport records every request and replays queued server events on
// dispatch; ManualLoop records what the display asks of its event loop.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;

use axiom_toolkit::cursor::{CursorImage, CursorTheme};
use axiom_toolkit::error::{Result, ToolkitError};
use axiom_toolkit::event_loop::EventLoopHandle;
use axiom_toolkit::input::{KeyboardState, KeymapCompiler, Keysym, ModifierName};
use axiom_toolkit::protocol::{
    Capabilities, Interest, Interface, KeymapFormat, ObjectId, Readiness, Rect, ResizeEdges, ShmFormat,
    Transport, TransportEvent,
};
use axiom_toolkit::{Display, ToolkitConfig};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Bind { name: u32, interface: String, id: ObjectId },
    GetPointer(ObjectId),
    GetKeyboard(ObjectId),
    CreateSurface(ObjectId),
    DestroySurface(ObjectId),
    CreateShellSurface { id: ObjectId, surface: ObjectId },
    SetToplevel(ObjectId),
    DestroyShellSurface(ObjectId),
    Pong { shell_surface: ObjectId, serial: u32 },
    StartMove { shell_surface: ObjectId, serial: u32 },
    StartResize { shell_surface: ObjectId, serial: u32, edges: ResizeEdges },
    CreatePool { id: ObjectId, size: usize },
    DestroyPool(ObjectId),
    CreateBuffer { id: ObjectId, pool: ObjectId, width: u32, height: u32, stride: u32 },
    DestroyBuffer(ObjectId),
    Attach { surface: ObjectId, buffer: Option<ObjectId>, dx: i32, dy: i32 },
    Damage { surface: ObjectId, rect: Rect },
    Commit(ObjectId),
    Frame { surface: ObjectId, callback: ObjectId },
    DestroyCallback(ObjectId),
    SetCursor { serial: u32, surface: Option<ObjectId> },
    Flush,
    Disconnect,
}

#[derive(Default)]
pub struct Recorder {
    pub requests: Vec<Request>,
    pub events: VecDeque<TransportEvent>,
    pub next_id: u32,
    pub fail_frame: bool,
    pub fail_create_buffer: bool,
    pub fail_dispatch: bool,
    pub want_write: bool,
    /// Theme cursor names that resolve; `None` means no theme at all
    pub cursor_names: Option<Vec<String>>,
}

impl Recorder {
    fn object(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    pub fn count(&self, pred: impl Fn(&Request) -> bool) -> usize {
        self.requests.iter().filter(|r| pred(r)).count()
    }

    pub fn last_buffer(&self) -> Option<(ObjectId, u32, u32, u32)> {
        self.requests.iter().rev().find_map(|r| match r {
            Request::CreateBuffer {
                id, width, height, stride, ..
            } => Some((*id, *width, *height, *stride)),
            _ => None,
        })
    }
}

pub type Shared = Rc<RefCell<Recorder>>;

pub struct MockTransport {
    rec: Shared,
    socket: UnixStream,
}

impl MockTransport {
    pub fn new(rec: Shared) -> (Self, UnixStream) {
        let (socket, peer) = UnixStream::pair().expect("socket pair");
        (Self { rec, socket }, peer)
    }

    fn record(&self, request: Request) {
        self.rec.borrow_mut().requests.push(request);
    }
}

struct FakeTheme {
    images: HashMap<String, CursorImage>,
}

impl CursorTheme for FakeTheme {
    fn cursor(&self, name: &str) -> Option<CursorImage> {
        self.images.get(name).copied()
    }
}

impl Transport for MockTransport {
    fn bind(&mut self, name: u32, interface: &Interface) -> Result<ObjectId> {
        let id = self.rec.borrow_mut().object();
        self.record(Request::Bind {
            name,
            interface: interface.name().to_string(),
            id,
        });
        Ok(id)
    }

    fn get_pointer(&mut self, _seat: ObjectId) -> Result<ObjectId> {
        let id = self.rec.borrow_mut().object();
        self.record(Request::GetPointer(id));
        Ok(id)
    }

    fn get_keyboard(&mut self, _seat: ObjectId) -> Result<ObjectId> {
        let id = self.rec.borrow_mut().object();
        self.record(Request::GetKeyboard(id));
        Ok(id)
    }

    fn create_surface(&mut self, _compositor: ObjectId) -> Result<ObjectId> {
        let id = self.rec.borrow_mut().object();
        self.record(Request::CreateSurface(id));
        Ok(id)
    }

    fn destroy_surface(&mut self, surface: ObjectId) {
        self.record(Request::DestroySurface(surface));
    }

    fn create_shell_surface(&mut self, _shell: ObjectId, surface: ObjectId) -> Result<ObjectId> {
        let id = self.rec.borrow_mut().object();
        self.record(Request::CreateShellSurface { id, surface });
        Ok(id)
    }

    fn set_toplevel(&mut self, shell_surface: ObjectId) {
        self.record(Request::SetToplevel(shell_surface));
    }

    fn destroy_shell_surface(&mut self, shell_surface: ObjectId) {
        self.record(Request::DestroyShellSurface(shell_surface));
    }

    fn pong(&mut self, shell_surface: ObjectId, serial: u32) {
        self.record(Request::Pong { shell_surface, serial });
    }

    fn start_move(&mut self, shell_surface: ObjectId, _seat: ObjectId, serial: u32) {
        self.record(Request::StartMove { shell_surface, serial });
    }

    fn start_resize(&mut self, shell_surface: ObjectId, _seat: ObjectId, serial: u32, edges: ResizeEdges) {
        self.record(Request::StartResize {
            shell_surface,
            serial,
            edges,
        });
    }

    fn create_pool(&mut self, _shm: ObjectId, fd: BorrowedFd<'_>, size: usize) -> Result<ObjectId> {
        assert!(fd.as_raw_fd() >= 0);
        let id = self.rec.borrow_mut().object();
        self.record(Request::CreatePool { id, size });
        Ok(id)
    }

    fn destroy_pool(&mut self, pool: ObjectId) {
        self.record(Request::DestroyPool(pool));
    }

    fn create_buffer(
        &mut self,
        pool: ObjectId,
        offset: u32,
        width: u32,
        height: u32,
        stride: u32,
        format: ShmFormat,
    ) -> Result<ObjectId> {
        assert_eq!(offset, 0);
        assert_eq!(format, ShmFormat::Argb8888);
        if self.rec.borrow().fail_create_buffer {
            return Err(ToolkitError::resource("buffer creation refused"));
        }
        let id = self.rec.borrow_mut().object();
        self.record(Request::CreateBuffer {
            id,
            pool,
            width,
            height,
            stride,
        });
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: ObjectId) {
        self.record(Request::DestroyBuffer(buffer));
    }

    fn attach(&mut self, surface: ObjectId, buffer: Option<ObjectId>, dx: i32, dy: i32) {
        self.record(Request::Attach { surface, buffer, dx, dy });
    }

    fn damage(&mut self, surface: ObjectId, rect: Rect) {
        self.record(Request::Damage { surface, rect });
    }

    fn commit(&mut self, surface: ObjectId) {
        self.record(Request::Commit(surface));
    }

    fn frame(&mut self, surface: ObjectId) -> Result<ObjectId> {
        if self.rec.borrow().fail_frame {
            return Err(ToolkitError::resource("frame callbacks unavailable"));
        }
        let callback = self.rec.borrow_mut().object();
        self.record(Request::Frame { surface, callback });
        Ok(callback)
    }

    fn destroy_callback(&mut self, callback: ObjectId) {
        self.record(Request::DestroyCallback(callback));
    }

    fn set_cursor(&mut self, _pointer: ObjectId, serial: u32, image: Option<(ObjectId, i32, i32)>) {
        self.record(Request::SetCursor {
            serial,
            surface: image.map(|(surface, _, _)| surface),
        });
    }

    fn load_cursor_theme(&mut self, _shm: ObjectId, _name: Option<&str>, size: u32) -> Option<Box<dyn CursorTheme>> {
        let names = self.rec.borrow().cursor_names.clone()?;
        let images = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let image = CursorImage {
                    buffer: ObjectId(10_000 + i as u32),
                    width: size,
                    height: size,
                    hotspot_x: 4,
                    hotspot_y: 4,
                };
                (name, image)
            })
            .collect();
        Some(Box::new(FakeTheme { images }))
    }

    fn dispatch(&mut self, _readiness: Readiness) -> Result<Vec<TransportEvent>> {
        let mut rec = self.rec.borrow_mut();
        if rec.fail_dispatch {
            return Err(ToolkitError::protocol("connection reset"));
        }
        Ok(rec.events.drain(..).collect())
    }

    fn interest(&self) -> Interest {
        if self.rec.borrow().want_write {
            Interest::READ | Interest::WRITE
        } else {
            Interest::READ
        }
    }

    fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    fn flush(&mut self) -> Result<()> {
        self.record(Request::Flush);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.record(Request::Disconnect);
    }
}

/// What the display asked of its event loop
#[derive(Debug, Default)]
pub struct LoopLog {
    pub registered: Option<(RawFd, Interest)>,
    pub interest_updates: Vec<Interest>,
    pub unregistered: usize,
    pub idle_requests: usize,
}

pub struct ManualLoop {
    log: Rc<RefCell<LoopLog>>,
}

impl EventLoopHandle for ManualLoop {
    fn register_fd(&mut self, fd: RawFd, interest: Interest) -> Result<()> {
        self.log.borrow_mut().registered = Some((fd, interest));
        Ok(())
    }

    fn update_fd_interest(&mut self, interest: Interest) -> Result<()> {
        self.log.borrow_mut().interest_updates.push(interest);
        Ok(())
    }

    fn unregister_fd(&mut self) {
        self.log.borrow_mut().unregistered += 1;
    }

    fn request_idle(&mut self) {
        self.log.borrow_mut().idle_requests += 1;
    }
}

/// Keyboard state driven by raw modifier bits
///
/// Bits follow the usual xkb layout (shift=0, lock=1, control=2, mod1=3,
/// mod4=6) and every keycode produces itself as its only symbol.
pub struct BitsKeyboard {
    depressed: u32,
}

impl KeyboardState for BitsKeyboard {
    fn update_modifiers(&mut self, depressed: u32, latched: u32, locked: u32, _group: u32) {
        self.depressed = depressed | latched | locked;
    }

    fn key_symbols(&self, keycode: u32) -> Vec<Keysym> {
        vec![Keysym(keycode)]
    }

    fn is_modifier_active(&self, modifier: ModifierName) -> bool {
        let bit = match modifier {
            ModifierName::Shift => 0,
            ModifierName::CapsLock => 1,
            ModifierName::Control => 2,
            ModifierName::Alt => 3,
            ModifierName::Logo => 6,
        };
        self.depressed & (1 << bit) != 0
    }
}

/// Accepts any keymap whose text starts with "valid"
pub struct FakeCompiler;

impl KeymapCompiler for FakeCompiler {
    fn compile(&self, format: KeymapFormat, keymap: &[u8]) -> Result<Box<dyn KeyboardState>> {
        if format != KeymapFormat::XkbV1 || !keymap.starts_with(b"valid") {
            return Err(ToolkitError::protocol("bad keymap"));
        }
        Ok(Box::new(BitsKeyboard { depressed: 0 }))
    }
}

/// Keymap file descriptor carrying `contents` plus a trailing NUL
pub fn keymap_fd(contents: &str) -> (OwnedFd, u32) {
    let mut file = tempfile::tempfile().expect("keymap file");
    file.write_all(contents.as_bytes()).expect("write keymap");
    file.write_all(&[0]).expect("write keymap");
    (OwnedFd::from(file), contents.len() as u32 + 1)
}

pub fn global(name: u32, interface: &str) -> TransportEvent {
    TransportEvent::GlobalAdvertised {
        name,
        interface: interface.to_string(),
        version: 1,
    }
}

/// The six independent readiness conditions, by index
pub fn readiness_event(index: usize) -> TransportEvent {
    match index {
        0 => global(1, "wl_compositor"),
        1 => global(2, "wl_seat"),
        2 => global(3, "wl_shell"),
        3 => global(4, "wl_shm"),
        4 => TransportEvent::SeatCapabilities(Capabilities::POINTER),
        _ => TransportEvent::SeatCapabilities(Capabilities::KEYBOARD),
    }
}

pub const ALL_CURSOR_NAMES: &[&str] = &[
    "top_side",
    "bottom_side",
    "left_side",
    "right_side",
    "top_left_corner",
    "top_right_corner",
    "bottom_left_corner",
    "bottom_right_corner",
    "grabbing",
    "left_ptr",
    "xterm",
];

pub struct Harness {
    pub display: Display,
    pub rec: Shared,
    pub loop_log: Rc<RefCell<LoopLog>>,
    pub peer: UnixStream,
    pub runtime: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let runtime = TempDir::new().expect("runtime dir");
        let mut config = ToolkitConfig::default();
        config.shm.runtime_dir = Some(runtime.path().to_path_buf());

        let rec: Shared = Rc::new(RefCell::new(Recorder {
            cursor_names: Some(ALL_CURSOR_NAMES.iter().map(|n| n.to_string()).collect()),
            ..Recorder::default()
        }));
        let (transport, peer) = MockTransport::new(rec.clone());
        let loop_log = Rc::new(RefCell::new(LoopLog::default()));
        let event_loop = ManualLoop {
            log: loop_log.clone(),
        };

        let display = Display::with_keymap_compiler(
            config,
            Box::new(transport),
            Box::new(event_loop),
            Box::new(FakeCompiler),
        )
        .expect("display");

        Self {
            display,
            rec,
            loop_log,
            peer,
            runtime,
        }
    }

    /// Harness whose display is already Running
    pub fn running() -> Self {
        let mut harness = Self::new();
        for index in 0..6 {
            harness.push(readiness_event(index));
        }
        harness.pump();
        harness
    }

    pub fn push(&mut self, event: TransportEvent) {
        self.rec.borrow_mut().events.push_back(event);
    }

    /// Deliver queued events as one readable fd event
    pub fn pump(&mut self) {
        self.display.handle_fd_event(Readiness::readable());
    }

    pub fn send(&mut self, event: TransportEvent) {
        self.push(event);
        self.pump();
    }

    pub fn idle(&mut self) {
        self.display.dispatch_idle();
    }

    pub fn requests(&self) -> Vec<Request> {
        self.rec.borrow().requests.clone()
    }

    pub fn clear_requests(&mut self) {
        self.rec.borrow_mut().requests.clear();
    }

    pub fn count(&self, pred: impl Fn(&Request) -> bool) -> usize {
        self.rec.borrow().count(pred)
    }

    /// Deliver a valid keymap so keyboard events get dispatched
    pub fn install_keymap(&mut self) {
        let (fd, size) = keymap_fd("valid keymap");
        self.send(TransportEvent::KeyboardKeymap {
            format: KeymapFormat::XkbV1,
            fd,
            size,
        });
    }

    /// Surface and shell surface created for the most recent window
    pub fn last_surfaces(&self) -> (ObjectId, ObjectId) {
        self.rec
            .borrow()
            .requests
            .iter()
            .rev()
            .find_map(|r| match r {
                Request::CreateShellSurface { id, surface } => Some((*surface, *id)),
                _ => None,
            })
            .expect("a window was created")
    }

    /// Callback of the most recent frame request
    pub fn last_frame_callback(&self) -> Option<ObjectId> {
        self.rec.borrow().requests.iter().rev().find_map(|r| match r {
            Request::Frame { callback, .. } => Some(*callback),
            _ => None,
        })
    }
}

/// 24.8 fixed point from whole pixels
pub fn fixed(pixels: i32) -> i32 {
    pixels * 256
}
