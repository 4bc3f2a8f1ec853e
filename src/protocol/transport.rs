//! Requests the toolkit issues to the display server

use std::os::fd::{BorrowedFd, RawFd};

use super::{Interest, Interface, ObjectId, Readiness, Rect, ResizeEdges, ShmFormat, TransportEvent};
use crate::cursor::CursorTheme;
use crate::error::Result;

/// Connection to a display server
///
/// Fallible calls return [`crate::ToolkitError::Resource`] when the server
/// object could not be created. Destructors are infallible and must tolerate
/// being called after the connection hung up.
pub trait Transport {
    /// Bind the advertised global `name` as `interface`
    fn bind(&mut self, name: u32, interface: &Interface) -> Result<ObjectId>;

    fn get_pointer(&mut self, seat: ObjectId) -> Result<ObjectId>;
    fn get_keyboard(&mut self, seat: ObjectId) -> Result<ObjectId>;

    fn create_surface(&mut self, compositor: ObjectId) -> Result<ObjectId>;
    fn destroy_surface(&mut self, surface: ObjectId);

    fn create_shell_surface(&mut self, shell: ObjectId, surface: ObjectId) -> Result<ObjectId>;
    fn set_toplevel(&mut self, shell_surface: ObjectId);
    fn destroy_shell_surface(&mut self, shell_surface: ObjectId);
    fn pong(&mut self, shell_surface: ObjectId, serial: u32);
    fn start_move(&mut self, shell_surface: ObjectId, seat: ObjectId, serial: u32);
    fn start_resize(&mut self, shell_surface: ObjectId, seat: ObjectId, serial: u32, edges: ResizeEdges);

    /// Register `fd` (of `size` bytes) with the shm global as a pool
    fn create_pool(&mut self, shm: ObjectId, fd: BorrowedFd<'_>, size: usize) -> Result<ObjectId>;
    fn destroy_pool(&mut self, pool: ObjectId);

    fn create_buffer(
        &mut self,
        pool: ObjectId,
        offset: u32,
        width: u32,
        height: u32,
        stride: u32,
        format: ShmFormat,
    ) -> Result<ObjectId>;
    fn destroy_buffer(&mut self, buffer: ObjectId);

    fn attach(&mut self, surface: ObjectId, buffer: Option<ObjectId>, dx: i32, dy: i32);
    fn damage(&mut self, surface: ObjectId, rect: Rect);
    fn commit(&mut self, surface: ObjectId);

    /// Request a one-shot frame-presentation callback for `surface`
    fn frame(&mut self, surface: ObjectId) -> Result<ObjectId>;
    fn destroy_callback(&mut self, callback: ObjectId);

    /// Set (or hide, with `None`) the pointer image: cursor surface plus hotspot
    fn set_cursor(&mut self, pointer: ObjectId, serial: u32, cursor: Option<(ObjectId, i32, i32)>);

    /// Load a cursor theme backed by the shm global
    fn load_cursor_theme(&mut self, shm: ObjectId, theme: Option<&str>, size: u32) -> Option<Box<dyn CursorTheme>>;

    /// Process pending I/O and return the decoded server events
    fn dispatch(&mut self, readiness: Readiness) -> Result<Vec<TransportEvent>>;

    /// Poll interest the transport currently needs (WRITE while output is queued)
    fn interest(&self) -> Interest;

    fn fd(&self) -> RawFd;

    fn flush(&mut self) -> Result<()>;

    fn disconnect(&mut self);
}
