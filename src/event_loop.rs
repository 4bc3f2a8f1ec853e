//! Event-loop integration
//!
//! Deferred work (frame servicing, deferred window close) lives in an
//! [`IdleQueue`] owned by the display. The host event loop only has to poll
//! the transport fd and, when asked through [`EventLoopHandle::request_idle`],
//! call [`Display::dispatch_idle`] on its next idle turn.
//!
//! [`CalloopEventLoop`] implements the handle on top of `calloop`.

use calloop::generic::Generic;
use calloop::{Dispatcher, Interest as CalloopInterest, LoopHandle, Mode, PostAction, RegistrationToken};
use log::{debug, trace, warn};
use std::cell::Cell;
use std::collections::VecDeque;
use std::os::fd::{AsFd, BorrowedFd, RawFd};
use std::rc::Rc;

use crate::display::{ConnectionState, Display};
use crate::error::{Result, ToolkitError};
use crate::protocol::{Interest, Readiness};
use crate::window::WindowId;

/// Cancellation token returned by [`IdleQueue::register`]
///
/// Not `Copy`: cancelling a task consumes its token.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct IdleToken(u64);

/// Start of an idle turn, see [`IdleQueue::begin_turn`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnBoundary(u64);

/// Work that can be deferred to an idle turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTask {
    /// Service pending resize/redraw of a window
    Frame(WindowId),
    /// Run a window's close handler
    Close(WindowId),
}

/// FIFO of one-shot idle tasks
///
/// Tasks registered while a turn is being dispatched run on the next turn,
/// never on the current one.
#[derive(Debug, Default)]
pub struct IdleQueue {
    next_token: u64,
    entries: VecDeque<(u64, IdleTask)>,
}

impl IdleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: IdleTask) -> IdleToken {
        let key = self.next_token;
        self.next_token += 1;
        self.entries.push_back((key, task));
        trace!("idle task {:?} registered as #{}", task, key);
        IdleToken(key)
    }

    /// Cancel a pending task; returns false if it already ran
    pub fn cancel(&mut self, token: IdleToken) -> bool {
        match self.entries.iter().position(|(key, _)| *key == token.0) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Mark the start of a turn; the boundary excludes later registrations
    pub fn begin_turn(&self) -> TurnBoundary {
        TurnBoundary(self.next_token)
    }

    /// Pop the oldest task registered before `boundary`
    ///
    /// The returned token identifies the task that is now running, so the
    /// owner can match it against the token it holds.
    pub fn pop_before(&mut self, boundary: TurnBoundary) -> Option<(IdleToken, IdleTask)> {
        match self.entries.front() {
            Some((key, _)) if *key < boundary.0 => self
                .entries
                .pop_front()
                .map(|(key, task)| (IdleToken(key), task)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_pending(&self, token: &IdleToken) -> bool {
        self.entries.iter().any(|(key, _)| *key == token.0)
    }
}

/// Services the display needs from the host event loop
pub trait EventLoopHandle {
    /// Watch the transport fd with edge-triggered readiness
    fn register_fd(&mut self, fd: RawFd, interest: Interest) -> Result<()>;
    fn update_fd_interest(&mut self, interest: Interest) -> Result<()>;
    fn unregister_fd(&mut self);
    /// Arrange for [`Display::dispatch_idle`] to run on the next idle turn
    fn request_idle(&mut self);
}

/// Host data that owns a [`Display`], used by [`CalloopEventLoop`] callbacks
pub trait DisplayHost {
    fn display_mut(&mut self) -> &mut Display;
}

impl DisplayHost for Display {
    fn display_mut(&mut self) -> &mut Display {
        self
    }
}

/// Transport fd as registered with calloop; the transport keeps ownership
#[derive(Debug)]
pub struct DisplayFd(RawFd);

impl AsFd for DisplayFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the transport owns the descriptor and outlives the
        // registration, which is removed before the transport disconnects.
        unsafe { BorrowedFd::borrow_raw(self.0) }
    }
}

fn to_calloop_interest(interest: Interest) -> CalloopInterest {
    CalloopInterest {
        readable: interest.contains(Interest::READ),
        writable: interest.contains(Interest::WRITE),
    }
}

type FdDispatcher<D> = Dispatcher<'static, Generic<DisplayFd>, D>;

/// [`EventLoopHandle`] backed by a calloop loop whose data is `D`
///
/// calloop keeps a source borrowed while its callback runs, so interest
/// updates requested from inside the fd callback are applied from an idle
/// callback, and a hangup removes the source by returning
/// [`PostAction::Remove`].
pub struct CalloopEventLoop<D: DisplayHost + 'static> {
    handle: LoopHandle<'static, D>,
    fd_source: Option<(FdDispatcher<D>, RegistrationToken)>,
    idle_requested: Rc<Cell<bool>>,
    in_fd_dispatch: Rc<Cell<bool>>,
}

impl<D: DisplayHost + 'static> CalloopEventLoop<D> {
    pub fn new(handle: LoopHandle<'static, D>) -> Self {
        Self {
            handle,
            fd_source: None,
            idle_requested: Rc::new(Cell::new(false)),
            in_fd_dispatch: Rc::new(Cell::new(false)),
        }
    }
}

impl<D: DisplayHost + 'static> EventLoopHandle for CalloopEventLoop<D> {
    fn register_fd(&mut self, fd: RawFd, interest: Interest) -> Result<()> {
        if self.fd_source.is_some() {
            return Err(ToolkitError::state("display fd already registered"));
        }

        let in_dispatch = self.in_fd_dispatch.clone();
        let source = Generic::new(DisplayFd(fd), to_calloop_interest(interest), Mode::Edge);
        let dispatcher = Dispatcher::new(source, move |readiness, _fd, data: &mut D| {
            in_dispatch.set(true);
            let display = data.display_mut();
            display.handle_fd_event(Readiness {
                readable: readiness.readable,
                writable: readiness.writable,
                hangup: readiness.error,
            });
            let hung_up = display.state() == ConnectionState::Hup;
            in_dispatch.set(false);

            if hung_up {
                Ok(PostAction::Remove)
            } else {
                Ok(PostAction::Continue)
            }
        });

        let token = self
            .handle
            .register_dispatcher(dispatcher.clone())
            .map_err(|e| ToolkitError::resource(format!("cannot register display fd: {}", e)))?;

        debug!("🔌 Display fd {} registered with calloop", fd);
        self.fd_source = Some((dispatcher, token));
        Ok(())
    }

    fn update_fd_interest(&mut self, interest: Interest) -> Result<()> {
        let Some((dispatcher, token)) = &self.fd_source else {
            return Ok(());
        };

        if self.in_fd_dispatch.get() {
            let dispatcher = dispatcher.clone();
            let handle = self.handle.clone();
            let token = *token;
            let _idle = self.handle.insert_idle(move |_: &mut D| {
                dispatcher.as_source_mut().interest = to_calloop_interest(interest);
                if let Err(e) = handle.update(&token) {
                    warn!("cannot update display fd interest: {}", e);
                }
            });
            return Ok(());
        }

        dispatcher.as_source_mut().interest = to_calloop_interest(interest);
        self.handle
            .update(token)
            .map_err(|e| ToolkitError::resource(format!("cannot update display fd interest: {}", e)))
    }

    fn unregister_fd(&mut self) {
        let Some((_, token)) = self.fd_source.take() else {
            return;
        };

        if self.in_fd_dispatch.get() {
            // The fd callback returns PostAction::Remove once the display hung up.
            debug!("🔌 Display fd removal left to the fd callback");
        } else {
            self.handle.remove(token);
            debug!("🔌 Display fd removed from calloop");
        }
    }

    fn request_idle(&mut self) {
        if self.idle_requested.replace(true) {
            return;
        }

        let requested = self.idle_requested.clone();
        let _idle = self.handle.insert_idle(move |data: &mut D| {
            requested.set(false);
            data.display_mut().dispatch_idle();
        });
    }
}
