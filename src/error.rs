//! Error types shared by every toolkit subsystem

use thiserror::Error;

use crate::widget::WidgetId;
use crate::window::WindowId;

/// Errors surfaced to toolkit callers
#[derive(Error, Debug)]
pub enum ToolkitError {
    /// Missing environment or capability, never retried automatically
    #[error("configuration error: {0}")]
    Config(String),

    /// File, memory, mapping or protocol-object creation failed
    #[error("resource error: {0}")]
    Resource(String),

    /// Operation attempted while the display is not running
    #[error("state error: {0}")]
    State(String),

    /// The compositor sent something the toolkit cannot use
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown window {0:?}")]
    UnknownWindow(WindowId),

    #[error("unknown widget {0:?}")]
    UnknownWidget(WidgetId),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToolkitError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Result type for toolkit operations
pub type Result<T> = std::result::Result<T, ToolkitError>;
