//! Debug Attach Core
//!
//! Building blocks for a loopback service that attaches an IDE debugger to a running
//! Godot game process: request/response types, process discovery, IDE path detection,
//! IDE drivers and the TCP request server that ties them together.

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod locator;
pub mod process;
pub mod resolver;
pub mod server;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use client::AttachClient;
pub use config::AttachConfig;
pub use error::{AttachError, ErrorCode};
pub use server::RequestServer;
pub use service::AttachService;

/// Result type alias using AttachError
pub type Result<T> = std::result::Result<T, AttachError>;
