// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: packet framing,
//! routing, and the per-session reply queue.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use session::{Outbound, SessionState, SessionStatus};
