// src/core/handler/mod.rs

//! Packet routing and the control/message handler tables.

mod context;
mod controls;
mod messages;

pub mod router;

pub use context::HandlerContext;
pub use controls::ControlOutcome;
pub use router::Router;
