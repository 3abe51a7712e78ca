// src/core/tasks/mod.rs

//! Background work that outlives a single request: the recovery cycle and the
//! one-shot timers behind disable-recoveries.

pub mod recovery;
pub mod timer;

pub use recovery::{PendingReply, RecoveryMachine, RecoveryPhase, spawn_recovery};
pub use timer::OneShotTimer;
