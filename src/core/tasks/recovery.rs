// src/core/tasks/recovery.rs

//! Simulated database recovery, started by `SET_RECMODE(ACTIVE)`.
//!
//! A recovery waits until no node has recoveries disabled, stamps the recovery
//! start, waits once more and then returns the cluster to NORMAL with a new
//! generation. Nothing cancels a recovery once started.

use crate::connection::Outbound;
use crate::core::FakeCtdbError;
use crate::core::cluster::SharedCluster;
use crate::core::protocol::{ReplyControl, ReqHeader};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    Idle,
    /// Waiting for every node to allow recoveries.
    Polling,
    /// Recovery has started; completes after one more interval.
    Completing,
}

/// Drives one recovery cycle. Each call to [`step`](Self::step) performs the
/// work of the current phase and says how long to wait before the next one.
pub struct RecoveryMachine {
    cluster: SharedCluster,
    phase: RecoveryPhase,
    interval: Duration,
}

impl RecoveryMachine {
    pub fn new(cluster: SharedCluster) -> Self {
        let interval = cluster.lock().options.recovery_poll_interval;
        Self {
            cluster,
            phase: RecoveryPhase::Idle,
            interval,
        }
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    /// Runs the current phase. Returns the delay before the next step, or `None`
    /// once the cycle has finished.
    pub fn step(&mut self) -> Option<Duration> {
        let mut cluster = self.cluster.lock();
        match self.phase {
            RecoveryPhase::Idle | RecoveryPhase::Polling => {
                if cluster.any_recovery_disabled() {
                    debug!("Recoveries disabled on some node, polling again");
                    self.phase = RecoveryPhase::Polling;
                } else {
                    cluster.begin_recovery();
                    self.phase = RecoveryPhase::Completing;
                }
                Some(self.interval)
            }
            RecoveryPhase::Completing => {
                cluster.finish_recovery();
                self.phase = RecoveryPhase::Idle;
                None
            }
        }
    }

    pub async fn run(mut self) {
        while let Some(delay) = self.step() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// A control reply held back until the recovery it is waiting on settles.
pub struct PendingReply {
    header: ReqHeader,
    opcode: u32,
    outbound: Outbound,
}

impl PendingReply {
    pub fn new(header: ReqHeader, opcode: u32, outbound: Outbound) -> Self {
        Self {
            header,
            opcode,
            outbound,
        }
    }

    /// Sends the reply. The header carries the generation current at the time of
    /// sending, which is the one the recovery just produced.
    pub fn complete(self, cluster: &SharedCluster, result: Result<(), FakeCtdbError>) {
        let reply = match result {
            Ok(()) => ReplyControl::ok(self.opcode, 0),
            Err(e) => {
                warn!("Recovery failed: {}", e);
                ReplyControl::error(self.opcode, e.reply_status(), "recovery failed")
            }
        };
        let header = self.header.reply_control(cluster.lock().generation());
        if self.outbound.send(reply.push(&header)).is_err() {
            debug!("Client went away before recovery finished");
        }
    }
}

/// Starts a recovery in the background and answers `pending` when it is over.
pub fn spawn_recovery(cluster: SharedCluster, pending: PendingReply) {
    tokio::spawn(async move {
        let machine = RecoveryMachine::new(cluster.clone());
        let result = tokio::spawn(machine.run())
            .await
            .map_err(FakeCtdbError::from);
        pending.complete(&cluster, result);
    });
}
