// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::{ConnectionHandler, SessionStatus};
use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// The main server loop. Runs until a signal arrives or a client requests
/// `SHUTDOWN`, then closes every remaining session.
pub async fn run(ctx: ServerContext) -> Result<()> {
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();

    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            Some(res) = client_tasks.join_next() => {
                match res {
                    Ok(SessionStatus::ShutdownRequested) => {
                        info!("Shutdown requested by client.");
                        break;
                    }
                    Ok(SessionStatus::Open) => {}
                    Err(e) if e.is_panic() => error!("A client handler panicked: {e:?}"),
                    Err(_) => {}
                }
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, _addr)) => {
                        session_id_counter = session_id_counter.wrapping_add(1);
                        let session_id = session_id_counter;
                        debug!("Accepted client {}", session_id);
                        let handler = ConnectionHandler::new(
                            socket,
                            ctx.cluster.clone(),
                            session_id,
                            ctx.shutdown_tx.subscribe(),
                        );
                        client_tasks.spawn(handler.run());
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        return Err(e).context("Listener failed");
                    }
                }
            },
        }
    }

    info!("Shutting down. Sending signal to all sessions.");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No sessions left to notify.");
    }

    client_tasks.shutdown().await;
    info!("Server shutdown complete.");
    Ok(())
}
