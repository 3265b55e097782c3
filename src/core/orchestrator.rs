// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Runtime orchestration: the listener loop.
//!
//! [`run_honeypot`] is the single entry point for the long-lived runtime. It
//! binds the configured address, runs one task per accepted connection
//! (handshake, then [`run_session`]), and drains the alert channel into the
//! log until SIGINT or SIGTERM. On shutdown every live session is told to
//! close and is awaited, so its transcript still gets written.

use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::alerts::{log_alert, Alert, Severity};
use super::app_state::AppState;
use super::session::{run_session, shutdown_requested, SessionContext};
use crate::transport::Handshake;

/// How long closing sessions get to write their transcripts before being aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bind the listener and serve until a shutdown signal arrives.
pub async fn run_honeypot(state: AppState, alert_rx: mpsc::Receiver<Alert>) -> Result<()> {
    let addr = format!("{}:{}", state.config.listener.bind, state.config.listener.port);
    let listener = TcpListener::bind(&addr).await
        .with_context(|| format!("Failed to bind listener on {}", addr))?;

    let mut sigterm = tokio::signal::unix::signal(
        tokio::signal::unix::SignalKind::terminate(),
    ).context("Failed to register SIGTERM handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => eprintln!("Shutting down (SIGINT)..."),
            _ = sigterm.recv() => eprintln!("Shutting down (SIGTERM)..."),
        }
    };

    serve(listener, state, alert_rx, shutdown).await
}

/// Accept loop over an already-bound listener. Returns once `shutdown`
/// resolves and every connection task has finished (or the grace period ran out).
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    mut alert_rx: mpsc::Receiver<Alert>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let local = listener.local_addr().context("Listener has no local address")?;
    let ctx = state.session_context();
    let handshake = state.handshake.clone();
    let mut connections = JoinSet::new();

    log_alert(&Alert::new(
        Severity::Info,
        "listener",
        &format!("Honeypot listening on {} ({}), config {}, transcripts to {}",
            local, handshake.name(), state.config_path.display(), state.logger.path().display()),
    ));

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(handle_connection(stream, peer, handshake.clone(), ctx.clone()));
                }
                Err(e) => tracing::warn!("Accept error on {}: {}", local, e),
            },
            Some(alert) = alert_rx.recv() => log_alert(&alert),
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!("Connection task failed: {}", e);
                }
            }
            _ = &mut shutdown => break,
        }
    }

    drop(listener);
    state.shutdown_tx.send_replace(true);
    if !connections.is_empty() {
        tracing::info!("Waiting for {} open connections to close", connections.len());
    }

    // Keep draining alerts while sessions finish so none block on a full channel.
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        loop {
            tokio::select! {
                joined = connections.join_next() => match joined {
                    Some(Err(e)) => tracing::warn!("Connection task failed: {}", e),
                    Some(Ok(())) => {}
                    None => break,
                },
                Some(alert) = alert_rx.recv() => log_alert(&alert),
            }
        }
    }).await;
    if drained.is_err() {
        tracing::warn!("{} connections still open after {:?}, aborting them",
            connections.len(), SHUTDOWN_GRACE);
        connections.shutdown().await;
    }

    while let Ok(alert) = alert_rx.try_recv() {
        log_alert(&alert);
    }
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handshake: Arc<dyn Handshake>,
    ctx: SessionContext,
) {
    let mut shutdown = ctx.shutdown.clone();
    let established = tokio::select! {
        result = handshake.establish(stream, peer) => result,
        _ = shutdown_requested(&mut shutdown) => {
            tracing::debug!("{} dropped mid-login by shutdown", peer);
            return;
        }
    };

    match established {
        Ok(Some(handoff)) => {
            let Some(summary) = run_session(
                handoff.reader,
                handoff.writer,
                handoff.identity,
                handoff.source_address,
                &ctx,
            ).await else {
                return;
            };
            if !summary.logged {
                tracing::warn!("Session from {} ({} commands) was not persisted",
                    summary.record.source_ip, summary.record.commands.len());
            }
            tracing::debug!("Session from {} ended ({}), label {}",
                peer, summary.reason, summary.label);
        }
        Ok(None) => tracing::debug!("{} disconnected before login", peer),
        Err(e) => tracing::warn!("Handshake with {} failed: {:#}", peer, e),
    }
}
