// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Centralized application state for the honeypot runtime.
//!
//! [`AppState`] bundles everything the listener hands to each connection task:
//! config, the shared shell tables, the classifier, the transcript sink, the
//! handshake, and the alert sender. Built once at startup; every session gets
//! a cheap [`SessionContext`] clone of it.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::alerts::Alert;
use super::session::SessionContext;
use crate::behavior::BehaviorClassifier;
use crate::config::Config;
use crate::shell::Shell;
use crate::transcript::TranscriptLogger;
use crate::transport::{Handshake, LineLogin};
use crate::vfs::VirtualFilesystem;

/// Centralized application state shared across all spawned tasks.
pub struct AppState {
    pub config: Config,
    pub config_path: PathBuf,

    // Alert pipeline: session tasks → raw_tx → orchestrator → tracing
    pub raw_tx: mpsc::Sender<Alert>,
    /// Set to `true` to end every live session and handshake
    pub shutdown_tx: watch::Sender<bool>,

    pub shell: Shell,
    pub classifier: Arc<BehaviorClassifier>,
    pub logger: Arc<TranscriptLogger>,
    pub handshake: Arc<dyn Handshake>,
}

impl AppState {
    /// Build all shared state from config. Returns the state and the alert
    /// receiver the orchestrator drains.
    pub fn build(config: Config, config_path: PathBuf) -> (Self, mpsc::Receiver<Alert>) {
        let (raw_tx, raw_rx) = mpsc::channel::<Alert>(1000);
        let (shutdown_tx, _) = watch::channel(false);

        let fs = VirtualFilesystem::from_config(&config.filesystem);
        tracing::info!("Virtual filesystem loaded: {} directories, {} files",
            fs.directory_count(), fs.file_count());
        let shell = Shell::new(Arc::new(fs), Arc::new(config.system.clone()));

        let classifier = Arc::new(BehaviorClassifier::from_config(&config.behavior));
        let logger = Arc::new(TranscriptLogger::new(
            &config.general.log_file,
            config.general.max_log_bytes,
        ));
        let handshake: Arc<dyn Handshake> = Arc::new(LineLogin::from_config(&config.listener));

        let state = Self {
            config,
            config_path,
            raw_tx,
            shutdown_tx,
            shell,
            classifier,
            logger,
            handshake,
        };
        (state, raw_rx)
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            shell: self.shell.clone(),
            classifier: self.classifier.clone(),
            logger: self.logger.clone(),
            alert_tx: self.raw_tx.clone(),
            shutdown: self.shutdown_tx.subscribe(),
        }
    }
}
