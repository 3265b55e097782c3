// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Operational alert types.
//!
//! Session tasks report lifecycle events (session opened, session closed and
//! labelled, transcript write failed) as [`Alert`] values over an `mpsc`
//! channel. The orchestrator drains that channel into the tracing log.

use chrono::{DateTime, Local};
use std::fmt;

/// Alert severity level, ordered from lowest to highest.
///
/// Implements `Ord` so `Critical > Warning > Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Critical => write!(f, "CRIT"),
        }
    }
}

/// A timestamped event from a session task or the listener.
#[derive(Debug, Clone)]
pub struct Alert {
    /// When the alert was created (local time)
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    /// Which component produced it (e.g. "session", "listener", "transcript")
    pub source: String,
    pub message: String,
}

impl Alert {
    /// Create a new alert timestamped to now.
    pub fn new(severity: Severity, source: &str, message: &str) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            source: source.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.source,
            self.message
        )
    }
}

/// Write an alert to the operational log at the matching level.
pub fn log_alert(alert: &Alert) {
    match alert.severity {
        Severity::Info => tracing::info!(source = %alert.source, "{}", alert.message),
        Severity::Warning => tracing::warn!(source = %alert.source, "{}", alert.message),
        Severity::Critical => tracing::error!(source = %alert.source, "{}", alert.message),
    }
}
