// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Per-connection session state and its lifecycle.
//!
//! A [`SessionState`] is owned by exactly one connection task. It moves
//! `Authenticating → Active → Closed`; [`SessionState::close`] hands back the
//! [`TranscriptRecord`] only on the first transition into `Closed`, which is
//! what guarantees one log record per session.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::transcript::TranscriptRecord;

/// Credentials the intruder claimed. Accepted unconditionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub password: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Authenticating,
    Active,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Authenticating => write!(f, "AUTHENTICATING"),
            SessionPhase::Active => write!(f, "ACTIVE"),
            SessionPhase::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Mutable state of one emulated shell session.
#[derive(Debug, Clone)]
pub struct SessionState {
    identity: Identity,
    source_address: String,
    started_at: DateTime<Utc>,
    phase: SessionPhase,
    /// Absolute path; only `cd` changes it
    pub(crate) working_directory: String,
    transcript: Vec<String>,
}

impl SessionState {
    pub fn new(identity: Identity, source_address: impl Into<String>) -> Self {
        Self::started_at(identity, source_address, Utc::now())
    }

    pub fn started_at(identity: Identity, source_address: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            source_address: source_address.into(),
            started_at,
            phase: SessionPhase::Authenticating,
            working_directory: "/".to_string(),
            transcript: Vec::new(),
        }
    }

    /// Interactive channel opened. Returns false if the session was not
    /// waiting on authentication (already active or closed).
    pub fn activate(&mut self) -> bool {
        if self.phase != SessionPhase::Authenticating {
            return false;
        }
        self.phase = SessionPhase::Active;
        true
    }

    /// Enter `Closed`. Yields the record to persist the first time only.
    pub fn close(&mut self) -> Option<TranscriptRecord> {
        if self.phase == SessionPhase::Closed {
            return None;
        }
        self.phase = SessionPhase::Closed;
        Some(TranscriptRecord {
            timestamp: epoch_seconds(&self.started_at),
            source_ip: self.source_address.clone(),
            username: self.identity.username.clone(),
            password: self.identity.password.clone(),
            commands: self.transcript.clone(),
        })
    }

    pub(crate) fn record_command(&mut self, line: &str) {
        self.transcript.push(line.to_string());
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Resolve a path argument against the working directory. Absolute
    /// paths pass through untouched.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.working_directory.trim_end_matches('/'), path)
        }
    }
}

fn epoch_seconds(at: &DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1_000_000.0
}
