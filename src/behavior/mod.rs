// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Post-session behavioral triage.
//!
//! Labels a finished transcript with one coarse category so an analyst can
//! sort sessions without reading every one. Rules run in a fixed priority
//! order and the first match wins:
//!
//! 1. automation: more commands than the threshold
//! 2. payload delivery: any token of any command is a fetch tool
//! 3. reconnaissance: any whole command is a known recon probe
//! 4. unknown
//!
//! Labels are always recomputed from the transcript; they are never stored as
//! part of the session record.

pub(crate) mod patterns;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::config::BehaviorConfig;
use crate::core::alerts::Severity;

/// Coarse behavioral category for a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorLabel {
    BruteforceOrAutomation,
    PayloadDelivery,
    Reconnaissance,
    Unknown,
}

impl BehaviorLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorLabel::BruteforceOrAutomation => "bruteforce_or_automation",
            BehaviorLabel::PayloadDelivery => "payload_delivery",
            BehaviorLabel::Reconnaissance => "reconnaissance",
            BehaviorLabel::Unknown => "unknown",
        }
    }

    /// Alert severity used when a session with this label closes.
    pub fn severity(&self) -> Severity {
        match self {
            BehaviorLabel::PayloadDelivery => Severity::Critical,
            BehaviorLabel::BruteforceOrAutomation | BehaviorLabel::Reconnaissance => Severity::Warning,
            BehaviorLabel::Unknown => Severity::Info,
        }
    }
}

impl fmt::Display for BehaviorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifier built once from config and shared read-only across sessions.
#[derive(Debug, Clone)]
pub struct BehaviorClassifier {
    bruteforce_threshold: usize,
    fetch_tools: HashSet<String>,
    recon_probes: HashSet<String>,
}

impl Default for BehaviorClassifier {
    fn default() -> Self {
        Self::from_config(&BehaviorConfig::default())
    }
}

impl BehaviorClassifier {
    pub fn from_config(config: &BehaviorConfig) -> Self {
        Self {
            bruteforce_threshold: config.bruteforce_threshold,
            fetch_tools: config.fetch_tools.iter().cloned().collect(),
            recon_probes: config.recon_probes.iter().map(|p| p.trim().to_string()).collect(),
        }
    }

    /// Label a transcript. Pure and deterministic.
    pub fn classify<S: AsRef<str>>(&self, commands: &[S]) -> BehaviorLabel {
        if commands.len() > self.bruteforce_threshold {
            return BehaviorLabel::BruteforceOrAutomation;
        }

        if commands.iter().any(|cmd| self.is_payload_delivery(cmd.as_ref())) {
            return BehaviorLabel::PayloadDelivery;
        }

        if commands.iter().any(|cmd| self.recon_probes.contains(cmd.as_ref().trim())) {
            return BehaviorLabel::Reconnaissance;
        }

        BehaviorLabel::Unknown
    }

    fn is_payload_delivery(&self, cmd: &str) -> bool {
        cmd.split_whitespace().any(|token| self.fetch_tools.contains(token))
    }
}

#[cfg(test)]
mod tests;
