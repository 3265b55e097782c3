// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Static pattern arrays for session triage.
//!
//! These are the built-in defaults; `[behavior]` in the config file can
//! replace any of them.

// ─── Automation ─────────────────────────────────────────────────────────────

/// Sessions issuing more commands than this are treated as scripted.
pub(crate) const BRUTEFORCE_COMMAND_THRESHOLD: usize = 10;

// ─── Payload delivery ───────────────────────────────────────────────────────

/// Fetch/transfer tools. Matched against individual tokens, never substrings,
/// so `curlew` or `wget2` do not count.
pub(crate) const DEFAULT_FETCH_TOOLS: &[&str] = &[
    "wget", "curl",           // HTTP transfer
    "nc", "ncat", "netcat",   // Raw connections
    "tftp",
];

// ─── Reconnaissance ─────────────────────────────────────────────────────────

/// Whole command lines that are classic first probes after login.
pub(crate) const DEFAULT_RECON_PROBES: &[&str] = &[
    "cat /etc/passwd",
    "whoami",
    "uname",
    "uname -a",
    "id",
    "cat /proc/cpuinfo",
];
