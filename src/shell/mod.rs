// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Emulated shell: command interpretation against the virtual filesystem.
//!
//! [`Shell`] is the shared, immutable half of the emulator (filesystem tables
//! and fake host profile). Each call to [`Shell::execute`] takes one input line
//! and the caller's [`SessionState`], produces exactly one [`Reply`], and
//! appends the line to the session transcript. Nothing here can fail: unknown
//! commands and missing paths are answered with text, the way a real shell
//! would answer them.
//!
//! ## Module structure
//!
//! - `commands`: the dispatch table and one handler per recognised command
//! - `session`: per-connection state and the session lifecycle

pub mod commands;
pub mod session;

use chrono::{DateTime, Local};
use std::sync::Arc;

use crate::config::SystemProfile;
use crate::vfs::VirtualFilesystem;
use session::SessionState;

/// Whether the connection keeps going after a reply is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

/// Text produced by one command plus the flow signal for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub output: String,
    pub flow: Flow,
}

impl Reply {
    pub fn text(output: impl Into<String>) -> Self {
        Self { output: output.into(), flow: Flow::Continue }
    }

    pub fn empty() -> Self {
        Self::text(String::new())
    }

    /// Send `output`, then close the channel.
    pub fn terminate(output: impl Into<String>) -> Self {
        Self { output: output.into(), flow: Flow::Terminate }
    }
}

/// One tokenised input line.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    /// The line with surrounding whitespace removed
    pub line: &'a str,
    /// First whitespace token, empty for a blank line
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

impl<'a> Invocation<'a> {
    pub fn parse(line: &'a str) -> Self {
        let mut tokens = line.split_whitespace();
        let name = tokens.next().unwrap_or("");
        Self { line: line.trim(), name, args: tokens.collect() }
    }
}

/// Shared command interpreter. Cheap to clone; holds only `Arc`s.
#[derive(Debug, Clone)]
pub struct Shell {
    fs: Arc<VirtualFilesystem>,
    profile: Arc<SystemProfile>,
}

impl Shell {
    pub fn new(fs: Arc<VirtualFilesystem>, profile: Arc<SystemProfile>) -> Self {
        Self { fs, profile }
    }

    pub fn filesystem(&self) -> &VirtualFilesystem {
        &self.fs
    }

    pub fn profile(&self) -> &SystemProfile {
        &self.profile
    }

    pub fn prompt(&self) -> &str {
        &self.profile.prompt
    }

    /// Interpret one line for `session`.
    ///
    /// The line is appended to the transcript after the handler runs, so
    /// `history` lists only the commands issued before it. Blank lines are
    /// recorded too and answered with an empty reply.
    pub fn execute(&self, line: &str, session: &mut SessionState) -> Reply {
        let invocation = Invocation::parse(line);
        let reply = if invocation.name.is_empty() {
            Reply::empty()
        } else {
            match commands::lookup(&invocation) {
                Some(entry) => (entry.handler)(&invocation, session, self),
                None => Reply::text(commands::NOT_FOUND),
            }
        };
        session.record_command(line);
        reply
    }

    /// Greeting written once the interactive channel opens.
    pub fn banner(&self, session: &SessionState) -> String {
        self.banner_at(session, Local::now())
    }

    pub fn banner_at(&self, session: &SessionState, now: DateTime<Local>) -> String {
        format!(
            "Welcome to {} {} ({})\nLast login: {} from {}\n",
            self.profile.sysname,
            self.profile.release,
            self.profile.machine,
            now.format("%a %b %e %H:%M:%S %Y"),
            session.source_address(),
        )
    }
}
