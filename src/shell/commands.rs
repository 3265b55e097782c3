// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Dispatch table and handlers for the recognised commands.
//!
//! Entries match either the whole trimmed line (`whoami`, `ip a`, ...) or the
//! first token (`cd`, `cat`, ...). Whole-line entries are checked first, so
//! `whoami --help` falls through to "command not found" like it always has.

use super::session::SessionState;
use super::{Invocation, Reply, Shell};

/// Uniform handler signature for every table entry.
pub type Handler = fn(&Invocation<'_>, &mut SessionState, &Shell) -> Reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOn {
    /// The trimmed line must equal the pattern
    Line,
    /// The first token must equal the pattern
    Name,
}

pub struct CommandEntry {
    pub pattern: &'static str,
    pub match_on: MatchOn,
    pub handler: Handler,
}

pub(crate) const NOT_FOUND: &str = "command not found";

const ID_LINE: &str = "uid=0(root) gid=0(root) groups=0(root) context=system_u:system_r:unconfined_t:s0";

const PS_TABLE: &str = "\
PID TTY      TIME CMD
1   ?        00:00 init
1337 pts/0   00:00 bash";

const IFCONFIG_BLOCK: &str = "\
eth0: flags=4163<UP,BROADCAST,RUNNING>
inet 10.0.0.10 netmask 255.255.255.0";

pub const COMMANDS: &[CommandEntry] = &[
    CommandEntry { pattern: "whoami", match_on: MatchOn::Line, handler: whoami },
    CommandEntry { pattern: "id", match_on: MatchOn::Line, handler: id },
    CommandEntry { pattern: "ps", match_on: MatchOn::Line, handler: ps },
    CommandEntry { pattern: "ifconfig", match_on: MatchOn::Line, handler: ifconfig },
    CommandEntry { pattern: "ip a", match_on: MatchOn::Line, handler: ifconfig },
    CommandEntry { pattern: "history", match_on: MatchOn::Line, handler: history },
    CommandEntry { pattern: "exit", match_on: MatchOn::Line, handler: logout },
    CommandEntry { pattern: "logout", match_on: MatchOn::Line, handler: logout },
    CommandEntry { pattern: "uname", match_on: MatchOn::Name, handler: uname },
    CommandEntry { pattern: "pwd", match_on: MatchOn::Name, handler: pwd },
    CommandEntry { pattern: "cd", match_on: MatchOn::Name, handler: cd },
    CommandEntry { pattern: "ls", match_on: MatchOn::Name, handler: ls },
    CommandEntry { pattern: "cat", match_on: MatchOn::Name, handler: cat },
    CommandEntry { pattern: "echo", match_on: MatchOn::Name, handler: echo },
];

/// Find the entry for an invocation: whole-line matches win over name matches.
pub fn lookup(invocation: &Invocation<'_>) -> Option<&'static CommandEntry> {
    COMMANDS.iter()
        .find(|e| e.match_on == MatchOn::Line && e.pattern == invocation.line)
        .or_else(|| COMMANDS.iter()
            .find(|e| e.match_on == MatchOn::Name && e.pattern == invocation.name))
}

fn whoami(_: &Invocation<'_>, _: &mut SessionState, _: &Shell) -> Reply {
    Reply::text("root")
}

fn id(_: &Invocation<'_>, _: &mut SessionState, _: &Shell) -> Reply {
    Reply::text(ID_LINE)
}

fn ps(_: &Invocation<'_>, _: &mut SessionState, _: &Shell) -> Reply {
    Reply::text(PS_TABLE)
}

fn ifconfig(_: &Invocation<'_>, _: &mut SessionState, _: &Shell) -> Reply {
    Reply::text(IFCONFIG_BLOCK)
}

fn logout(_: &Invocation<'_>, _: &mut SessionState, _: &Shell) -> Reply {
    Reply::terminate("logout")
}

fn uname(inv: &Invocation<'_>, _: &mut SessionState, shell: &Shell) -> Reply {
    if inv.args.contains(&"-a") {
        Reply::text(shell.profile().uname_all())
    } else {
        Reply::text(shell.profile().sysname.clone())
    }
}

fn pwd(_: &Invocation<'_>, session: &mut SessionState, _: &Shell) -> Reply {
    Reply::text(session.working_directory())
}

fn cd(inv: &Invocation<'_>, session: &mut SessionState, shell: &Shell) -> Reply {
    let target = inv.args.first().copied().unwrap_or("/");

    if target == ".." {
        let cwd = session.working_directory().trim_end_matches('/');
        let parent = match cwd.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &cwd[..idx],
        };
        session.working_directory = parent.to_string();
        return Reply::empty();
    }

    let resolved = session.resolve(target);
    if shell.filesystem().is_directory(&resolved) {
        session.working_directory = resolved;
        Reply::empty()
    } else {
        Reply::text(format!("bash: cd: {}: No such file or directory", target))
    }
}

fn ls(inv: &Invocation<'_>, session: &mut SessionState, shell: &Shell) -> Reply {
    let path = match inv.args.iter().find(|a| !a.starts_with('-')) {
        Some(arg) => session.resolve(arg),
        None => session.working_directory().to_string(),
    };
    Reply::text(shell.filesystem().list_directory(&path).join("  "))
}

fn cat(inv: &Invocation<'_>, session: &mut SessionState, shell: &Shell) -> Reply {
    let Some(arg) = inv.args.first() else {
        return Reply::text("cat: missing file operand");
    };
    let path = session.resolve(arg);
    let fs = shell.filesystem();
    if fs.is_protected(&path) {
        return Reply::text(fs.denial_message());
    }
    match fs.read_file(&path) {
        Some(content) => Reply::text(content),
        None => Reply::text(fs.denial_message()),
    }
}

fn echo(inv: &Invocation<'_>, _: &mut SessionState, _: &Shell) -> Reply {
    Reply::text(inv.args.join(" "))
}

fn history(_: &Invocation<'_>, session: &mut SessionState, _: &Shell) -> Reply {
    let lines: Vec<String> = session.transcript().iter()
        .enumerate()
        .map(|(i, cmd)| format!("{}  {}", i + 1, cmd))
        .collect();
    Reply::text(lines.join("\n"))
}
