// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Connection handshake: everything that happens before the shell starts.
//!
//! A [`Handshake`] turns an accepted TCP stream into a [`SessionHandoff`]
//! (byte streams plus the credentials the client offered). Authentication
//! always succeeds; the only way to not get a session is to hang up first.
//!
//! [`LineLogin`] is the built-in handshake: a plain-text `login:` /
//! `Password:` exchange over the raw socket. A full SSH transport plugs in
//! at the same seam.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::ListenerConfig;
use crate::core::session::read_line;
use crate::shell::session::Identity;

/// An authenticated channel ready for [`crate::core::session::run_session`].
pub struct SessionHandoff {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    pub identity: Identity,
    /// Client IP, without the port
    pub source_address: String,
}

impl std::fmt::Debug for SessionHandoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandoff")
            .field("identity", &self.identity)
            .field("source_address", &self.source_address)
            .finish_non_exhaustive()
    }
}

/// Accept-everything authentication front end.
#[async_trait]
pub trait Handshake: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the client went away before authenticating.
    async fn establish(&self, stream: TcpStream, peer: SocketAddr) -> Result<Option<SessionHandoff>>;
}

/// Line-mode login prompt over a bare TCP stream.
#[derive(Debug, Clone)]
pub struct LineLogin {
    login_prompt: String,
    password_prompt: String,
}

impl LineLogin {
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self {
            login_prompt: config.login_prompt.clone(),
            password_prompt: config.password_prompt.clone(),
        }
    }

    /// Run the login exchange over any byte stream pair.
    pub async fn login<R, W>(
        &self,
        reader: R,
        mut writer: W,
        source_address: String,
    ) -> Result<Option<SessionHandoff>>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut reader = BufReader::new(reader);

        writer.write_all(self.login_prompt.as_bytes()).await
            .context("Failed to send login prompt")?;
        writer.flush().await?;
        let username = match read_line(&mut reader).await.context("Failed to read username")? {
            Some(line) => line.trim().to_string(),
            None => return Ok(None),
        };

        writer.write_all(self.password_prompt.as_bytes()).await
            .context("Failed to send password prompt")?;
        writer.flush().await?;
        let password = match read_line(&mut reader).await.context("Failed to read password")? {
            Some(line) => line,
            None => return Ok(None),
        };

        tracing::debug!("Login from {} accepted for {:?}", source_address, username);

        // The BufReader goes along with the handoff so bytes the client
        // pipelined after the password are not lost.
        Ok(Some(SessionHandoff {
            reader: Box::new(reader),
            writer: Box::new(writer),
            identity: Identity::new(username, password),
            source_address,
        }))
    }
}

#[async_trait]
impl Handshake for LineLogin {
    fn name(&self) -> &str {
        "line-login"
    }

    async fn establish(&self, stream: TcpStream, peer: SocketAddr) -> Result<Option<SessionHandoff>> {
        let (reader, writer) = stream.into_split();
        self.login(reader, writer, peer.ip().to_string()).await
    }
}
