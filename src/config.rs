// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Configuration loading and serialization.
//!
//! Defines the TOML configuration schema for ClawTrap. The root [`Config`] struct
//! contains one section per component: transcript logging, the line-mode
//! listener, the fake host identity, the virtual filesystem tables, and the
//! behavior classifier's pattern sets.
//!
//! Every section implements `Default` and is marked `#[serde(default)]`, so an
//! empty file (or no file at all) yields a working honeypot. Config is loaded
//! from `/etc/clawtrap/config.toml` by default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::behavior::patterns::{DEFAULT_FETCH_TOOLS, DEFAULT_RECON_PROBES, BRUTEFORCE_COMMAND_THRESHOLD};

/// Root configuration struct, deserialized from TOML.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub system: SystemProfile,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

/// General configuration: transcript log location and operational log level.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeneralConfig {
    /// JSONL file receiving one record per finished session
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Rotate the transcript log to `<log_file>.1` once it grows past this size (0 = never)
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: u64,
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Root writes under /var/log, everyone else under a per-uid /tmp directory.
pub fn default_log_file() -> String {
    if unsafe { libc::getuid() } == 0 {
        "/var/log/clawtrap/sessions.jsonl".to_string()
    } else {
        format!("/tmp/clawtrap-{}/sessions.jsonl", unsafe { libc::getuid() })
    }
}
fn default_max_log_bytes() -> u64 { 10_000_000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            max_log_bytes: default_max_log_bytes(),
            log_level: default_log_level(),
        }
    }
}

/// Line-mode TCP front end that collects credentials and hands off the stream.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ListenerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_login_prompt")]
    pub login_prompt: String,
    #[serde(default = "default_password_prompt")]
    pub password_prompt: String,
}

fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 2222 }
fn default_login_prompt() -> String { "login: ".to_string() }
fn default_password_prompt() -> String { "Password: ".to_string() }

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            login_prompt: default_login_prompt(),
            password_prompt: default_password_prompt(),
        }
    }
}

/// Fake host identity reported by `uname`, the login banner and the prompt.
/// Never derived from the machine the honeypot actually runs on.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SystemProfile {
    pub sysname: String,
    pub nodename: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    pub prompt: String,
}

impl SystemProfile {
    /// `uname -a` style line: sysname, nodename, release, version, machine.
    pub fn uname_all(&self) -> String {
        format!("{} {} {} {} {}", self.sysname, self.nodename, self.release, self.version, self.machine)
    }
}

impl Default for SystemProfile {
    fn default() -> Self {
        Self {
            sysname: "Linux".to_string(),
            nodename: "srv-prod-01".to_string(),
            release: "5.15.0-91-generic".to_string(),
            version: "#101-Ubuntu SMP Tue Nov 14 13:30:08 UTC 2023".to_string(),
            machine: "x86_64".to_string(),
            prompt: "$ ".to_string(),
        }
    }
}

/// Virtual filesystem tables. Directory children keep their configured order.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FilesystemConfig {
    /// Paths that always read as denied, even with configured content
    #[serde(default)]
    pub protected: Vec<String>,
    /// Text `cat` answers with for protected or unknown files
    #[serde(default = "default_denial_message")]
    pub denial_message: String,
    #[serde(default)]
    pub directories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

fn default_denial_message() -> String { "Permission denied".to_string() }

impl Default for FilesystemConfig {
    fn default() -> Self {
        let dir = |path: &str, children: &[&str]| {
            (path.to_string(), children.iter().map(|c| c.to_string()).collect::<Vec<_>>())
        };
        Self {
            protected: vec!["/etc/shadow".to_string()],
            denial_message: default_denial_message(),
            directories: BTreeMap::from([
                dir("/", &["bin", "etc", "home", "var"]),
                dir("/home", &["admin"]),
                dir("/home/admin", &["notes.txt", ".bash_history"]),
                dir("/etc", &["passwd", "shadow"]),
            ]),
            files: BTreeMap::from([
                ("/home/admin/notes.txt".to_string(), "TODO: rotate SSH keys".to_string()),
                ("/etc/passwd".to_string(), "root:x:0:0:root:/root:/bin/bash".to_string()),
            ]),
        }
    }
}

/// Behavior classifier thresholds and pattern sets.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BehaviorConfig {
    /// Sessions with more commands than this are labelled automation
    #[serde(default = "default_bruteforce_threshold")]
    pub bruteforce_threshold: usize,
    /// Tokens that mark a payload download attempt (exact token match)
    #[serde(default = "default_fetch_tools")]
    pub fetch_tools: Vec<String>,
    /// Whole command lines that mark reconnaissance (exact line match)
    #[serde(default = "default_recon_probes")]
    pub recon_probes: Vec<String>,
}

fn default_bruteforce_threshold() -> usize { BRUTEFORCE_COMMAND_THRESHOLD }
fn default_fetch_tools() -> Vec<String> {
    DEFAULT_FETCH_TOOLS.iter().map(|s| s.to_string()).collect()
}
fn default_recon_probes() -> Vec<String> {
    DEFAULT_RECON_PROBES.iter().map(|s| s.to_string()).collect()
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            bruteforce_threshold: default_bruteforce_threshold(),
            fetch_tools: default_fetch_tools(),
            recon_probes: default_recon_probes(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config")?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            eprintln!("Config {} not found, using built-in defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.listener.port, 2222);
        assert_eq!(config.system.sysname, "Linux");
        assert_eq!(config.filesystem.directories["/"], vec!["bin", "etc", "home", "var"]);
        assert_eq!(config.behavior.bruteforce_threshold, 10);
        assert!(config.behavior.fetch_tools.iter().any(|t| t == "wget"));
    }

    #[test]
    fn test_partial_sections() {
        let toml_str = r##"
            [listener]
            port = 2323

            [system]
            nodename = "db-02"
            prompt = "# "

            [filesystem.directories]
            "/" = ["srv", "tmp"]
            "/srv" = []
        "##;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.listener.port, 2323);
        assert_eq!(config.listener.bind, "0.0.0.0");
        assert_eq!(config.system.nodename, "db-02");
        assert_eq!(config.system.sysname, "Linux");
        assert_eq!(config.system.prompt, "# ");
        assert_eq!(config.filesystem.directories.len(), 2);
        assert!(config.filesystem.files.is_empty());
        assert_eq!(config.filesystem.denial_message, "Permission denied");
    }

    #[test]
    fn test_uname_all_format() {
        let profile = SystemProfile {
            sysname: "Linux".into(),
            nodename: "box".into(),
            release: "6.1.0".into(),
            version: "#1 SMP".into(),
            machine: "aarch64".into(),
            prompt: "$ ".into(),
        };
        assert_eq!(profile.uname_all(), "Linux box 6.1.0 #1 SMP aarch64");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.listener.port = 2200;
        config.behavior.fetch_tools.push("tftp".to_string());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.listener.port, 2200);
        assert!(loaded.behavior.fetch_tools.contains(&"tftp".to_string()));
        assert_eq!(loaded.filesystem.files, config.filesystem.files);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default(Path::new("/nonexistent/clawtrap/config.toml")).unwrap();
        assert_eq!(config.listener.port, 2222);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[listener\nport = ").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }
}
