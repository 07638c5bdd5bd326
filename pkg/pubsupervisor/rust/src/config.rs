// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::launcher::{DEFAULT_WORKER_ARGS, DEFAULT_WORKER_PROGRAM, GroupKey, WorkerCommand, WorkerConfig};
use crate::supervisor::SupervisorOptions;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = "/etc/datadog-agent/publishers.d";
pub const CONFIG_DIR_ENV: &str = "DD_PUBSUP_CONFIG_DIR";

fn default_program() -> String {
    DEFAULT_WORKER_PROGRAM.to_string()
}

fn default_args() -> Vec<String> {
    DEFAULT_WORKER_ARGS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct GroupKeyConfig {
    pub id: String,
    pub hex: String,
}

/// One worker definition, as written in `<name>.yaml`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublisherConfig {
    pub publisher_id: String,
    pub private_key: String,
    pub stream_id: String,
    pub publish_function: String,
    pub interval_ms: u64,
    #[serde(default)]
    pub max_messages: u32,
    pub group_key: Option<GroupKeyConfig>,
    #[serde(default = "default_program")]
    pub command: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Seconds between SIGTERM and SIGKILL.
    pub stop_timeout: Option<u64>,
}

impl PublisherConfig {
    pub fn worker_config(&self) -> WorkerConfig {
        let config = WorkerConfig::new(
            &self.publisher_id,
            &self.private_key,
            &self.stream_id,
            &self.publish_function,
            self.interval_ms,
            self.max_messages,
        );
        match self.group_key {
            Some(ref key) => config.with_group_key(GroupKey::new(&key.id, &key.hex)),
            None => config,
        }
    }

    pub fn worker_command(&self) -> WorkerCommand {
        WorkerCommand::new(&self.command, self.args.clone())
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        match self.stop_timeout {
            Some(secs) => SupervisorOptions {
                stop_timeout: Duration::from_secs(secs),
            },
            None => SupervisorOptions::default(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR))
}

/// Scan a directory for `*.yaml` files and parse each into a PublisherConfig.
/// The worker name is derived from the filename (without extension).
/// Files that fail to parse are logged and skipped.
pub fn load_configs(dir: &Path) -> Result<Vec<(String, PublisherConfig)>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read config directory: {}", dir.display()))?;

    let mut yaml_files: Vec<_> = entries
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", dir.display());
                None
            }
        })
        .filter(|e| {
            let is_yaml = e
                .path()
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if !is_yaml {
                debug!("skipping non-YAML file: {}", e.path().display());
            }
            is_yaml
        })
        .collect();

    yaml_files.sort_by_key(|e| e.file_name());

    let mut configs = Vec::new();
    for entry in yaml_files {
        let path = entry.path();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        match parse_config(&path) {
            Ok(config) => configs.push((name, config)),
            Err(e) => warn!("skipping {}: {e:#}", path.display()),
        }
    }

    Ok(configs)
}

fn parse_config(path: &Path) -> Result<PublisherConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: PublisherConfig =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
