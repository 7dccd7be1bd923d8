//! Triage configuration.
//!
//! Lives in a JSON file, or YAML when the file extension is `.yaml`/`.yml`. Every field is
//! optional; command-line flags layer on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::registers::{AliasError, RegisterAliasTable};
use crate::services::{ResolutionPolicy, DEFAULT_TIMEOUT};
use crate::warnings::{WarningClassifier, WarningKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Warning kinds suppressed from the report.
    pub ignore: Vec<WarningKind>,
    /// Prefix stripped from resolved source paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_root: Option<String>,
    /// Explicit path to the addr2line binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr2line: Option<PathBuf>,
    /// Deadline for one addr2line invocation, in milliseconds.
    pub timeout_ms: u64,
    pub on_resolution_error: ResolutionPolicy,
    /// Extra register aliases merged over the built-in table.
    pub register_aliases: BTreeMap<String, String>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            build_root: None,
            addr2line: None,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            on_resolution_error: ResolutionPolicy::default(),
            register_aliases: BTreeMap::new(),
        }
    }
}

impl TriageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn classifier(&self) -> WarningClassifier {
        WarningClassifier::with_ignored(self.ignore.iter().copied())
    }

    /// Built-in register aliases with the configured extras merged in.
    pub fn alias_table(&self) -> Result<RegisterAliasTable, AliasError> {
        let mut table = RegisterAliasTable::default();
        table.extend(self.register_aliases.clone())?;
        Ok(table)
    }
}

/// Load a config file, choosing YAML or JSON by extension.
pub fn load_config(path: &Path) -> Result<TriageConfig> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    let config: TriageConfig = if is_yaml {
        serde_yaml::from_str(&body).context("Failed to parse config YAML")?
    } else {
        serde_json::from_str(&body).context("Failed to parse config JSON")?
    };
    config
        .alias_table()
        .with_context(|| format!("Invalid register_aliases in {}", path.display()))?;
    Ok(config)
}
