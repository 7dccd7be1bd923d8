use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;
use slicetriage_core::config::TriageConfig;
use slicetriage_core::services::{
    resolve_addr2line_path, Addr2LineResolver, CorrelatedWarning, Correlator, ResolutionPolicy,
    SymbolResolver,
};
use slicetriage_core::warnings::WarningKind;

use crate::{load_config_or_default, open_input, sha256_file};

/// Options for the `warnings` command, as collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct WarningsOptions {
    pub executable: String,
    pub log: String,
    pub config: Option<String>,
    pub ignore: Vec<WarningKind>,
    pub build_root: Option<String>,
    pub addr2line: Option<String>,
    pub timeout_ms: Option<u64>,
    pub on_resolution_error: Option<ResolutionPolicy>,
    pub json: bool,
}

/// JSON form of a full warnings run.
#[derive(Debug, Serialize)]
pub struct TriageReport {
    pub executable: String,
    pub executable_sha256: String,
    pub generated_at: String,
    pub ignored: Vec<WarningKind>,
    pub records: Vec<CorrelatedWarning>,
    pub skipped: usize,
}

/// Layer command-line flags over the config file (if any).
pub fn effective_config(opts: &WarningsOptions) -> Result<TriageConfig> {
    let mut config = load_config_or_default(opts.config.as_deref())?;
    for kind in &opts.ignore {
        if !config.ignore.contains(kind) {
            config.ignore.push(*kind);
        }
    }
    if opts.build_root.is_some() {
        config.build_root = opts.build_root.clone();
    }
    if let Some(tool) = &opts.addr2line {
        config.addr2line = Some(PathBuf::from(tool));
    }
    if let Some(ms) = opts.timeout_ms {
        config.timeout_ms = ms;
    }
    if let Some(policy) = opts.on_resolution_error {
        config.on_resolution_error = policy;
    }
    Ok(config)
}

/// Correlate a warning log against an executable and print the report to stdout.
pub fn warnings_command(opts: &WarningsOptions) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_warnings_report(opts, &mut out)?;
    Ok(())
}

/// Same as [`warnings_command`] but writing to `out`. Returns the number of records emitted.
pub fn write_warnings_report<W: Write>(opts: &WarningsOptions, out: &mut W) -> Result<usize> {
    let executable = Path::new(&opts.executable);
    if !executable.is_file() {
        return Err(anyhow!("Executable does not exist: {}", executable.display()));
    }
    let input = open_input(&opts.log)
        .with_context(|| format!("Failed to open warning log {}", opts.log))?;
    let config = effective_config(opts)?;

    let tool = config.addr2line.clone().unwrap_or_else(resolve_addr2line_path);
    let resolver =
        SymbolResolver::new(Addr2LineResolver::new(tool).with_timeout(config.timeout()));
    let classifier = config.classifier();
    let correlator = Correlator::new(&classifier, &resolver, executable)
        .with_build_root(config.build_root.clone())
        .with_policy(config.on_resolution_error);

    let emitted = if opts.json {
        let records = correlator
            .correlate(input)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to correlate warnings from {}", opts.log))?;
        let report = TriageReport {
            executable: executable.display().to_string(),
            executable_sha256: sha256_file(executable)?,
            generated_at: Utc::now().to_rfc3339(),
            ignored: config.ignore.clone(),
            skipped: correlator.skipped(),
            records,
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        report.records.len()
    } else {
        let mut count = 0;
        for record in correlator.correlate(input) {
            let record =
                record.with_context(|| format!("Failed to correlate warnings from {}", opts.log))?;
            writeln!(out, "{record}")?;
            count += 1;
        }
        count
    };

    log::info!(
        "emitted {} record(s), skipped {}, {} address(es) resolved",
        emitted,
        correlator.skipped(),
        resolver.cached_len()
    );
    Ok(emitted)
}
