use std::fmt;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::symbolizer::{
    AddressResolver, ResolutionError, ResolvedLocation, SymbolResolver,
};
use crate::warnings::{ClassifyError, WarningClassifier, WarningKind, WarningRecord};

/// What to do when one of a warning's addresses cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Propagate the error and stop correlating.
    #[default]
    Abort,
    /// Drop the record and continue with the next line.
    Skip,
    /// Emit the record with the unresolved endpoint shown as `??@??:0`.
    Placeholder,
}

impl ResolutionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionPolicy::Abort => "abort",
            ResolutionPolicy::Skip => "skip",
            ResolutionPolicy::Placeholder => "placeholder",
        }
    }
}

impl std::str::FromStr for ResolutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(ResolutionPolicy::Abort),
            "skip" => Ok(ResolutionPolicy::Skip),
            "placeholder" => Ok(ResolutionPolicy::Placeholder),
            other => Err(format!(
                "Invalid resolution policy '{}'. Allowed: abort, skip, placeholder",
                other
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum CorrelateError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("failed to resolve {address:#010x} for {kind} warning: {source}")]
    Resolution {
        kind: WarningKind,
        address: u64,
        #[source]
        source: ResolutionError,
    },

    #[error("failed to read warning stream: {0}")]
    Io(#[from] io::Error),
}

/// One address of a warning together with its resolved source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: u64,
    /// `None` only under [`ResolutionPolicy::Placeholder`].
    pub location: Option<ResolvedLocation>,
}

impl Endpoint {
    /// `func@file:line`, or `??@??:0` when unresolved.
    pub fn source_label(&self) -> String {
        match &self.location {
            Some(loc) => format!("{}@{}:{}", loc.function, loc.file, loc.line),
            None => "??@??:0".to_string(),
        }
    }
}

/// A normalized report record.
///
/// `primary` is the message's second address (the related site), `secondary` the first;
/// report output lists them in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatedWarning {
    pub kind: WarningKind,
    pub label: String,
    pub primary: Endpoint,
    pub secondary: Endpoint,
}

impl fmt::Display for CorrelatedWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<40}: {:08x} : {:<40} : {:08x} : {}",
            self.label,
            self.primary.address,
            self.primary.source_label(),
            self.secondary.address,
            self.secondary.source_label()
        )
    }
}

/// Strip `build_root` from the front of `path` if present.
pub fn strip_build_root(path: &str, build_root: Option<&str>) -> String {
    match build_root {
        Some(root) if !root.is_empty() => path.strip_prefix(root).unwrap_or(path).to_string(),
        _ => path.to_string(),
    }
}

/// Drives classification and resolution over a warning stream.
pub struct Correlator<'a, R> {
    classifier: &'a WarningClassifier,
    resolver: &'a SymbolResolver<R>,
    executable: PathBuf,
    build_root: Option<String>,
    policy: ResolutionPolicy,
    skipped: AtomicUsize,
}

impl<'a, R: AddressResolver> Correlator<'a, R> {
    pub fn new(
        classifier: &'a WarningClassifier,
        resolver: &'a SymbolResolver<R>,
        executable: impl Into<PathBuf>,
    ) -> Self {
        Self {
            classifier,
            resolver,
            executable: executable.into(),
            build_root: None,
            policy: ResolutionPolicy::default(),
            skipped: AtomicUsize::new(0),
        }
    }

    pub fn with_build_root(mut self, build_root: Option<String>) -> Self {
        self.build_root = build_root;
        self
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Records dropped so far under [`ResolutionPolicy::Skip`].
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Correlate a single line.
    ///
    /// `Ok(None)` means the line is not a warning, is of an ignored kind, or was dropped
    /// under [`ResolutionPolicy::Skip`].
    pub fn correlate_line(&self, line: &str) -> Result<Option<CorrelatedWarning>, CorrelateError> {
        let Some(record) = self.classifier.classify(line)? else {
            return Ok(None);
        };
        let Some(secondary) = self.endpoint(&record, record.address1)? else {
            return Ok(None);
        };
        let Some(primary) = self.endpoint(&record, record.address2)? else {
            return Ok(None);
        };
        Ok(Some(CorrelatedWarning {
            kind: record.kind,
            label: record.kind.label().to_string(),
            primary,
            secondary,
        }))
    }

    /// Resolve one endpoint; `Ok(None)` means the record should be skipped.
    fn endpoint(
        &self,
        record: &WarningRecord,
        address: u64,
    ) -> Result<Option<Endpoint>, CorrelateError> {
        match self.resolver.resolve(&self.executable, address) {
            Ok(mut location) => {
                location.file = strip_build_root(&location.file, self.build_root.as_deref());
                Ok(Some(Endpoint { address, location: Some(location) }))
            }
            Err(source) => match self.policy {
                ResolutionPolicy::Abort => {
                    Err(CorrelateError::Resolution { kind: record.kind, address, source })
                }
                ResolutionPolicy::Skip => {
                    log::warn!("skipping {} warning at {:#010x}: {}", record.kind, address, source);
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
                ResolutionPolicy::Placeholder => {
                    log::warn!("unresolved {:#010x} in {} warning: {}", address, record.kind, source);
                    Ok(Some(Endpoint { address, location: None }))
                }
            },
        }
    }

    /// Lazily correlate every line of `reader`.
    pub fn correlate<'c, B: BufRead>(&'c self, reader: B) -> Correlation<'c, 'a, R, io::Lines<B>> {
        self.correlate_lines(reader.lines())
    }

    /// Lazily correlate an arbitrary line source.
    pub fn correlate_lines<'c, I>(&'c self, lines: I) -> Correlation<'c, 'a, R, I>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        Correlation { correlator: self, lines, failed: false }
    }
}

/// Iterator returned by [`Correlator::correlate`]. Stops after the first error.
pub struct Correlation<'c, 'a, R, I> {
    correlator: &'c Correlator<'a, R>,
    lines: I,
    failed: bool,
}

impl<R, I> Iterator for Correlation<'_, '_, R, I>
where
    R: AddressResolver,
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<CorrelatedWarning, CorrelateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        for line in self.lines.by_ref() {
            let outcome =
                line.map_err(CorrelateError::from).and_then(|line| self.correlator.correlate_line(&line));
            match outcome {
                Ok(Some(warning)) => return Some(Ok(warning)),
                Ok(None) => continue,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}
