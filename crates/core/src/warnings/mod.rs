//! Warning-stream classification.
//!
//! Warning lines look like `*** <message> ### <addr1> ### <addr2>`. The message text
//! carries one of eight fixed phrases that identify the warning kind.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parse_hex_address;

/// Prefix that marks a line as a warning record.
pub const WARNING_MARKER: &str = "***";

/// Separator between the message text and the two addresses.
pub const FIELD_SEPARATOR: &str = " ### ";

/// The fixed warning taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    NullDerefRead,
    NullDerefWrite,
    MisalignedRead,
    MisalignedWrite,
    WriteOutOfBounds,
    ReadOutOfBounds,
    ReadUninitialized,
    UnboundedMalloc,
}

/// Ordered (message phrase, kind) table. The first phrase found in a message wins, so
/// entries must stay in this priority order.
pub const CLASSIFICATION_TABLE: [(&str, WarningKind); 8] = [
    ("Possible NULL ptr dereference (read)", WarningKind::NullDerefRead),
    ("Possible NULL ptr dereference (write)", WarningKind::NullDerefWrite),
    ("Misaligned read discovered", WarningKind::MisalignedRead),
    ("Misaligned write discovered", WarningKind::MisalignedWrite),
    ("Write out of bounds", WarningKind::WriteOutOfBounds),
    ("Read out of bounds", WarningKind::ReadOutOfBounds),
    ("Read of uninitialized address", WarningKind::ReadUninitialized),
    ("Unbounded malloc", WarningKind::UnboundedMalloc),
];

impl WarningKind {
    /// All kinds in classification priority order.
    pub const ALL: [WarningKind; 8] = [
        WarningKind::NullDerefRead,
        WarningKind::NullDerefWrite,
        WarningKind::MisalignedRead,
        WarningKind::MisalignedWrite,
        WarningKind::WriteOutOfBounds,
        WarningKind::ReadOutOfBounds,
        WarningKind::ReadUninitialized,
        WarningKind::UnboundedMalloc,
    ];

    /// Human-readable label used in report output.
    pub fn label(self) -> &'static str {
        match self {
            WarningKind::NullDerefRead => "Null pointer dereference (read)",
            WarningKind::NullDerefWrite => "Null pointer dereference (write)",
            WarningKind::MisalignedRead => "Misaligned read",
            WarningKind::MisalignedWrite => "Misaligned write",
            WarningKind::WriteOutOfBounds => "Write out-of-bounds",
            WarningKind::ReadOutOfBounds => "Read out-of-bounds",
            WarningKind::ReadUninitialized => "Read of uninitialized address",
            WarningKind::UnboundedMalloc => "Allocate the entire address space",
        }
    }

    /// Stable kebab-case name, as accepted by [`FromStr`] and used in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            WarningKind::NullDerefRead => "null-deref-read",
            WarningKind::NullDerefWrite => "null-deref-write",
            WarningKind::MisalignedRead => "misaligned-read",
            WarningKind::MisalignedWrite => "misaligned-write",
            WarningKind::WriteOutOfBounds => "write-out-of-bounds",
            WarningKind::ReadOutOfBounds => "read-out-of-bounds",
            WarningKind::ReadUninitialized => "read-uninitialized",
            WarningKind::UnboundedMalloc => "unbounded-malloc",
        }
    }

    /// Message phrase the analyzer uses for this kind.
    pub fn pattern(self) -> &'static str {
        CLASSIFICATION_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(pattern, _)| *pattern)
            .unwrap_or_default()
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarningKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WarningKind::ALL.into_iter().find(|kind| kind.as_str() == s).ok_or_else(|| {
            let allowed: Vec<&str> = WarningKind::ALL.iter().map(|k| k.as_str()).collect();
            format!("Invalid warning kind '{}'. Allowed: {}", s, allowed.join(", "))
        })
    }
}

/// A classified warning line. `address1`/`address2` are in message order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    pub kind: WarningKind,
    pub address1: u64,
    pub address2: u64,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A marker line matched none of the known phrases. The upstream format changed;
    /// callers must stop rather than drop the line.
    #[error("Unrecognized warning: {0:?}")]
    Unrecognized(String),

    #[error("Malformed {kind} warning ({reason}): {line:?}")]
    Malformed { kind: WarningKind, reason: String, line: String },
}

/// Maps raw warning-stream lines to [`WarningRecord`]s, honoring an ignore set.
#[derive(Debug, Clone, Default)]
pub struct WarningClassifier {
    ignore: BTreeSet<WarningKind>,
}

impl WarningClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignored<I: IntoIterator<Item = WarningKind>>(ignore: I) -> Self {
        Self { ignore: ignore.into_iter().collect() }
    }

    pub fn ignore(&mut self, kind: WarningKind) -> &mut Self {
        self.ignore.insert(kind);
        self
    }

    pub fn is_ignored(&self, kind: WarningKind) -> bool {
        self.ignore.contains(&kind)
    }

    pub fn ignored(&self) -> &BTreeSet<WarningKind> {
        &self.ignore
    }

    /// Match a message against [`CLASSIFICATION_TABLE`] without extracting addresses.
    pub fn kind_of(message: &str) -> Option<WarningKind> {
        CLASSIFICATION_TABLE
            .iter()
            .find(|(pattern, _)| message.contains(pattern))
            .map(|(_, kind)| *kind)
    }

    /// Classify one line.
    ///
    /// Returns `Ok(None)` for non-warning lines and for warnings of an ignored kind.
    pub fn classify(&self, line: &str) -> Result<Option<WarningRecord>, ClassifyError> {
        let line = line.trim();
        if !line.starts_with(WARNING_MARKER) {
            return Ok(None);
        }
        let kind =
            Self::kind_of(line).ok_or_else(|| ClassifyError::Unrecognized(line.to_string()))?;
        if self.is_ignored(kind) {
            return Ok(None);
        }

        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() < 3 {
            return Err(ClassifyError::Malformed {
                kind,
                reason: format!("expected 3 '###' fields, found {}", fields.len()),
                line: line.to_string(),
            });
        }
        let address = |index: usize| {
            parse_hex_address(fields[index]).ok_or_else(|| ClassifyError::Malformed {
                kind,
                reason: format!("address {} is not hexadecimal: {:?}", index, fields[index].trim()),
                line: line.to_string(),
            })
        };

        Ok(Some(WarningRecord { kind, address1: address(1)?, address2: address(2)? }))
    }
}
