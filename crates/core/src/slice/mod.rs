//! Slice-report parsing.
//!
//! A slice report is a text dump made of per-address sections. Each section carries a
//! `USES` table (instruction → registers read), a `DEFS` table (instruction → registers
//! written) and a `DEFINITIONS` table (register → instructions that write it).
//! [`SliceStore`] holds those three tables for exactly one section.

mod parser;

use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

use serde::Serialize;
use thiserror::Error;

use crate::registers::RegisterAliasTable;

pub use parser::{
    ParseState, SectionParser, SubSection, DEFINITIONS_HEADER, DEFINITIONS_TERMINATOR, DEFS_HEADER,
    SECTION_END_MARKER, SECTION_START_MARKER, USES_HEADER,
};

/// Errors raised while parsing a slice report.
#[derive(Debug, Error)]
pub enum SliceError {
    #[error("line {line}: {section} entry has no tab separator: {text:?}")]
    MissingTab { line: usize, section: SubSection, text: String },

    #[error("line {line}: invalid hexadecimal address {value:?}")]
    BadAddress { line: usize, value: String },

    #[error("line {line}: {section} entry {key:?} has no values")]
    EmptyValues { line: usize, section: SubSection, key: String },

    #[error("no slice section found for target address {target:#x}")]
    SectionNotFound { target: u64 },

    #[error("failed to read slice report: {0}")]
    Io(#[from] std::io::Error),
}

impl SliceError {
    /// True for malformed-content errors (as opposed to I/O or a missing section).
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            SliceError::MissingTab { .. }
                | SliceError::BadAddress { .. }
                | SliceError::EmptyValues { .. }
        )
    }
}

/// Register def/use tables for one slice-report section.
///
/// Every key in every table maps to a non-empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SliceStore {
    pub(crate) target: Option<u64>,
    pub(crate) defs: BTreeMap<u64, BTreeSet<String>>,
    pub(crate) uses: BTreeMap<u64, BTreeSet<String>>,
    pub(crate) definitions: BTreeMap<String, BTreeSet<u64>>,
}

impl SliceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the section for `target` out of a report.
    pub fn parse<R: BufRead>(
        reader: R,
        target: u64,
        aliases: &RegisterAliasTable,
    ) -> Result<Self, SliceError> {
        let mut parser = SectionParser::new(target, aliases);
        for line in reader.lines() {
            if parser.feed(&line?)? == ParseState::Finished {
                break;
            }
        }
        parser.finish()
    }

    pub fn parse_str(
        report: &str,
        target: u64,
        aliases: &RegisterAliasTable,
    ) -> Result<Self, SliceError> {
        Self::parse(report.as_bytes(), target, aliases)
    }

    /// Replace this store's contents with the section for `target`.
    ///
    /// Prior contents are discarded first; on error the store is left empty.
    pub fn load<R: BufRead>(
        &mut self,
        reader: R,
        target: u64,
        aliases: &RegisterAliasTable,
    ) -> Result<(), SliceError> {
        self.clear();
        *self = Self::parse(reader, target, aliases)?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.target = None;
        self.defs.clear();
        self.uses.clear();
        self.definitions.clear();
    }

    /// Target address of the loaded section, `None` when nothing is loaded.
    pub fn target(&self) -> Option<u64> {
        self.target
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty() && self.uses.is_empty() && self.definitions.is_empty()
    }

    pub fn defs(&self) -> &BTreeMap<u64, BTreeSet<String>> {
        &self.defs
    }

    pub fn uses(&self) -> &BTreeMap<u64, BTreeSet<String>> {
        &self.uses
    }

    pub fn definitions(&self) -> &BTreeMap<String, BTreeSet<u64>> {
        &self.definitions
    }

    /// Registers written by the instruction at `address`.
    pub fn defs_at(&self, address: u64) -> Option<&BTreeSet<String>> {
        self.defs.get(&address)
    }

    /// Registers read by the instruction at `address`.
    pub fn uses_at(&self, address: u64) -> Option<&BTreeSet<String>> {
        self.uses.get(&address)
    }

    /// Instructions that define `register` (canonical name).
    pub fn definers_of(&self, register: &str) -> Option<&BTreeSet<u64>> {
        self.definitions.get(register)
    }
}
