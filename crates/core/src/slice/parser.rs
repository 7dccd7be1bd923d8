//! Line-at-a-time state machine for one slice-report section.
//!
//! States and transitions (markers are tested on the raw line, everything else on
//! the trimmed line):
//!
//! | state             | input                                        | next              |
//! |-------------------|----------------------------------------------|-------------------|
//! | `Seeking`         | starts with `@@@@@@@` and contains target hex | `InSection(None)` |
//! | `Seeking`         | anything else                                | `Seeking`         |
//! | `InSection(_)`    | starts with `@@@@@`                          | `Finished`        |
//! | `InSection(_)`    | contains `===== USES`                        | `InSection(Uses)` |
//! | `InSection(_)`    | contains `==== DEFS`                         | `InSection(Defs)` |
//! | `InSection(_)`    | contains `==== DEFINI`                       | `InSection(Definitions)` |
//! | `InSection(Uses\|Defs)` | blank                                  | `InSection(None)` |
//! | `InSection(Definitions)` | blank or starts with `Serializing`    | `InSection(None)` |
//! | `InSection(Some)` | `<key>\t<values>`                            | unchanged, entry recorded |
//! | `InSection(None)` | anything else                                | unchanged         |
//! | `Finished`        | anything                                     | `Finished`        |

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::parse_hex_address;
use crate::registers::RegisterAliasTable;
use crate::slice::{SliceError, SliceStore};

pub const SECTION_START_MARKER: &str = "@@@@@@@";
pub const SECTION_END_MARKER: &str = "@@@@@";
pub const USES_HEADER: &str = "===== USES";
pub const DEFS_HEADER: &str = "==== DEFS";
pub const DEFINITIONS_HEADER: &str = "==== DEFINI";
pub const DEFINITIONS_TERMINATOR: &str = "Serializing";

/// Sub-section of a report section whose data lines are being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubSection {
    Uses,
    Defs,
    Definitions,
}

impl fmt::Display for SubSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubSection::Uses => "USES",
            SubSection::Defs => "DEFS",
            SubSection::Definitions => "DEFINITIONS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Seeking,
    InSection(Option<SubSection>),
    Finished,
}

/// Incremental parser scoped to the section for one target address.
///
/// Feed lines in order with [`SectionParser::feed`], then call [`SectionParser::finish`].
/// The parser never looks at anything after the section's end marker.
#[derive(Debug)]
pub struct SectionParser<'a> {
    target: u64,
    target_hex: String,
    aliases: &'a RegisterAliasTable,
    state: ParseState,
    line_no: usize,
    defs: BTreeMap<u64, BTreeSet<String>>,
    uses: BTreeMap<u64, BTreeSet<String>>,
    definitions: BTreeMap<String, BTreeSet<u64>>,
}

impl<'a> SectionParser<'a> {
    pub fn new(target: u64, aliases: &'a RegisterAliasTable) -> Self {
        Self {
            target,
            target_hex: format!("{target:x}"),
            aliases,
            state: ParseState::Seeking,
            line_no: 0,
            defs: BTreeMap::new(),
            uses: BTreeMap::new(),
            definitions: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Advance the state machine by one raw report line and return the new state.
    pub fn feed(&mut self, raw: &str) -> Result<ParseState, SliceError> {
        self.line_no += 1;
        match self.state {
            ParseState::Finished => {}
            ParseState::Seeking => {
                if raw.starts_with(SECTION_START_MARKER) && raw.contains(&self.target_hex) {
                    log::debug!(
                        "slice section for {:#x} starts at line {}",
                        self.target,
                        self.line_no
                    );
                    self.state = ParseState::InSection(None);
                }
            }
            ParseState::InSection(current) => {
                if raw.starts_with(SECTION_END_MARKER) {
                    log::debug!("slice section ends at line {}", self.line_no);
                    self.state = ParseState::Finished;
                } else {
                    self.state = ParseState::InSection(self.in_section(current, raw.trim())?);
                }
            }
        }
        Ok(self.state)
    }

    fn in_section(
        &mut self,
        current: Option<SubSection>,
        line: &str,
    ) -> Result<Option<SubSection>, SliceError> {
        if line.contains(USES_HEADER) {
            return Ok(Some(SubSection::Uses));
        }
        if line.contains(DEFS_HEADER) {
            return Ok(Some(SubSection::Defs));
        }
        if line.contains(DEFINITIONS_HEADER) {
            return Ok(Some(SubSection::Definitions));
        }

        let Some(section) = current else {
            return Ok(None);
        };
        if line.is_empty()
            || (section == SubSection::Definitions && line.starts_with(DEFINITIONS_TERMINATOR))
        {
            return Ok(None);
        }

        let mut fields = line.split('\t');
        let key = fields.next().unwrap_or_default();
        let values = fields.next().ok_or_else(|| SliceError::MissingTab {
            line: self.line_no,
            section,
            text: line.to_string(),
        })?;

        match section {
            SubSection::Uses | SubSection::Defs => {
                let address = self.hex(key)?;
                let aliases = self.aliases;
                let table = if section == SubSection::Uses { &mut self.uses } else { &mut self.defs };
                let registers = table.entry(address).or_default();
                registers.extend(
                    values.split_whitespace().map(|raw| aliases.canonicalize(raw).to_string()),
                );
                if registers.is_empty() {
                    return Err(SliceError::EmptyValues {
                        line: self.line_no,
                        section,
                        key: key.to_string(),
                    });
                }
            }
            SubSection::Definitions => {
                let register = self.aliases.canonicalize(key).to_string();
                let addresses = values
                    .split_whitespace()
                    .map(|value| self.hex(value))
                    .collect::<Result<Vec<_>, _>>()?;
                let definers = self.definitions.entry(register).or_default();
                definers.extend(addresses);
                if definers.is_empty() {
                    return Err(SliceError::EmptyValues {
                        line: self.line_no,
                        section,
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(current)
    }

    fn hex(&self, text: &str) -> Result<u64, SliceError> {
        parse_hex_address(text)
            .ok_or_else(|| SliceError::BadAddress { line: self.line_no, value: text.to_string() })
    }

    /// Consume the parser. Fails if the target section was never found.
    pub fn finish(self) -> Result<SliceStore, SliceError> {
        if self.state == ParseState::Seeking {
            return Err(SliceError::SectionNotFound { target: self.target });
        }
        Ok(SliceStore {
            target: Some(self.target),
            defs: self.defs,
            uses: self.uses,
            definitions: self.definitions,
        })
    }
}
