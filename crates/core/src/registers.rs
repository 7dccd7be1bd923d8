//! Register descriptor canonicalization.
//!
//! The analyzer emits registers as encoded byte ranges inside its register file
//! (e.g. `R1:4[0,0x4]`). A small alias table maps the ones we care about onto
//! architectural names; anything else passes through unchanged.
//!
//! Entries never chain: a canonical name is never itself a descriptor with a different
//! mapping, so canonicalizing twice gives the same answer as canonicalizing once.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasError {
    #[error("alias {raw} -> {canonical} would remap {raw}, already the canonical name of {existing}")]
    RawIsCanonical { raw: String, canonical: String, existing: String },

    #[error("alias {raw} -> {canonical} targets {canonical}, which is itself aliased to {next}")]
    CanonicalIsRaw { raw: String, canonical: String, next: String },
}

/// Built-in raw descriptor → canonical name entries.
pub const DEFAULT_ALIASES: &[(&str, &str)] =
    &[("R1:4[0,0x4]", "EAX"), ("R1:4[0x8,0xc]", "ECX"), ("R1:4[0x14,0x18]", "EDI")];

/// Canonicalize `raw` against the built-in table only.
pub fn canonicalize(raw: &str) -> &str {
    DEFAULT_ALIASES
        .iter()
        .find(|(descriptor, _)| *descriptor == raw)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw)
}

/// Lookup table from raw register descriptors to canonical register names.
///
/// Lookups are total: a descriptor without an entry is returned as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterAliasTable {
    aliases: BTreeMap<String, String>,
}

impl Default for RegisterAliasTable {
    fn default() -> Self {
        Self {
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
                .collect(),
        }
    }
}

impl RegisterAliasTable {
    /// An empty table (every descriptor maps to itself).
    pub fn empty() -> Self {
        Self { aliases: BTreeMap::new() }
    }

    /// Add or replace an alias. Builder-style so tables can be composed from config.
    pub fn with_alias(
        mut self,
        raw: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Result<Self, AliasError> {
        self.insert(raw.into(), canonical.into())?;
        Ok(self)
    }

    /// Merge every entry from `extra` over the current table.
    ///
    /// All or nothing: on error the table is left as it was.
    pub fn extend<I, K, V>(&mut self, extra: I) -> Result<(), AliasError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut merged = self.clone();
        for (raw, canonical) in extra {
            merged.insert(raw.into(), canonical.into())?;
        }
        *self = merged;
        Ok(())
    }

    fn insert(&mut self, raw: String, canonical: String) -> Result<(), AliasError> {
        if raw != canonical {
            if let Some((existing, _)) =
                self.aliases.iter().find(|(r, c)| **c == raw && **r != raw)
            {
                return Err(AliasError::RawIsCanonical {
                    existing: existing.clone(),
                    raw,
                    canonical,
                });
            }
            if let Some(next) = self.aliases.get(&canonical).filter(|next| **next != canonical) {
                return Err(AliasError::CanonicalIsRaw { next: next.clone(), raw, canonical });
            }
        }
        self.aliases.insert(raw, canonical);
        Ok(())
    }

    pub fn canonicalize<'a>(&'a self, raw: &'a str) -> &'a str {
        self.aliases.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Iterate entries in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(raw, canonical)| (raw.as_str(), canonical.as_str()))
    }
}
