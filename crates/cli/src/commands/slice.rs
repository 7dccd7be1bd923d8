use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use slicetriage_core::slice::SliceStore;

use crate::{load_config_or_default, open_input, parse_target_address};

/// Options for the `slice` command.
#[derive(Debug, Clone, Default)]
pub struct SliceOptions {
    /// Hex address whose section should be extracted.
    pub target: String,
    /// Report path; standard input when `None`, `-` or `/dev/stdin`.
    pub report: Option<String>,
    pub config: Option<String>,
    pub json: bool,
}

/// JSON view of a slice section, with addresses rendered as hex strings.
#[derive(Debug, Serialize)]
pub struct SliceView {
    pub target: String,
    pub uses: BTreeMap<String, Vec<String>>,
    pub defs: BTreeMap<String, Vec<String>>,
    pub definitions: BTreeMap<String, Vec<String>>,
}

impl SliceView {
    pub fn from_store(target: u64, store: &SliceStore) -> Self {
        Self {
            target: format!("0x{target:x}"),
            uses: registers_by_address(store.uses()),
            defs: registers_by_address(store.defs()),
            definitions: store
                .definitions()
                .iter()
                .map(|(reg, addrs)| {
                    (reg.clone(), addrs.iter().map(|a| format!("0x{a:08x}")).collect())
                })
                .collect(),
        }
    }
}

fn registers_by_address(
    table: &BTreeMap<u64, BTreeSet<String>>,
) -> BTreeMap<String, Vec<String>> {
    table
        .iter()
        .map(|(addr, regs)| (format!("0x{addr:08x}"), regs.iter().cloned().collect()))
        .collect()
}

/// Parse one slice-report section and print its tables to stdout.
pub fn slice_command(opts: &SliceOptions) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_slice_report(opts, &mut out)?;
    Ok(())
}

pub fn write_slice_report<W: Write>(opts: &SliceOptions, out: &mut W) -> Result<SliceStore> {
    let target = parse_target_address(&opts.target)?;
    let config = load_config_or_default(opts.config.as_deref())?;
    let aliases = config.alias_table()?;
    let report = opts.report.as_deref().unwrap_or("-");
    let input = open_input(report).with_context(|| format!("Failed to open slice report {report}"))?;

    let store = SliceStore::parse(input, target, &aliases)
        .with_context(|| format!("Failed to parse slice section for 0x{target:x}"))?;

    if opts.json {
        let view = SliceView::from_store(target, &store);
        writeln!(out, "{}", serde_json::to_string_pretty(&view)?)?;
        return Ok(store);
    }

    writeln!(out, "Slice section 0x{target:x}")?;
    writeln!(out, "USES ({}):", store.uses().len())?;
    for (addr, regs) in store.uses() {
        writeln!(out, "  {addr:08x}  {}", join(regs))?;
    }
    writeln!(out, "DEFS ({}):", store.defs().len())?;
    for (addr, regs) in store.defs() {
        writeln!(out, "  {addr:08x}  {}", join(regs))?;
    }
    writeln!(out, "DEFINITIONS ({}):", store.definitions().len())?;
    for (reg, addrs) in store.definitions() {
        let addrs: Vec<String> = addrs.iter().map(|a| format!("{a:08x}")).collect();
        writeln!(out, "  {reg}  {}", addrs.join(" "))?;
    }

    Ok(store)
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}
