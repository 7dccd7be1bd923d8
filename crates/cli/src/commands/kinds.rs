use anyhow::Result;
use serde::Serialize;
use slicetriage_core::warnings::WarningKind;

#[derive(Debug, Serialize)]
pub struct KindInfo {
    pub name: &'static str,
    pub label: &'static str,
    pub pattern: &'static str,
}

/// Warning kinds in classification priority order.
pub fn kind_infos() -> Vec<KindInfo> {
    WarningKind::ALL
        .iter()
        .map(|kind| KindInfo { name: kind.as_str(), label: kind.label(), pattern: kind.pattern() })
        .collect()
}

/// List the warning taxonomy (names usable with `--ignore`).
pub fn list_kinds_command(json: bool) -> Result<()> {
    let entries = kind_infos();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Warning kinds (priority order):");
    for entry in entries {
        println!("- {}: {} (matches \"{}\")", entry.name, entry.label, entry.pattern);
    }

    Ok(())
}
