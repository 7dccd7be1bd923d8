use slicetriage_core::registers::RegisterAliasTable;
use slicetriage_core::slice::{ParseState, SectionParser, SliceError, SliceStore, SubSection};

const REPORT: &str = concat!(
    "Loading trace...\n",
    "@@@@@@@ Slice for 8048400 @@@@@@@\n",
    "===== USES =====\n",
    "8048400\tR1:4[0,0x4] R1:4[0x8,0xc]\n",
    "8048403\tESP\n",
    "\n",
    "===== DEFS =====\n",
    "8048400\tR1:4[0x14,0x18]\n",
    "\n",
    "===== DEFINITIONS =====\n",
    "R1:4[0,0x4]\t8048300 80482f0\n",
    "ESP\t8048100\n",
    "Serializing slice to disk\n",
    "@@@@@ done\n",
    "@@@@@@@ Slice for 8048500 @@@@@@@\n",
    "===== USES =====\n",
    "8048500\tEBX\n",
    "\n",
    "===== DEFS =====\n",
    "8048500\tR1:4[0x8,0xc]\n",
    "\n",
    "===== DEFINITIONS =====\n",
    "EBX\t8048450\n",
    "\n",
    "@@@@@ done\n",
);

fn set<T: Ord + Clone>(items: &[T]) -> std::collections::BTreeSet<T> {
    items.iter().cloned().collect()
}

fn strings(items: &[&str]) -> std::collections::BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn parses_only_the_requested_section() {
    let aliases = RegisterAliasTable::default();
    let store = SliceStore::parse_str(REPORT, 0x8048400, &aliases).expect("parse first section");

    assert_eq!(store.target(), Some(0x8048400));
    assert_eq!(store.uses().len(), 2);
    assert_eq!(store.uses_at(0x8048400), Some(&strings(&["EAX", "ECX"])));
    assert_eq!(store.uses_at(0x8048403), Some(&strings(&["ESP"])));
    assert_eq!(store.defs_at(0x8048400), Some(&strings(&["EDI"])));
    assert_eq!(store.definers_of("EAX"), Some(&set(&[0x8048300u64, 0x80482f0])));
    assert_eq!(store.definers_of("ESP"), Some(&set(&[0x8048100u64])));

    assert!(store.uses_at(0x8048500).is_none());
    assert!(store.definers_of("EBX").is_none());
}

#[test]
fn different_targets_yield_disjoint_stores() {
    let aliases = RegisterAliasTable::default();
    let first = SliceStore::parse_str(REPORT, 0x8048400, &aliases).unwrap();
    let second = SliceStore::parse_str(REPORT, 0x8048500, &aliases).unwrap();

    assert_eq!(second.uses_at(0x8048500), Some(&strings(&["EBX"])));
    assert_eq!(second.defs_at(0x8048500), Some(&strings(&["ECX"])));
    assert_eq!(second.definers_of("EBX"), Some(&set(&[0x8048450u64])));

    for addr in first.uses().keys() {
        assert!(!second.uses().contains_key(addr));
    }
    for addr in first.defs().keys() {
        assert!(!second.defs().contains_key(addr));
    }
    for reg in first.definitions().keys() {
        assert!(!second.definitions().contains_key(reg));
    }
}

#[test]
fn every_key_maps_to_a_non_empty_set() {
    let aliases = RegisterAliasTable::default();
    for target in [0x8048400u64, 0x8048500] {
        let store = SliceStore::parse_str(REPORT, target, &aliases).unwrap();
        assert!(store.uses().values().all(|regs| !regs.is_empty()));
        assert!(store.defs().values().all(|regs| !regs.is_empty()));
        assert!(store.definitions().values().all(|addrs| !addrs.is_empty()));
    }
}

#[test]
fn missing_tab_in_uses_is_a_format_error() {
    let report = "@@@@@@@ 401000\n===== USES\n401000 EAX\n\n@@@@@\n";
    let err = SliceStore::parse_str(report, 0x401000, &RegisterAliasTable::default()).unwrap_err();
    assert!(err.is_format_error(), "unexpected error: {err}");
    match err {
        SliceError::MissingTab { line, section, .. } => {
            assert_eq!(line, 3);
            assert_eq!(section, SubSection::Uses);
        }
        other => panic!("expected MissingTab, got {other:?}"),
    }
}

#[test]
fn failed_load_leaves_store_empty() {
    let aliases = RegisterAliasTable::default();
    let mut store = SliceStore::new();
    store.load(REPORT.as_bytes(), 0x8048400, &aliases).unwrap();
    assert!(!store.is_empty());

    let bad = "@@@@@@@ 401000\n===== USES\n401000 EAX\n";
    assert!(store.load(bad.as_bytes(), 0x401000, &aliases).is_err());
    assert!(store.is_empty());
    assert_eq!(store.target(), None);
}

#[test]
fn reload_discards_previous_section() {
    let aliases = RegisterAliasTable::default();
    let mut store = SliceStore::new();
    store.load(REPORT.as_bytes(), 0x8048400, &aliases).unwrap();
    store.load(REPORT.as_bytes(), 0x8048500, &aliases).unwrap();
    assert_eq!(store.target(), Some(0x8048500));
    assert!(store.uses_at(0x8048400).is_none());
    assert!(store.uses_at(0x8048500).is_some());
}

#[test]
fn bad_hex_is_rejected() {
    let aliases = RegisterAliasTable::default();
    let report = "@@@@@@@ 10\n===== DEFS\nnothex\tEAX\n";
    let err = SliceStore::parse_str(report, 0x10, &aliases).unwrap_err();
    assert!(matches!(err, SliceError::BadAddress { ref value, .. } if value == "nothex"));

    let report = "@@@@@@@ 10\n==== DEFINITIONS\nEAX\t10 zz\n";
    let err = SliceStore::parse_str(report, 0x10, &aliases).unwrap_err();
    assert!(matches!(err, SliceError::BadAddress { ref value, .. } if value == "zz"));
}

#[test]
fn key_without_values_is_rejected() {
    let report = "@@@@@@@ 10\n===== USES\n10\t \tEAX\n";
    let err = SliceStore::parse_str(report, 0x10, &RegisterAliasTable::default()).unwrap_err();
    assert!(matches!(err, SliceError::EmptyValues { section: SubSection::Uses, .. }));
    assert!(err.is_format_error());
}

#[test]
fn missing_section_is_reported() {
    let err =
        SliceStore::parse_str(REPORT, 0xdeadbeef, &RegisterAliasTable::default()).unwrap_err();
    assert!(matches!(err, SliceError::SectionNotFound { target: 0xdeadbeef }));
    assert!(!err.is_format_error());
}

#[test]
fn data_outside_sub_sections_is_ignored() {
    let report = "@@@@@@@ 10\nfree text without tab\n===== USES\n10\tEAX\n\nmore noise\n";
    let store = SliceStore::parse_str(report, 0x10, &RegisterAliasTable::default()).unwrap();
    assert_eq!(store.uses_at(0x10), Some(&strings(&["EAX"])));
}

#[test]
fn custom_aliases_apply_to_keys_and_values() {
    let aliases = RegisterAliasTable::default().with_alias("R1:4[0x4,0x8]", "EBX").unwrap();
    let report = "@@@@@@@ 10\n===== USES\n10\tR1:4[0x4,0x8]\n\n==== DEFINITIONS\nR1:4[0x4,0x8]\t0x20\n";
    let store = SliceStore::parse_str(report, 0x10, &aliases).unwrap();
    assert_eq!(store.uses_at(0x10), Some(&strings(&["EBX"])));
    assert_eq!(store.definers_of("EBX"), Some(&set(&[0x20u64])));
}

#[test]
fn state_machine_transitions() {
    let aliases = RegisterAliasTable::default();
    let mut parser = SectionParser::new(0x10, &aliases);
    assert_eq!(parser.feed("noise").unwrap(), ParseState::Seeking);
    assert_eq!(parser.feed("@@@@@@@ 20").unwrap(), ParseState::Seeking);
    assert_eq!(parser.feed("@@@@@@@ 10").unwrap(), ParseState::InSection(None));
    assert_eq!(
        parser.feed("===== USES").unwrap(),
        ParseState::InSection(Some(SubSection::Uses))
    );
    assert_eq!(parser.feed("10\tEAX").unwrap(), ParseState::InSection(Some(SubSection::Uses)));
    assert_eq!(parser.feed("   ").unwrap(), ParseState::InSection(None));
    assert_eq!(
        parser.feed("===== DEFS").unwrap(),
        ParseState::InSection(Some(SubSection::Defs))
    );
    assert_eq!(
        parser.feed("==== DEFINITIONS").unwrap(),
        ParseState::InSection(Some(SubSection::Definitions))
    );
    assert_eq!(parser.feed("EAX\t10").unwrap(), ParseState::InSection(Some(SubSection::Definitions)));
    assert_eq!(parser.feed("Serializing...").unwrap(), ParseState::InSection(None));
    assert_eq!(parser.feed("@@@@@ end").unwrap(), ParseState::Finished);
    assert_eq!(parser.feed("garbage without tab").unwrap(), ParseState::Finished);

    let store = parser.finish().unwrap();
    assert_eq!(store.uses().len(), 1);
    assert_eq!(store.definitions().len(), 1);
}

#[test]
fn serializing_only_terminates_definitions() {
    let aliases = RegisterAliasTable::default();
    let mut parser = SectionParser::new(0x10, &aliases);
    parser.feed("@@@@@@@ 10").unwrap();
    parser.feed("===== USES").unwrap();
    let err = parser.feed("Serializing").unwrap_err();
    assert!(matches!(err, SliceError::MissingTab { section: SubSection::Uses, .. }));
}

#[test]
fn parses_from_a_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("slice.txt");
    std::fs::write(&path, REPORT).unwrap();
    let file = std::io::BufReader::new(std::fs::File::open(&path).unwrap());
    let store = SliceStore::parse(file, 0x8048500, &RegisterAliasTable::default()).unwrap();
    assert_eq!(store.uses_at(0x8048500), Some(&strings(&["EBX"])));
}
