use std::io::Read;
use std::path::Path;

use slicetriage::{
    is_stdin_path, load_config_or_default, open_input, parse_target_address, sha256_file,
};
use tempfile::tempdir;

#[test]
fn stdin_paths_are_recognized() {
    assert!(is_stdin_path("-"));
    assert!(is_stdin_path("/dev/stdin"));
    assert!(!is_stdin_path("warnings.log"));
}

#[test]
fn open_input_reads_files() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("log.txt");
    std::fs::write(&path, "line one\nline two\n").unwrap();

    let mut contents = String::new();
    open_input(path.to_str().unwrap()).unwrap().read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "line one\nline two\n");
}

#[test]
fn open_input_rejects_missing_files() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("missing.log");
    let err = open_input(missing.to_str().unwrap()).err().expect("should fail");
    assert!(err.to_string().contains("Input file does not exist"), "unexpected error: {err}");
}

#[test]
fn target_addresses_parse_as_hex() {
    assert_eq!(parse_target_address("8048400").unwrap(), 0x8048400);
    assert_eq!(parse_target_address("0x10").unwrap(), 0x10);
    let err = parse_target_address("main").unwrap_err();
    assert!(err.to_string().contains("Invalid target address"));
}

#[test]
fn missing_config_path_yields_defaults() {
    let config = load_config_or_default(None).unwrap();
    assert!(config.ignore.is_empty());
}

#[test]
fn sha256_file_matches_known_hash() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("abc.bin");
    std::fs::write(&path, b"abc").unwrap();
    assert_eq!(
        sha256_file(Path::new(&path)).unwrap(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
