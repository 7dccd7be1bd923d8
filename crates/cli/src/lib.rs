use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use slicetriage_core::config::{load_config, TriageConfig};

pub mod commands;

/// Input paths that mean "read standard input".
pub const STDIN_PATHS: [&str; 2] = ["-", "/dev/stdin"];

pub fn is_stdin_path(path: &str) -> bool {
    STDIN_PATHS.contains(&path)
}

/// Open a line-oriented input, treating `-` and `/dev/stdin` as standard input.
pub fn open_input(path: &str) -> Result<Box<dyn BufRead>> {
    if is_stdin_path(path) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let path = Path::new(path);
    if !path.is_file() {
        return Err(anyhow!("Input file does not exist: {}", path.display()));
    }
    let file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Load the config at `path`, or defaults when no path is given.
pub fn load_config_or_default(path: Option<&str>) -> Result<TriageConfig> {
    match path {
        Some(p) => load_config(Path::new(p)),
        None => Ok(TriageConfig::default()),
    }
}

/// Parse a hex target address given on the command line.
pub fn parse_target_address(text: &str) -> Result<u64> {
    slicetriage_core::parse_hex_address(text)
        .ok_or_else(|| anyhow!("Invalid target address '{}': expected hexadecimal", text))
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open binary for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read binary for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}
