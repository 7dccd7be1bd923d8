use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default deadline for a single external resolution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Source location of an instruction address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl ResolvedLocation {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self { function: function.into(), file: file.into(), line }
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with {status} resolving {address:#010x}")]
    Exited { tool: String, status: String, address: u64 },

    #[error("{tool} timed out after {timeout:?} resolving {address:#010x}")]
    TimedOut { tool: String, timeout: Duration, address: u64 },

    #[error("no file:line for {address:#010x} in resolver output {output:?}")]
    Malformed { address: u64, output: String },

    #[error("resolver I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The external address-to-source tool, seen as a black box.
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, executable: &Path, address: u64)
        -> Result<ResolvedLocation, ResolutionError>;
    fn name(&self) -> &'static str;
}

/// Resolve the addr2line binary from `ADDR2LINE_BIN`, falling back to `addr2line` on PATH.
pub fn resolve_addr2line_path() -> PathBuf {
    std::env::var_os("ADDR2LINE_BIN")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("addr2line"))
}

/// Shells out to binutils `addr2line -f -e <exe> 0x%08x`.
#[derive(Debug, Clone)]
pub struct Addr2LineResolver {
    tool: PathBuf,
    timeout: Duration,
}

impl Default for Addr2LineResolver {
    fn default() -> Self {
        Self::new(resolve_addr2line_path())
    }
}

impl Addr2LineResolver {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self { tool: tool.into(), timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn command_args(executable: &Path, address: u64) -> Vec<OsString> {
        vec![
            OsString::from("-f"),
            OsString::from("-e"),
            executable.as_os_str().to_os_string(),
            OsString::from(format!("0x{address:08x}")),
        ]
    }
}

impl AddressResolver for Addr2LineResolver {
    fn resolve(
        &self,
        executable: &Path,
        address: u64,
    ) -> Result<ResolvedLocation, ResolutionError> {
        let tool = self.tool.display().to_string();
        let mut child = Command::new(&self.tool)
            .args(Self::command_args(executable, address))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ResolutionError::Spawn { tool: tool.clone(), source })?;

        // Drained concurrently; a full pipe would block the tool.
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                stdout.read_to_end(&mut buf).map(|_| buf)
            })
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                // The reader is detached; a grandchild may still hold the pipe open.
                return Err(ResolutionError::TimedOut { tool, timeout: self.timeout, address });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = match reader {
            Some(handle) => {
                handle.join().map_err(|_| io::Error::other("stdout reader panicked"))??
            }
            None => Vec::new(),
        };
        if !status.success() {
            return Err(ResolutionError::Exited { tool, status: status.to_string(), address });
        }
        parse_addr2line_output(address, &String::from_utf8_lossy(&stdout))
    }

    fn name(&self) -> &'static str {
        "addr2line"
    }
}

/// Parse `addr2line -f` output: function on the first line, `file:line` on the second.
///
/// The file is split at the last colon; trailing text after the line digits (such as
/// ` (discriminator 2)`) is ignored.
pub fn parse_addr2line_output(
    address: u64,
    output: &str,
) -> Result<ResolvedLocation, ResolutionError> {
    let malformed = || ResolutionError::Malformed { address, output: output.to_string() };
    let mut lines = output.lines();
    let function = lines.next().ok_or_else(malformed)?.trim();
    let (file, rest) = lines.next().and_then(|l| l.trim().rsplit_once(':')).ok_or_else(malformed)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let line = digits.parse::<u32>().map_err(|_| malformed())?;
    Ok(ResolvedLocation::new(function, file, line))
}

type CacheKey = (PathBuf, u64);
type CacheSlot = Arc<Mutex<Option<ResolvedLocation>>>;

/// Memoizing front for an [`AddressResolver`].
///
/// Each `(executable, address)` key owns a slot; concurrent misses on the same key wait
/// on that slot, so the backend runs at most once per key. Failures are not cached.
pub struct SymbolResolver<R> {
    backend: R,
    cache: Mutex<HashMap<CacheKey, CacheSlot>>,
}

impl<R: AddressResolver> SymbolResolver<R> {
    pub fn new(backend: R) -> Self {
        Self { backend, cache: Mutex::new(HashMap::new()) }
    }

    pub fn backend(&self) -> &R {
        &self.backend
    }

    pub fn resolve(
        &self,
        executable: &Path,
        address: u64,
    ) -> Result<ResolvedLocation, ResolutionError> {
        let slot = lock(&self.cache).entry((executable.to_path_buf(), address)).or_default().clone();
        let mut entry = lock(&slot);
        if let Some(hit) = entry.as_ref() {
            log::debug!("symbol cache hit for {:#010x}", address);
            return Ok(hit.clone());
        }

        log::debug!(
            "resolving {:#010x} in {} via {}",
            address,
            executable.display(),
            self.backend.name()
        );
        let resolved = self.backend.resolve(executable, address)?;
        *entry = Some(resolved.clone());
        Ok(resolved)
    }

    /// Number of successfully memoized resolutions.
    pub fn cached_len(&self) -> usize {
        lock(&self.cache).values().filter(|slot| lock(slot).is_some()).count()
    }

    pub fn clear_cache(&self) {
        lock(&self.cache).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
