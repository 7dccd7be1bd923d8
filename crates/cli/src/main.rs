use anyhow::Result;
use clap::{Parser, Subcommand};
use slicetriage::commands::{
    list_kinds_command, slice_command, warnings_command, SliceOptions, WarningsOptions,
};
use slicetriage_core::services::ResolutionPolicy;
use slicetriage_core::warnings::WarningKind;

/// Post-processing for binary memory-safety analyzer output.
///
/// This CLI is a thin wrapper around `slicetriage-core` (exposed in code as
/// `slicetriage_core`). All substantive logic lives in the library.
#[derive(Parser, Debug)]
#[command(
    name = "slicetriage",
    version,
    about = "Slice-report parsing and memory-safety warning triage",
    long_about = None
)]
struct Cli {
    /// Enable debug logging on stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a warning log and resolve both addresses of each warning to source.
    ///
    /// Prints one line per retained warning:
    /// `<kind>: <addr2> : <func2@file2:line2> : <addr1> : <func1@file1:line1>`.
    Warnings {
        /// Executable the warnings were produced for.
        executable: String,

        /// Warning log path (`-` or `/dev/stdin` reads standard input).
        log: String,

        /// Optional config file (JSON, or YAML with a .yaml/.yml extension).
        #[arg(long)]
        config: Option<String>,

        /// Warning kind to suppress (repeatable). See `kinds` for names.
        #[arg(long = "ignore")]
        ignore: Vec<WarningKind>,

        /// Path prefix to strip from resolved source files.
        #[arg(long)]
        build_root: Option<String>,

        /// Path to addr2line (defaults to ADDR2LINE_BIN or `addr2line` on PATH).
        #[arg(long)]
        addr2line: Option<String>,

        /// Deadline for a single addr2line invocation, in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// What to do when an address cannot be resolved: abort, skip or placeholder.
        #[arg(long)]
        on_resolution_error: Option<ResolutionPolicy>,

        /// Emit a JSON report instead of text lines.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Parse the section of a slice report for one target address.
    Slice {
        /// Target address (hex, optional 0x prefix).
        target: String,

        /// Slice report path. Reads standard input when omitted or `-`.
        report: Option<String>,

        /// Optional config file providing extra register aliases.
        #[arg(long)]
        config: Option<String>,

        /// Emit JSON instead of human-readable tables.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the warning kinds in classification priority order.
    Kinds {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Command::Warnings {
            executable,
            log,
            config,
            ignore,
            build_root,
            addr2line,
            timeout_ms,
            on_resolution_error,
            json,
        } => warnings_command(&WarningsOptions {
            executable,
            log,
            config,
            ignore,
            build_root,
            addr2line,
            timeout_ms,
            on_resolution_error,
            json,
        })?,
        Command::Slice { target, report, config, json } => {
            slice_command(&SliceOptions { target, report, config, json })?
        }
        Command::Kinds { json } => list_kinds_command(json)?,
    }

    Ok(())
}
