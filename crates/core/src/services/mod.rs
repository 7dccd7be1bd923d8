//! Services that talk to the outside world: address symbolization through an external
//! tool, and correlation of the warning stream against it.

pub mod correlator;
pub mod symbolizer;

pub use correlator::{
    strip_build_root, CorrelateError, CorrelatedWarning, Correlation, Correlator, Endpoint,
    ResolutionPolicy,
};
pub use symbolizer::{
    parse_addr2line_output, resolve_addr2line_path, Addr2LineResolver, AddressResolver,
    ResolutionError, ResolvedLocation, SymbolResolver, DEFAULT_TIMEOUT,
};
