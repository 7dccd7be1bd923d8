pub mod kinds;
pub mod slice;
pub mod warnings;

pub use kinds::*;
pub use slice::*;
pub use warnings::*;
