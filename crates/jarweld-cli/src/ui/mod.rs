//! Console output.

pub mod reporter;
pub mod theme;

pub use reporter::ConsoleReporter;
pub use theme::{Theme, format_size};
