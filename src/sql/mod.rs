//! SQL generation: filter and sort keys, and the SELECT compiler

mod filter;
mod select;

pub use filter::*;
pub use select::*;
