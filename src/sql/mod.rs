//! Safe SQL assembly: identifiers from config only, values as parameters.

pub mod expr;
pub mod query;

pub use expr::*;
pub use query::*;
