//! Live-schema metadata: tables, keys, foreign-key edges, link resolution.

pub mod introspect;
pub mod links;
pub mod table;

pub use introspect::*;
pub use links::*;
pub use table::*;
