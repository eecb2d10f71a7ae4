//! Query planning: descriptors, definition building, facet and list composition.

pub mod facet;
pub mod field;
pub mod list;
pub mod query_def;

pub use facet::*;
pub use field::*;
pub use list::*;
pub use query_def::*;
