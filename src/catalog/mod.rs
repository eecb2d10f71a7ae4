//! Field/facet catalog: operator-maintained metadata describing what each
//! model can report, validated and resolved once at startup.

pub mod loader;
pub mod resolved;
pub mod types;
pub mod validator;

pub use loader::*;
pub use resolved::*;
pub use types::*;
pub use validator::*;
