//! Cross-filtered faceted list queries over a relational schema: introspect
//! the link graph once, plan every count/page/facet query from an
//! operator-maintained field catalog, and run them concurrently.

pub mod catalog;
pub mod error;
pub mod exec;
pub mod plan;
pub mod schema;
pub mod settings;
pub mod sql;

pub use catalog::{CatalogConfig, FieldCatalog};
pub use error::{EngineError, PlanError};
pub use exec::{CatalogSource, Engine, ListResponse};
pub use plan::{FacetSelection, ListPlanner, ListRequest};
pub use schema::{LinkOverrides, SchemaGraph};
pub use settings::Settings;
