//! Typed errors: planning failures are configuration errors and fail fast,
//! execution failures surface from sqlx.

use thiserror::Error;

/// Raised synchronously while assembling a query, before anything executes.
/// These point at a bad catalog entry or a missing link override, not at data.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("no link between tables '{from}' and '{to}'")]
    NoLink { from: String, to: String },
    #[error("unknown field '{name}' for model '{model}'")]
    UnknownField { model: String, name: String },
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("unknown association '{association}' for model '{model}'")]
    UnknownAssociation { model: String, association: String },
    #[error("model '{0}' has no search configuration")]
    NoSearchConfig(String),
    #[error("catalog: {0}")]
    Catalog(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("config: {0}")]
    Config(String),
}
