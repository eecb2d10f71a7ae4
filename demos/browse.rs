//! Example browse run: loads catalog config from JSON files, connects to the
//! database named in the environment, and serves one list request.
//!
//! Usage: browse <model> [term]   (CONFIG_PATH points at models.json/fields.json)

use facet_engine::catalog::{CatalogConfig, FieldConfig, ModelConfig};
use facet_engine::schema::LinkOverrides;
use facet_engine::{CatalogSource, Engine, ListRequest, Settings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("facet_engine=debug".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let model = args.next().unwrap_or_else(|| "Target".into());
    let term = args.next().unwrap_or_default();

    let config_dir = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "sample".into());
    let config = load_catalog_from_path(&config_dir).await?;

    let settings = Settings::from_env()?;
    let engine = Engine::connect(
        &settings,
        LinkOverrides::default(),
        CatalogSource::Inline(config),
    )
    .await?;

    let request = ListRequest {
        model,
        term,
        top: Some(10),
        ..Default::default()
    };
    let response = engine.list(&request).await?;

    tracing::info!(count = response.count, "list served");
    for row in &response.rows {
        println!("{}", serde_json::to_string(row)?);
    }
    for facet in &response.facets {
        println!("-- {} ({} values)", facet.facet, facet.values.len());
        for v in facet.values.iter().take(5) {
            println!("   {} {}", v.value, v.name);
        }
    }
    for timing in &response.timings {
        println!(".. {} {}ms", timing.label, timing.elapsed.as_millis());
    }
    Ok(())
}

async fn load_catalog_from_path(dir: &str) -> Result<CatalogConfig, Box<dyn std::error::Error>> {
    let dir = PathBuf::from(dir);
    let models: Vec<ModelConfig> =
        serde_json::from_str(&tokio::fs::read_to_string(dir.join("models.json")).await?)?;
    let fields: Vec<FieldConfig> =
        serde_json::from_str(&tokio::fs::read_to_string(dir.join("fields.json")).await?)?;
    Ok(CatalogConfig { models, fields })
}
