//! services/api/src/bin/openapi.rs
//!
//! Dumps the OpenAPI document for the REST API, to `openapi.json` unless a
//! path is given as the first argument.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

/// Writes the API description as pretty-printed JSON.
fn generate_spec(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = api_doc.to_pretty_json()?;
    std::fs::write(path, spec_json)?;
    println!("OpenAPI document for the research copilot API written to {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());
    generate_spec(ApiDoc::openapi(), &path)?;
    Ok(())
}
