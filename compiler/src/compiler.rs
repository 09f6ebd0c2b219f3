use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::{
    error::DaliError,
    generator::render_templates,
    loader::load_document,
    resolver::resolve_document,
    validator::validate_document,
};

/// Loads, validates and resolves the register document, producing the
/// frozen model handed to the template engine.
/// Returns `Err(DaliError)` if loading/validation/resolution fails.
pub fn build_model(infile: &Path) -> Result<Value, DaliError> {
    let mut doc = load_document(infile)?;
    validate_document(&doc)?;
    info!("traversing the document to replace macros and references");
    resolve_document(&mut doc)?;
    Ok(doc)
}

/// Runs the whole pipeline: build the model from the register document,
/// then expand every template in `template_dir` into `out_dir`.
pub fn run(infile: &Path, template_dir: &Path, out_dir: &Path) -> Result<(), DaliError> {
    let model = build_model(infile)?;
    render_templates(template_dir, out_dir, &model)
}
