use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use minijinja::{Environment, UndefinedBehavior};
use regex::Regex;
use tracing::info;

use crate::error::DaliError;

lazy_static! {
    // A marker captures everything up to the next close tag, newlines included.
    static ref MARKER_RX: Regex = Regex::new(r"(?s)<%dali\s(.*?)%>").unwrap();
}

/// Builds the sandboxed evaluation environment for template snippets.
/// Snippets only get read access to the model; an undefined lookup is an
/// error rather than silent empty output.
pub fn template_env() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

/// Wraps the validated model so its top-level keys are visible to snippets
/// as template variables.
pub fn model_context(model: &serde_json::Value) -> minijinja::Value {
    minijinja::Value::from_serialize(model)
}

/// Renders one template text: literal text is copied verbatim (carriage
/// returns stripped) and each `<%dali ... %>` snippet is replaced by its
/// evaluated output.
pub fn render_text(
    text: &str,
    env: &Environment,
    ctx: &minijinja::Value,
    path: &str,
) -> Result<String, DaliError> {
    let text = text.replace('\r', "");
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;

    for caps in MARKER_RX.captures_iter(&text) {
        let marker = caps.get(0).unwrap();
        let snippet = caps.get(1).unwrap().as_str().trim();

        out.push_str(&text[last_end..marker.start()]);
        let produced = env.render_str(snippet, ctx).map_err(|e| DaliError::Render {
            path: path.to_string(),
            msg:  e.to_string(),
        })?;
        out.push_str(&produced);
        last_end = marker.end();
    }
    out.push_str(&text[last_end..]);
    Ok(out)
}

fn render_file(
    infile: &Path,
    outfile: &Path,
    env: &Environment,
    ctx: &minijinja::Value,
) -> Result<(), DaliError> {
    info!("processing template file {} to {}", infile.display(), outfile.display());

    let text = fs::read_to_string(infile)?;
    let rendered = render_text(&text, env, ctx, &infile.display().to_string())?;
    fs::write(outfile, rendered)?;
    Ok(())
}

fn render_dir(
    indir: &Path,
    outdir: &Path,
    env: &Environment,
    ctx: &minijinja::Value,
) -> Result<(), DaliError> {
    info!("processing all templates in {}", indir.display());
    if !outdir.exists() {
        fs::create_dir_all(outdir)?;
    }

    for entry in fs::read_dir(indir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let infile = entry.path();
        let outfile = outdir.join(&file_name);
        if infile.is_dir() {
            render_dir(&infile, &outfile, env, ctx)?;
        } else if infile.is_file() {
            render_file(&infile, &outfile, env, ctx)?;
        }
    }
    Ok(())
}

/// Mirrors the template directory onto the output directory, rendering
/// every non-hidden file against the validated model. The first failing
/// template aborts the remaining traversal.
pub fn render_templates(
    template_dir: &Path,
    out_dir: &Path,
    model: &serde_json::Value,
) -> Result<(), DaliError> {
    let env = template_env();
    let ctx = model_context(model);
    render_dir(template_dir, out_dir, &env, &ctx)
}
