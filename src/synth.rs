//! Synthesis: resolve, emit, and write the template
//!
//! The only module in the repository that touches the filesystem. Output is
//! all-or-nothing: the document is fully rendered in memory before a single
//! byte reaches disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stackform_core::{emit, resolve, EmitOptions, Template};
use tracing::info;

use crate::config::SynthConfig;
use crate::stacks;

/// Build the fully-resolved template for the items-service stack
pub fn build_template(config: &SynthConfig) -> Result<Template> {
    let mut graph = stacks::items_service(config).context("declaring stack")?;
    resolve(&mut graph).context("resolving references")?;

    let options = EmitOptions {
        stack_name: config.stack_name.clone(),
        environment: config.environment.clone(),
    };
    let template = emit(&graph, &options).context("emitting template")?;
    Ok(template)
}

/// Write a template to `<out_dir>/<stack>.template.json`
///
/// The document goes to a temp file in `out_dir` first and is renamed into
/// place, so an interrupted write never leaves a truncated template behind.
/// Returns the path written.
pub fn write_template(template: &Template, out_dir: &Path) -> Result<PathBuf> {
    let rendered = render(template)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let path = out_dir.join(format!("{}.template.json", template.stack));

    let mut staged = tempfile::NamedTempFile::new_in(out_dir)
        .with_context(|| format!("staging template in {}", out_dir.display()))?;
    staged
        .write_all(rendered.as_bytes())
        .with_context(|| format!("writing template {}", path.display()))?;
    staged
        .persist(&path)
        .with_context(|| format!("moving template into place at {}", path.display()))?;

    info!(
        path = %path.display(),
        resources = template.resources.len(),
        "wrote template"
    );
    Ok(path)
}

/// Render the document with a trailing newline
pub fn render(template: &Template) -> Result<String> {
    let mut rendered = template
        .to_json_string()
        .context("serializing template document")?;
    rendered.push('\n');
    Ok(rendered)
}
