use super::{emit_document, load_document};
use quayside_compose::{apply_suffix, generate_suffix};
use std::path::Path;
use tracing::info;

pub fn run(
    file: &Path,
    suffix: Option<&str>,
    output: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let doc = load_document(file)?;
    let suffix = suffix.map_or_else(generate_suffix, str::to_owned);
    info!("suffixing {} with '{suffix}'", file.display());
    let out = apply_suffix(&doc, &suffix);
    if output.is_some() && !json {
        println!("suffix: {suffix}");
    }
    emit_document(&out, output, json)
}
