use super::{emit_document, load_document};
use quayside_compose::isolate_deployment;
use std::path::Path;

pub fn run(
    file: &Path,
    network: &str,
    volumes: bool,
    output: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    if network.is_empty() {
        return Err("isolation network name must not be empty".to_owned());
    }
    let doc = load_document(file)?;
    emit_document(&isolate_deployment(&doc, network, volumes), output, json)
}
