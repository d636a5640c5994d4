use super::{compose_err, emit_document, load_document, load_domains};
use quayside_compose::{inject_domains_with, ComposeType, InjectOptions};
use std::path::Path;

pub fn run(
    file: &Path,
    domains: &Path,
    options: InjectOptions,
    output: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let doc = load_document(file)?;
    let domains = load_domains(domains)?;
    let out = inject_domains_with(&doc, &domains, &options).map_err(compose_err)?;
    emit_document(&out, output, json)
}

pub fn options(stack: bool, isolated: bool) -> InjectOptions {
    InjectOptions {
        compose_type: if stack {
            ComposeType::Stack
        } else {
            ComposeType::DockerCompose
        },
        isolated,
    }
}
