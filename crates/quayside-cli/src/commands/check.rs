use super::{json_pretty, load_document, EXIT_COMPOSE_ERROR, EXIT_SUCCESS};
use quayside_compose::check_references;
use std::path::Path;

pub fn run(file: &Path, json: bool) -> Result<u8, String> {
    let doc = load_document(file)?;
    let dangling = check_references(&doc);

    if json {
        let payload = serde_json::json!({
            "file": file.display().to_string(),
            "ok": dangling.is_empty(),
            "dangling": dangling,
        });
        println!("{}", json_pretty(&payload)?);
    } else if dangling.is_empty() {
        println!("{}: all references resolve", file.display());
    } else {
        for d in &dangling {
            eprintln!("{} {d}", console::style("dangling:").red());
        }
    }

    Ok(if dangling.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_COMPOSE_ERROR
    })
}
