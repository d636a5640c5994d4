pub mod auth;
pub mod check;
pub mod completions;
pub mod deploy;
pub mod domain;
pub mod inject;
pub mod isolate;
pub mod man_pages;
pub mod proxy;
pub mod redirect;
pub mod suffix;

use indicatif::{ProgressBar, ProgressStyle};
use quayside_compose::{parse_document_file, to_yaml_string, ComposeDocument, Domain};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_COMPOSE_ERROR: u8 = 2;
pub const EXIT_PROXY_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

fn template(pattern: &str) -> ProgressStyle {
    ProgressStyle::with_template(pattern).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        template("{spinner:.cyan} {msg}")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(template("{msg}"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(template("{msg}"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Entry points a router listens on, colored by transport.
pub fn colorize_entrypoint(entrypoint: &str) -> String {
    use console::Style;
    match entrypoint {
        "websecure" => Style::new().green().apply_to(entrypoint).to_string(),
        "web" => Style::new().yellow().apply_to(entrypoint).to_string(),
        other => other.to_owned(),
    }
}

/// Compose errors are reported with the prefix that selects exit code 2.
pub fn compose_err(e: impl std::fmt::Display) -> String {
    format!("compose error: {e}")
}

pub fn load_document(path: &Path) -> Result<ComposeDocument, String> {
    parse_document_file(path).map_err(compose_err)
}

pub fn load_domains(path: &Path) -> Result<Vec<Domain>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read domains file {}: {e}", path.display()))?;
    quayside_compose::parse_domains_json(&content).map_err(compose_err)
}

/// Print a transformed document as YAML (or JSON with `--json`), or write it
/// to `output` when given.
pub fn emit_document(
    doc: &ComposeDocument,
    output: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let rendered = if json {
        json_pretty(doc)?
    } else {
        to_yaml_string(doc).map_err(compose_err)?
    };
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            if !json {
                println!("wrote {}", path.display());
            }
        }
        None => print!("{rendered}"),
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_formats_correctly() {
        let val = serde_json::json!({"app": "shop", "routers": 2});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"app\": \"shop\""));
        assert!(result.contains('\n'));
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_COMPOSE_ERROR);
        assert_ne!(EXIT_COMPOSE_ERROR, EXIT_PROXY_ERROR);
    }

    #[test]
    fn colorize_entrypoints() {
        assert!(colorize_entrypoint("websecure").contains("websecure"));
        assert!(colorize_entrypoint("web").contains("web"));
        assert_eq!(colorize_entrypoint("metrics"), "metrics");
    }

    #[test]
    fn compose_errors_carry_prefix() {
        assert_eq!(compose_err("bad"), "compose error: bad");
    }

    #[test]
    fn load_domains_reads_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domains.json");
        std::fs::write(
            &path,
            r#"[{"host": "shop.example.com", "serviceName": "web", "uniqueConfigKey": 1}]"#,
        )
        .unwrap();
        let domains = load_domains(&path).unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].port, 80);
    }

    #[test]
    fn load_domains_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domains.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_domains(&path).unwrap_err().starts_with("compose error:"));
    }

    #[test]
    fn load_domains_missing_file() {
        let err = load_domains(Path::new("/nonexistent/domains.json")).unwrap_err();
        assert!(err.starts_with("failed to read domains file"));
    }

    #[test]
    fn emit_document_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let doc = quayside_compose::parse_document_str("services:\n  web:\n    image: nginx\n")
            .unwrap();
        let out = dir.path().join("out.yml");
        emit_document(&doc, Some(&out), true).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["services"]["web"]["image"], "nginx");
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
