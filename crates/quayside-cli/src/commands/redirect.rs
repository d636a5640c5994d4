use super::{json_pretty, EXIT_SUCCESS};
use quayside_core::Engine;
use quayside_proxy::Redirect;

pub fn add(
    engine: &Engine,
    app: &str,
    redirect: &Redirect,
    server: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    engine
        .add_redirect(app, redirect, server)
        .map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({ "app": app, "redirect": redirect });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "added redirect {} to {app}: {} -> {}",
            redirect.unique_config_key, redirect.regex, redirect.replacement
        );
    }
    Ok(EXIT_SUCCESS)
}

pub fn remove(
    engine: &Engine,
    app: &str,
    key: u32,
    server: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    engine
        .remove_redirect(app, key, server)
        .map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({ "app": app, "removed": key });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("removed redirect {key} from {app}");
    }
    Ok(EXIT_SUCCESS)
}
