use super::{json_pretty, EXIT_SUCCESS};
use quayside_core::Engine;

/// Create the dynamic directory and the default shared middlewares.
pub fn init(engine: &Engine, server: Option<&str>, json: bool) -> Result<u8, String> {
    let created = engine
        .ensure_default_middlewares(server)
        .map_err(|e| e.to_string())?;
    let file = engine.proxy().layout().middlewares_file();
    if json {
        let payload = serde_json::json!({
            "middlewares": file.display().to_string(),
            "server": server,
            "created": created,
        });
        println!("{}", json_pretty(&payload)?);
    } else if created {
        println!("wrote default middlewares to {}", file.display());
    } else {
        println!("{} already exists", file.display());
    }
    Ok(EXIT_SUCCESS)
}
