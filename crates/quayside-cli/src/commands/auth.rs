use super::{json_pretty, EXIT_SUCCESS};
use quayside_core::Engine;
use quayside_proxy::router::auth_middleware;
use std::io::BufRead;

/// The first line of `input`, without its line ending.
fn read_password(input: &mut impl BufRead) -> Result<String, String> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| format!("failed to read password from stdin: {e}"))?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err("password must not be empty".to_owned());
    }
    Ok(password)
}

pub fn add(
    engine: &Engine,
    app: &str,
    username: &str,
    password: Option<&str>,
    server: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let password = match password {
        Some(p) if !p.is_empty() => p.to_owned(),
        Some(_) => return Err("password must not be empty".to_owned()),
        None => read_password(&mut std::io::stdin().lock())?,
    };
    engine
        .add_credential(app, username, &password, server)
        .map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({ "app": app, "user": username, "added": true });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("added credential '{username}' to {app}");
    }
    Ok(EXIT_SUCCESS)
}

pub fn remove(
    engine: &Engine,
    app: &str,
    username: &str,
    server: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    engine
        .remove_credential(app, username, server)
        .map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({ "app": app, "user": username, "removed": true });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("removed credential '{username}' from {app}");
    }
    Ok(EXIT_SUCCESS)
}

pub fn list(engine: &Engine, app: &str, server: Option<&str>, json: bool) -> Result<u8, String> {
    let shared = engine
        .shared_middlewares(server)
        .map_err(|e| e.to_string())?;
    let users: Vec<String> = shared
        .middlewares()
        .and_then(|m| m.get(&auth_middleware(app)))
        .and_then(|m| m.basic_auth.as_ref())
        .map(|auth| auth.usernames().into_iter().map(str::to_owned).collect())
        .unwrap_or_default();

    if json {
        let payload = serde_json::json!({ "app": app, "users": users });
        println!("{}", json_pretty(&payload)?);
    } else if users.is_empty() {
        println!("{app} has no basic-auth users");
    } else {
        for user in &users {
            println!("{user}");
        }
    }
    Ok(EXIT_SUCCESS)
}
