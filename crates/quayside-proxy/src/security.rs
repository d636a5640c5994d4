//! Basic-auth credential handling.

use crate::config::BasicAuth;
use crate::ProxyError;

/// bcrypt work factor for stored credentials.
pub const BCRYPT_COST: u32 = 10;

/// Usernames end up in `user:hash` entries, so `:` is not allowed.
pub fn validate_username(username: &str) -> Result<(), ProxyError> {
    if username.is_empty() {
        return Err(ProxyError::InvalidUsername(
            "username must not be empty".to_owned(),
        ));
    }
    if username.contains(':') || username.chars().any(char::is_whitespace) {
        return Err(ProxyError::InvalidUsername(format!(
            "'{username}': username must not contain ':' or whitespace"
        )));
    }
    Ok(())
}

/// `username:bcrypt-hash`, as the proxy expects in a `basicAuth.users` list.
pub fn hash_credential(username: &str, password: &str) -> Result<String, ProxyError> {
    validate_username(username)?;
    let hash = bcrypt::hash(password, BCRYPT_COST)?;
    Ok(format!("{username}:{hash}"))
}

fn entry_username(entry: &str) -> &str {
    entry.split_once(':').map_or(entry, |(user, _)| user)
}

impl BasicAuth {
    /// Add `entry`, replacing any existing credential for the same user.
    pub fn upsert(&mut self, entry: String) {
        let user = entry_username(&entry).to_owned();
        self.users.retain(|e| entry_username(e) != user);
        self.users.push(entry);
    }

    /// Drop every credential for `username`. Returns whether one was found.
    pub fn remove_user(&mut self, username: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|e| entry_username(e) != username);
        self.users.len() != before
    }

    pub fn usernames(&self) -> Vec<&str> {
        self.users.iter().map(|e| entry_username(e)).collect()
    }
}
