//! Where an application's files live: the local filesystem or a remote
//! server reached by running shell commands over ssh.

use crate::config::ServerConfig;
use crate::CoreError;
use quayside_proxy::{ConfigFiles, ProxyError};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Read, write and remove whole files on a deployment target.
pub trait Host {
    /// `None` when the file does not exist.
    fn read(&self, path: &Path) -> Result<Option<String>, CoreError>;
    fn write(&self, path: &Path, content: &str) -> Result<(), CoreError>;
    /// Removing a missing file succeeds.
    fn remove(&self, path: &Path) -> Result<(), CoreError>;
    fn describe(&self) -> String;
}

/// Runs one shell script on a named server and returns its stdout.
pub trait CommandExecutor {
    fn server(&self) -> &str;
    fn run(&self, script: &str) -> Result<String, CoreError>;
}

/// Opens executors for named servers.
pub trait RemoteConnector {
    fn connect(&self, server: &str) -> Result<Box<dyn CommandExecutor>, CoreError>;
}

/// Quote `s` as a single POSIX shell word.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Shell snippet that writes `content` to `path` without depending on the
/// content's quoting.
pub fn write_file_script(path: &Path, content: &str) -> String {
    let encoded = base64::encode(content.as_bytes());
    format!(
        "echo \"{encoded}\" | base64 -d > {};",
        shell_quote(&path.to_string_lossy())
    )
}

pub struct LocalHost;

impl Host for LocalHost {
    fn read(&self, path: &Path) -> Result<Option<String>, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), CoreError> {
        Ok(quayside_proxy::write_atomic(path, content.as_bytes())?)
    }

    fn remove(&self, path: &Path) -> Result<(), CoreError> {
        Ok(quayside_proxy::remove_file(path)?)
    }

    fn describe(&self) -> String {
        "local".to_owned()
    }
}

const PRESENT_MARKER: &str = "__quayside_present__";

pub struct RemoteHost {
    executor: Box<dyn CommandExecutor>,
}

impl RemoteHost {
    pub fn new(executor: Box<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

impl Host for RemoteHost {
    fn read(&self, path: &Path) -> Result<Option<String>, CoreError> {
        let quoted = shell_quote(&path.to_string_lossy());
        // The marker tells a missing file apart from an empty one.
        let script = format!("if [ -f {quoted} ]; then echo {PRESENT_MARKER}; cat {quoted}; fi");
        let out = self.executor.run(&script)?;
        Ok(out
            .strip_prefix(PRESENT_MARKER)
            .map(|rest| rest.strip_prefix('\n').unwrap_or(rest).to_owned()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), CoreError> {
        let mut script = String::new();
        if let Some(dir) = path.parent() {
            script.push_str(&format!("mkdir -p {} && ", shell_quote(&dir.to_string_lossy())));
        }
        script.push_str(&write_file_script(path, content));
        self.executor.run(&script)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), CoreError> {
        self.executor
            .run(&format!("rm -f {}", shell_quote(&path.to_string_lossy())))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("server '{}'", self.executor.server())
    }
}

/// Proxy config files kept on a [`Host`].
pub struct HostFiles {
    host: Box<dyn Host>,
}

impl HostFiles {
    pub fn new(host: Box<dyn Host>) -> Self {
        Self { host }
    }
}

fn to_proxy_error(e: CoreError) -> ProxyError {
    match e {
        CoreError::Proxy(e) => e,
        CoreError::Io(e) => ProxyError::Io(e),
        other => ProxyError::Remote(other.to_string()),
    }
}

impl ConfigFiles for HostFiles {
    fn read(&self, path: &Path) -> Result<Option<String>, ProxyError> {
        self.host.read(path).map_err(to_proxy_error)
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), ProxyError> {
        self.host.write(path, content).map_err(to_proxy_error)
    }

    fn remove(&self, path: &Path) -> Result<(), ProxyError> {
        self.host.remove(path).map_err(to_proxy_error)
    }

    fn describe(&self) -> String {
        self.host.describe()
    }
}

pub struct SshExecutor {
    server: String,
    config: ServerConfig,
}

impl SshExecutor {
    pub fn new(server: &str, config: ServerConfig) -> Self {
        Self {
            server: server.to_owned(),
            config,
        }
    }

    fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(["-o", "BatchMode=yes"]);
        if let Some(port) = self.config.port {
            cmd.arg("-p").arg(port.to_string());
        }
        if let Some(identity) = &self.config.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(&self.config.host).arg(script);
        cmd
    }
}

impl CommandExecutor for SshExecutor {
    fn server(&self) -> &str {
        &self.server
    }

    fn run(&self, script: &str) -> Result<String, CoreError> {
        debug!("ssh {}: {} bytes of script", self.server, script.len());
        let output = self.command(script).output().map_err(|e| CoreError::Remote {
            server: self.server.clone(),
            message: format!("failed to run ssh: {e}"),
        })?;
        if !output.status.success() {
            return Err(CoreError::Remote {
                server: self.server.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Connects to the servers named in the engine configuration.
pub struct SshConnector {
    servers: BTreeMap<String, ServerConfig>,
}

impl SshConnector {
    pub fn new(servers: BTreeMap<String, ServerConfig>) -> Self {
        Self { servers }
    }
}

impl RemoteConnector for SshConnector {
    fn connect(&self, server: &str) -> Result<Box<dyn CommandExecutor>, CoreError> {
        let config = self
            .servers
            .get(server)
            .ok_or_else(|| CoreError::Config(format!("unknown server '{server}'")))?;
        Ok(Box::new(SshExecutor::new(server, config.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Interprets the script shapes the remote host emits against an
    /// in-memory file map.
    struct FakeShell {
        files: Rc<RefCell<BTreeMap<String, String>>>,
        scripts: Rc<RefCell<Vec<String>>>,
    }

    impl CommandExecutor for FakeShell {
        fn server(&self) -> &str {
            "edge-1"
        }

        fn run(&self, script: &str) -> Result<String, CoreError> {
            self.scripts.borrow_mut().push(script.to_owned());
            if let Some(rest) = script.strip_prefix("if [ -f '") {
                let path = rest.split('\'').next().unwrap_or_default();
                return Ok(self
                    .files
                    .borrow()
                    .get(path)
                    .map(|c| format!("{PRESENT_MARKER}\n{c}"))
                    .unwrap_or_default());
            }
            if let Some(rest) = script.strip_prefix("rm -f '") {
                let path = rest.split('\'').next().unwrap_or_default();
                self.files.borrow_mut().remove(path);
                return Ok(String::new());
            }
            let (_, after_echo) = script.split_once("echo \"").unwrap();
            let (encoded, after) = after_echo.split_once('"').unwrap();
            let path = after.split('\'').nth(1).unwrap();
            let decoded = String::from_utf8(base64::decode(encoded).unwrap()).unwrap();
            self.files.borrow_mut().insert(path.to_owned(), decoded);
            Ok(String::new())
        }
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn write_script_shape() {
        let script = write_file_script(Path::new("/srv/app/code/docker-compose.yml"), "a: 1\n");
        assert_eq!(
            script,
            format!(
                "echo \"{}\" | base64 -d > '/srv/app/code/docker-compose.yml';",
                base64::encode("a: 1\n")
            )
        );
    }

    #[test]
    fn local_host_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop").join("code").join("docker-compose.yml");
        assert!(LocalHost.read(&path).unwrap().is_none());
        LocalHost.write(&path, "services: {}\n").unwrap();
        assert_eq!(LocalHost.read(&path).unwrap().as_deref(), Some("services: {}\n"));
        LocalHost.remove(&path).unwrap();
        assert!(LocalHost.read(&path).unwrap().is_none());
        LocalHost.remove(&path).unwrap();
    }

    #[test]
    fn remote_host_roundtrip() {
        let files = Rc::new(RefCell::new(BTreeMap::new()));
        let scripts = Rc::new(RefCell::new(Vec::new()));
        let host = RemoteHost::new(Box::new(FakeShell {
            files: files.clone(),
            scripts: scripts.clone(),
        }));
        let path = Path::new("/etc/quayside/compose/shop/code/docker-compose.yml");

        assert!(host.read(path).unwrap().is_none());
        host.write(path, "services:\n  web: {}\n").unwrap();
        assert_eq!(
            host.read(path).unwrap().as_deref(),
            Some("services:\n  web: {}\n")
        );
        assert!(scripts.borrow()[1].starts_with("mkdir -p '/etc/quayside/compose/shop/code' && "));
        assert_eq!(host.describe(), "server 'edge-1'");
    }

    #[test]
    fn remote_host_removes_files() {
        let files = Rc::new(RefCell::new(BTreeMap::from([(
            "/dynamic/it's.yml".to_owned(),
            "http: {}\n".to_owned(),
        )])));
        let scripts = Rc::new(RefCell::new(Vec::new()));
        let host = RemoteHost::new(Box::new(FakeShell {
            files: files.clone(),
            scripts: scripts.clone(),
        }));
        host.remove(Path::new("/dynamic/it's.yml")).unwrap();
        assert_eq!(scripts.borrow()[0], r"rm -f '/dynamic/it'\''s.yml'");
    }

    #[test]
    fn host_files_read_write_remove() {
        let files = Rc::new(RefCell::new(BTreeMap::new()));
        let store = HostFiles::new(Box::new(RemoteHost::new(Box::new(FakeShell {
            files: files.clone(),
            scripts: Rc::new(RefCell::new(Vec::new())),
        }))));
        let path = Path::new("/etc/quayside/traefik/dynamic/shop.yml");
        ConfigFiles::write(&store, path, "http: {}\n").unwrap();
        assert_eq!(files.borrow()[&path.to_string_lossy().into_owned()], "http: {}\n");
        assert_eq!(
            ConfigFiles::read(&store, path).unwrap().as_deref(),
            Some("http: {}\n")
        );
        ConfigFiles::remove(&store, path).unwrap();
        assert!(files.borrow().is_empty());
        assert_eq!(ConfigFiles::describe(&store), "server 'edge-1'");
    }

    #[test]
    fn host_files_reports_remote_failures_as_proxy_errors() {
        struct Down;
        impl CommandExecutor for Down {
            fn server(&self) -> &str {
                "edge-1"
            }
            fn run(&self, _script: &str) -> Result<String, CoreError> {
                Err(CoreError::Remote {
                    server: "edge-1".to_owned(),
                    message: "connection refused".to_owned(),
                })
            }
        }
        let store = HostFiles::new(Box::new(RemoteHost::new(Box::new(Down))));
        let err = ConfigFiles::read(&store, Path::new("/d/shop.yml")).unwrap_err();
        assert!(matches!(&err, ProxyError::Remote(m) if m.contains("connection refused")));
    }

    #[test]
    fn remote_host_empty_file_is_present() {
        let files = Rc::new(RefCell::new(BTreeMap::from([(
            "/x.yml".to_owned(),
            String::new(),
        )])));
        let host = RemoteHost::new(Box::new(FakeShell {
            files,
            scripts: Rc::new(RefCell::new(Vec::new())),
        }));
        assert_eq!(host.read(Path::new("/x.yml")).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn ssh_command_arguments() {
        let exec = SshExecutor::new(
            "edge-1",
            ServerConfig {
                host: "deploy@10.0.0.12".to_owned(),
                port: Some(2222),
                identity_file: Some("/root/.ssh/id".into()),
            },
        );
        let cmd = exec.command("true");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-o", "BatchMode=yes", "-p", "2222", "-i", "/root/.ssh/id", "deploy@10.0.0.12", "true"]
        );
    }

    #[test]
    fn connector_rejects_unknown_server() {
        let connector = SshConnector::new(BTreeMap::new());
        assert!(matches!(
            connector.connect("nowhere"),
            Err(CoreError::Config(_))
        ));
    }
}
