mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::deploy::{DeployArgs, ModeArg};
use commands::domain::DomainInput;
use commands::{EXIT_COMPOSE_ERROR, EXIT_FAILURE, EXIT_PROXY_ERROR};
use quayside_core::{Engine, EngineConfig};
use quayside_proxy::Redirect;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "quayside",
    version,
    about = "Compose isolation and reverse-proxy routing for self-hosted deployments"
)]
struct Cli {
    /// Path to quayside.toml (defaults to $QUAYSIDE_CONFIG, then /etc/quayside/quayside.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Suffix every service, network, volume, config and secret name.
    Suffix {
        /// Compose file to transform.
        file: PathBuf,
        /// Suffix to append (random 8 hex characters when omitted).
        #[arg(long)]
        suffix: Option<String>,
        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Attach every service to a private external network.
    Isolate {
        /// Compose file to transform.
        file: PathBuf,
        /// Name of the isolation network.
        #[arg(long)]
        network: String,
        /// Suffix named volumes with the network name as well.
        #[arg(long, default_value_t = false)]
        volumes: bool,
        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add reverse-proxy labels for a list of domains.
    Inject {
        /// Compose file to transform.
        file: PathBuf,
        /// JSON file holding an array of domains.
        #[arg(long)]
        domains: PathBuf,
        /// Write labels under deploy.labels for swarm stacks.
        #[arg(long, default_value_t = false)]
        stack: bool,
        /// The deployment is isolated; skip the shared ingress network.
        #[arg(long, default_value_t = false)]
        isolated: bool,
        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report references to services or networks that do not exist.
    Check {
        /// Compose file to check.
        file: PathBuf,
    },
    /// Prepare an application's compose file in place.
    Deploy {
        /// Application name.
        app: String,
        /// JSON file holding an array of domains to inject.
        #[arg(long)]
        domains: Option<PathBuf>,
        /// How the deployment avoids name collisions.
        #[arg(long, value_enum, default_value_t = ModeArg::Plain)]
        mode: ModeArg,
        /// Suffix for randomized mode, or network name for isolated mode.
        #[arg(long)]
        suffix: Option<String>,
        /// In isolated mode, suffix named volumes too.
        #[arg(long, default_value_t = false)]
        isolate_volumes: bool,
        /// Compose file path relative to the repository checkout.
        #[arg(long)]
        compose_path: Option<String>,
        /// Write labels under deploy.labels for swarm stacks.
        #[arg(long, default_value_t = false)]
        stack: bool,
        /// Remote server from the config file.
        #[arg(long)]
        server: Option<String>,
        /// Print the remote write script instead of writing; errors append to this log.
        #[arg(long, value_name = "LOG_PATH")]
        script: Option<String>,
    },
    /// Manage an application's proxy routes.
    Domain(DomainArgs),
    /// Manage basic-auth credentials of an application.
    Auth(AuthArgs),
    /// Manage regex redirects of an application.
    Redirect(RedirectArgs),
    /// Manage the proxy's shared configuration.
    Proxy(ProxyArgs),
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

#[derive(Debug, Args)]
struct DomainArgs {
    /// Edit the dynamic directory on this server from the config file.
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: DomainCommand,
}

#[derive(Debug, Args)]
struct AuthArgs {
    /// Edit the dynamic directory on this server from the config file.
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: AuthCommand,
}

#[derive(Debug, Args)]
struct RedirectArgs {
    /// Edit the dynamic directory on this server from the config file.
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: RedirectCommand,
}

#[derive(Debug, Args)]
struct ProxyArgs {
    /// Edit the dynamic directory on this server from the config file.
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: ProxyCommand,
}

#[derive(Debug, Subcommand)]
enum DomainCommand {
    /// Route one or more domains to an application.
    Add {
        app: String,
        #[command(flatten)]
        input: DomainInput,
    },
    /// Remove the routes of one domain.
    Remove { app: String, key: u32 },
    /// Show an application's routers.
    List { app: String },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Add or replace a credential (password read from stdin when omitted).
    Add {
        app: String,
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Remove a credential.
    Remove { app: String, username: String },
    /// List the users of an application.
    List { app: String },
}

#[derive(Debug, Subcommand)]
enum RedirectCommand {
    /// Add or replace a regex redirect.
    Add {
        app: String,
        #[arg(long)]
        key: u32,
        #[arg(long)]
        regex: String,
        #[arg(long)]
        replacement: String,
        #[arg(long, default_value_t = false)]
        permanent: bool,
    },
    /// Remove a redirect.
    Remove { app: String, key: u32 },
}

#[derive(Debug, Subcommand)]
enum ProxyCommand {
    /// Create the dynamic directory and default middlewares.
    Init,
}

fn load_engine(config: Option<&Path>) -> Result<Engine, String> {
    EngineConfig::resolve(config)
        .map(Engine::new)
        .map_err(|e| e.to_string())
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("compose error:") {
        EXIT_COMPOSE_ERROR
    } else if msg.starts_with("proxy error:") {
        EXIT_PROXY_ERROR
    } else {
        EXIT_FAILURE
    }
}

#[allow(clippy::too_many_lines)]
fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("QUAYSIDE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json = cli.json;
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Suffix {
            file,
            suffix,
            output,
        } => commands::suffix::run(&file, suffix.as_deref(), output.as_deref(), json),
        Commands::Isolate {
            file,
            network,
            volumes,
            output,
        } => commands::isolate::run(&file, &network, volumes, output.as_deref(), json),
        Commands::Inject {
            file,
            domains,
            stack,
            isolated,
            output,
        } => commands::inject::run(
            &file,
            &domains,
            commands::inject::options(stack, isolated),
            output.as_deref(),
            json,
        ),
        Commands::Check { file } => commands::check::run(&file, json),
        Commands::Deploy {
            app,
            domains,
            mode,
            suffix,
            isolate_volumes,
            compose_path,
            stack,
            server,
            script,
        } => {
            let args = DeployArgs {
                app: &app,
                domains: domains.as_deref(),
                mode,
                suffix: suffix.as_deref(),
                isolate_volumes,
                compose_path: compose_path.as_deref(),
                stack,
                server: server.as_deref(),
            };
            load_engine(config).and_then(|engine| match script {
                Some(log_path) => commands::deploy::run_script(&engine, &args, &log_path),
                None => commands::deploy::run(&engine, &args, json),
            })
        }
        Commands::Domain(DomainArgs { server, command }) => {
            let server = server.as_deref();
            load_engine(config).and_then(|engine| match command {
                DomainCommand::Add { app, input } => {
                    commands::domain::add(&engine, &app, &input, server, json)
                }
                DomainCommand::Remove { app, key } => {
                    commands::domain::remove(&engine, &app, key, server, json)
                }
                DomainCommand::List { app } => commands::domain::list(&engine, &app, server, json),
            })
        }
        Commands::Auth(AuthArgs { server, command }) => {
            let server = server.as_deref();
            load_engine(config).and_then(|engine| match command {
                AuthCommand::Add {
                    app,
                    username,
                    password,
                } => commands::auth::add(
                    &engine,
                    &app,
                    &username,
                    password.as_deref(),
                    server,
                    json,
                ),
                AuthCommand::Remove { app, username } => {
                    commands::auth::remove(&engine, &app, &username, server, json)
                }
                AuthCommand::List { app } => commands::auth::list(&engine, &app, server, json),
            })
        }
        Commands::Redirect(RedirectArgs { server, command }) => {
            let server = server.as_deref();
            load_engine(config).and_then(|engine| match command {
                RedirectCommand::Add {
                    app,
                    key,
                    regex,
                    replacement,
                    permanent,
                } => {
                    let redirect = Redirect {
                        unique_config_key: key,
                        regex,
                        replacement,
                        permanent,
                    };
                    commands::redirect::add(&engine, &app, &redirect, server, json)
                }
                RedirectCommand::Remove { app, key } => {
                    commands::redirect::remove(&engine, &app, key, server, json)
                }
            })
        }
        Commands::Proxy(ProxyArgs {
            server,
            command: ProxyCommand::Init,
        }) => load_engine(config)
            .and_then(|engine| commands::proxy::init(&engine, server.as_deref(), json)),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exit_code_by_prefix() {
        assert_eq!(exit_code_for("compose error: bad yaml"), EXIT_COMPOSE_ERROR);
        assert_eq!(exit_code_for("proxy error: corrupt"), EXIT_PROXY_ERROR);
        assert_eq!(exit_code_for("lock error: busy"), EXIT_FAILURE);
    }

    #[test]
    fn domain_add_requires_host_or_file() {
        assert!(Cli::try_parse_from(["quayside", "domain", "add", "shop"]).is_err());
        assert!(Cli::try_parse_from([
            "quayside", "domain", "add", "shop", "--host", "a.example.com", "--key", "1"
        ])
        .is_ok());
        assert!(Cli::try_parse_from([
            "quayside", "domain", "add", "shop", "--file", "d.json", "--host", "a.example.com"
        ])
        .is_err());
    }

    #[test]
    fn proxy_commands_take_a_server() {
        let cli = Cli::try_parse_from([
            "quayside", "auth", "remove", "shop", "admin", "--server", "edge-1",
        ])
        .unwrap();
        let Commands::Auth(AuthArgs { server, command }) = cli.command else {
            panic!("expected the auth command");
        };
        assert_eq!(server.as_deref(), Some("edge-1"));
        assert!(matches!(command, AuthCommand::Remove { .. }));

        let cli = Cli::try_parse_from(["quayside", "domain", "list", "shop"]).unwrap();
        let Commands::Domain(DomainArgs { server, .. }) = cli.command else {
            panic!("expected the domain command");
        };
        assert!(server.is_none());
    }
}
