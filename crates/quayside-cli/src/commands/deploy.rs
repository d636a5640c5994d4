use super::{json_pretty, load_domains, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use clap::ValueEnum;
use quayside_compose::{generate_suffix, ComposeType, Domain};
use quayside_core::{ComposeApp, DeploymentMode, Engine, SourceKind};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    #[default]
    Plain,
    Randomized,
    Isolated,
}

/// Everything the `deploy` subcommand needs to describe one application.
#[derive(Debug, Default)]
pub struct DeployArgs<'a> {
    pub app: &'a str,
    pub domains: Option<&'a Path>,
    pub mode: ModeArg,
    pub suffix: Option<&'a str>,
    pub isolate_volumes: bool,
    pub compose_path: Option<&'a str>,
    pub stack: bool,
    pub server: Option<&'a str>,
}

impl DeployArgs<'_> {
    pub fn compose_app(&self) -> ComposeApp {
        let mode = match self.mode {
            ModeArg::Plain => DeploymentMode::Plain,
            ModeArg::Randomized => DeploymentMode::Randomized {
                suffix: self.suffix.map_or_else(generate_suffix, str::to_owned),
            },
            ModeArg::Isolated => DeploymentMode::Isolated {
                suffix: self.suffix.map(str::to_owned),
                isolate_volumes: self.isolate_volumes,
            },
        };
        let source = match self.compose_path {
            Some(path) => SourceKind::Repository {
                compose_path: path.to_owned(),
            },
            None => SourceKind::Raw,
        };
        let compose_type = if self.stack {
            ComposeType::Stack
        } else {
            ComposeType::DockerCompose
        };
        let app = ComposeApp::new(self.app)
            .with_source(source)
            .with_mode(mode)
            .with_compose_type(compose_type);
        match self.server {
            Some(server) => app.on_server(server),
            None => app,
        }
    }

    fn domains(&self) -> Result<Vec<Domain>, String> {
        self.domains.map_or_else(|| Ok(Vec::new()), load_domains)
    }
}

pub fn run(engine: &Engine, args: &DeployArgs<'_>, json: bool) -> Result<u8, String> {
    let app = args.compose_app();
    let domains = args.domains()?;

    let pb = (!json).then(|| spinner(&format!("preparing compose for {}...", app.app_name)));
    let written = match engine.write_compose(&app, &domains) {
        Ok(written) => written,
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, "deploy failed");
            }
            return Err(e.to_string());
        }
    };
    let Some(path) = written else {
        if let Some(pb) = &pb {
            spin_fail(pb, "compose file not found");
        }
        let expected = engine.compose_path(&app).map_err(|e| e.to_string())?;
        return Err(format!("compose file not found: {}", expected.display()));
    };

    if json {
        let payload = serde_json::json!({
            "app": app,
            "path": path.display().to_string(),
            "domains": domains.len(),
        });
        println!("{}", json_pretty(&payload)?);
    } else if let Some(pb) = &pb {
        spin_ok(pb, &format!("wrote {}", path.display()));
        if let DeploymentMode::Randomized { suffix } = &app.mode {
            println!("suffix: {suffix}");
        }
    }
    Ok(EXIT_SUCCESS)
}

/// Print the shell snippet a remote build pipeline runs to write the
/// prepared compose file.
pub fn run_script(engine: &Engine, args: &DeployArgs<'_>, log_path: &str) -> Result<u8, String> {
    let app = args.compose_app();
    let domains = args.domains()?;
    let script = engine.remote_write_script(&app, &domains, log_path);
    if !script.is_empty() {
        println!("{script}");
    }
    Ok(EXIT_SUCCESS)
}
