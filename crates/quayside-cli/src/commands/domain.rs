use super::{colorize_entrypoint, json_pretty, load_domains, EXIT_SUCCESS};
use clap::{Args, ValueEnum};
use quayside_compose::{CertificateType, Domain};
use quayside_core::Engine;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CertArg {
    Letsencrypt,
    None,
    Custom,
}

impl From<CertArg> for CertificateType {
    fn from(arg: CertArg) -> Self {
        match arg {
            CertArg::Letsencrypt => CertificateType::Letsencrypt,
            CertArg::None => CertificateType::None,
            CertArg::Custom => CertificateType::Custom,
        }
    }
}

/// A single domain given on the command line, or a JSON file of them.
#[derive(Debug, Args)]
pub struct DomainInput {
    /// JSON file holding an array of domains.
    #[arg(long, conflicts_with_all = ["host", "key"])]
    pub file: Option<PathBuf>,
    /// Public host name.
    #[arg(long, required_unless_present = "file", requires = "key")]
    pub host: Option<String>,
    /// Caller-stable id of this domain within the application.
    #[arg(long)]
    pub key: Option<u32>,
    /// Container port the proxy forwards to.
    #[arg(long, default_value_t = 80)]
    pub port: u16,
    /// Path prefix the router matches on.
    #[arg(long)]
    pub path: Option<String>,
    /// Also serve the domain on the websecure entry point.
    #[arg(long, default_value_t = false)]
    pub https: bool,
    /// Certificate source for HTTPS.
    #[arg(long, value_enum, default_value_t = CertArg::None)]
    pub cert: CertArg,
    /// Resolver name used with `--cert custom`.
    #[arg(long)]
    pub resolver: Option<String>,
    /// Strip the matched path before forwarding.
    #[arg(long, default_value_t = false)]
    pub strip_path: bool,
    /// Prefix added to the forwarded path.
    #[arg(long)]
    pub internal_path: Option<String>,
}

impl DomainInput {
    pub fn domains(&self) -> Result<Vec<Domain>, String> {
        if let Some(file) = &self.file {
            return load_domains(file);
        }
        let (Some(host), Some(key)) = (&self.host, self.key) else {
            return Err("either --file or --host with --key is required".to_owned());
        };
        let mut domain = Domain::new(host.clone(), key).with_port(self.port);
        domain.path.clone_from(&self.path);
        domain.https = self.https;
        domain.certificate_type = self.cert.into();
        domain.custom_cert_resolver.clone_from(&self.resolver);
        domain.strip_path = self.strip_path;
        domain.internal_path.clone_from(&self.internal_path);
        Ok(vec![domain])
    }
}

pub fn add(
    engine: &Engine,
    app: &str,
    input: &DomainInput,
    server: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let domains = input.domains()?;
    for domain in &domains {
        engine
            .manage_domain(app, domain, server)
            .map_err(|e| e.to_string())?;
    }
    if json {
        let payload = serde_json::json!({ "app": app, "domains": domains });
        println!("{}", json_pretty(&payload)?);
    } else {
        for domain in &domains {
            println!(
                "routed {} -> {app}:{} (key {})",
                domain.rule(),
                domain.port,
                domain.unique_config_key
            );
        }
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
        .remove_domain(app, key, server)
        .map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({ "app": app, "removed": key });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("removed domain {key} from {app}");
    }
    Ok(EXIT_SUCCESS)
}

pub fn list(engine: &Engine, app: &str, server: Option<&str>, json: bool) -> Result<u8, String> {
    let routes = engine
        .app_routes(app, server)
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&routes)?);
        return Ok(EXIT_SUCCESS);
    }
    if routes.router_count() == 0 {
        println!("no routers for {app}");
        return Ok(EXIT_SUCCESS);
    }
    println!("{:<28} {:<14} {:<48} MIDDLEWARES", "ROUTER", "ENTRYPOINTS", "RULE");
    for (name, router) in routes.routers() {
        let entrypoints: Vec<String> = router
            .entry_points
            .iter()
            .map(|ep| colorize_entrypoint(ep))
            .collect();
        println!(
            "{:<28} {:<14} {:<48} {}",
            name,
            entrypoints.join(","),
            router.rule,
            router.middlewares.join(",")
        );
    }
    Ok(EXIT_SUCCESS)
}
