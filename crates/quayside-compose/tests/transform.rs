//! Transform pipelines over compose files on disk.

use quayside_compose::{
    apply_suffix, check_references, inject_domains, isolate_deployment, parse_document_file,
    parse_domains_json, to_yaml_string, CertificateType, ComposeDocument, Domain, Labels,
    INGRESS_NETWORK,
};
use std::fs;
use std::path::Path;

const SHOP: &str = r#"
version: "3.8"
services:
  web:
    image: nginx:1.27
    depends_on: [api]
    networks:
      frontend:
        aliases: [www]
    volumes:
      - static:/usr/share/nginx/html:ro
      - ./nginx.conf:/etc/nginx/nginx.conf
    ports:
      - "8080:80"
  api:
    image: shop/api:2
    depends_on:
      db:
        condition: service_healthy
    networks: [frontend, backend]
    secrets: [db_password]
    configs:
      - source: api_settings
        target: /etc/api/settings.yml
  db:
    image: postgres:16
    networks: [backend]
    volumes:
      - type: volume
        source: pgdata
        target: /var/lib/postgresql/data
    healthcheck:
      test: ["CMD", "pg_isready"]
networks:
  frontend:
  backend:
    driver: bridge
volumes:
  static:
  pgdata:
configs:
  api_settings:
    file: ./settings.yml
secrets:
  db_password:
    file: ./db_password.txt
"#;

fn write_compose(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("docker-compose.yml");
    fs::write(&path, content).unwrap();
    path
}

fn load(dir: &Path) -> ComposeDocument {
    parse_document_file(write_compose(dir, SHOP)).unwrap()
}

#[test]
fn randomized_deployment_stays_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let doc = load(dir.path());

    let out = apply_suffix(&doc, "a1b2c3d4");
    let names: Vec<_> = out.services.keys().cloned().collect();
    assert_eq!(names, vec!["api-a1b2c3d4", "db-a1b2c3d4", "web-a1b2c3d4"]);
    assert!(out.volumes.as_ref().unwrap().contains_key("pgdata-a1b2c3d4"));
    assert!(out.secrets.as_ref().unwrap().contains_key("db_password-a1b2c3d4"));
    assert!(out.configs.as_ref().unwrap().contains_key("api_settings-a1b2c3d4"));
    assert!(check_references(&out).is_empty());

    // Unknown keys survive the rewrite.
    assert!(out.services["db-a1b2c3d4"].extra.contains_key("healthcheck"));
    assert!(out.services["web-a1b2c3d4"].extra.contains_key("ports"));
}

#[test]
fn suffixed_document_roundtrips_through_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let doc = load(dir.path());
    let out = apply_suffix(&doc, "x1");

    let yaml = to_yaml_string(&out).unwrap();
    let reparsed = write_compose(dir.path(), &yaml);
    assert_eq!(parse_document_file(reparsed).unwrap(), out);
    assert!(yaml.contains("./nginx.conf:/etc/nginx/nginx.conf"));
    assert!(yaml.contains("static-x1:/usr/share/nginx/html:ro"));
}

#[test]
fn isolated_deployment_with_domains() {
    let dir = tempfile::tempdir().unwrap();
    let doc = load(dir.path());

    let isolated = isolate_deployment(&doc, "shop", true);
    assert!(check_references(&isolated).is_empty());
    for service in isolated.services.values() {
        assert!(service.network_names().contains(&"shop"));
    }

    let domains = parse_domains_json(
        r#"[{"host": "shop.example.com", "port": 80, "https": true,
             "serviceName": "web", "uniqueConfigKey": 1,
             "certificateType": "letsencrypt"}]"#,
    )
    .unwrap();
    let options = quayside_compose::InjectOptions {
        isolated: true,
        ..Default::default()
    };
    let out = quayside_compose::inject_domains_with(&isolated, &domains, &options).unwrap();
    assert!(!out.networks.as_ref().unwrap().contains_key(INGRESS_NETWORK));
    let labels = out.services["web"].labels.as_ref().unwrap();
    assert_eq!(
        labels
            .get("traefik.http.routers.web-1-websecure.tls.certresolver")
            .as_deref(),
        Some("letsencrypt")
    );
}

#[test]
fn injected_document_passes_integrity() {
    let dir = tempfile::tempdir().unwrap();
    let doc = apply_suffix(&load(dir.path()), "k9");
    let domains = [Domain::new("api.example.com", 3)
        .with_service("api-k9")
        .with_port(8000)
        .with_https(CertificateType::None)];
    let out = inject_domains(&doc, &domains).unwrap();

    assert!(check_references(&out).is_empty());
    let api = &out.services["api-k9"];
    assert!(api.network_names().contains(&INGRESS_NETWORK));
    let Some(Labels::List(labels)) = &api.labels else {
        panic!("labels should be created as a list");
    };
    assert!(labels.contains(&"traefik.http.services.api-k9-3-web.loadbalancer.server.port=8000".to_owned()));
    assert!(labels.iter().any(|l| l.starts_with("traefik.http.routers.api-k9-3-websecure.")));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse_document_file(dir.path().join("nope.yml")).unwrap_err();
    assert!(matches!(err, quayside_compose::ComposeError::Io(_)));
}
