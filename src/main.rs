use std::path::Path;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use piiguard::classifier::http::HttpClassifier;
use piiguard::classifier::Classifier;
use piiguard::cli::{Cli, Commands, ConfigAction};
use piiguard::guard::{guard_label, sensitive_category, GUARD_FIELDS};
use piiguard::policy::config::AppConfig;
use piiguard::policy::evaluator::detected_blocked_types;
use piiguard::policy::normalize::normalize;
use piiguard::proxy::forward::{forward_handler, Forwarder};
use piiguard::proxy::ProxyServer;
use piiguard::web::{self, Services};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = include_str!("../templates/piiguard.toml");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => cmd_serve(&cli.config).await?,
        Commands::Check { text } => cmd_check(&cli.config, &text).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&cli.config)?,
            ConfigAction::Validate => cmd_config_validate(&cli.config)?,
        },
        Commands::Init => cmd_init(&cli.config)?,
    }

    Ok(())
}

async fn cmd_serve(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let upstream = config
        .server
        .upstream
        .clone()
        .context("[server].upstream must be set to run the gateway")?;

    println!("piiguard starting...");
    println!("Config:     {}", config_path.display());
    println!("Upstream:   {}", upstream);
    println!("Classifier: {}", config.classifier.url);
    println!("Rules:      {}", config.routes.len());
    println!("Guarded:    {}", config.guard.routes.len());

    let listen = config.server.listen.clone();
    let services = Services::from_config(config)?;
    let upstream_app = Router::new()
        .fallback(forward_handler)
        .with_state(Forwarder::new(upstream));
    let app = web::router(&services, upstream_app);

    let addr = ProxyServer::new(listen, app).start().await?;
    println!("Gateway running on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    Ok(())
}

async fn cmd_check(config_path: &Path, text: &str) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    let classifier = HttpClassifier::from_config(&config.classifier);
    let entities = classifier
        .classify(text, config.classifier.timeout())
        .await
        .context("classifier call failed")?;

    if entities.is_empty() {
        println!("No PII detected.");
        return Ok(());
    }

    println!("{:<28} {:<28} {:<6} {}", "TYPE", "VALUE", "CONF", "GUARD");
    println!("{}", "─".repeat(80));
    for entity in &entities {
        let guard = sensitive_category(&entity.entity_type)
            .map(|c| format!("blocked ({})", c))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<28} {:<28} {:<6.2} {}",
            normalize(&entity.entity_type),
            entity.value,
            entity.confidence,
            guard
        );
    }

    println!();
    for rule in &config.routes {
        let hits = detected_blocked_types(&entities, &rule.check_type);
        if !hits.is_empty() {
            println!(
                "  [{}] would {} on: {}",
                rule.label(),
                rule.action.as_str(),
                hits.join(", ")
            );
        }
    }
    for entity in entities
        .iter()
        .filter(|e| sensitive_category(&e.entity_type).is_some())
    {
        println!("  [guard] would silently drop: {}", guard_label(&entity.entity_type));
    }
    Ok(())
}

fn cmd_config_show(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    println!("Configuration ({})", config_path.display());
    println!("═══════════════════════════════════════");
    println!("Listen:     {}", config.server.listen);
    println!(
        "Upstream:   {}",
        config.server.upstream.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Classifier: {} ({} ms, {})",
        config.classifier.url, config.classifier.timeout_ms, config.classifier.language
    );
    println!("Rules ({}):", config.routes.len());
    for rule in &config.routes {
        let types = if rule.check_type.is_empty() {
            "(detection only)".to_string()
        } else {
            rule.check_type.join(", ")
        };
        println!(
            "  [{}] {} {} fields=[{}] → {} on {}",
            rule.label(),
            rule.method.to_uppercase(),
            rule.path,
            rule.fields.join(", "),
            rule.action.as_str(),
            types
        );
    }
    println!("Guard ({}):", config.guard.routes.len());
    for route in &config.guard.routes {
        println!(
            "  {} {} fields=[{}]",
            route.method.to_uppercase(),
            route.path,
            GUARD_FIELDS.join(", ")
        );
    }
    Ok(())
}

fn cmd_config_validate(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)
        .with_context(|| format!("{} is invalid", config_path.display()))?;
    println!(
        "{} is valid: {} rule(s), {} guarded endpoint(s)",
        config_path.display(),
        config.routes.len(),
        config.guard.routes.len()
    );
    Ok(())
}

fn cmd_init(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
        return Ok(());
    }

    std::fs::write(config_path, DEFAULT_CONFIG)?;
    println!("Created config: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Set [server].upstream and [classifier].url");
    println!("  2. Validate:  piiguard config validate");
    println!("  3. Start:     piiguard serve");
    Ok(())
}
