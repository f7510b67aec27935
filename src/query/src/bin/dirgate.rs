//! Dirgate - directory search from the command line
//!
//! Loads a JSON fixture into the relational cache, then evaluates one filter
//! with the configured strategy and prints the hits as JSON.
//!
//! ```text
//! dirgate --fixture directory.json --kind user \
//!     --filter '{"op":"equal","args":{"attribute":"memberOf","value":"cn=Admins,ou=groups,dc=example,dc=com"}}'
//! dirgate --fixture directory.json --kind group sql
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dirgate_core::backends::CachedDirectory;
use dirgate_core::{DirectoryBackend, Entity, EntityKind, InMemoryDirectory};
use dirgate_query::config::Strategy;
use dirgate_query::{
    DnResolver, GatewayConfig, GraphMembership, MemberRef, QueryExpression, SearchEngine, SearchHit, SqlDirectory,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Dirgate CLI
#[derive(Parser)]
#[command(name = "dirgate")]
#[command(about = "Evaluate directory filters against a fixture")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "DIRGATE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON directory fixture
    #[arg(short, long, env = "DIRGATE_FIXTURE")]
    fixture: PathBuf,

    /// Entity kind to search
    #[arg(short, long, default_value = "user")]
    kind: EntityKind,

    /// Filter as a JSON query expression
    #[arg(long, default_value = r#"{"op":"boolean_value","args":true}"#)]
    filter: String,

    /// Override the configured strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the search and print matching entries
    Search,

    /// Print the compiled SQL and its bind values
    Sql,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum StrategyArg {
    Interpreter,
    Sql,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Interpreter => Strategy::Interpreter,
            StrategyArg::Sql => Strategy::Sql,
        }
    }
}

/// One printed entry
#[derive(Serialize)]
struct Entry {
    dn: String,
    #[serde(flatten)]
    hit: SearchHit,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    member_of_dns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    member_dns: Vec<String>,
}

/// Log filter used when `RUST_LOG` is unset
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,dirgate_query=debug"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(cli.verbose).into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            let config = GatewayConfig::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => GatewayConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.query.strategy = strategy.into();
    }
    config.validate()?;

    let filter: QueryExpression = serde_json::from_str(&cli.filter).context("Failed to parse --filter")?;

    let fixture = InMemoryDirectory::load(&cli.fixture)
        .with_context(|| format!("Failed to load fixture {:?}", cli.fixture))?;

    let names = fixture.clone();
    let store = SqlDirectory::connect(&config.database).await?;
    store.import(&fixture).await?;
    store.refresh_closures().await?;

    let engine = match config.query.strategy {
        Strategy::Sql => SearchEngine::with_store(&config, store),
        Strategy::Interpreter => {
            let backend: Arc<dyn DirectoryBackend> = if config.cache.enabled {
                Arc::new(CachedDirectory::with_config(fixture, config.cache.to_cache_config()))
            } else {
                Arc::new(fixture)
            };
            let membership = Arc::new(GraphMembership::new(backend.clone()));
            SearchEngine::new(&config, backend, membership)
        }
    };

    match cli.command.unwrap_or(Command::Search) {
        Command::Sql => {
            let query = engine.compile(cli.kind, &filter)?;
            println!("{}", query.sql());
            println!("{}", serde_json::to_string(query.binds())?);
        }
        Command::Search => {
            let hits = engine.search(cli.kind, &filter).await?;
            let dn = engine.dn();
            let mut entries = Vec::with_capacity(hits.len());
            for hit in hits {
                let mut member_of_dns = Vec::with_capacity(hit.member_of.len());
                for id in &hit.member_of {
                    member_of_dns.push(entry_dn(&names, dn, MemberRef::Group(id.clone())).await?);
                }
                let mut member_dns = Vec::new();
                for id in &hit.member_groups {
                    member_dns.push(entry_dn(&names, dn, MemberRef::Group(id.clone())).await?);
                }
                for id in &hit.member_users {
                    member_dns.push(entry_dn(&names, dn, MemberRef::User(id.clone())).await?);
                }
                entries.push(Entry {
                    dn: hit.dn(dn),
                    hit,
                    member_of_dns,
                    member_dns,
                });
            }
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

/// DN of a referenced entry, rendered from its display name like the hit's own
async fn entry_dn(directory: &InMemoryDirectory, dn: &DnResolver, member: MemberRef) -> Result<String> {
    let entity: Option<Entity> = match &member {
        MemberRef::Group(id) => directory.group(id).await?.map(Entity::from),
        MemberRef::User(id) => directory.user(id).await?.map(Entity::from),
    };
    Ok(match entity {
        Some(entity) => dn.dn_of(&entity),
        None => dn.member_dn(&member),
    })
}
