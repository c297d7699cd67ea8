mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use audit::{AuditEntry, AuditTrail, LogOptions, SqliteStore};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use policy::{Action, Decision, Resource, ResourceData, Role, User, UserId};
use serde_json::{Map, Value};
use tracing_subscriber::{EnvFilter, fmt};

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "warden.toml";

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Inspect authorization decisions and the audit trail", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a policy decision
    Can {
        #[arg(long)]
        role: Role,
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        action: Action,
        #[arg(long)]
        resource_type: String,
        /// Owner of the resource instance; omit for "no instance yet"
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Query the audit trail
    Logs {
        #[command(subcommand)]
        query: LogQuery,
        /// Maximum number of entries
        #[arg(short, long, global = true, default_value_t = audit::DEFAULT_LIMIT)]
        limit: usize,
        /// Print entries as JSON lines
        #[arg(long, global = true)]
        json: bool,
    },
    /// Append an entry to the audit trail
    Log {
        action: String,
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long)]
        ip: Option<String>,
        /// Resource type and id
        #[arg(long, num_args = 2, value_names = ["TYPE", "ID"])]
        resource: Option<Vec<String>>,
        /// Metadata as key=value, repeatable
        #[arg(long = "meta")]
        meta: Vec<String>,
    },
    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum LogQuery {
    /// Most recent entries
    Recent,
    /// Entries recorded for a user
    User { user_id: i64 },
    /// Entries recorded against a resource
    Resource {
        resource_type: String,
        resource_id: String,
    },
}

fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Can {
            role,
            user_id,
            action,
            resource_type,
            owner,
        } => cmd_can(&config, User::new(user_id, role), action, resource_type, owner),
        Commands::Logs { query, limit, json } => cmd_logs(&config, query, limit, json),
        Commands::Log {
            action,
            user_id,
            ip,
            resource,
            meta,
        } => cmd_log(&config, &action, user_id, ip, resource, &meta),
        Commands::Config => cmd_config(&config),
    }
}

fn cmd_can(
    config: &Config,
    user: User,
    action: Action,
    resource_type: String,
    owner: Option<i64>,
) -> Result<()> {
    let engine = config.policy_engine()?;
    let resource = match owner {
        Some(owner) => Resource::with_data(
            resource_type,
            ResourceData {
                id: None,
                user_id: Some(UserId(owner)),
            },
        ),
        None => Resource::new(resource_type),
    };

    match engine.decide(&user, action, &resource) {
        Decision::Allow => println!("allow"),
        Decision::Deny { reason } => println!("deny: {reason}"),
    }
    Ok(())
}

fn cmd_logs(config: &Config, query: LogQuery, limit: usize, json: bool) -> Result<()> {
    let trail = open_trail(config)?;

    let entries = match query {
        LogQuery::Recent => trail.list_recent_logs(limit)?,
        LogQuery::User { user_id } => trail.list_user_logs(user_id, limit)?,
        LogQuery::Resource {
            resource_type,
            resource_id,
        } => trail.list_resource_logs(&resource_type, &resource_id, limit)?,
    };

    if entries.is_empty() && !json {
        println!("No entries found.");
        return Ok(());
    }

    for entry in &entries {
        if json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            print_entry(entry);
        }
    }
    Ok(())
}

fn cmd_log(
    config: &Config,
    action: &str,
    user_id: Option<i64>,
    ip: Option<String>,
    resource: Option<Vec<String>>,
    meta: &[String],
) -> Result<()> {
    let trail = open_trail(config)?;

    let mut opts = LogOptions::new().metadata(parse_meta(meta)?);
    if let Some(ip) = ip {
        opts = opts.ip_address(ip);
    }
    if let Some([resource_type, resource_id]) = resource.as_deref() {
        opts = opts.resource(resource_type.as_str(), resource_id);
    }

    let entry = trail.log_action(action, user_id, opts)?;
    println!("{}", entry.id);
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let engine = config.policy_engine()?;
    let limiter = config.rate_limiter();

    println!("[policy]");
    println!("content  = {:?}", engine.vocabulary().content);
    println!("comments = {:?}", engine.vocabulary().comments);
    println!();
    println!("[rate_limit]");
    println!("max_attempts  = {}", limiter.max_attempts());
    println!("interval_secs = {}", limiter.interval().as_secs());
    println!();
    println!("[audit]");
    println!("database       = {}", config.audit.database.display());
    println!("queue_capacity = {}", config.audit.writer.queue_capacity);
    Ok(())
}

fn open_trail(config: &Config) -> Result<AuditTrail> {
    let store = SqliteStore::open(&config.audit.database)?;
    Ok(AuditTrail::new(Arc::new(store)))
}

fn parse_meta(pairs: &[String]) -> Result<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                .ok_or_else(|| Error::InvalidMeta(pair.clone()))
        })
        .collect()
}

fn print_entry(entry: &AuditEntry) {
    let time = Local
        .from_utc_datetime(&entry.inserted_at.naive_utc())
        .format("%Y-%m-%d %H:%M:%S");

    let actor = entry
        .user_id
        .map(|id| format!("user {id}"))
        .unwrap_or_else(|| "anonymous".to_string());

    let mut line = format!("[{time}] {:<24} {actor}", entry.action);
    if let (Some(kind), Some(id)) = (&entry.resource_type, &entry.resource_id) {
        line.push_str(&format!(" on {kind}/{id}"));
    }
    if let Some(ip) = &entry.ip_address {
        line.push_str(&format!(" from {ip}"));
    }
    if !entry.metadata.is_empty() {
        line.push_str(&format!(" {}", Value::Object(entry.metadata.clone())));
    }
    println!("{line}");
}
