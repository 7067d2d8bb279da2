use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use logreach_remote::SshExecutor;
use logreach_types::{FilterChain, ListKind, SearchOptions};

mod config;
mod service;

use config::ConfigFile;
use service::LogInspectionService;

/// Logreach - inspect and search local and remote (SSH) log files
#[derive(Parser, Debug)]
#[command(name = "logreach")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (re-read on every operation)
    #[arg(long, default_value = "logreach.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Auto,
    Text,
    Image,
}

impl From<KindArg> for ListKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Auto => ListKind::Auto,
            KindArg::Text => ListKind::Text,
            KindArg::Image => ListKind::Image,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered local logs
    Logs,

    /// Print the last N lines of a registered log
    Tail {
        name: String,

        #[arg(long, default_value = "200")]
        lines: usize,
    },

    /// Search a registered log line by line
    Search {
        name: String,
        query: String,

        /// Interpret the query as a regular expression
        #[arg(long)]
        regex: bool,

        /// Match case-sensitively
        #[arg(long)]
        case_sensitive: bool,

        /// Lines of leading context per match
        #[arg(long, default_value = "0")]
        context: usize,

        /// Maximum number of matches
        #[arg(long, default_value = "5000")]
        limit: usize,
    },

    /// Tail a remote pattern over SSH, optionally through grep filters
    Cat {
        profile: u64,
        pattern: String,

        /// Fixed-string filter stage; repeatable, applied in order
        #[arg(long = "grep")]
        greps: Vec<String>,

        #[arg(long, default_value = "200")]
        lines: usize,
    },

    /// List remote files matching a glob
    List {
        profile: u64,
        pattern: String,

        #[arg(long, value_enum, default_value = "auto")]
        kind: KindArg,

        #[arg(long, default_value = "200")]
        limit: usize,
    },

    /// Fetch remote file bytes (cached in memory)
    Fetch {
        profile: u64,
        path: String,

        /// Write the payload here instead of reporting metadata only
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check connectivity to an SSH profile
    Ping { profile: u64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let service = LogInspectionService::new(
        ConfigFile::new(&args.config),
        Arc::new(SshExecutor),
    );
    run_command(&service, args.command).await
}

async fn run_command(service: &LogInspectionService, command: Command) -> Result<()> {
    match command {
        Command::Logs => {
            let logs = service.list_logs()?;
            print_json(&serde_json::json!({ "logs": logs }))?;
        }
        Command::Tail { name, lines } => {
            let result = service.tail_local(&name, lines).await?;
            print_json(&serde_json::json!({ "name": name, "lines": result }))?;
        }
        Command::Search {
            name,
            query,
            regex,
            case_sensitive,
            context,
            limit,
        } => {
            let options = SearchOptions {
                use_regex: regex,
                case_sensitive,
                context_lines: context,
                limit,
            };
            let outcome = service
                .search_local(&name, &query, options, CancellationToken::new())
                .await?;
            print_json(&serde_json::json!({
                "name": name,
                "matches": outcome.matches,
                "truncated": outcome.truncated,
            }))?;
        }
        Command::Cat {
            profile,
            pattern,
            greps,
            lines,
        } => {
            let chain = FilterChain::from_stages(greps);
            let result = service.remote_cat(profile, &pattern, &chain, lines).await?;
            print_json(&serde_json::json!({
                "pattern": pattern,
                "grep": chain.stages(),
                "lines": result,
            }))?;
        }
        Command::List {
            profile,
            pattern,
            kind,
            limit,
        } => {
            let files = service
                .remote_list(profile, &pattern, kind.into(), limit)
                .await?;
            print_json(&serde_json::json!({ "pattern": pattern, "files": files }))?;
        }
        Command::Fetch {
            profile,
            path,
            output,
        } => {
            let fetched = service.remote_fetch(profile, &path).await?;
            if let Some(output) = &output {
                std::fs::write(output, fetched.data.as_slice())?;
            }
            print_json(&serde_json::json!({
                "path": path,
                "bytes": fetched.data.len(),
                "content_type": fetched.content_type,
                "cached": fetched.cached,
                "saved_to": output,
            }))?;
        }
        Command::Ping { profile } => {
            service.ping(profile).await?;
            print_json(&serde_json::json!({ "ok": true }))?;
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
