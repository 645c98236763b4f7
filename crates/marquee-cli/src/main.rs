use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::json;

use marquee_core::domain::{FilterPatch, SortKey, StagingJobId};
use marquee_core::impls::InMemoryCredentialStore;
use marquee_core::{ClientConfig, Console, ConsoleBuilder, Settled};

const TOKEN_ENV: &str = "MARQUEE_TOKEN";

#[derive(Parser, Debug)]
#[command(name = "marquee", about = "Inspect the Marquee console's state from a terminal")]
struct Cli {
    /// TOML config file; environment variables are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the asset library (visible set after filters)
    Assets {
        #[arg(long)]
        query: Option<String>,
        /// image | video | document | audio | other
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// name | size | createdAt | updatedAt | property
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, requires = "sort")]
        desc: bool,
    },
    #[command(subcommand)]
    Staging(StagingCommand),
    #[command(subcommand)]
    Videos(VideoCommand),
    #[command(subcommand)]
    Social(SocialCommand),
}

#[derive(Subcommand, Debug)]
enum StagingCommand {
    /// Poll a staging job until it completes or fails
    Watch { job_id: String },
}

#[derive(Subcommand, Debug)]
enum VideoCommand {
    List,
}

#[derive(Subcommand, Debug)]
enum SocialCommand {
    /// Connection state of every social platform
    Platforms,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ClientConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            Ok(ClientConfig::from_toml_str(&raw)?)
        }
        None => Ok(ClientConfig::from_env()?),
    }
}

fn build_console(config: ClientConfig) -> anyhow::Result<Console> {
    let credentials = match std::env::var(TOKEN_ENV) {
        Ok(token) => InMemoryCredentialStore::with_token(token),
        Err(_) => InMemoryCredentialStore::new(),
    };
    let console = ConsoleBuilder::new(config)
        .http(None)
        .credentials(Arc::new(credentials))
        .build()?;
    Ok(console)
}

/// Rejections become a CLI error; everything else is handed back.
fn settled<T>(result: Settled<T>, what: &str) -> anyhow::Result<Option<T>> {
    match result {
        Settled::Fulfilled(value) => Ok(Some(value)),
        Settled::Rejected(err) => bail!("{what}: {err}"),
        Settled::Superseded => Ok(None),
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let console = build_console(load_config(cli.config.as_ref())?)?;

    match cli.command {
        Command::Assets {
            query,
            format,
            tag,
            sort,
            desc,
        } => {
            let mut patch = FilterPatch::new();
            if let Some(format) = format {
                patch = patch.set("fileFormat", format);
            }
            if let Some(tag) = tag {
                patch = patch.set("tag", tag);
            }
            if let Some(query) = query {
                patch = patch.query(query);
            }
            settled(console.assets.fetch(&patch).await, "assets")?;

            let sort = sort.map(|field| {
                if desc {
                    SortKey::descending(field)
                } else {
                    SortKey::ascending(field)
                }
            });
            let visible = console.assets.visible_sorted(sort.as_ref());
            print_json(&json!({
                "filters": console.assets.read(|s| s.filters().clone()),
                "total": console.assets.read(|s| s.items().len()),
                "visible": visible,
            }))?;
        }
        Command::Staging(StagingCommand::Watch { job_id }) => {
            let id = StagingJobId::new(job_id);
            // タイトル表示用。一覧が取れなくても watch は続ける
            if let Settled::Rejected(err) = console.staging.fetch(&FilterPatch::new()).await {
                tracing::warn!(error = %err, "could not load staging projects");
            }

            let handle = console.staging.watch(&id);
            tracing::info!(job = %id, op = %handle.id(), "watching staging job");
            handle.join().await;

            print_json(&json!({
                "job": console.staging.get(&id),
                "notifications": console.ui.notifications(),
            }))?;
        }
        Command::Videos(VideoCommand::List) => {
            settled(console.videos.fetch(&FilterPatch::new()).await, "videos")?;
            print_json(&json!(console.videos.visible()))?;
        }
        Command::Social(SocialCommand::Platforms) => {
            let platforms = settled(console.social.fetch_platforms().await, "platforms")?
                .unwrap_or_else(|| console.social.platforms());
            print_json(&json!(platforms))?;
        }
    }

    Ok(())
}
