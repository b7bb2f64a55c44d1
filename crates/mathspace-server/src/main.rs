use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use mathspace_core::{MathSpaceConfig, Pipeline, API_KEY_ENV};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_BIND: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 5001);

struct ServeOptions {
    bind: SocketAddr,
    config: Option<PathBuf>,
    json_logs: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            config: None,
            json_logs: false,
        }
    }
}

impl ServeOptions {
    fn from_matches(args: &ArgMatches) -> Self {
        Self {
            bind: args.get_one::<SocketAddr>("bind").copied().unwrap_or(DEFAULT_BIND),
            config: args.get_one::<PathBuf>("config").cloned(),
            json_logs: args.get_flag("json-logs"),
        }
    }
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Path to a TOML config file")
}

fn cli() -> Command {
    Command::new("mathspace")
        .version(mathspace_server::VERSION)
        .about("Context-aware instruction to Manim scene pipeline")
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP server (default)")
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .default_value("127.0.0.1:5001")
                        .value_parser(clap::value_parser!(SocketAddr))
                        .help("Address to listen on"),
                )
                .arg(config_arg())
                .arg(
                    Arg::new("json-logs")
                        .long("json-logs")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines"),
                ),
        )
        .subcommand(
            Command::new("reset")
                .about("Clear the live scene, history and published videos")
                .arg(config_arg()),
        )
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_pipeline(config: Option<&Path>) -> anyhow::Result<Pipeline> {
    let config = MathSpaceConfig::load(config).context("failed to load configuration")?;
    Pipeline::from_config(config).context("failed to build model client")
}

async fn serve(options: ServeOptions) -> anyhow::Result<()> {
    let pipeline = build_pipeline(options.config.as_deref())?;
    pipeline
        .workspace()
        .ensure_layout()
        .context("failed to create workspace directories")?;
    if pipeline.config().llm.api_key.is_none() {
        tracing::warn!("{} is not set; model calls will fail", API_KEY_ENV);
    }

    let listener = tokio::net::TcpListener::bind(options.bind)
        .await
        .with_context(|| format!("failed to bind {}", options.bind))?;
    tracing::info!("Listening on http://{}", options.bind);

    axum::serve(listener, mathspace_server::app(Arc::new(pipeline)))
        .await
        .context("server error")
}

async fn reset(config: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    pipeline.reset().await.context("failed to reset workspace")?;
    tracing::info!("Workspace reset");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("reset", args)) => {
            init_tracing(false);
            reset(args.get_one::<PathBuf>("config").map(PathBuf::as_path)).await
        }
        Some(("serve", args)) => {
            let options = ServeOptions::from_matches(args);
            init_tracing(options.json_logs);
            serve(options).await
        }
        _ => {
            init_tracing(false);
            serve(ServeOptions::default()).await
        }
    }
}
