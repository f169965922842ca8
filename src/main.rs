use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vertex_openai_proxy::config::{config_search_paths, BackendFlavor};
use vertex_openai_proxy::{build_router, AppState, ProxyConfig, SharedJournal};

#[derive(Parser)]
#[command(
    name = "vertex-openai-proxy",
    about = "OpenAI-compatible API in front of Gemini and Claude",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Exchange journal path (JSON lines)
    #[arg(long, default_value = "vertex-openai-proxy.jsonl")]
    journal_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

fn flavor_name(flavor: BackendFlavor) -> &'static str {
    match flavor {
        BackendFlavor::Direct => "direct",
        BackendFlavor::Vertex => "vertex",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vertex_openai_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let journal = SharedJournal::open(&cli.journal_file)?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    // Validates base URLs eagerly; keys are read per request.
    let state = AppState::from_config(config.clone(), client, journal)?;

    info!("vertex-openai-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!(
        flavor = flavor_name(config.gemini.flavor),
        base_url = %config.gemini.effective_base_url()?,
        key_env = %config.gemini.api_key_env,
        "Gemini backend"
    );
    info!(
        flavor = flavor_name(config.claude.flavor),
        base_url = %config.claude.effective_base_url()?,
        key_env = %config.claude.api_key_env,
        "Claude backend"
    );
    info!(
        enabled = config.signatures.enabled,
        ttl_secs = config.signatures.ttl_secs,
        "Signature cache"
    );
    info!(models = state.router.list().data.len(), journal = %cli.journal_file.display(), "Ready");

    let app = build_router(Arc::new(state));
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OPENAI_BASE_URL=http://localhost:{}/v1", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
