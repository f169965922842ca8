//! Start a vertex-openai-proxy server programmatically.
//!
//! Usage:
//!   export GEMINI_API_KEY=your_key
//!   export ANTHROPIC_API_KEY=your_key
//!   cargo run --example basic_proxy

use std::sync::Arc;
use vertex_openai_proxy::{build_router, AppState, ProxyConfig, SharedJournal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ProxyConfig::find_and_load(None)?;

    println!("Gemini: {}", config.gemini.effective_base_url()?);
    println!("Claude: {}", config.claude.effective_base_url()?);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let port = config.port;
    let state = AppState::from_config(config, client, SharedJournal::memory())?;
    println!("Models: {}", state.router.list().data.len());

    let app = build_router(Arc::new(state));
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("Listening on http://{}", addr);
    println!();
    println!("  OPENAI_BASE_URL=http://localhost:{}/v1", port);

    axum::serve(listener, app).await?;
    Ok(())
}
