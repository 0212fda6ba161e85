mod config;
mod handlers;
mod models;
mod server;
mod services;

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use config::AppConfig;
use handlers::{LogProgressSink, PipelineOrchestrator};
use server::create_router;
use services::{GroqClient, ImgBbClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting Food Nutrition Analyzer...");

    let config = AppConfig::from_env()?;
    let http = config.http_client()?;
    log::info!("✅ HTTP client ready (timeout {:?})", config.request_timeout);

    let hosting = Arc::new(ImgBbClient::new(
        config.imgbb_api_key.clone(),
        config.imgbb_upload_url.clone(),
        config.imgbb_expiration_secs,
        http.clone(),
    ));
    log::info!("✅ ImgBB hosting client initialized");

    let inference = Arc::new(GroqClient::new(
        config.groq_api_key.clone(),
        config.groq_model.clone(),
        config.groq_chat_url.clone(),
        config.sampling.clone(),
        http,
    ));
    log::info!("✅ Groq inference client initialized with model: {}", config.groq_model);

    let pipeline = Arc::new(PipelineOrchestrator::new(
        hosting,
        inference,
        Arc::new(LogProgressSink),
        config.reveal_delay,
    ));

    let app = create_router(pipeline, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    log::info!("🌐 Server listening on {}", config.bind_addr);
    println!("\n🍽️ Food Nutrition Analyzer is running on http://{}", config.bind_addr);
    println!("   POST /image    - select a photo (raw body, image/* Content-Type)");
    println!("   POST /analyze  - analyze the selected photo");
    println!("   GET  /state    - progress and result cards");
    println!("\n🛑 Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("🛑 Shutting down...");
        })
        .await?;

    Ok(())
}
