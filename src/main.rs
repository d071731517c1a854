// src/main.rs
mod api;
mod config;
mod layout;
mod model;
mod scene;
mod types;
mod weights;

use config::AppConfig;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let layout_config = app_config.layout.layout_config();

    println!("🚀 Carton calculator starting...");
    api::start_api_server(api_config, layout_config).await;
}
