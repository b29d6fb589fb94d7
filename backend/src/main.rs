use actix_web::{web, HttpServer};
use log::{error, info, warn};
use schoolapp_backend::config::AppConfig;
use schoolapp_backend::{create_app, init_db, AppState};
use std::path::PathBuf;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file in project root
    let env_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../.env");
    let dotenv_result = dotenv::from_path(&env_path);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = dotenv_result {
        warn!("No .env file loaded from {:?}: {}", env_path, e);
    }

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let db_pool = init_db(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to initialize database: {}", e)
        ))?;

    info!("Database initialized successfully");

    let app_state = web::Data::new(AppState {
        db: db_pool,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl_minutes: config.token_ttl_minutes,
    });

    info!("Starting server at http://{}", config.bind_addr);

    HttpServer::new(move || create_app(app_state.clone()))
        .bind(config.bind_addr.as_str())?
        .run()
        .await
}
