pub mod auth;
pub mod config;
pub mod error;
pub mod event_types;
pub mod events;
pub mod groups;
pub mod members;
pub mod models;
pub mod relations;
pub mod roles;
pub mod tasks;

use actix_cors::Cors;
use actix_web::{middleware, web, App};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::extractor_error;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
}

pub fn create_app(app_state: web::Data<AppState>) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(app_state)
        .app_data(web::JsonConfig::default().error_handler(|err, _req| extractor_error(err)))
        .app_data(web::PathConfig::default().error_handler(|err, _req| extractor_error(err)))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| extractor_error(err)))
        .wrap(
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600)
        )
        .wrap(middleware::Logger::default())
        .configure(auth::configure)
        .configure(members::configure)
        .configure(roles::configure_routes)
        .configure(groups::configure)
        .configure(event_types::configure)
        .configure(events::configure)
        .configure(tasks::configure)
}

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    Ok(pool)
}
