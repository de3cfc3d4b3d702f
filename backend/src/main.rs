//! DocSparrow - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use clap::Parser;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docsparrow_backend::{
    api,
    cli::{self, Cli, Command},
    config::Config,
    db,
    error::Result,
    services::auth_service::AuthService,
    storage::filesystem::FilesystemStorage,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    let config = Arc::new(Config::from_env()?);
    telemetry::init_tracing(config.log_json);

    let db_pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Connected to database");

    db::run_migrations(&db_pool).await?;
    tracing::info!("Database migrations complete");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db_pool).await,
        Command::Seed => {
            let report = cli::seed::run(&db_pool).await?;
            println!(
                "Seeded {} countries, {} products, {} categories",
                report.countries, report.products, report.categories
            );
            Ok(())
        }
        Command::CreateUser {
            username,
            password,
            display_name,
            staff,
        } => {
            let auth_service = AuthService::new(db_pool, config);
            let user = auth_service
                .create_user(&username, display_name.as_deref(), &password, staff)
                .await?;
            println!("Created user {} ({})", user.username, user.id);
            Ok(())
        }
    }
}

async fn serve(config: Arc<Config>, db_pool: sqlx::PgPool) -> Result<()> {
    tracing::info!(storage_path = %config.storage_path, "Starting DocSparrow");
    let storage = Arc::new(FilesystemStorage::new(&config.storage_path));
    let state = Arc::new(api::AppState::new(config.clone(), db_pool, storage));

    let app = Router::new()
        .merge(api::routes::create_router(state))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// In development the frontend runs on another origin and sends credentials,
/// so its origins are listed explicitly. Otherwise any origin is accepted.
fn cors_layer() -> CorsLayer {
    if std::env::var("ENVIRONMENT").unwrap_or_default() == "development" {
        let origins: Vec<HeaderValue> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
