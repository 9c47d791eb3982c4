use axum::Router;
use migration::MigratorTrait;
use sea_orm::Database;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config;
use crate::todo::web::{TodoState, create_todo_router};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::todo::web::index_handler,
        crate::todo::web::create_todo_handler,
        crate::todo::web::update_todo_handler,
        crate::todo::web::delete_todo_handler,
        crate::todo::web::toggle_status_handler,
        crate::todo::web::export_json_handler,
        crate::todo::web::export_csv_handler,
    ),
    tags(
        (name = "Todos", description = "Todo CRUD and listing"),
        (name = "Export", description = "Full-collection exports")
    )
)]
struct ApiDoc;

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: config::Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let todo_state = Arc::new(TodoState { db: Arc::new(db) });
    let todo_router = create_todo_router(todo_state);

    let app = Router::new()
        .merge(todo_router)
        .route("/health", axum::routing::get(health_check_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new()),
        );

    axum::serve(listener, app).await?;
    Ok(())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}
