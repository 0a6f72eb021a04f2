//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiReflectionAdapter, ScriptureApiAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        meditate_ws_handler,
        middleware::{require_admin, require_auth},
        rest::{
            admin_prayers_handler, admin_suggestions_handler, answer_prayer_handler,
            bible_books_handler, bible_chapter_handler, create_prayer_handler,
            create_suggestion_handler, daily_verse_handler, list_prayers_handler,
            meditation_tracks_handler, verse_history_handler, verse_reflection_handler, ApiDoc,
        },
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use devotional_core::cache::MemoryCache;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            config.log_level.to_string(),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let reflection_adapter = Arc::new(OpenAiReflectionAdapter::new(
        openai_client,
        config.reflection_model.clone(),
    ));

    let scripture_adapter = Arc::new(ScriptureApiAdapter::new(
        reqwest::Client::new(),
        config.scripture_api_base.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        reflection_adapter,
        scripture_adapter,
        daily_cache: Arc::new(MemoryCache::new()),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/verses/daily", get(daily_verse_handler))
        .route("/verses/{id}/reflection", post(verse_reflection_handler))
        .route("/verses/history", get(verse_history_handler))
        .route("/prayers", get(list_prayers_handler).post(create_prayer_handler))
        .route("/prayers/{id}/answered", post(answer_prayer_handler))
        .route("/suggestions", post(create_suggestion_handler))
        .route("/bible/books", get(bible_books_handler))
        .route(
            "/bible/{translation}/{book}/{chapter}",
            get(bible_chapter_handler),
        )
        .route("/meditation/tracks", get(meditation_tracks_handler))
        .route("/ws/meditate", get(meditate_ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Moderator routes (auth + app_admins membership)
    let admin_routes = Router::new()
        .route("/admin/prayers", get(admin_prayers_handler))
        .route("/admin/suggestions", get(admin_suggestions_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete
    // application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
