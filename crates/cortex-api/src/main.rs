use axum::Router;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cortex_agent::{Projector, TurnExecutor};
use cortex_api::{
    auth::HeaderAuthenticator,
    config::Config,
    limits::Unlimited,
    routes,
    state::AppState,
};
use cortex_llm::OpenAIClient;
use cortex_store::{MessageStore, MongoStore};
use cortex_tools::ToolRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Cortex API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    let chat: Arc<dyn cortex_llm::ChatClient> =
        Arc::new(OpenAIClient::new(config.openai_api_key.clone())?);

    tracing::info!("Connecting to MongoDB");
    let store: Arc<dyn MessageStore> = Arc::new(
        MongoStore::connect(&config.mongodb_uri, &config.mongodb.database).await?,
    );
    tracing::info!("MongoDB connected");

    // Tool factories register here at startup; `refresh()` rebuilds the
    // catalog without restarting the process.
    let registry = Arc::new(ToolRegistry::new());

    let executor = TurnExecutor::new(
        chat,
        store.clone(),
        registry,
        config.agent.clone().into(),
    );
    let projector = Projector::new(store.clone());

    let state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        store,
        executor,
        projector,
        authenticator: Arc::new(HeaderAuthenticator),
        limiter: Arc::new(Unlimited),
    });

    let app = build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config);
    routes::router(state)
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(300)))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors.allow_origin(Any)
        } else {
            let parsed_origins: Vec<axum::http::HeaderValue> = config
                .cors
                .origins
                .iter()
                .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                .collect();
            cors.allow_origin(parsed_origins)
        }
    } else {
        CorsLayer::permissive()
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
