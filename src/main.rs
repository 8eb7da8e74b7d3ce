use axum::{
    extract::{ConnectInfo, Multipart, Query, Request, State},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

// Import from the library instead of local modules
use logstats_service::{
    cache::CacheService,
    config::Config,
    enrich::Enricher,
    errors::ServiceError,
    metrics,
    stats,
    store::MemoryStore,
    whois::WhoisService,
    WhoisRecord,
};

// Timestamp format written into the access log
const ACCESS_LOG_TIMESTAMP: &str = "%d/%b/%Y:%H:%M:%S %z";

#[derive(Clone)]
pub struct AppState {
    enricher: Arc<Enricher>,
    config: Arc<Config>,
}

#[derive(Deserialize)]
struct LookupQuery {
    /// IP address to look up (e.g., "203.0.113.7")
    ip: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "logstats_service=info,tower_http=debug".into()),
        )
        .init();

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    ensure_log_dir(&config.log_path)?;
    ensure_log_dir(&config.upload_log_path)?;

    // Initialize services
    let store = Arc::new(MemoryStore::new());
    let whois_service = Arc::new(WhoisService::new(config.clone()));
    let cache_service = Arc::new(CacheService::new(config.clone()));
    let enricher = Arc::new(Enricher::new(store, whois_service, cache_service));

    // Initialize metrics
    metrics::init_metrics();

    let app_state = AppState {
        enricher,
        config: config.clone(),
    };

    // Build the application
    let app = Router::new()
        .route("/api/logs", get(stats_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/get_stats", get(whois_lookup))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            access_log_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Logstats service listening on {}", addr);
    info!("Stats: http://{}/api/logs", addr);
    info!("Lookup: http://{}/api/get_stats?ip=203.0.113.7", addr);
    info!("Access log: {}", config.log_path);

    // Graceful shutdown handling
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, gracefully shutting down...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    Ok(())
}

fn ensure_log_dir(path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Appends one combined-format line per request and dispatches fire-and-forget
/// enrichment for the client IP once the response has been produced. Neither
/// the append nor the enrichment may fail the request being served.
async fn access_log_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = client_ip(&request, peer);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let line = format!(
        "{} - - [{}] \"{} {}\" {} 0\n",
        client_ip,
        chrono::Local::now().format(ACCESS_LOG_TIMESTAMP),
        method,
        path,
        response.status().as_u16()
    );

    if let Err(e) = append_log_line(&state.config.log_path, &line).await {
        warn!("Failed to append access log line: {}", e);
    }

    state.enricher.spawn_enrich(client_ip);

    response
}

/// First entry of `x-forwarded-for` when present, else the socket peer.
fn client_ip(request: &Request, peer: SocketAddr) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| peer.ip().to_string())
}

async fn append_log_line(path: &str, line: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    metrics::increment_requests("logs");

    let path = state.config.log_path.clone();
    let limit = state.config.top_ips_limit;

    // File read stays off the runtime threads
    let result = tokio::task::spawn_blocking(move || stats::aggregate_file(&path, limit))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    match result {
        Ok(report) => Ok(Json(
            serde_json::to_value(report).map_err(|e| ServiceError::Internal(e.to_string()))?,
        )),
        // A missing or unreadable log is reported in-band, not as an HTTP error
        Err(ServiceError::LogSource(reason)) => Ok(Json(json!({ "error": reason }))),
        Err(e) => Err(e),
    }
}

async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ServiceError> {
    metrics::increment_requests("upload");

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
    {
        if field.name() != Some("logfile") {
            continue;
        }

        let contents = field
            .bytes()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        tokio::fs::write(&state.config.upload_log_path, &contents).await?;

        return Ok(Json(json!({ "message": "Log file uploaded successfully." })));
    }

    Err(ServiceError::Internal("missing logfile field".to_string()))
}

async fn whois_lookup(
    Query(params): Query<LookupQuery>,
    State(state): State<AppState>,
) -> Result<Json<WhoisRecord>, ServiceError> {
    let start_time = std::time::Instant::now();
    metrics::increment_requests("get_stats");

    let record = match state.enricher.lookup(&params.ip).await {
        Ok(record) => record,
        Err(e) => {
            track_lookup_error(&e);
            return Err(e);
        }
    };

    metrics::record_lookup_time(start_time.elapsed().as_millis() as u64);

    Ok(Json(record))
}

// Helper function to track different error types
fn track_lookup_error(error: &ServiceError) {
    match error {
        ServiceError::WhoisNotFound(_) => metrics::increment_whois_misses(),
        ServiceError::InvalidIp(_) => metrics::increment_errors("invalid_ip"),
        ServiceError::Timeout => metrics::increment_errors("timeout"),
        ServiceError::IoError(_) => metrics::increment_errors("io_error"),
        ServiceError::StoreError(_) => metrics::increment_errors("store_error"),
        _ => metrics::increment_errors("other"),
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.start_time.elapsed().as_secs(),
    })
}
