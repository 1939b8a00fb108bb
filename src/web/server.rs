use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use crate::catalog::store::{Dataset, DatasetCatalog};
use crate::cli::ServeArgs;
use crate::matching::shard::{CancelToken, ShardResult};
use crate::query::dispatcher::{execute_unit, AnyDispatcher, DispatchError};
use crate::query::orchestrator::{DatasetResponse, Orchestrator, QueryRequest};
use crate::query::splitter::WorkUnit;
use crate::source::SourceKind;
use crate::utils::validation::validate_location;

/// Security configuration constants to prevent `DoS` attacks
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024; // 1MB
pub const MAX_CONCURRENT_REQUESTS: usize = 100;

/// Shared application state
pub struct AppState {
    pub catalog: DatasetCatalog,
    pub orchestrator: Orchestrator<AnyDispatcher>,
    /// How `/api/shard` reads variant files
    pub source_kind: SourceKind,
    /// Canonical directory whose files `/api/shard` may read besides catalog sources
    pub shard_root: Option<PathBuf>,
}

impl AppState {
    /// Whether `/api/shard` may read `location`
    pub async fn shard_location_allowed(&self, location: &str) -> bool {
        if self.catalog.serves_location(location) {
            return true;
        }
        let Some(root) = &self.shard_root else {
            return false;
        };
        tokio::fs::canonicalize(location)
            .await
            .is_ok_and(|path| path.starts_with(root))
    }
}

/// Enhanced error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub details: Option<String>,
}

/// Body of `POST /api/query`
#[derive(Debug, Deserialize)]
pub struct QueryBody {
    /// Datasets to query; all catalog datasets when absent
    #[serde(default)]
    pub dataset_ids: Option<Vec<String>>,
    #[serde(flatten)]
    pub query: QueryRequest,
}

/// Answer of `POST /api/query`, one entry per dataset in catalog order
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub datasets: Vec<DatasetResponse>,
}

/// Create a safe error response that prevents information disclosure
/// while logging detailed errors server-side for debugging
pub fn create_safe_error_response(
    error_type: &str,
    user_message: &str,
    internal_error: Option<&str>,
) -> ErrorResponse {
    // Log detailed error server-side for debugging (not exposed to client)
    if let Some(internal_msg) = internal_error {
        tracing::error!("Internal error ({}): {}", error_type, internal_msg);
    }

    ErrorResponse {
        error: user_message.to_string(),
        error_type: error_type.to_string(),
        details: None, // Never expose internal details to prevent information disclosure
    }
}

fn error_reply(status: StatusCode, response: ErrorResponse) -> Response {
    (status, Json(response)).into_response()
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the tokio runtime cannot be created or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(args).await })
}

/// Build shared state from the serve arguments.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, the shard root does not
/// exist, or the worker list is empty.
pub fn build_state(args: &ServeArgs) -> anyhow::Result<Arc<AppState>> {
    let catalog = match &args.catalog {
        Some(path) => DatasetCatalog::load_from_file(path)?,
        None => DatasetCatalog::new(),
    };
    let orchestrator = Orchestrator::new(
        args.engine.dispatcher()?,
        args.engine.cache(),
        args.engine.query_config(),
    );
    let shard_root = args
        .shard_root
        .as_deref()
        .map(std::fs::canonicalize)
        .transpose()
        .context("Failed to resolve shard root")?;
    Ok(Arc::new(AppState {
        catalog,
        orchestrator,
        source_kind: args.engine.source_kind(),
        shard_root,
    }))
}

/// Routes without the network-facing middleware, for embedding and tests
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/datasets", get(datasets_handler))
        .route("/api/shard", post(shard_handler))
        .route("/api/query", post(query_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
}

/// Create the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns an error if the rate limiter configuration is rejected.
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> anyhow::Result<Router> {
    // Configure IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10) // 10 requests per second per IP
        .burst_size(50) // Allow bursts of 50 requests
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?;

    let app = api_router(state).layer(
        ServiceBuilder::new()
            // Security headers
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static("x-frame-options"),
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static("strict-transport-security"),
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            ))
            // IP-based rate limiting to prevent abuse
            .layer(GovernorLayer {
                config: Arc::new(governor_conf),
            })
            // A query may wait on several shard timeouts
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            ))
            // Limit concurrent requests to prevent DOS
            .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS)),
    );

    Ok(app)
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let state = build_state(&args)?;
    info!(
        "Loaded {} datasets; shards run {}",
        state.catalog.len(),
        if args.engine.workers.is_empty() { "locally" } else { "on workers" }
    );
    if let Some(root) = &state.shard_root {
        info!("Shard requests may also read files under {}", root.display());
    }
    let app = create_router(state, Duration::from_secs(args.request_timeout))?;

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting beacon-query server at http://{addr}");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Return list of datasets in catalog
async fn datasets_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let datasets: Vec<serde_json::Value> = state
        .catalog
        .datasets
        .iter()
        .map(|d| {
            serde_json::json!({
                "dataset_id": d.dataset_id,
                "name": d.name,
                "description": d.description,
                "sample_count": d.sample_count,
                "source_count": d.vcf_locations.len(),
                "annotated": d.annotation_location.is_some(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "count": datasets.len(),
        "datasets": datasets,
    }))
}

fn json_rejection(rejection: &JsonRejection) -> Response {
    error_reply(
        rejection.status(),
        create_safe_error_response("invalid_json", &rejection.body_text(), None),
    )
}

/// Run one work unit for a coordinator
async fn shard_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WorkUnit>, JsonRejection>,
) -> Response {
    let Json(unit) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(&rejection),
    };

    if let Err(e) = validate_location(&unit.location) {
        return error_reply(
            StatusCode::BAD_REQUEST,
            create_safe_error_response("invalid_request", &e.to_string(), None),
        );
    }
    if !state.shard_location_allowed(&unit.location).await {
        warn!("Refused shard for unlisted location {}", unit.location);
        return error_reply(
            StatusCode::FORBIDDEN,
            create_safe_error_response(
                "forbidden_location",
                "Location is not served by this worker",
                None,
            ),
        );
    }

    let kind = state.source_kind.clone();
    let outcome =
        tokio::task::spawn_blocking(move || execute_unit(&kind, &unit, &CancelToken::new())).await;

    match outcome {
        Ok(Ok(result)) => Json::<ShardResult>(result).into_response(),
        Ok(Err(DispatchError::Validation(e))) => error_reply(
            StatusCode::BAD_REQUEST,
            create_safe_error_response("invalid_request", &e.to_string(), None),
        ),
        Ok(Err(e)) => error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            create_safe_error_response("shard_failed", "Shard query failed", Some(&e.to_string())),
        ),
        Err(e) => error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            create_safe_error_response("internal_error", "Internal error", Some(&e.to_string())),
        ),
    }
}

/// Run an orchestrated query against one or more datasets
async fn query_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(&rejection),
    };

    let datasets: Vec<&Dataset> = match &body.dataset_ids {
        None => state.catalog.datasets.iter().collect(),
        Some(ids) => {
            let mut selected = Vec::with_capacity(ids.len());
            for id in ids {
                match state.catalog.get(id) {
                    Some(dataset) => selected.push(dataset),
                    None => {
                        return error_reply(
                            StatusCode::NOT_FOUND,
                            create_safe_error_response(
                                "unknown_dataset",
                                &format!("Unknown dataset '{id}'"),
                                None,
                            ),
                        )
                    }
                }
            }
            selected
        }
    };

    let mut responses = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        match state.orchestrator.split_query(dataset, &body.query).await {
            Ok(response) => responses.push(response),
            Err(e) => {
                return error_reply(
                    StatusCode::BAD_REQUEST,
                    create_safe_error_response("invalid_request", &e.to_string(), None),
                )
            }
        }
    }

    Json(QueryResponse {
        datasets: responses,
    })
    .into_response()
}
