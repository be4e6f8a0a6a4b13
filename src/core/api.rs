//! HTTP API for the KYC pipeline
//!
//! Endpoints:
//! - POST /kyc/start - Create session and challenge sequence
//! - POST /kyc/frame - Score a live frame
//! - POST /kyc/id-upload - Upload identity document
//! - POST /kyc/verify - Final verdict
//! - POST /kyc/social/upload - Score social images
//! - POST /kyc/social/check - Cross-check a social profile
//! - POST /kyc/admin/approve - Force passed
//! - POST /kyc/admin/reject - Force failed
//! - GET /kyc/status/:user_id - Status lookup
//! - GET /kyc/session/:id - Session summary
//! - GET /health - Health check

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Path, Request, State},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::core::collaborators::{decode_base64, Collaborators};
use crate::core::social::SocialUpload;
use crate::core::{SessionStore, SocialRiskAggregator, VerificationPipeline};
use crate::error::KycError;
use crate::types::{
    AdminOutcome, DocumentOutcome, FrameOutcome, KycStatus, Override, ProfileCheck,
    SessionSummary, SocialOutcome, StartOutcome, Verdict,
};
use crate::KycConfig;

/// Header carrying the boundary API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// JSON body whose rejections come back as `{"detail"}` errors
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(KycError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections come back as `{"detail"}` errors
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(KycError))]
pub struct ApiQuery<T>(pub T);

/// App state
pub struct AppState {
    pub pipeline: VerificationPipeline,
    pub social: SocialRiskAggregator,
    pub api_key: Option<String>,
}

impl AppState {
    /// Wire one store into the pipeline and the aggregator
    pub fn new(config: KycConfig, collaborators: Collaborators) -> Self {
        let store = Arc::new(SessionStore::new());
        let api_key = config.api_key.clone();
        Self {
            social: SocialRiskAggregator::new(Arc::clone(&store), collaborators.clone()),
            pipeline: VerificationPipeline::new(store, collaborators, config),
            api_key,
        }
    }
}

/// Start request; both fields fall back to configuration
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub pool: Option<Vec<String>>,
    pub count: Option<usize>,
}

/// Live frame
#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub session_id: String,
    pub frame_base64: String,
}

/// Identity document front
#[derive(Debug, Deserialize)]
pub struct IdUploadRequest {
    pub session_id: String,
    pub id_front_base64: String,
}

/// Verify request
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub session_id: String,
}

/// One social image
#[derive(Debug, Deserialize)]
pub struct SocialFile {
    #[serde(default)]
    pub name: String,
    pub data_base64: String,
}

/// Social image batch
#[derive(Debug, Deserialize)]
pub struct SocialUploadRequest {
    pub session_id: String,
    pub files: Vec<SocialFile>,
}

/// Social profile check
#[derive(Debug, Deserialize)]
pub struct SocialCheckRequest {
    pub session_id: String,
    pub profile_url: String,
}

/// Admin query parameters
#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub session_id: String,
    #[serde(default)]
    pub reason: String,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub kyc_status: KycStatus,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

/// Create the API router
pub fn create_router(config: KycConfig, collaborators: Collaborators) -> Router {
    router_with_state(Arc::new(AppState::new(config, collaborators)))
}

/// Router over existing state
pub fn router_with_state(state: Arc<AppState>) -> Router {
    let kyc = Router::new()
        .route("/start", post(start))
        .route("/frame", post(frame))
        .route("/id-upload", post(id_upload))
        .route("/verify", post(verify))
        .route("/social/upload", post(social_upload))
        .route("/social/check", post(social_check))
        .route("/admin/approve", post(admin_approve))
        .route("/admin/reject", post(admin_reject))
        .route("/status/:user_id", get(status))
        .route("/session/:id", get(session))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ));

    let body_limit = state.pipeline.config().max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .nest("/kyc", kyc)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Boundary check: when a key is configured, `X-API-Key` must match it
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, KycError> {
    if let Some(expected) = &state.api_key {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(KycError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: state.pipeline.store().len().await,
    })
}

/// Create new session; only an empty body means "use the defaults"
async fn start(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StartOutcome>, KycError> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice::<StartRequest>(&body)
            .map_err(|e| KycError::InvalidRequest(format!("malformed start request: {e}")))?
    };
    Ok(Json(state.pipeline.start(req.pool, req.count).await?))
}

/// Score one live frame
async fn frame(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<FrameRequest>,
) -> Result<Json<FrameOutcome>, KycError> {
    state.pipeline.store().require(&req.session_id).await?;
    let image = state.pipeline.decode(&decode_base64(&req.frame_base64)?)?;
    Ok(Json(state.pipeline.process_frame(&req.session_id, image).await?))
}

/// Upload the document front
async fn id_upload(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<IdUploadRequest>,
) -> Result<Json<DocumentOutcome>, KycError> {
    state.pipeline.store().require(&req.session_id).await?;
    let image = state.pipeline.decode(&decode_base64(&req.id_front_base64)?)?;
    Ok(Json(state.pipeline.upload_document(&req.session_id, image).await?))
}

/// Final verdict
async fn verify(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> Result<Json<Verdict>, KycError> {
    Ok(Json(state.pipeline.verify(&req.session_id).await?))
}

/// Score a batch of social images; bad base64 items are skipped
async fn social_upload(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SocialUploadRequest>,
) -> Result<Json<SocialOutcome>, KycError> {
    let uploads = req
        .files
        .into_iter()
        .filter_map(|file| match decode_base64(&file.data_base64) {
            Ok(data) => Some(SocialUpload {
                name: file.name,
                data,
            }),
            Err(e) => {
                debug!(name = %file.name, error = %e, "skipping social file");
                None
            }
        })
        .collect();
    Ok(Json(
        state
            .social
            .upload_social_evidence(&req.session_id, uploads)
            .await?,
    ))
}

/// Cross-check a social profile
async fn social_check(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SocialCheckRequest>,
) -> Result<Json<ProfileCheck>, KycError> {
    Ok(Json(
        state
            .social
            .check_social_profile(&req.session_id, &req.profile_url)
            .await?,
    ))
}

/// Force passed
async fn admin_approve(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<AdminQuery>,
) -> Result<Json<AdminOutcome>, KycError> {
    Ok(Json(
        state
            .pipeline
            .admin_override(&query.session_id, Override::Approve)
            .await?,
    ))
}

/// Force failed with a reason
async fn admin_reject(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<AdminQuery>,
) -> Result<Json<AdminOutcome>, KycError> {
    let decision = Override::Reject {
        reason: query.reason,
    };
    Ok(Json(
        state
            .pipeline
            .admin_override(&query.session_id, decision)
            .await?,
    ))
}

/// Status by user id (not backed by the session store)
async fn status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        kyc_status: state.pipeline.status(&user_id),
    })
}

/// Session summary
async fn session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, KycError> {
    Ok(Json(state.pipeline.summary(&id).await?))
}

/// Run the API server
pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let router = router_with_state(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "kycgate API listening");
    info!("  POST /kyc/start | /kyc/frame | /kyc/id-upload | /kyc/verify");
    info!("  POST /kyc/social/upload | /kyc/social/check");
    info!("  POST /kyc/admin/approve | /kyc/admin/reject");
    info!("  GET  /kyc/status/:user_id | /kyc/session/:id | /health");
    axum::serve(listener, router).await?;
    Ok(())
}
