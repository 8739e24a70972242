//! # REST API
//!
//! Builds the axum router that exposes the issuance node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                                       | Description                      |
//! |--------|--------------------------------------------|----------------------------------|
//! | GET    | `/health`                                  | Liveness probe                   |
//! | GET    | `/status`                                  | Node status summary              |
//! | POST   | `/loan-requests`                           | Decide a loan request            |
//! | GET    | `/credit-criteria`                         | Grade criteria table             |
//! | GET    | `/tokens/:customer_id/:holder`             | Token status and view            |
//! | POST   | `/tokens/:customer_id/:holder/invalidate`  | Invalidate a token               |
//! | GET    | `/tokens/:customer_id/:holder/eligibility` | Ownership and limit check        |
//! | POST   | `/proofs/verify`                           | Verify a proof commitment        |
//!
//! Issuance errors map to `400` (validation), `404` (unknown customer),
//! `503` (bureau or prover unavailable) and `422` (commitment rejected),
//! always with a `{ "error", "kind" }` body. A JSON body that does not
//! deserialize is a validation error.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use zkgrade_protocol::bureau::GradeCriterion;
use zkgrade_protocol::{
    CreditBureau, CreditGradeToken, EligibilityEvaluator, EligibilityReport, IssuanceError,
    IssuanceOrchestrator, LoanDecision, LoanRequest, ProofCommitment, TokenStatus,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The issuance pipeline. Cheap to clone; the registry is shared.
    pub orchestrator: IssuanceOrchestrator,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/loan-requests", post(loan_request_handler))
        .route("/credit-criteria", get(criteria_handler))
        .route("/tokens/:customer_id/:holder_address", get(token_status_handler))
        .route(
            "/tokens/:customer_id/:holder_address/invalidate",
            post(invalidate_handler),
        )
        .route(
            "/tokens/:customer_id/:holder_address/eligibility",
            get(eligibility_handler),
        )
        .route("/proofs/verify", post(verify_proof_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response body for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub protocol_version: String,
    pub proof_backend: String,
    pub issuer: String,
    pub validity_period: String,
    pub tokens_stored: u64,
    pub live_tokens: u64,
    pub timestamp: String,
}

/// Response body for `GET /tokens/:customer_id/:holder_address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenStatusResponse {
    /// `valid`, `expired` or `invalidated`.
    pub status: String,
    pub token: CreditGradeToken,
}

/// Response body for `POST /tokens/:customer_id/:holder_address/invalidate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub token_id: String,
    pub invalidated: bool,
}

/// Query string for the eligibility endpoint.
#[derive(Debug, Deserialize)]
pub struct EligibilityQuery {
    /// Address presenting the token.
    pub address: String,
    /// Requested loan amount.
    pub amount: u64,
}

/// Response body for the eligibility endpoint.
///
/// A token that is not live is never eligible, whatever the ownership and
/// limit checks say.
#[derive(Debug, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub status: String,
    #[serde(flatten)]
    pub report: EligibilityReport,
}

/// Response body for `POST /proofs/verify`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyProofResponse {
    pub proof_id: String,
    pub is_valid: bool,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// HTTP wrapper around [`IssuanceError`].
#[derive(Debug)]
pub struct ApiError(pub IssuanceError);

impl From<IssuanceError> for ApiError {
    fn from(e: IssuanceError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            IssuanceError::Validation(_) => StatusCode::BAD_REQUEST,
            IssuanceError::NotFound { .. } => StatusCode::NOT_FOUND,
            IssuanceError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            IssuanceError::ProofStructure(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Unwrap a JSON body, turning extractor rejections into validation errors.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError(IssuanceError::Validation(rejection.body_text())))
}

fn token_not_found(customer_id: &str, holder_address: &str) -> Response {
    let body = ErrorResponse {
        error: format!("no token for {} / {}", customer_id, holder_address),
        kind: "not_found".into(),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: node version, backend and registry counts.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.orchestrator.registry();
    let config = state.orchestrator.config();

    Json(StatusResponse {
        version: state.version.clone(),
        protocol_version: zkgrade_protocol::config::PROTOCOL_VERSION.into(),
        proof_backend: state.orchestrator.committer().backend_name().into(),
        issuer: config.issuer_id.clone(),
        validity_period: config.validity_label(),
        tokens_stored: registry.len() as u64,
        live_tokens: registry.live_count() as u64,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /loan-requests`: run the full issuance path and return the decision.
async fn loan_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoanRequest>, JsonRejection>,
) -> Result<Json<LoanDecision>, ApiError> {
    let metrics = &state.metrics;
    metrics.loan_requests_total.inc();
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(e) => {
            metrics.issuance_failures_total.inc();
            return Err(e);
        }
    };
    let started = Instant::now();

    let outcome = state.orchestrator.process_request(&request).await;

    metrics
        .decision_latency_seconds
        .observe(started.elapsed().as_secs_f64());
    metrics
        .tokens_stored
        .set(state.orchestrator.registry().len() as i64);

    match outcome {
        Ok(decision) => {
            metrics.record_decision(&decision);
            Ok(Json(decision))
        }
        Err(e) => {
            metrics.issuance_failures_total.inc();
            Err(e.into())
        }
    }
}

/// `GET /credit-criteria`: score bands, descriptions and limits per grade.
async fn criteria_handler() -> Json<Vec<GradeCriterion>> {
    Json(CreditBureau::criteria())
}

/// `GET /tokens/:customer_id/:holder_address`: 404 when the key has no
/// token, otherwise the token with its status label.
async fn token_status_handler(
    Path((customer_id, holder_address)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let status = state
        .orchestrator
        .registry()
        .status(&customer_id, &holder_address);

    match status.token() {
        Some(token) => Json(TokenStatusResponse {
            status: status.label().into(),
            token: token.clone(),
        })
        .into_response(),
        None => token_not_found(&customer_id, &holder_address),
    }
}

/// `POST /tokens/:customer_id/:holder_address/invalidate`
async fn invalidate_handler(
    Path((customer_id, holder_address)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let registry = state.orchestrator.registry();
    if !registry.invalidate(&customer_id, &holder_address).await {
        return token_not_found(&customer_id, &holder_address);
    }

    match registry.lookup(&customer_id, &holder_address) {
        Some(token) => Json(InvalidateResponse {
            token_id: token.token_id,
            invalidated: !token.valid,
        })
        .into_response(),
        None => token_not_found(&customer_id, &holder_address),
    }
}

/// `GET /tokens/:customer_id/:holder_address/eligibility?address=..&amount=..`
async fn eligibility_handler(
    Path((customer_id, holder_address)): Path<(String, String)>,
    Query(query): Query<EligibilityQuery>,
    State(state): State<AppState>,
) -> Response {
    let status = state
        .orchestrator
        .registry()
        .status(&customer_id, &holder_address);

    let Some(token) = status.token() else {
        return token_not_found(&customer_id, &holder_address);
    };

    let mut report = EligibilityEvaluator::check(token, &query.address, query.amount);
    if !matches!(status, TokenStatus::Live(_)) {
        report.is_eligible = false;
    }

    Json(EligibilityResponse {
        status: status.label().into(),
        report,
    })
    .into_response()
}

/// `POST /proofs/verify`: check a serialized commitment with the active
/// backend.
async fn verify_proof_handler(
    State(state): State<AppState>,
    payload: Result<Json<ProofCommitment>, JsonRejection>,
) -> Result<Json<VerifyProofResponse>, ApiError> {
    let commitment = json_body(payload)?;
    let is_valid = state.orchestrator.committer().verify(&commitment);
    Ok(Json(VerifyProofResponse {
        proof_id: commitment.proof_id,
        is_valid,
    }))
}
