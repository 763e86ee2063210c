use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use report_flow::{Authenticator, FlowError, InMemorySessionStorage, Session, SessionStorage};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{
    ChatEnterRequest, ChatQueryRequest, ChatResponse, GenerateReportRequest,
    GenerateReportResponse, LoginRequest, LoginResponse, LogoutRequest, PatientForm,
    ReportArtifact, ReportState, SessionStatusResponse, SignupRequest, session_keys,
};
use crate::orchestrator::AnalysisOrchestrator;
use crate::pipeline::{CaptionService, ReportArchiver, ReportComposer};
use crate::providers::{
    FirebaseAuthenticator, FirebaseBlobStore, FirebaseRecordStore, HtmlReportRenderer,
    OpenRouterCaptioner, OpenRouterChatModel,
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn auth_error(details: &str) -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "Authentication failed",
            "details": details
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

/// Every fatal failure names the step that failed.
fn flow_error(e: FlowError) -> ApiError {
    match e {
        FlowError::SessionNotFound(id) => not_found_error("Session not found", &id),
        FlowError::AuthFailure(details) => auth_error(&details),
        FlowError::TemplateFailure(details) | FlowError::RenderFailure(details) => {
            internal_error("Report rendering failed", &details)
        }
        FlowError::UploadFailure(details) => internal_error("Report upload failed", &details),
        FlowError::ExtractionFailure(details) => {
            internal_error("Report text extraction failed", &details)
        }
        FlowError::ChatCallFailure(details) => internal_error("Chat model call failed", &details),
        other => internal_error("Request failed", &other.to_string()),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub authenticator: Arc<dyn Authenticator>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

pub async fn create_app() -> Router {
    let app_state = create_app_state().await;
    build_router(app_state)
}

async fn create_app_state() -> AppState {
    let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());

    let authenticator = Arc::new(FirebaseAuthenticator::from_env().unwrap_or_else(|e| {
        error!("Failed to configure authenticator: {}", e);
        std::process::exit(1);
    }));
    let captioner = Arc::new(OpenRouterCaptioner::from_env().unwrap_or_else(|e| {
        error!("Failed to configure captioner: {}", e);
        std::process::exit(1);
    }));
    let chat_model = Arc::new(OpenRouterChatModel::from_env().unwrap_or_else(|e| {
        error!("Failed to configure chat model: {}", e);
        std::process::exit(1);
    }));
    let blob_store = Arc::new(FirebaseBlobStore::from_env().unwrap_or_else(|e| {
        error!("Failed to configure blob store: {}", e);
        std::process::exit(1);
    }));
    let record_store = Arc::new(FirebaseRecordStore::from_env().unwrap_or_else(|e| {
        error!("Failed to configure record store: {}", e);
        std::process::exit(1);
    }));
    let renderer = Arc::new(
        HtmlReportRenderer::new("templates/*.html").unwrap_or_else(|e| {
            error!("Failed to load report templates: {}", e);
            std::process::exit(1);
        }),
    );

    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        session_storage.clone(),
        CaptionService::new(captioner),
        ReportComposer::new(renderer),
        ReportArchiver::new(blob_store, record_store),
        chat_model,
    ));

    AppState {
        session_storage,
        authenticator,
        orchestrator,
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/reports", post(generate_report))
        .route("/reports/{session_id}/download", get(download_report))
        .route("/chat/enter", post(chat_enter))
        .route("/chat/query", post(chat_query))
        .route("/sessions/{session_id}", get(get_session_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "MRI Report Service",
        "version": "1.0.0",
        "description": "MRI report generation with automatic first-pass analysis and follow-up chat",
        "endpoints": {
            "POST /auth/signup": "Create an account",
            "POST /auth/login": "Authenticate and open a session",
            "POST /auth/logout": "Close a session",
            "POST /reports": "Generate, archive and index a report",
            "GET /reports/{session_id}/download": "Download the current report",
            "POST /chat/enter": "Enter the chat surface (runs the one-time analysis)",
            "POST /chat/query": "Ask a follow-up question",
            "GET /sessions/{session_id}": "Session status",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<Value> {
    validate_credentials(&request.email, &request.password)?;

    match state
        .authenticator
        .signup(&request.email, &request.password)
        .await
    {
        Ok(account) => Ok(Json(json!({
            "user_id": account.user_id,
            "email": account.email,
            "message": "Signup successful. Please login."
        }))),
        Err(FlowError::AuthFailure(details)) => {
            Err(bad_request_error(&format!("Signup failed: {details}")))
        }
        Err(e) => Err(flow_error(e)),
    }
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    validate_credentials(&request.email, &request.password)?;

    let auth = state
        .authenticator
        .login(&request.email, &request.password)
        .await
        .map_err(flow_error)?;

    let session = Session::new(Uuid::new_v4().to_string(), auth.user_id.clone());
    let session_id = session.id.clone();
    state
        .session_storage
        .save(session)
        .await
        .map_err(flow_error)?;

    info!("Session {} opened for user {}", session_id, auth.user_id);
    Ok(Json(LoginResponse {
        session_id,
        user_id: auth.user_id,
        email: auth.email,
    }))
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(bad_request_error("Email and password are required"));
    }
    Ok(())
}

async fn logout(
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> ApiResult<Value> {
    state
        .session_storage
        .delete(&request.session_id)
        .await
        .map_err(flow_error)?;

    info!("Session {} closed", request.session_id);
    Ok(Json(json!({ "status": "logged_out" })))
}

async fn generate_report(
    State(state): State<AppState>,
    Json(request): Json<GenerateReportRequest>,
) -> ApiResult<GenerateReportResponse> {
    if request.name.trim().is_empty() {
        return Err(bad_request_error("Patient name is required"));
    }

    let session_id = request.session_id.clone();
    let form = request.into_form();
    let generated = state
        .orchestrator
        .on_report_submitted(&session_id, form)
        .await
        .map_err(flow_error)?;

    Ok(Json(GenerateReportResponse {
        filename: generated.filename,
        pdf_url: generated.pdf_url,
    }))
}

async fn download_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let session = load_session(&state, &session_id).await?;

    let Some(report) = session
        .context
        .get::<ReportArtifact>(session_keys::REPORT)
        .await
    else {
        return Err(not_found_error("No report generated yet", &session_id));
    };

    let pdf_bytes = STANDARD
        .decode(&report.pdf_base64)
        .map_err(|e| internal_error("Stored report is unreadable", &e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.filename),
            ),
        ],
        pdf_bytes,
    )
        .into_response())
}

async fn chat_enter(
    State(state): State<AppState>,
    Json(request): Json<ChatEnterRequest>,
) -> ApiResult<ChatResponse> {
    let response = state
        .orchestrator
        .on_chat_surface_entered(&request.session_id)
        .await
        .map_err(flow_error)?;

    Ok(Json(ChatResponse { response }))
}

async fn chat_query(
    State(state): State<AppState>,
    Json(request): Json<ChatQueryRequest>,
) -> ApiResult<ChatResponse> {
    if request.content.trim().is_empty() {
        return Err(bad_request_error("Query cannot be empty"));
    }

    let reply = state
        .orchestrator
        .on_user_query(&request.session_id, &request.content)
        .await
        .map_err(flow_error)?;

    Ok(Json(ChatResponse {
        response: Some(reply),
    }))
}

async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionStatusResponse> {
    let session = load_session(&state, &session_id).await?;

    let report = session
        .context
        .get::<ReportArtifact>(session_keys::REPORT)
        .await;
    let analyzed = session
        .context
        .get::<bool>(session_keys::ANALYZED)
        .await
        .unwrap_or(false);
    let form = session
        .context
        .get::<PatientForm>(session_keys::PATIENT_FORM)
        .await;
    let chat_turns = session.context.message_count().await;

    Ok(Json(SessionStatusResponse {
        session_id: session.id.clone(),
        user_id: session.user_id.clone(),
        state: ReportState::derive(report.is_some(), analyzed),
        filename: report.as_ref().map(|r| r.filename.clone()),
        pdf_url: report.as_ref().map(|r| r.pdf_url.clone()),
        chat_turns,
        form,
    }))
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}
