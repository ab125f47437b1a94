#[cfg(test)]
#[path = "server_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::application::assets;
use crate::configuration::Config;
use crate::domain::models::Credentials;
use crate::domain::models::GenerationError;
use crate::domain::models::GeneratorBox;
use crate::domain::models::Language;
use crate::domain::models::Prompt;
use crate::domain::models::SessionState;
use crate::domain::services::MemorySessionStore;
use crate::domain::services::SessionManager;
use crate::infrastructure::backends::BackendManager;

pub const SESSION_COOKIE: &str = "agrichat_session";

const LOGIN_FIELDS_REQUIRED: &str = "Email and password required";
const MESSAGE_REQUIRED: &str = "Message is required";
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Everything a request can fail with. The display text is exactly what the
/// client receives in `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not found")]
    NotFound,

    #[error("An error occurred: {0}")]
    Generation(#[from] GenerationError),

    #[error("An error occurred: sessions are unavailable")]
    Session(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => return StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => return StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => return StatusCode::UNAUTHORIZED,
            ApiError::NotFound => return StatusCode::NOT_FOUND,
            ApiError::Generation(_) => return StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Session(_) => return StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Generation(err) => {
                tracing::error!(error = ?err, "Generation request failed");
            }
            ApiError::Session(err) => {
                tracing::error!(error = ?err, "Session store failed");
            }
            _ => {
                tracing::debug!(error = %self, "Request rejected");
            }
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };

        return (self.status(), Json(body)).into_response();
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    success: bool,
    email: String,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
struct CheckLoginResponse {
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AskRequest {
    message: String,
    /// Anything other than a string falls back to the default language.
    language: Option<Value>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
}

/// Shared, read only handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<Credentials>,
    pub sessions: Arc<SessionManager>,
    pub generator: GeneratorBox,
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    return headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| return value.to_str().ok())
        .flat_map(|value| return value.split(';'))
        .filter_map(|pair| return pair.trim().split_once('='))
        .find(|(name, _)| return *name == SESSION_COOKIE)
        .map(|(_, value)| return value.to_string());
}

fn set_session_cookie(value: &str, max_age: Duration) -> Result<HeaderValue, ApiError> {
    return HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={value}; Max-Age={max_age}; HttpOnly; SameSite=Lax; Path=/",
        max_age = max_age.as_secs()
    ))
    .map_err(|err| return ApiError::Session(err.into()));
}

fn clear_session_cookie() -> HeaderValue {
    return HeaderValue::from_static("agrichat_session=; Max-Age=0; HttpOnly; SameSite=Lax; Path=/");
}

async fn index() -> Result<Response, ApiError> {
    return assets::get(assets::INDEX).ok_or(ApiError::NotFound);
}

async fn static_asset(Path(path): Path<String>) -> Result<Response, ApiError> {
    return assets::get(&path).ok_or(ApiError::NotFound);
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(_) => return Err(ApiError::Validation(LOGIN_FIELDS_REQUIRED)),
    };

    let email = payload.email.trim();
    let password = payload.password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation(LOGIN_FIELDS_REQUIRED));
    }

    if !state.credentials.verify(email, password) {
        tracing::info!("Rejected sign in attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let cookie = state
        .sessions
        .login(session_cookie(&headers).as_deref(), email)
        .await
        .map_err(ApiError::Session)?;

    tracing::info!(email = email, "User signed in");

    let body = LoginResponse {
        success: true,
        email: email.to_string(),
    };

    return Ok((
        [(header::SET_COOKIE, set_session_cookie(&cookie, state.sessions.ttl())?)],
        Json(body),
    )
        .into_response());
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    state
        .sessions
        .logout(session_cookie(&headers).as_deref())
        .await
        .map_err(ApiError::Session)?;

    return Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(SuccessResponse { success: true }),
    )
        .into_response());
}

async fn check_login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CheckLoginResponse>, ApiError> {
    let session = state
        .sessions
        .current(session_cookie(&headers).as_deref())
        .await
        .map_err(ApiError::Session)?;

    let res = match session {
        SessionState::Authenticated(email) => CheckLoginResponse {
            logged_in: true,
            email: Some(email),
        },
        SessionState::Anonymous => CheckLoginResponse {
            logged_in: false,
            email: None,
        },
    };

    return Ok(Json(res));
}

async fn ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let session = state
        .sessions
        .current(session_cookie(&headers).as_deref())
        .await
        .map_err(ApiError::Session)?;

    let email = match session {
        SessionState::Authenticated(email) => email,
        SessionState::Anonymous => return Err(ApiError::Unauthorized),
    };

    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(_) => return Err(ApiError::Validation(MESSAGE_REQUIRED)),
    };

    let message = payload.message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation(MESSAGE_REQUIRED));
    }

    let language = Language::resolve(
        payload
            .language
            .as_ref()
            .and_then(|e| return e.as_str())
            .unwrap_or("en"),
    );
    let prompt = Prompt::build(message, &language.to_string());

    tracing::debug!(
        email = email,
        language = language.code(),
        model = state.generator.model(),
        "Asking model"
    );

    let text = state.generator.generate(&prompt).await?;

    return Ok(Json(AskResponse { response: text }));
}

pub fn router(state: AppState) -> Router {
    return Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/check-login", get(check_login))
        .route("/ask", post(ask))
        .route("/{*path}", get(static_asset))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?err, "Unable to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutting down");
}

/// Connects to Gemini, then serves until interrupted. Fails before binding
/// when no model can be configured.
pub async fn start(config: Config) -> Result<()> {
    if config.uses_default_secret_key() {
        tracing::warn!(
            "Session cookies are signed with the development secret key. Set AGRICHAT_SECRET_KEY before serving real users."
        );
    }

    let generator = BackendManager::connect(&config).await?;

    let credentials = match config.credentials.clone() {
        Some(entries) => Credentials::new(entries),
        None => Credentials::default(),
    };

    let sessions = SessionManager::new(
        Arc::new(MemorySessionStore::new(config.session_ttl)),
        &config.secret_key,
    )?;
    sessions.spawn_sweeper(SESSION_SWEEP_INTERVAL);

    tracing::info!(
        accounts = credentials.len(),
        model = generator.model(),
        "Starting agrichat"
    );

    let state = AppState {
        credentials: Arc::new(credentials),
        sessions: Arc::new(sessions),
        generator,
    };

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| return format!("Failed to bind {}:{}", config.host, config.port))?;
    tracing::info!(address = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    return Ok(());
}
