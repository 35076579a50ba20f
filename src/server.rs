//! nograd HTTP server
//!
//! One endpoint per app screen. Endpoints that act on the signed-in user
//! expect `Authorization: Bearer <session token>`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::accounts::{AccountError, Accounts, SignInRequest, SignUpRequest};
use crate::classifier::{Classifier, GeminiClassifier};
use crate::config::Config;
use crate::identity::{IdentityError, IdentityProvider, IdentityToolkit, MemoryIdentity, Session};
use crate::leaderboard::Leaderboard;
use crate::ledger::{PointTable, PointsLedger};
use crate::news::{NewsApiClient, NewsFeed};
use crate::profile::ProfileService;
use crate::store::{DocumentStore, MemoryStore, PgDocumentStore, StoreError};
use crate::upload::{
    ImageUpload, ServiceFailure, UploadError, UploadOutcome, UploadSubmission, UploadWorkflow,
    DEFAULT_MIME_TYPE,
};

pub struct AppState {
    pub accounts: Accounts,
    pub leaderboard: Leaderboard,
    pub profiles: ProfileService,
    pub uploads: UploadWorkflow,
    pub news: Arc<dyn NewsFeed>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the services over the given collaborators
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        classifier: Arc<dyn Classifier>,
        news: Arc<dyn NewsFeed>,
        points: PointTable,
    ) -> Self {
        let ledger = Arc::new(PointsLedger::with_table(store.clone(), points));
        Self {
            accounts: Accounts::new(identity, store.clone()),
            leaderboard: Leaderboard::new(store.clone()),
            profiles: ProfileService::new(store.clone(), ledger.clone()),
            uploads: UploadWorkflow::new(store, classifier, ledger),
            news,
            started_at: Instant::now(),
        }
    }

    /// Build the production collaborators from configuration.
    ///
    /// Without `DATABASE_URL` documents are kept in memory, and without an
    /// identity API key accounts are kept in memory too. Both are lost on
    /// restart.
    pub async fn from_config(config: &Config, database_url: Option<&str>) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match database_url.filter(|u| !u.is_empty()) {
            Some(url) => {
                let store = PgDocumentStore::new(url).await?;
                info!("PostgreSQL storage initialized");
                Arc::new(store)
            }
            None => {
                warn!("DATABASE_URL not set - using in-memory storage, data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let identity: Arc<dyn IdentityProvider> = if config.identity.api_key.is_empty() {
            warn!("No identity API key - using in-memory accounts");
            Arc::new(MemoryIdentity::new())
        } else {
            Arc::new(IdentityToolkit::new(
                &config.identity.base_url,
                config.identity.api_key.clone(),
            ))
        };

        let classifier: Arc<dyn Classifier> = Arc::new(GeminiClassifier::new(
            &config.classifier.base_url,
            config.classifier.model.clone(),
            config.classifier.api_key.clone(),
            Duration::from_secs(config.classifier.timeout_secs),
        ));

        let news: Arc<dyn NewsFeed> = Arc::new(NewsApiClient::new(config.news.clone()));

        info!(
            "Points per category: open source {}, CP {}, achievements {}, projects {}",
            config.rewards.open_source,
            config.rewards.competitive_programming,
            config.rewards.achievements,
            config.rewards.projects
        );

        Ok(Self::new(store, identity, classifier, news, config.rewards))
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized(String),
    ServiceUnavailable(String),
    /// Contribution stored, points not credited
    LedgerUpdate { record_id: String },
    Internal(String),
}

const LEDGER_UPDATE_MESSAGE: &str = "Your contribution was recorded and verified, but your points could not be updated. Please contact support.";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": msg }))
            }
            ApiError::LedgerUpdate { record_id } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "status": "ledger_update_failed",
                    "error": LEDGER_UPDATE_MESSAGE,
                    "message": LEDGER_UPDATE_MESSAGE,
                    "record_id": record_id,
                    "recorded": true,
                }),
            ),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => {
                warn!("Document store unavailable: {}", msg);
                ApiError::ServiceUnavailable(
                    "Service unavailable. Please try again later.".to_string(),
                )
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Auth(msg) => ApiError::Unauthorized(msg),
            IdentityError::Unavailable(msg) => {
                warn!("Identity provider unavailable: {}", msg);
                ApiError::ServiceUnavailable(
                    "Sign-in is unavailable. Please try again later.".to_string(),
                )
            }
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Missing(field) => ApiError::Validation(format!("{} is required", field)),
            AccountError::Identity(inner) => inner.into(),
            AccountError::Profile(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Persist(inner) => inner.into(),
            UploadError::LedgerUpdate { record_id, source } => {
                error!("Points update failed after recording {}: {}", record_id, source);
                ApiError::LedgerUpdate { record_id }
            }
        }
    }
}

/// Resolve the bearer token to a user id
async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Please login first!".to_string()))?;

    state
        .accounts
        .current_user(token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Session expired. Please login again.".to_string()))
}

// ============================================================================
// ROUTES
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/home", get(home_handler))
        .route("/profile", get(profile_handler))
        .route("/news", get(news_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/contributions/:category", get(contributions_handler))
        .route("/uploads", post(upload_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "healthy": true,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = state.accounts.sign_up(request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state.accounts.sign_in(request).await?;
    Ok(Json(session))
}

async fn home_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let dashboard = state.profiles.dashboard(&user_id).await?;
    Ok(Json(json!({ "dashboard": dashboard })))
}

async fn profile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let profile = state.profiles.profile(&user_id).await?;
    Ok(Json(json!({ "profile": profile })))
}

async fn news_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.news.latest().await {
        Ok(articles) => Ok(Json(json!({ "articles": articles }))),
        Err(e) => {
            warn!("Error fetching news: {}", e);
            Err(ApiError::ServiceUnavailable(
                "News is unavailable right now. Please try again later.".to_string(),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ranking = state.leaderboard.build_ranking(query.limit).await?;
    Ok(Json(json!({ "leaderboard": ranking })))
}

async fn contributions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(category): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let records = state.profiles.contributions(&user_id, &category).await?;
    Ok(Json(json!({ "category": category, "contributions": records })))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub description: String,
    /// Standard base64 image bytes
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl UploadRequest {
    fn into_submission(self) -> Result<UploadSubmission, ApiError> {
        let image = match self.image_base64.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|_| ApiError::Validation("image_base64 is not valid base64".to_string()))?;
                Some(ImageUpload {
                    bytes,
                    mime_type: self
                        .mime_type
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
                    uri: self.image_url,
                })
            }
            _ => None,
        };

        Ok(UploadSubmission {
            image,
            category: self.category,
            language: self.language,
            description: self.description,
        })
    }
}

fn outcome_status(outcome: &UploadOutcome) -> StatusCode {
    match outcome {
        UploadOutcome::Completed { .. } | UploadOutcome::CompletedUnverified { .. } => {
            StatusCode::OK
        }
        UploadOutcome::RejectedValidation { .. } => StatusCode::BAD_REQUEST,
        UploadOutcome::RejectedService {
            reason: ServiceFailure::Unavailable,
        } => StatusCode::SERVICE_UNAVAILABLE,
        UploadOutcome::RejectedService {
            reason: ServiceFailure::UnexpectedResponse,
        } => StatusCode::BAD_GATEWAY,
    }
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let submission = request.into_submission()?;

    let outcome = state.uploads.run(&user_id, submission).await?;
    info!("Upload by {} finished at {:?}", user_id, outcome.stage());

    let mut body = serde_json::to_value(&outcome).map_err(|e| ApiError::Internal(e.to_string()))?;
    body["message"] = json!(outcome.message());
    Ok((outcome_status(&outcome), Json(body)))
}

/// Run the server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting nograd server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, VerificationRequest, Verdict};
    use crate::identity::MemoryIdentity;
    use crate::models::{NewsArticle, CONTRIBUTIONS};
    use crate::news::NewsError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use axum::http::HeaderValue;

    struct FixedClassifier(Verdict);

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(
            &self,
            _request: &VerificationRequest<'_>,
        ) -> Result<Verdict, ClassifierError> {
            Ok(self.0)
        }
    }

    struct OfflineNews;

    #[async_trait]
    impl NewsFeed for OfflineNews {
        async fn latest(&self) -> Result<Vec<NewsArticle>, NewsError> {
            Err(NewsError::Unavailable("dns failure".into()))
        }
    }

    fn state(verdict: Verdict) -> (Arc<MemoryStore>, Arc<AppState>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store.clone(),
            Arc::new(MemoryIdentity::new()),
            Arc::new(FixedClassifier(verdict)),
            Arc::new(OfflineNews),
            PointTable::default(),
        );
        (store, Arc::new(state))
    }

    async fn signed_in(state: &Arc<AppState>) -> (Session, HeaderMap) {
        let (_, Json(session)) = signup_handler(
            State(state.clone()),
            Json(SignUpRequest {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password: "analytical".to_string(),
                ..SignUpRequest::default()
            }),
        )
        .await
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", session.token)).unwrap(),
        );
        (session, headers)
    }

    fn upload_request() -> UploadRequest {
        UploadRequest {
            category: "Open Source".to_string(),
            language: "Rust".to_string(),
            description: "Merged a fix upstream".to_string(),
            image_base64: Some("iVBORw0KGgo=".to_string()),
            image_url: None,
            mime_type: Some("image/png".to_string()),
        }
    }

    #[test]
    fn test_error_statuses() {
        let cases = [
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (
                ApiError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::LedgerUpdate {
                    record_id: "r1".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_ledger_update_body_keeps_record_id() {
        let response = ApiError::LedgerUpdate {
            record_id: "r1".into(),
        }
        .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ledger_update_failed");
        assert_eq!(body["record_id"], "r1");
        assert_eq!(body["recorded"], true);
        assert_eq!(body["message"], LEDGER_UPDATE_MESSAGE);
    }

    #[test]
    fn test_identity_errors_map_to_statuses() {
        let err: ApiError = IdentityError::Auth("EMAIL_EXISTS".into()).into();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "EMAIL_EXISTS"));

        let err: ApiError = IdentityError::Unavailable("timeout".into()).into();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_upload_request_rejects_bad_base64() {
        let request = UploadRequest {
            image_base64: Some("not base64!".to_string()),
            ..upload_request()
        };
        assert!(matches!(
            request.into_submission(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_upload_request_without_image() {
        let request = UploadRequest {
            image_base64: Some("   ".to_string()),
            ..upload_request()
        };
        let submission = request.into_submission().unwrap();
        assert!(submission.image.is_none());
        assert_eq!(submission.missing_fields(), vec!["image"]);
    }

    #[tokio::test]
    async fn test_upload_requires_login() {
        let (store, state) = state(Verdict::Supported);
        let result = upload_handler(State(state), HeaderMap::new(), Json(upload_request())).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
        assert_eq!(store.count(CONTRIBUTIONS), 0);
    }

    #[tokio::test]
    async fn test_upload_and_leaderboard() {
        let (_, state) = state(Verdict::Supported);
        let (session, headers) = signed_in(&state).await;

        let (status, Json(body)) =
            upload_handler(State(state.clone()), headers.clone(), Json(upload_request()))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["points_awarded"], 40);
        assert_eq!(body["message"], "Upload successful! You earned 40 points.");

        let Json(board) = leaderboard_handler(
            State(state.clone()),
            Query(LeaderboardQuery { limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(board["leaderboard"][0]["displayName"], "Ada");
        assert_eq!(board["leaderboard"][0]["points"], 40);
        assert_eq!(board["leaderboard"][0]["rank"], 1);
        assert_eq!(board["leaderboard"][0]["userId"], session.user_id.as_str());

        let Json(profile) = profile_handler(State(state.clone()), headers.clone())
            .await
            .unwrap();
        assert_eq!(profile["profile"]["points"], 40);
        assert_eq!(profile["profile"]["badge"], "BRONZE");

        let Json(progress) = contributions_handler(
            State(state),
            headers,
            Path("Open Source".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(progress["contributions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unverified_upload_status() {
        let (_, state) = state(Verdict::NotSupported);
        let (_, headers) = signed_in(&state).await;

        let (status, Json(body)) =
            upload_handler(State(state), headers, Json(upload_request()))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed_unverified");
    }

    #[tokio::test]
    async fn test_validation_status() {
        let (_, state) = state(Verdict::Supported);
        let (_, headers) = signed_in(&state).await;

        let request = UploadRequest {
            description: String::new(),
            ..upload_request()
        };
        let (status, Json(body)) = upload_handler(State(state), headers, Json(request))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["missing"][0], "description");
    }

    #[tokio::test]
    async fn test_news_unavailable() {
        let (_, state) = state(Verdict::Supported);
        let result = news_handler(State(state)).await;
        assert!(matches!(result, Err(ApiError::ServiceUnavailable(_))));
    }
}
