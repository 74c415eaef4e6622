// Merchant Portal - REST API with Axum
//
// Transport mapping only: resolve the bearer actor, parse the id and body,
// call the workflow, translate its error kinds into status codes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::{bearer_token, ActorResolver};
use crate::db::Event;
use crate::entities::{Actor, MerchantId, MerchantView};
use crate::store::StoreError;
use crate::validation::{MerchantDraftRequest, SetStatusRequest, ValidationError};
use crate::workflow::{RegistrationStatusWorkflow, WorkflowError};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<RegistrationStatusWorkflow>,
    pub actors: Arc<dyn ActorResolver>,
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
}

impl<T> ApiResponse<T> {
    fn ok(message: &str, data: T) -> Self {
        Self {
            message: message.to_string(),
            data: Some(data),
            errors: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    /// Missing or unknown bearer credential
    Unauthenticated,
    InvalidId,
    InvalidBody(Vec<ValidationError>),
    Workflow(WorkflowError),
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Workflow(WorkflowError::Storage(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(vec![ValidationError {
            field: "body".to_string(),
            message: rejection.body_text(),
        }])
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::InvalidId => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid ID".to_string()),
            ApiError::InvalidBody(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Validation error".to_string())
            }
            ApiError::Workflow(err) => match err {
                WorkflowError::NotFound(_) => (StatusCode::NOT_FOUND, "Merchant not found".to_string()),
                WorkflowError::Unauthorized(_) | WorkflowError::IllegalTransition { .. } => {
                    (StatusCode::UNAUTHORIZED, err.to_string())
                }
                WorkflowError::Storage(e) if e.is_conflict() => (StatusCode::CONFLICT, err.to_string()),
                WorkflowError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            error!(error = ?self, "request failed");
        } else {
            warn!(%status, %message, "request rejected");
        }

        let errors = match self {
            ApiError::InvalidBody(errors) => Some(errors),
            _ => None,
        };

        let body = ApiResponse::<()> {
            message,
            data: None,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Actor, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or(ApiError::Unauthenticated)?;

    state.actors.resolve(token)?.ok_or(ApiError::Unauthenticated)
}

fn parse_id(raw: &str) -> Result<MerchantId, ApiError> {
    raw.parse::<MerchantId>().map_err(|_| ApiError::InvalidId)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK", ()))
}

/// POST /api/v1/merchants/draft
async fn post_merchant_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<MerchantDraftRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<MerchantView>>), ApiError> {
    let actor = authenticate(&state, &headers)?;
    let Json(request) = body?;
    let draft = request.validate().map_err(ApiError::InvalidBody)?;

    let merchant = state.workflow.submit_draft(&actor, draft)?;
    info!(merchant_id = merchant.id, actor_id = actor.id, "merchant drafted");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Drafting Merchant Successful", merchant)),
    ))
}

/// GET /api/v1/merchants/:id
async fn get_merchant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MerchantView>>, ApiError> {
    authenticate(&state, &headers)?;
    let id = parse_id(&id)?;

    let merchant = state.workflow.get_merchant(id)?;
    Ok(Json(ApiResponse::ok("OK", merchant)))
}

/// GET /api/v1/merchants/:id/audit-logs
async fn get_audit_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Event>>>, ApiError> {
    authenticate(&state, &headers)?;
    let id = parse_id(&id)?;

    let events = state.workflow.audit_trail(id)?;
    Ok(Json(ApiResponse::ok("OK", events)))
}

/// PUT /api/v1/merchants/:id/ready-to-review
async fn put_ready_to_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MerchantView>>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let id = parse_id(&id)?;

    let merchant = state.workflow.submit_for_review(id, &actor)?;
    info!(merchant_id = id, actor_id = actor.id, "status updated to review");

    Ok(Json(ApiResponse::ok("Status Updated to Review", merchant)))
}

/// PUT /api/v1/merchants/:id/registration-status
async fn put_registration_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MerchantView>>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let id = parse_id(&id)?;
    let Json(request) = body?;
    let change = request.validate().map_err(ApiError::InvalidBody)?;

    let merchant = state
        .workflow
        .set_registration_status(id, &actor, change.status, change.reason)?;
    info!(merchant_id = id, actor_id = actor.id, status = %merchant.registration_status, "status updated");

    Ok(Json(ApiResponse::ok("Status Updated", merchant)))
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/merchants/draft", post(post_merchant_draft))
        .route("/merchants/:id", get(get_merchant))
        .route("/merchants/:id/audit-logs", get(get_audit_logs))
        .route("/merchants/:id/ready-to-review", put(put_ready_to_review))
        .route("/merchants/:id/registration-status", put(put_registration_status))
        .with_state(state);

    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticActorResolver;
    use crate::entities::merchant::tests::sample_new_merchant;
    use crate::entities::{ActorId, Merchant, NewMerchant, RegistrationStatus};
    use crate::store::{InMemoryMerchantStore, MerchantStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TOKEN_1: &str = "test1-token";
    const TOKEN_2: &str = "test2-token";

    fn app_over(store: Arc<dyn MerchantStore>) -> Router {
        let actors = StaticActorResolver::new()
            .with_actor(TOKEN_1, Actor::new(1, "Test One", "one@example.com"))
            .with_actor(TOKEN_2, Actor::new(2, "Test Two", "two@example.com"));

        let state = AppState {
            workflow: Arc::new(RegistrationStatusWorkflow::new(store)),
            actors: Arc::new(actors),
        };
        router(state)
    }

    fn setup() -> (InMemoryMerchantStore, Router) {
        let store = InMemoryMerchantStore::new();
        let app = app_over(Arc::new(store.clone()));
        (store, app)
    }

    /// Store whose saves always fail with the error `fail` builds
    struct FailingStore {
        inner: InMemoryMerchantStore,
        fail: fn(&Merchant) -> StoreError,
    }

    impl MerchantStore for FailingStore {
        fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, StoreError> {
            self.inner.find_by_id(id)
        }

        fn insert(&self, data: NewMerchant, created_by: ActorId) -> Result<Merchant, StoreError> {
            self.inner.insert(data, created_by)
        }

        fn save(&self, merchant: &Merchant, _changed_by: ActorId) -> Result<Merchant, StoreError> {
            Err((self.fail)(merchant))
        }

        fn audit_trail(&self, id: MerchantId) -> Result<Vec<Event>, StoreError> {
            self.inner.audit_trail(id)
        }
    }

    fn failing_app(fail: fn(&Merchant) -> StoreError) -> (InMemoryMerchantStore, MerchantId, Router) {
        let inner = InMemoryMerchantStore::new();
        let merchant = inner.insert(sample_new_merchant(), 1).unwrap();
        let app = app_over(Arc::new(FailingStore {
            inner: inner.clone(),
            fail,
        }));
        (inner, merchant.id, app)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn approve_body() -> Value {
        json!({
            "registration_status": "Approved",
            "registration_status_reason": "Approved Merchant"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (_store, app) = setup();
        let (status, body) = send(app, request("GET", "/api/health", None, None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OK");
    }

    #[tokio::test]
    async fn test_reviewer_sets_status() {
        let (store, app) = setup();
        let merchant = store.insert(sample_new_merchant(), 1).unwrap();

        let uri = format!("/api/v1/merchants/{}/registration-status", merchant.id);
        let (status, body) = send(app, request("PUT", &uri, Some(TOKEN_2), Some(approve_body()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Status Updated");
        assert_eq!(body["data"]["id"], merchant.id);
        assert_eq!(body["data"]["registration_status"], "Approved");
        assert_eq!(body["data"]["registration_status_reason"], "Approved Merchant");
        assert!(body["data"].get("created_by").is_none());

        let stored = store.find_by_id(merchant.id).unwrap().unwrap();
        assert_eq!(stored.registration_status, RegistrationStatus::Approved);
    }

    #[tokio::test]
    async fn test_drafter_cannot_set_status() {
        let (store, app) = setup();
        let merchant = store.insert(sample_new_merchant(), 1).unwrap();

        let uri = format!("/api/v1/merchants/{}/registration-status", merchant.id);
        let (status, body) = send(app, request("PUT", &uri, Some(TOKEN_1), Some(approve_body()))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Same Hub User cannot do both Submitting and Review Checking");

        let stored = store.find_by_id(merchant.id).unwrap().unwrap();
        assert_eq!(stored.registration_status, RegistrationStatus::Draft);
    }

    #[tokio::test]
    async fn test_ready_to_review() {
        let (store, app) = setup();
        let merchant = store.insert(sample_new_merchant(), 1).unwrap();

        let uri = format!("/api/v1/merchants/{}/ready-to-review", merchant.id);
        let (status, body) = send(app.clone(), request("PUT", &uri, Some(TOKEN_1), None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Status Updated to Review");
        assert_eq!(body["data"]["registration_status"], "Review");
        assert_eq!(body["data"]["registration_status_reason"], "Ready to Review");
        assert!(body["data"].get("created_by").is_none());

        // second attempt: no longer a draft
        let (status, body) = send(app, request("PUT", &uri, Some(TOKEN_1), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Only Draft Merchant can be marked as Review");
    }

    #[tokio::test]
    async fn test_ready_to_review_by_other_actor() {
        let (store, app) = setup();
        let merchant = store.insert(sample_new_merchant(), 1).unwrap();

        let uri = format!("/api/v1/merchants/{}/ready-to-review", merchant.id);
        let (status, body) = send(app, request("PUT", &uri, Some(TOKEN_2), None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["message"],
            "Only the Hub User who submitted the Draft Merchant can mark it as Review"
        );
    }

    #[tokio::test]
    async fn test_missing_or_unknown_token() {
        let (store, app) = setup();
        let merchant = store.insert(sample_new_merchant(), 1).unwrap();
        let uri = format!("/api/v1/merchants/{}/ready-to-review", merchant.id);

        let (status, body) = send(app.clone(), request("PUT", &uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");

        let (status, _) = send(app, request("PUT", &uri, Some("forged"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_not_found_and_invalid_id() {
        let (_store, app) = setup();

        let (status, body) = send(
            app.clone(),
            request("PUT", "/api/v1/merchants/404/registration-status", Some(TOKEN_2), Some(approve_body())),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Merchant not found");

        let (status, body) = send(
            app,
            request("PUT", "/api/v1/merchants/abc/ready-to-review", Some(TOKEN_1), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Invalid ID");
    }

    #[tokio::test]
    async fn test_invalid_status_body() {
        let (store, app) = setup();
        let merchant = store.insert(sample_new_merchant(), 1).unwrap();
        let uri = format!("/api/v1/merchants/{}/registration-status", merchant.id);

        let body = json!({ "registration_status": "Pending", "registration_status_reason": "" });
        let (status, body) = send(app.clone(), request("PUT", &uri, Some(TOKEN_2), Some(body))).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);

        let unknown_field = json!({
            "registration_status": "Approved",
            "registration_status_reason": "ok",
            "created_by": 2
        });
        let (status, _) = send(app, request("PUT", &uri, Some(TOKEN_2), Some(unknown_field))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_draft_then_audit_logs() {
        let (_store, app) = setup();

        let draft = json!({
            "dba_trading_name": "Test Merchant 1",
            "registered_name": "Test Merchant 1",
            "employees_num": "1 - 5",
            "monthly_turnover": "0.5",
            "currency_code": "USD",
            "category_code": "01110",
            "merchant_type": "Individual",
            "payinto_alias": "P33",
            "license_number": "007"
        });
        let (status, body) = send(
            app.clone(),
            request("POST", "/api/v1/merchants/draft", Some(TOKEN_1), Some(draft)),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Drafting Merchant Successful");
        assert_eq!(body["data"]["registration_status"], "Draft");
        assert!(body["data"].get("created_by").is_none());
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send(
            app.clone(),
            request("GET", &format!("/api/v1/merchants/{}", id), Some(TOKEN_2), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["dba_trading_name"], "Test Merchant 1");

        let (status, body) = send(
            app,
            request("GET", &format!("/api/v1/merchants/{}/audit-logs", id), Some(TOKEN_2), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["event_type"], "merchant_drafted");
    }

    #[tokio::test]
    async fn test_invalid_draft() {
        let (store, app) = setup();

        let draft = json!({ "dba_trading_name": "", "currency_code": "dollars" });
        let (status, body) = send(
            app,
            request("POST", "/api/v1/merchants/draft", Some(TOKEN_1), Some(draft)),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"].as_array().unwrap().len() >= 2);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_conflict_maps_to_409() {
        let (inner, id, app) = failing_app(|merchant| StoreError::Conflict {
            id: merchant.id,
            expected_version: merchant.version,
        });

        let uri = format!("/api/v1/merchants/{}/registration-status", id);
        let (status, body) = send(app.clone(), request("PUT", &uri, Some(TOKEN_2), Some(approve_body()))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["message"].as_str().unwrap().contains("modified concurrently"));

        let uri = format!("/api/v1/merchants/{}/ready-to-review", id);
        let (status, _) = send(app, request("PUT", &uri, Some(TOKEN_1), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let stored = inner.find_by_id(id).unwrap().unwrap();
        assert_eq!(stored.registration_status, RegistrationStatus::Draft);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_500_without_detail() {
        let (inner, id, app) = failing_app(|_| StoreError::Poisoned);

        let uri = format!("/api/v1/merchants/{}/registration-status", id);
        let (status, body) = send(app, request("PUT", &uri, Some(TOKEN_2), Some(approve_body()))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("data").is_none());
        assert!(!body.to_string().to_lowercase().contains("poisoned"));

        let stored = inner.find_by_id(id).unwrap().unwrap();
        assert_eq!(stored.registration_status, RegistrationStatus::Draft);
    }

    #[tokio::test]
    async fn test_reviewer_sends_approved_merchant_back_to_draft() {
        let (store, app) = setup();
        let merchant = store.insert(sample_new_merchant(), 1).unwrap();
        let uri = format!("/api/v1/merchants/{}/registration-status", merchant.id);

        let (status, _) = send(app.clone(), request("PUT", &uri, Some(TOKEN_2), Some(approve_body()))).await;
        assert_eq!(status, StatusCode::OK);

        let revert = json!({
            "registration_status": "Draft",
            "registration_status_reason": "Reverted"
        });
        let (status, body) = send(app, request("PUT", &uri, Some(TOKEN_2), Some(revert))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["registration_status"], "Draft");
        assert_eq!(body["data"]["registration_status_reason"], "Reverted");
    }
}
