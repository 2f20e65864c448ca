#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use campaign_engines::credential::AccessGrant;
use campaign_engines::IntakeError;
use campaign_kernel_contracts::admin::AdminAccount;
use campaign_kernel_contracts::analytics::AggregationSnapshot;
use campaign_kernel_contracts::submission::ListQuery;
use chrono::Utc;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use crate::{
    AdapterHealthResponse, AdapterRuntime, AdminView, CreateAdminRequest, DeleteIdsRequest,
    DeletedResponse, MessageResponse, RequestOtpRequest, SubmissionAcceptedResponse, SubmissionForm,
    SubmissionPageResponse, SubmissionView, VerifyOtpRequest,
};

pub type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

/// Multipart bodies carry the receipt plus a handful of short text fields.
const MAX_REQUEST_BYTES: usize = 12 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// HTTP face of `IntakeError`.
#[derive(Debug)]
pub enum ApiError {
    Intake(IntakeError),
    Internal(String),
}

impl From<IntakeError> for ApiError {
    fn from(value: IntakeError) -> Self {
        Self::Intake(value)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Intake(err) => match err {
                IntakeError::PayloadInvalid(_) => StatusCode::BAD_REQUEST,
                IntakeError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                IntakeError::Conflict { .. } => StatusCode::CONFLICT,
                IntakeError::NotFound(_) => StatusCode::NOT_FOUND,
                IntakeError::ChallengeMismatch => StatusCode::BAD_REQUEST,
                IntakeError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                IntakeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                IntakeError::Forbidden(_) => StatusCode::FORBIDDEN,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Intake(IntakeError::Unauthorized(_)) => {
                "Could not validate credentials".to_string()
            }
            Self::Intake(err) => err.to_string(),
            Self::Internal(_) => "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(reason) => error!(%reason, "request failed"),
            Self::Intake(err) if status.is_server_error() => warn!(error = %err, "request failed"),
            Self::Intake(_) => {}
        }
        let mut response = (status, Json(ErrorBody { detail: self.detail() })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert("www-authenticate", HeaderValue::from_static("Bearer"));
        }
        response
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn lock(runtime: &SharedRuntime) -> ApiResult<MutexGuard<'_, AdapterRuntime>> {
    runtime
        .lock()
        .map_err(|_| ApiError::Internal("adapter runtime lock poisoned".to_string()))
}

fn bearer_token(headers: &HeaderMap) -> ApiResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Intake(IntakeError::Unauthorized("missing bearer token")))
}

fn require_admin(runtime: &AdapterRuntime, headers: &HeaderMap) -> ApiResult<AdminAccount> {
    let token = bearer_token(headers)?;
    Ok(runtime.authenticate(token, Utc::now())?)
}

pub fn router(runtime: SharedRuntime) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route(
            "/submissions",
            post(create_submission)
                .get(list_submissions)
                .delete(delete_submissions),
        )
        .route("/submissions/:id", delete(delete_submission))
        .route("/submissions/:id/receipt", get(download_receipt))
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/dashboard/generate-winner", post(generate_winner))
        .route("/auth/request-otp", post(request_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/admins", post(create_admin));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(cors)
        .with_state(runtime)
}

async fn healthz(State(runtime): State<SharedRuntime>) -> ApiResult<Json<AdapterHealthResponse>> {
    Ok(Json(lock(&runtime)?.health_report()))
}

async fn read_submission_form(mut multipart: Multipart) -> ApiResult<SubmissionForm> {
    let mut form = SubmissionForm::default();
    let mut saw_receipt = false;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| IntakeError::PayloadInvalid(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "receipt" {
            form.receipt_filename = field.file_name().unwrap_or_default().to_string();
            form.receipt_bytes = field
                .bytes()
                .await
                .map_err(|err| IntakeError::PayloadInvalid(format!("receipt unreadable: {err}")))?
                .to_vec();
            saw_receipt = true;
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|err| IntakeError::PayloadInvalid(format!("field {name} unreadable: {err}")))?;
        match name.as_str() {
            "name" => form.name = text,
            "email" => form.email = text,
            "mobile" => form.mobile = text,
            "emirates_id" => form.emirates_id = text,
            "emirate" | "region" => form.emirate = text,
            _ => {}
        }
    }
    if !saw_receipt {
        return Err(IntakeError::PayloadInvalid("receipt file is required".to_string()).into());
    }
    Ok(form)
}

async fn create_submission(
    State(runtime): State<SharedRuntime>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmissionAcceptedResponse>)> {
    let form = read_submission_form(multipart).await?;
    let accepted = lock(&runtime)?.submit(form, Utc::now())?;
    Ok((StatusCode::CREATED, Json(accepted)))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    skip: Option<u64>,
    limit: Option<u64>,
    sort_by: Option<String>,
    order: Option<String>,
}

async fn list_submissions(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<SubmissionPageResponse>> {
    let runtime = lock(&runtime)?;
    require_admin(&runtime, &headers)?;
    let query = ListQuery::from_raw(
        params.skip,
        params.limit,
        params.sort_by.as_deref(),
        params.order.as_deref(),
    );
    Ok(Json(runtime.list_submissions(&query)))
}

async fn delete_submissions(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Json(body): Json<DeleteIdsRequest>,
) -> ApiResult<Json<DeletedResponse>> {
    let mut runtime = lock(&runtime)?;
    require_admin(&runtime, &headers)?;
    Ok(Json(runtime.delete_submissions(&body.ids)?))
}

async fn delete_submission(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> ApiResult<Json<DeletedResponse>> {
    let mut runtime = lock(&runtime)?;
    require_admin(&runtime, &headers)?;
    Ok(Json(runtime.delete_submission(id)?))
}

async fn download_receipt(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> ApiResult<Response> {
    let runtime = lock(&runtime)?;
    require_admin(&runtime, &headers)?;
    let opened = runtime.open_receipt(id)?;
    let disposition = HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        opened.stored_name
    ))
    .map_err(|err| ApiError::Internal(format!("bad content-disposition: {err}")))?;
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(opened.content_type)),
            (CONTENT_DISPOSITION, disposition),
        ],
        opened.bytes,
    )
        .into_response())
}

async fn dashboard_stats(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> ApiResult<Json<AggregationSnapshot>> {
    let runtime = lock(&runtime)?;
    require_admin(&runtime, &headers)?;
    Ok(Json(runtime.dashboard_stats()))
}

async fn generate_winner(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> ApiResult<Json<SubmissionView>> {
    let runtime = lock(&runtime)?;
    require_admin(&runtime, &headers)?;
    Ok(Json(runtime.generate_winner(&mut OsRng)?))
}

async fn request_otp(
    State(runtime): State<SharedRuntime>,
    Json(body): Json<RequestOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let (message, pending) = lock(&runtime)?.request_otp(&body.email, Utc::now());
    // Mail delivery blocks on the network; the runtime lock is already released here.
    if let Some(pending) = pending {
        tokio::task::spawn_blocking(move || pending.deliver());
    }
    Ok(Json(message))
}

async fn verify_otp(
    State(runtime): State<SharedRuntime>,
    Json(body): Json<VerifyOtpRequest>,
) -> ApiResult<Json<AccessGrant>> {
    Ok(Json(lock(&runtime)?.verify_otp(
        &body.email,
        &body.otp,
        Utc::now(),
    )?))
}

async fn create_admin(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Json(body): Json<CreateAdminRequest>,
) -> ApiResult<(StatusCode, Json<AdminView>)> {
    let mut runtime = lock(&runtime)?;
    let actor = require_admin(&runtime, &headers)?;
    let created = runtime.create_admin(&actor, &body.email, body.role.as_deref())?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use campaign_engines::notify::{CodeNotifier, MemoryNotifier, NotifyError};
    use std::sync::mpsc;
    use campaign_kernel_contracts::submission::UniqueField;
    use campaign_storage::blob::InMemoryBlobSink;
    use tower::ServiceExt;

    use crate::config::IntakeConfig;

    const ROOT: &str = "root@campaign.ae";
    const BOUNDARY: &str = "XBOUNDARYX";

    fn app() -> (Router, Arc<MemoryNotifier>) {
        let notifier = Arc::new(MemoryNotifier::new());
        (app_with(notifier.clone()), notifier)
    }

    fn app_with(notifier: Arc<dyn CodeNotifier>) -> Router {
        let cfg = IntakeConfig::from_env_var_map(|key| match key {
            "CAMPAIGN_GLOBAL_ADMIN_EMAIL" => Some(ROOT.to_string()),
            "CAMPAIGN_TOKEN_SECRET" => Some("0123456789abcdef0123456789abcdef".to_string()),
            "CAMPAIGN_STORE_PATH" => Some("off".to_string()),
            _ => None,
        })
        .unwrap();
        let runtime =
            AdapterRuntime::new(&cfg, Arc::new(InMemoryBlobSink::new()), notifier).unwrap();
        router(Arc::new(Mutex::new(runtime)))
    }

    /// Holds every delivery until the test sends on the paired channel.
    #[derive(Debug)]
    struct GatedNotifier {
        gate: Mutex<mpsc::Receiver<()>>,
        inner: Arc<MemoryNotifier>,
    }

    impl CodeNotifier for GatedNotifier {
        fn deliver(&self, identity: &str, code: &str) -> Result<(), NotifyError> {
            let _ = self.gate.lock().unwrap().recv();
            self.inner.deliver(identity, code)
        }
    }

    fn request_otp_request() -> Request<Body> {
        Request::post("/api/v1/auth/request-otp")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(format!("{{\"email\":\"{ROOT}\"}}")))
            .unwrap()
    }

    /// Delivery runs on the blocking pool, so the code lands shortly after the response.
    async fn wait_for_code(notifier: &MemoryNotifier) -> String {
        for _ in 0..200 {
            if let Some(code) = notifier.last_code_for(ROOT) {
                return code;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no code delivered to {ROOT}");
    }

    fn multipart_body(fields: &[(&str, &str)], receipt: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = receipt {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"receipt\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn submission_request(receipt: Option<(&str, &[u8])>) -> Request<Body> {
        let body = multipart_body(
            &[
                ("name", "Sam"),
                ("email", "sam@x.com"),
                ("mobile", "0501234567"),
                ("emirates_id", "784-1990-1234567-1"),
                ("emirate", "dubai"),
            ],
            receipt,
        );
        Request::post("/api/v1/submissions")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router, notifier: &MemoryNotifier) -> String {
        let response = app.clone().oneshot(request_otp_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let code = wait_for_code(notifier).await;

        let request = Request::post("/api/v1/auth/verify-otp")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(format!(
                "{{\"email\":\"{ROOT}\",\"otp\":\"{code}\"}}"
            )))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_string()
    }

    #[test]
    fn at_http_01_error_status_mapping() {
        let cases = [
            (IntakeError::PayloadInvalid("x".into()), StatusCode::BAD_REQUEST),
            (IntakeError::UnsupportedType("x".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (
                IntakeError::Conflict {
                    field: UniqueField::Email,
                },
                StatusCode::CONFLICT,
            ),
            (IntakeError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (IntakeError::ChallengeMismatch, StatusCode::BAD_REQUEST),
            (IntakeError::StoreUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (IntakeError::Unauthorized("x"), StatusCode::UNAUTHORIZED),
            (IntakeError::Forbidden("x"), StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn at_http_02_public_intake_then_admin_listing() {
        let (app, notifier) = app();

        let response = app
            .clone()
            .oneshot(submission_request(Some(("r.png", b"png-bytes"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_of(response).await;
        assert_eq!(body["emirate"], "Dubai");
        assert_eq!(body["duplicate_receipt"], false);

        let unauthenticated = app
            .clone()
            .oneshot(Request::get("/api/v1/submissions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

        let token = login(&app, &notifier).await;
        let response = app
            .clone()
            .oneshot(
                Request::get("/api/v1/submissions?sort_by=bogus&limit=5")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = json_of(response).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["name"], "Sam");
    }

    #[tokio::test]
    async fn at_http_03_rejected_receipts_and_missing_file() {
        let (app, _) = app();
        let unsupported = app
            .clone()
            .oneshot(submission_request(Some(("r.exe", b"MZ"))))
            .await
            .unwrap();
        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let missing = app.clone().oneshot(submission_request(None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn at_http_04_bad_otp_gets_uniform_message() {
        let (app, _) = app();
        let request = Request::post("/api/v1/auth/verify-otp")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(format!("{{\"email\":\"{ROOT}\",\"otp\":\"111111\"}}")))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(response).await["detail"], "Invalid or expired OTP");
    }

    #[tokio::test]
    async fn at_http_05_winner_on_empty_ledger_is_not_found() {
        let (app, notifier) = app();
        let token = login(&app, &notifier).await;
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/dashboard/generate-winner")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn at_http_06_stalled_mail_delivery_does_not_hold_the_runtime() {
        let (release, gate) = mpsc::channel();
        let delivered = Arc::new(MemoryNotifier::new());
        let app = app_with(Arc::new(GatedNotifier {
            gate: Mutex::new(gate),
            inner: delivered.clone(),
        }));

        let response = app.clone().oneshot(request_otp_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(delivered.delivery_count(), 0);

        let health = app
            .clone()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(delivered.delivery_count(), 0);

        release.send(()).unwrap();
        assert_eq!(wait_for_code(&delivered).await.len(), 6);
    }
}
