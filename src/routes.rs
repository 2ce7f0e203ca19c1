//! REST adapter over an open handover session.
//!
//! The acting clinician is named by the `x-clinician-id` header and resolved against the
//! roster. Authentication is assumed to happen in front of this service.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use handover_core::{
    ActionItem, Alert, ClinicianId, Clinician, Collaborator, ConfirmationGate, ContingencyPlan,
    ContingencyStatus, DocumentStatus, EditOutcome, EntryId, ErrorKind, Finalization,
    HandoverError, HandoverService, IPassDocument, IllnessSeverity, NewActionItem,
    NewContingencyPlan, Open, Patient, PatientHandover, PatientId, SessionSummary, StaticRoster,
    ValidationError,
};

pub const CLINICIAN_HEADER: &str = "x-clinician-id";

/// Application state shared across REST handlers
#[derive(Clone)]
pub struct AppState {
    pub service: HandoverService<Open>,
    pub roster: Arc<StaticRoster>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(session))
        .route("/session/next", post(next_patient))
        .route("/session/previous", post(previous_patient))
        .route("/connectivity", put(set_connectivity))
        .route("/patients/:id", get(patient))
        .route("/patients/:id/severity", put(set_severity))
        .route("/patients/:id/summary", put(set_summary))
        .route("/patients/:id/situation", put(set_situation))
        .route("/patients/:id/synthesis", put(set_synthesis))
        .route("/patients/:id/actions", post(add_action))
        .route("/patients/:id/actions/:entry/toggle", post(toggle_action))
        .route(
            "/patients/:id/actions/:entry",
            axum::routing::delete(delete_action),
        )
        .route("/patients/:id/contingencies", post(add_contingency))
        .route(
            "/patients/:id/contingencies/:entry/status",
            put(set_contingency_status),
        )
        .route(
            "/patients/:id/contingencies/:entry",
            axum::routing::delete(delete_contingency),
        )
        .route("/patients/:id/checklist/:item", put(check_item))
        .route("/patients/:id/finalize", post(finalize))
        .route("/patients/:id/alerts", get(alerts))
        .route("/patients/:id/collaborators", get(collaborators))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

/// Error responses, rendered as `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    Handover(HandoverError),
}

impl From<HandoverError> for ApiError {
    fn from(err: HandoverError) -> Self {
        Self::Handover(err)
    }
}

fn status_for(err: &HandoverError) -> StatusCode {
    match err {
        HandoverError::Validation(
            ValidationError::UnknownPatient(_)
            | ValidationError::UnknownEntry(_)
            | ValidationError::UnknownChecklistItem(_),
        ) => StatusCode::NOT_FOUND,
        _ => match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Permission => StatusCode::FORBIDDEN,
            ErrorKind::NotReady
            | ErrorKind::AlreadyFinalized
            | ErrorKind::FinalizeInProgress => StatusCode::CONFLICT,
            ErrorKind::Sync | ErrorKind::Finalize | ErrorKind::PatientData => {
                StatusCode::BAD_GATEWAY
            }
            ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn error_code(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::Permission => "permission",
        ErrorKind::NotReady => "not_ready",
        ErrorKind::AlreadyFinalized => "already_finalized",
        ErrorKind::FinalizeInProgress => "finalize_in_progress",
        ErrorKind::Sync => "sync",
        ErrorKind::Finalize => "finalize",
        ErrorKind::PatientData => "patient_data",
        ErrorKind::Config => "config",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "unauthorized", message),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            Self::Handover(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::error!("Handover error: {:?}", err);
                }
                (status, error_code(err.kind()), err.to_string())
            }
        };
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Extractors
// ============================================================================

/// The clinician named by the `x-clinician-id` header.
pub struct Actor(pub Clinician);

#[axum::async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let raw = parts
            .headers
            .get(CLINICIAN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {CLINICIAN_HEADER} header")))?;
        let id = ClinicianId::parse(raw.trim())
            .map_err(|e| ApiError::Unauthorized(format!("{CLINICIAN_HEADER}: {e}")))?;
        let clinician = state
            .roster
            .clinician(&id)
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized(format!("unknown clinician {id}")))?;
        Ok(Actor(clinician))
    }
}

fn patient_id(raw: &str) -> ApiResult<PatientId> {
    PatientId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn entry_id(raw: &str) -> ApiResult<EntryId> {
    raw.parse()
        .map_err(|e: handover_core::IdError| ApiError::BadRequest(e.to_string()))
}

// ============================================================================
// Request and response bodies
// ============================================================================

#[derive(Serialize)]
pub struct PatientView {
    pub patient: Patient,
    pub status: DocumentStatus,
    pub ready: bool,
    pub document: IPassDocument,
    pub gate: ConfirmationGate,
}

impl From<PatientHandover> for PatientView {
    fn from(h: PatientHandover) -> Self {
        Self {
            status: h.document.status(),
            ready: h.gate.is_ready(),
            patient: h.patient,
            document: h.document,
            gate: h.gate,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeverityReq {
    pub severity: IllnessSeverity,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextReq {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusReq {
    pub status: ContingencyStatus,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckReq {
    pub checked: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectivityReq {
    pub online: bool,
}

#[derive(Serialize)]
pub struct CreatedRes {
    pub id: EntryId,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn session(State(state): State<AppState>) -> Json<SessionSummary> {
    Json(state.service.summary().await)
}

async fn next_patient(State(state): State<AppState>) -> Json<Option<PatientView>> {
    Json(state.service.next().await.map(PatientView::from))
}

async fn previous_patient(State(state): State<AppState>) -> Json<Option<PatientView>> {
    Json(state.service.previous().await.map(PatientView::from))
}

async fn set_connectivity(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityReq>,
) -> StatusCode {
    state.service.set_online(req.online).await;
    StatusCode::NO_CONTENT
}

async fn patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PatientView>> {
    let handover = state.service.handover(&patient_id(&id)?).await?;
    Ok(Json(handover.into()))
}

async fn set_severity(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(req): Json<SeverityReq>,
) -> ApiResult<Json<EditOutcome>> {
    let outcome = state
        .service
        .set_illness_severity(&patient_id(&id)?, actor.id, req.severity)
        .await?;
    Ok(Json(outcome))
}

async fn set_summary(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(req): Json<TextReq>,
) -> ApiResult<Json<EditOutcome>> {
    let outcome = state
        .service
        .set_patient_summary(&patient_id(&id)?, actor.id, &req.text)
        .await?;
    Ok(Json(outcome))
}

async fn set_situation(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(req): Json<TextReq>,
) -> ApiResult<Json<EditOutcome>> {
    let outcome = state
        .service
        .set_situation_narrative(&patient_id(&id)?, actor.id, &req.text)
        .await?;
    Ok(Json(outcome))
}

async fn set_synthesis(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(req): Json<TextReq>,
) -> ApiResult<Json<EditOutcome>> {
    let outcome = state
        .service
        .set_synthesis(&patient_id(&id)?, actor.id, &req.text)
        .await?;
    Ok(Json(outcome))
}

async fn add_action(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(req): Json<NewActionItem>,
) -> ApiResult<(StatusCode, Json<CreatedRes>)> {
    let id = state
        .service
        .add_action(&patient_id(&id)?, &actor, req)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedRes { id })))
}

async fn toggle_action(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, entry)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let completed = state
        .service
        .toggle_action(&patient_id(&id)?, actor.id, &entry_id(&entry)?)
        .await?;
    Ok(Json(json!({ "completed": completed })))
}

async fn delete_action(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, entry)): Path<(String, String)>,
) -> ApiResult<Json<ActionItem>> {
    let removed = state
        .service
        .delete_action(&patient_id(&id)?, actor.id, &entry_id(&entry)?)
        .await?;
    Ok(Json(removed))
}

async fn add_contingency(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(req): Json<NewContingencyPlan>,
) -> ApiResult<(StatusCode, Json<CreatedRes>)> {
    let id = state
        .service
        .add_contingency(&patient_id(&id)?, &actor, req)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedRes { id })))
}

async fn set_contingency_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, entry)): Path<(String, String)>,
    Json(req): Json<StatusReq>,
) -> ApiResult<Json<serde_json::Value>> {
    let changed = state
        .service
        .set_contingency_status(&patient_id(&id)?, actor.id, &entry_id(&entry)?, req.status)
        .await?;
    Ok(Json(json!({ "changed": changed })))
}

async fn delete_contingency(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, entry)): Path<(String, String)>,
) -> ApiResult<Json<ContingencyPlan>> {
    let removed = state
        .service
        .delete_contingency(&patient_id(&id)?, actor.id, &entry_id(&entry)?)
        .await?;
    Ok(Json(removed))
}

async fn check_item(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, item)): Path<(String, String)>,
    Json(req): Json<CheckReq>,
) -> ApiResult<Json<ConfirmationGate>> {
    let patient = patient_id(&id)?;
    state
        .service
        .check_item(&patient, actor.id, &item, req.checked)
        .await?;
    Ok(Json(state.service.gate(&patient).await?))
}

async fn finalize(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<Finalization>> {
    let finalization = state
        .service
        .finalize(&patient_id(&id)?, actor.id)
        .await?;
    Ok(Json(finalization))
}

async fn alerts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Alert>>> {
    Ok(Json(state.service.alerts(&patient_id(&id)?).await?))
}

async fn collaborators(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Collaborator>>> {
    let patient = patient_id(&id)?;
    state.service.handover(&patient).await?;
    Ok(Json(state.service.active_collaborators(&patient).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use handover_core::{CoreConfig, InMemoryPersistence};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const PATIENT: &str = "550e8400e29b41d4a716446655440000";
    const JOHNSON: &str = "1f0e2d3c4b5a69788796a5b4c3d2e1f0";
    const PATEL: &str = "2a1b3c4d5e6f708192a3b4c5d6e7f801";
    const NURSE: &str = "8c7e0a3b5f8d4c2a9e1f0b6d4a2c8e11";

    const ROSTER: &str = r#"staff:
  - id: 8c7e0a3b5f8d4c2a9e1f0b6d4a2c8e11
    name: Nurse Okafor
    role: nurse
patients:
  - id: 550e8400e29b41d4a716446655440000
    name: Maria Rodriguez
    room: PICU-01
    mrn: MRN-004512
    illness_severity: watcher
    assigned_physician:
      id: 1f0e2d3c4b5a69788796a5b4c3d2e1f0
      name: Dr. Johnson
      role: physician
    receiving_physician:
      id: 2a1b3c4d5e6f708192a3b4c5d6e7f801
      name: Dr. Patel
      role: physician
"#;

    fn app() -> Router {
        let roster = Arc::new(StaticRoster::parse(ROSTER).unwrap());
        let cfg = CoreConfig::new("/tmp/handover-test".into(), "Night→Day".parse().unwrap());
        let service = HandoverService::new(Arc::new(cfg), Arc::new(InMemoryPersistence::new()))
            .open(roster.clone())
            .unwrap();
        router(AppState { service, roster })
    }

    fn request(method: &str, uri: &str, actor: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(CLINICIAN_HEADER, actor);
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (status, json) = send(&app(), request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn session_summary_lists_patients() {
        let (status, json) = send(&app(), request("GET", "/session", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_patients"], 1);
        assert_eq!(json["shift"], "Night→Day");
        assert_eq!(json["patients"][0]["status"], "draft");
    }

    #[tokio::test]
    async fn severity_edits_are_limited_to_the_assigned_physician() {
        let app = app();
        let uri = format!("/patients/{PATIENT}/severity");
        let body = serde_json::json!({ "severity": "unstable" });

        let (status, json) = send(&app, request("PUT", &uri, Some(JOHNSON), Some(body.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "applied");

        let (status, json) = send(&app, request("PUT", &uri, Some(PATEL), Some(body))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "permission");

        let (_, json) = send(&app, request("GET", &format!("/patients/{PATIENT}"), None, None)).await;
        assert_eq!(json["document"]["illness_severity"]["content"], "unstable");
    }

    #[tokio::test]
    async fn requests_without_a_known_actor_are_unauthorized() {
        let app = app();
        let uri = format!("/patients/{PATIENT}/summary");
        let body = serde_json::json!({ "text": "Stable overnight" });

        let (status, _) = send(&app, request("PUT", &uri, None, Some(body.clone()))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let stranger = "ffffffffffffffffffffffffffffffff";
        let (status, _) = send(&app, request("PUT", &uri, Some(stranger), Some(body))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_patients_are_not_found() {
        let uri = "/patients/00000000000000000000000000000001";
        let (status, json) = send(&app(), request("GET", uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "validation");

        let (status, _) = send(&app(), request("GET", "/patients/not-an-id", None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn nurse_adds_and_completes_but_cannot_delete_actions() {
        let app = app();
        let uri = format!("/patients/{PATIENT}/actions");
        let body = serde_json::json!({ "task": "Repeat lactate", "priority": "high" });

        let (status, json) = send(&app, request("POST", &uri, Some(NURSE), Some(body))).await;
        assert_eq!(status, StatusCode::CREATED);
        let entry = json["id"].as_str().unwrap().to_string();

        let (status, json) = send(
            &app,
            request("POST", &format!("{uri}/{entry}/toggle"), Some(NURSE), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["completed"], true);

        let (status, _) = send(&app, request("DELETE", &format!("{uri}/{entry}"), Some(NURSE), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn finalize_before_the_checklist_is_complete_conflicts() {
        let app = app();
        let (status, json) = send(
            &app,
            request("POST", &format!("/patients/{PATIENT}/finalize"), Some(PATEL), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "not_ready");

        let (status, json) = send(
            &app,
            request(
                "PUT",
                &format!("/patients/{PATIENT}/checklist/accept-responsibility"),
                Some(PATEL),
                Some(serde_json::json!({ "checked": true })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|i| i["id"] == "accept-responsibility" && i["checked"] == true));
    }

    #[tokio::test]
    async fn connectivity_changes_are_accepted() {
        let (status, _) = send(
            &app(),
            request("PUT", "/connectivity", None, Some(serde_json::json!({ "online": false }))),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
