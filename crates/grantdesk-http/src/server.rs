// grantdesk-http/src/server.rs
// ============================================================================
// Module: REST Surface
// Description: Versioned axum routes over the lifecycle engine.
// Purpose: Map HTTP requests to engine and identity operations.
// Dependencies: grantdesk-core, axum, tokio, serde, serde_json
// ============================================================================

//! ## Overview
//! Every route lives under `/api/v1`. Bodies are JSON except proposal
//! submission and revision, which are `multipart/form-data` with a PDF
//! `document` part. All routes except register, login, the password-reset
//! pair, email verification, and health require a bearer session. Engine
//! and identity calls run on the blocking pool; the async handlers only
//! parse requests and shape responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::multipart::MultipartError;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use grantdesk_core::CallForProposal;
use grantdesk_core::CallId;
use grantdesk_core::CallPatch;
use grantdesk_core::DashboardStats;
use grantdesk_core::DocumentStore;
use grantdesk_core::DocumentUpload;
use grantdesk_core::EngineError;
use grantdesk_core::Identity;
use grantdesk_core::LifecycleEngine;
use grantdesk_core::NewCall;
use grantdesk_core::NewProposal;
use grantdesk_core::NewRevision;
use grantdesk_core::Notification;
use grantdesk_core::NotificationId;
use grantdesk_core::Notifier;
use grantdesk_core::Page;
use grantdesk_core::PageRequest;
use grantdesk_core::Proposal;
use grantdesk_core::ProposalFilter;
use grantdesk_core::ProposalId;
use grantdesk_core::ProposalRevision;
use grantdesk_core::ProposalStatus;
use grantdesk_core::ReviewDecision;
use grantdesk_core::Role;
use grantdesk_core::SharedStorage;
use grantdesk_core::Storage;
use grantdesk_core::Timestamp;
use grantdesk_core::User;
use grantdesk_core::UserId;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::auth::IdentityService;
use crate::auth::Registration;
use crate::error::ApiError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default page number when the query omits one.
const DEFAULT_PAGE: u64 = 1;
/// Default page size when the query omits one.
const DEFAULT_LIMIT: u64 = 10;
/// Largest accepted page size.
const MAX_LIMIT: u64 = 100;

// ============================================================================
// SECTION: Application State
// ============================================================================

/// The concrete engine type served by this surface.
pub type AppEngine =
    LifecycleEngine<SharedStorage, Arc<dyn DocumentStore>, Arc<dyn Notifier>>;

/// Shared per-request state behind every handler.
#[derive(Clone)]
pub struct AppState {
    /// Proposal lifecycle engine.
    engine: Arc<AppEngine>,
    /// Identity and session service.
    identity: Arc<IdentityService<SharedStorage>>,
    /// Request body cap in bytes (documents dominate).
    max_body_bytes: usize,
}

impl AppState {
    /// Bundles the engine and identity service for the router.
    #[must_use]
    pub fn new(
        engine: Arc<AppEngine>,
        identity: Arc<IdentityService<SharedStorage>>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            engine,
            identity,
            max_body_bytes,
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the `/api/v1` router over the given state.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    let api = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(current_user))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/calls", get(list_calls).post(create_call))
        .route(
            "/calls/{id}",
            get(get_call).put(update_call).delete(delete_call),
        )
        .route("/proposals", get(list_proposals).post(submit_proposal))
        .route(
            "/proposals/{id}",
            get(proposal_detail).put(edit_proposal).delete(delete_proposal),
        )
        .route(
            "/proposals/{id}/revisions",
            get(list_revisions).post(revise_proposal),
        )
        .route("/proposals/{id}/status", put(review_proposal))
        .route("/users/me", get(current_user).put(update_profile))
        .route("/users/me/notifications", get(list_notifications))
        .route(
            "/users/me/notifications/{id}/read",
            put(mark_notification_read),
        )
        .route("/admin/stats", get(admin_stats))
        .route("/admin/proposals", get(admin_proposals))
        .route("/admin/users", get(admin_users))
        .route("/admin/users/{id}/role", put(admin_set_role))
        .with_state(state);
    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// Binds the listener and serves the router until shutdown.
///
/// # Errors
///
/// Returns the bind or accept-loop I/O error.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    log_started(&local);
    let router = build_router(state);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

/// Structured startup event.
#[derive(Serialize)]
struct ServerStartedEvent {
    /// Constant event tag.
    event: &'static str,
    /// Bound listen address.
    addr: String,
}

/// Emits the startup event as one JSON line on stderr.
fn log_started(addr: &SocketAddr) {
    let event = ServerStartedEvent {
        event: "http_server_started",
        addr: addr.to_string(),
    };
    if let Ok(payload) = serde_json::to_string(&event) {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "{payload}");
    }
}

// ============================================================================
// SECTION: Request Plumbing
// ============================================================================

/// Runs a blocking engine or identity call on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ApiError::internal(format!("worker task failed: {err}")))?
}

/// Extracts the raw authorization header value, if present.
fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Rejects non-admin callers.
fn require_admin(identity: &Identity) -> Result<(), ApiError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(ApiError::from(EngineError::Forbidden(
            "admin role required".to_string(),
        )))
    }
}

/// Pagination query parameters shared by every listing route.
#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    /// 1-based page number.
    page: Option<u64>,
    /// Page size.
    limit: Option<u64>,
}

impl PageQuery {
    /// Converts the query into a validated page request.
    fn to_request(&self) -> Result<PageRequest, ApiError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit > MAX_LIMIT {
            return Err(ApiError::validation(format!("limit must be at most {MAX_LIMIT}")));
        }
        PageRequest::new(self.page.unwrap_or(DEFAULT_PAGE), limit)
            .ok_or_else(|| ApiError::validation("page and limit must be positive".to_string()))
    }
}

/// Proposal listing query: pagination plus optional filters.
#[derive(Debug, Default, Deserialize)]
struct ProposalQuery {
    /// 1-based page number.
    page: Option<u64>,
    /// Page size.
    limit: Option<u64>,
    /// Status filter label, for example `UNDER_REVIEW`.
    status: Option<String>,
    /// Restrict to one call.
    call_id: Option<String>,
    /// Case-insensitive term matched against title and abstract.
    search: Option<String>,
}

impl ProposalQuery {
    /// Converts the query into a page request plus filter.
    fn to_parts(&self) -> Result<(PageRequest, ProposalFilter), ApiError> {
        let page = PageQuery {
            page: self.page,
            limit: self.limit,
        }
        .to_request()?;
        let status = match self.status.as_deref() {
            Some(label) => Some(parse_status(label)?),
            None => None,
        };
        let filter = ProposalFilter {
            status,
            call_id: self.call_id.as_deref().map(CallId::new),
            researcher_id: None,
            search_term: self.search.clone(),
        };
        Ok((page, filter))
    }
}

/// Parses a proposal status label, rejecting unknown ones.
fn parse_status(label: &str) -> Result<ProposalStatus, ApiError> {
    ProposalStatus::parse(label)
        .ok_or_else(|| ApiError::validation(format!("unknown proposal status: {label}")))
}

/// Parses a role label, rejecting unknown ones.
fn parse_role(label: &str) -> Result<Role, ApiError> {
    Role::parse(label).ok_or_else(|| ApiError::validation(format!("unknown role: {label}")))
}

// ============================================================================
// SECTION: Views
// ============================================================================

/// A user as returned to clients; never carries the password hash.
#[derive(Debug, Serialize)]
struct UserView {
    /// User identifier.
    id: String,
    /// Display name.
    full_name: String,
    /// Login email.
    email: String,
    /// Role label.
    role: &'static str,
    /// Whether the email address is verified.
    verified: bool,
    /// Creation time in unix milliseconds.
    created_at: i64,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id.as_str().to_string(),
            full_name: user.full_name,
            email: user.email,
            role: user.role.as_str(),
            verified: user.verified,
            created_at: user.created_at.as_millis(),
        }
    }
}

/// A proposal as returned to clients; omits the internal document key.
#[derive(Debug, Serialize)]
struct ProposalView {
    /// Proposal identifier.
    id: String,
    /// Owning researcher.
    researcher_id: String,
    /// Targeted call.
    call_id: String,
    /// Title.
    title: String,
    /// Abstract text.
    #[serde(rename = "abstract")]
    abstract_text: String,
    /// Serving URL of the current document.
    document_url: String,
    /// Status label.
    status: &'static str,
    /// Reason recorded on rejection, absent otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection_reason: Option<String>,
    /// Creation time in unix milliseconds.
    created_at: i64,
}

impl From<Proposal> for ProposalView {
    fn from(proposal: Proposal) -> Self {
        Self {
            id: proposal.id.as_str().to_string(),
            researcher_id: proposal.researcher_id.as_str().to_string(),
            call_id: proposal.call_id.as_str().to_string(),
            title: proposal.title,
            abstract_text: proposal.abstract_text,
            document_url: proposal.document_url,
            status: proposal.status.as_str(),
            rejection_reason: proposal.rejection_reason,
            created_at: proposal.created_at.as_millis(),
        }
    }
}

/// A revision as returned to clients; omits the internal document key.
#[derive(Debug, Serialize)]
struct RevisionView {
    /// Revision identifier.
    id: String,
    /// Owning proposal.
    proposal_id: String,
    /// Serving URL of the revised document.
    revised_document_url: String,
    /// Researcher comments accompanying the revision.
    comments: String,
    /// Submission time in unix milliseconds.
    submitted_at: i64,
}

impl From<ProposalRevision> for RevisionView {
    fn from(revision: ProposalRevision) -> Self {
        Self {
            id: revision.id.as_str().to_string(),
            proposal_id: revision.proposal_id.as_str().to_string(),
            revised_document_url: revision.revised_document_url,
            comments: revision.comments,
            submitted_at: revision.submitted_at.as_millis(),
        }
    }
}

/// One status bucket in the admin dashboard.
#[derive(Debug, Serialize)]
struct StatusCountView {
    /// Status label.
    status: &'static str,
    /// Proposals currently in this status.
    count: u64,
}

/// Admin dashboard counters.
#[derive(Debug, Serialize)]
struct StatsView {
    /// Proposal counts per status.
    proposals_by_status: Vec<StatusCountView>,
    /// Total proposals across all statuses.
    total_proposals: u64,
    /// Calls whose deadline has not passed.
    open_calls: u64,
    /// Registered researcher accounts.
    researchers: u64,
}

impl From<DashboardStats> for StatsView {
    fn from(stats: DashboardStats) -> Self {
        Self {
            proposals_by_status: stats
                .proposals_by_status
                .into_iter()
                .map(|(status, count)| StatusCountView {
                    status: status.as_str(),
                    count,
                })
                .collect(),
            total_proposals: stats.total_proposals,
            open_calls: stats.open_calls,
            researchers: stats.researchers,
        }
    }
}

/// A call plus the proposals visible to the caller.
#[derive(Debug, Serialize)]
struct CallDetailView {
    /// The call record.
    call: CallForProposal,
    /// Proposals against the call, scoped by role.
    proposals: Page<ProposalView>,
}

/// A proposal plus its revision history.
#[derive(Debug, Serialize)]
struct ProposalDetailView {
    /// The proposal record.
    proposal: ProposalView,
    /// Revisions, newest first.
    revisions: Vec<RevisionView>,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
struct StatusResponse {
    /// Outcome label.
    status: &'static str,
}

// ============================================================================
// SECTION: Identity Routes
// ============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
struct RegisterBody {
    /// Display name.
    full_name: String,
    /// Login email.
    email: String,
    /// Plaintext password, hashed before storage.
    password: String,
    /// Optional role label; defaults to `RESEARCHER`.
    role: Option<String>,
}

/// Registration response: the user plus their verification token.
///
/// Email delivery is out of scope, so the single-use token is returned
/// directly for the caller to deliver.
#[derive(Debug, Serialize)]
struct RegisterResponse {
    /// The created user.
    user: UserView,
    /// Single-use email verification token.
    verification_token: String,
}

/// `POST /auth/register`
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    let role = match body.role.as_deref() {
        Some(label) => Some(parse_role(label)?),
        None => None,
    };
    let registered = run_blocking(move || {
        let input = Registration {
            full_name: body.full_name,
            email: body.email,
            password: body.password,
            role,
        };
        Ok(state.identity.register(&input, Timestamp::now())?)
    })
    .await?;
    let response = RegisterResponse {
        user: UserView::from(registered.user),
        verification_token: registered.verification_token,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login request body.
#[derive(Debug, Deserialize)]
struct LoginBody {
    /// Login email.
    email: String,
    /// Plaintext password.
    password: String,
}

/// Login response: the user plus their bearer token.
#[derive(Debug, Serialize)]
struct SessionResponse {
    /// The authenticated user.
    user: UserView,
    /// Bearer token; shown once, never persisted.
    token: String,
}

/// `POST /auth/login`
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    let logged_in = run_blocking(move || {
        Ok(state
            .identity
            .login(&body.email, &body.password, Timestamp::now())?)
    })
    .await?;
    Ok(Json(SessionResponse {
        user: UserView::from(logged_in.user),
        token: logged_in.token,
    }))
}

/// `POST /auth/logout`
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let header = auth_header(&headers);
    run_blocking(move || Ok(state.identity.logout(header.as_deref())?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/me` and `GET /users/me`
async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserView>, ApiError> {
    let header = auth_header(&headers);
    let user = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.identity.current_user(&identity)?)
    })
    .await?;
    Ok(Json(UserView::from(user)))
}

/// Email verification query string.
#[derive(Debug, Deserialize)]
struct VerifyQuery {
    /// Single-use verification token.
    token: String,
}

/// `GET /auth/verify-email?token=`
async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    run_blocking(move || {
        state.identity.verify_email(&query.token, Timestamp::now())?;
        Ok(())
    })
    .await?;
    Ok(Json(StatusResponse {
        status: "verified",
    }))
}

/// Forgot-password request body.
#[derive(Debug, Deserialize)]
struct ForgotBody {
    /// Account email; unknown addresses get the same response shape.
    email: String,
}

/// Forgot-password response.
///
/// Email delivery is out of scope, so when the account exists the reset
/// token is returned directly for the caller to deliver.
#[derive(Debug, Serialize)]
struct ForgotResponse {
    /// Outcome label; identical for known and unknown emails.
    status: &'static str,
    /// Single-use reset token, present when the account exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_token: Option<String>,
}

/// `POST /auth/forgot-password`
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotBody>,
) -> Result<Json<ForgotResponse>, ApiError> {
    let token = run_blocking(move || {
        Ok(state.identity.forgot_password(&body.email, Timestamp::now())?)
    })
    .await?;
    Ok(Json(ForgotResponse {
        status: "ok",
        reset_token: token,
    }))
}

/// Reset-password request body.
#[derive(Debug, Deserialize)]
struct ResetBody {
    /// Single-use reset token.
    token: String,
    /// Replacement password.
    new_password: String,
}

/// `POST /auth/reset-password`
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetBody>,
) -> Result<Json<StatusResponse>, ApiError> {
    run_blocking(move || {
        state
            .identity
            .reset_password(&body.token, &body.new_password, Timestamp::now())?;
        Ok(())
    })
    .await?;
    Ok(Json(StatusResponse {
        status: "ok",
    }))
}

/// Profile update request body.
#[derive(Debug, Deserialize)]
struct ProfileBody {
    /// Replacement display name.
    full_name: Option<String>,
    /// Replacement login email.
    email: Option<String>,
}

/// `PUT /users/me`
async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Result<Json<UserView>, ApiError> {
    let header = auth_header(&headers);
    let user = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.identity.update_profile(
            &identity,
            body.full_name.as_deref(),
            body.email.as_deref(),
        )?)
    })
    .await?;
    Ok(Json(UserView::from(user)))
}

// ============================================================================
// SECTION: Call Routes
// ============================================================================

/// Call creation request body.
#[derive(Debug, Deserialize)]
struct CallBody {
    /// Call title.
    title: String,
    /// Call description.
    description: String,
    /// Submission deadline in unix milliseconds.
    deadline: i64,
}

/// Call update request body; at least one field must be present.
#[derive(Debug, Deserialize)]
struct CallPatchBody {
    /// Replacement title.
    title: Option<String>,
    /// Replacement description.
    description: Option<String>,
    /// Replacement deadline in unix milliseconds.
    deadline: Option<i64>,
}

/// `GET /calls`
async fn list_calls(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<CallForProposal>>, ApiError> {
    let header = auth_header(&headers);
    let page = query.to_request()?;
    let calls = run_blocking(move || {
        state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.engine.list_calls(page)?)
    })
    .await?;
    Ok(Json(calls))
}

/// `POST /calls`
async fn create_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CallBody>,
) -> Result<impl IntoResponse, ApiError> {
    let header = auth_header(&headers);
    let call = run_blocking(move || {
        let now = Timestamp::now();
        let identity = state.identity.authenticate(header.as_deref(), now)?;
        let input = NewCall {
            title: body.title,
            description: body.description,
            deadline: Timestamp::from(body.deadline),
        };
        Ok(state.engine.create_call(&identity, input, now)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(call)))
}

/// `GET /calls/{id}`
async fn get_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CallDetailView>, ApiError> {
    let header = auth_header(&headers);
    let page = query.to_request()?;
    let detail = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        let call_id = CallId::new(id);
        let call = state.engine.get_call(&call_id)?;
        let filter = ProposalFilter {
            call_id: Some(call_id),
            ..ProposalFilter::default()
        };
        let proposals = state.engine.list_proposals(&identity, filter, page)?;
        Ok(CallDetailView {
            call,
            proposals: proposals.map(ProposalView::from),
        })
    })
    .await?;
    Ok(Json(detail))
}

/// `PUT /calls/{id}`
async fn update_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CallPatchBody>,
) -> Result<Json<CallForProposal>, ApiError> {
    let header = auth_header(&headers);
    let call = run_blocking(move || {
        let now = Timestamp::now();
        let identity = state.identity.authenticate(header.as_deref(), now)?;
        let patch = CallPatch {
            title: body.title,
            description: body.description,
            deadline: body.deadline.map(Timestamp::from),
        };
        Ok(state.engine.update_call(&identity, &CallId::new(id), patch, now)?)
    })
    .await?;
    Ok(Json(call))
}

/// `DELETE /calls/{id}`
async fn delete_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let header = auth_header(&headers);
    run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.engine.delete_call(&identity, &CallId::new(id))?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// SECTION: Proposal Routes
// ============================================================================

/// Text and file parts collected from a multipart submission body.
#[derive(Debug, Default)]
struct UploadForm {
    /// Targeted call identifier.
    call_id: Option<String>,
    /// Proposal title.
    title: Option<String>,
    /// Proposal abstract.
    abstract_text: Option<String>,
    /// Revision comments.
    comments: Option<String>,
    /// The PDF document part.
    document: Option<DocumentUpload>,
}

/// Maps a multipart parse failure to a validation error.
fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError::validation(format!("invalid multipart body: {err}"))
}

/// Collects the known fields of a submission or revision form.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "call_id" => form.call_id = Some(field.text().await.map_err(bad_multipart)?),
            "title" => form.title = Some(field.text().await.map_err(bad_multipart)?),
            "abstract" => {
                form.abstract_text = Some(field.text().await.map_err(bad_multipart)?);
            }
            "comments" => form.comments = Some(field.text().await.map_err(bad_multipart)?),
            "document" => {
                let file_name = field.file_name().unwrap_or("document.pdf").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                form.document = Some(DocumentUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Requires a named form field to be present.
fn require_part<T>(part: Option<T>, name: &str) -> Result<T, ApiError> {
    part.ok_or_else(|| ApiError::validation(format!("missing form field: {name}")))
}

/// `GET /proposals`
async fn list_proposals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ProposalQuery>,
) -> Result<Json<Page<ProposalView>>, ApiError> {
    let header = auth_header(&headers);
    let (page, filter) = query.to_parts()?;
    let proposals = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.engine.list_proposals(&identity, filter, page)?)
    })
    .await?;
    Ok(Json(proposals.map(ProposalView::from)))
}

/// `POST /proposals` (multipart)
async fn submit_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let header = auth_header(&headers);
    let form = read_upload_form(multipart).await?;
    let proposal = run_blocking(move || {
        let now = Timestamp::now();
        let identity = state.identity.authenticate(header.as_deref(), now)?;
        let input = NewProposal {
            call_id: CallId::new(require_part(form.call_id, "call_id")?),
            title: require_part(form.title, "title")?,
            abstract_text: require_part(form.abstract_text, "abstract")?,
            document: require_part(form.document, "document")?,
        };
        Ok(state.engine.submit_proposal(&identity, input, now)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ProposalView::from(proposal))))
}

/// `GET /proposals/{id}`
async fn proposal_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProposalDetailView>, ApiError> {
    let header = auth_header(&headers);
    let detail = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.engine.proposal_detail(&identity, &ProposalId::new(id))?)
    })
    .await?;
    Ok(Json(ProposalDetailView {
        proposal: ProposalView::from(detail.proposal),
        revisions: detail.revisions.into_iter().map(RevisionView::from).collect(),
    }))
}

/// Proposal edit request body.
#[derive(Debug, Deserialize)]
struct EditBody {
    /// Replacement title.
    title: Option<String>,
    /// Replacement abstract.
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

/// `PUT /proposals/{id}`
async fn edit_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<EditBody>,
) -> Result<Json<ProposalView>, ApiError> {
    let header = auth_header(&headers);
    let proposal = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.engine.edit_proposal(
            &identity,
            &ProposalId::new(id),
            body.title,
            body.abstract_text,
        )?)
    })
    .await?;
    Ok(Json(ProposalView::from(proposal)))
}

/// `DELETE /proposals/{id}`
async fn delete_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let header = auth_header(&headers);
    run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.engine.delete_proposal(&identity, &ProposalId::new(id))?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /proposals/{id}/revisions`
async fn list_revisions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<RevisionView>>, ApiError> {
    let header = auth_header(&headers);
    let detail = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.engine.proposal_detail(&identity, &ProposalId::new(id))?)
    })
    .await?;
    Ok(Json(detail.revisions.into_iter().map(RevisionView::from).collect()))
}

/// `POST /proposals/{id}/revisions` (multipart)
async fn revise_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let header = auth_header(&headers);
    let form = read_upload_form(multipart).await?;
    let proposal = run_blocking(move || {
        let now = Timestamp::now();
        let identity = state.identity.authenticate(header.as_deref(), now)?;
        let input = NewRevision {
            comments: form.comments,
            document: require_part(form.document, "document")?,
        };
        Ok(state
            .engine
            .revise_proposal(&identity, &ProposalId::new(id), input, now)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ProposalView::from(proposal))))
}

/// Review decision request body.
#[derive(Debug, Deserialize)]
struct StatusBody {
    /// Target status label.
    status: String,
    /// Reviewer comment; required as the reason when rejecting.
    comments: Option<String>,
}

/// `PUT /proposals/{id}/status`
async fn review_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ProposalView>, ApiError> {
    let header = auth_header(&headers);
    let next = parse_status(&body.status)?;
    let proposal = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        let decision = ReviewDecision {
            next,
            comment: body.comments,
        };
        Ok(state
            .engine
            .review_proposal(&identity, &ProposalId::new(id), decision)?)
    })
    .await?;
    Ok(Json(ProposalView::from(proposal)))
}

// ============================================================================
// SECTION: Notification Routes
// ============================================================================

/// `GET /users/me/notifications`
async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Notification>>, ApiError> {
    let header = auth_header(&headers);
    let page = query.to_request()?;
    let notifications = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state.engine.notifications(&identity, page)?)
    })
    .await?;
    Ok(Json(notifications))
}

/// `PUT /users/me/notifications/{id}/read`
async fn mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ApiError> {
    let header = auth_header(&headers);
    let notification = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        Ok(state
            .engine
            .mark_notification_read(&identity, &NotificationId::new(id))?)
    })
    .await?;
    Ok(Json(notification))
}

// ============================================================================
// SECTION: Admin Routes
// ============================================================================

/// `GET /admin/stats`
async fn admin_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsView>, ApiError> {
    let header = auth_header(&headers);
    let stats = run_blocking(move || {
        let now = Timestamp::now();
        let identity = state.identity.authenticate(header.as_deref(), now)?;
        Ok(state.engine.dashboard_stats(&identity, now)?)
    })
    .await?;
    Ok(Json(StatsView::from(stats)))
}

/// `GET /admin/proposals`
async fn admin_proposals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ProposalQuery>,
) -> Result<Json<Page<ProposalView>>, ApiError> {
    let header = auth_header(&headers);
    let (page, filter) = query.to_parts()?;
    let proposals = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        require_admin(&identity)?;
        Ok(state.engine.list_proposals(&identity, filter, page)?)
    })
    .await?;
    Ok(Json(proposals.map(ProposalView::from)))
}

/// `GET /admin/users`
async fn admin_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<UserView>>, ApiError> {
    let header = auth_header(&headers);
    let page = query.to_request()?;
    let users = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        require_admin(&identity)?;
        state
            .engine
            .storage()
            .list_users(page)
            .map_err(|err| ApiError::from(EngineError::from(err)))
    })
    .await?;
    Ok(Json(users.map(UserView::from)))
}

/// Role update request body.
#[derive(Debug, Deserialize)]
struct RoleBody {
    /// Target role label.
    role: String,
}

/// `PUT /admin/users/{id}/role`
async fn admin_set_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RoleBody>,
) -> Result<Json<UserView>, ApiError> {
    let header = auth_header(&headers);
    let role = parse_role(&body.role)?;
    let user = run_blocking(move || {
        let identity = state.identity.authenticate(header.as_deref(), Timestamp::now())?;
        require_admin(&identity)?;
        Ok(state.identity.set_role(&UserId::new(id), role)?)
    })
    .await?;
    Ok(Json(UserView::from(user)))
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// `GET /health`
async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
    })
}
