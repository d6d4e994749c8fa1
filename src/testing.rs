//! In-process mock of the TenderHub backend for tests.
//!
//! Every request is recorded. Protected routes answer 401 unless the bearer
//! token equals the currently valid access token, which tests can rotate
//! to simulate expiry.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use jsonwebtoken::{EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::client::{ApiClient, SessionObserver};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::session::{Role, TokenStore};

const SIGNING_KEY: &[u8] = b"mock-backend-signing-key";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshMode {
    /// Issue a new access token that protected routes accept
    #[default]
    Issue,
    /// Issue a new access token that protected routes still reject
    IssueUnusable,
    /// Reject the refresh token with 401
    Reject,
    /// Answer 200 with no token in the body
    EmptyBody,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct MockState {
    pub refresh_calls: AtomicUsize,
    issued: AtomicUsize,
    valid_access: Mutex<String>,
    valid_refresh: Mutex<String>,
    refresh_mode: Mutex<RefreshMode>,
    account_role: Mutex<Option<Role>>,
    profile_role: Mutex<Option<String>>,
    claim_role: Mutex<Option<String>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockState {
    pub fn set_valid_access(&self, token: &str) {
        *self.valid_access.lock() = token.to_string();
    }

    pub fn valid_access(&self) -> String {
        self.valid_access.lock().clone()
    }

    pub fn set_valid_refresh(&self, token: &str) {
        *self.valid_refresh.lock() = token.to_string();
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock() = mode;
    }

    /// Which of `vendors/me/` and `clients/me/` answers 200.
    pub fn set_account_role(&self, role: Option<Role>) {
        *self.account_role.lock() = role;
    }

    /// `role` field reported by `users/me/`.
    pub fn set_profile_role(&self, role: Option<&str>) {
        *self.profile_role.lock() = role.map(str::to_string);
    }

    /// `role` claim minted into the next access tokens.
    pub fn set_claim_role(&self, role: Option<&str>) {
        *self.claim_role.lock() = role.map(str::to_string);
    }

    pub fn authorization_headers(&self, path: &str) -> Vec<Option<String>> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.authorization.clone())
            .collect()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self, path: &str) -> Option<Recorded> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|r| r.path == path)
            .cloned()
    }

    /// Body of the most recent JSON request to `path`.
    pub fn last_json_body(&self, path: &str) -> Option<Value> {
        self.requests
            .lock()
            .iter()
            .rev()
            .filter(|r| r.path == path)
            .find_map(|r| serde_json::from_slice(&r.body).ok())
    }

    fn mint_access(&self, username: &str, user_id: i64) -> String {
        let serial = self.issued.fetch_add(1, Ordering::SeqCst);
        let mut claims = json!({
            "token_type": "access",
            "user_id": user_id,
            "username": username,
            "jti": format!("mock-{}", serial),
            "exp": 4_102_444_800u64,
        });
        if let Some(role) = self.claim_role.lock().clone() {
            claims["role"] = Value::String(role);
        }
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SIGNING_KEY),
        )
        .unwrap()
    }

    fn is_authorized(&self, authorization: Option<&str>) -> bool {
        let valid = self.valid_access.lock();
        !valid.is_empty() && authorization == Some(format!("Bearer {}", *valid).as_str())
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api", addr),
            state,
        }
    }

    pub fn config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            timeout_secs: 5,
            ..ApiConfig::default()
        }
    }

    pub fn client(&self, store: Arc<TokenStore>) -> ApiClient {
        ApiClient::new(&self.config(), store).unwrap()
    }

    pub fn client_with_observer(
        &self,
        store: Arc<TokenStore>,
        observer: Arc<dyn SessionObserver>,
    ) -> ApiClient {
        ApiClient::with_observer(&self.config(), store, observer).unwrap()
    }

    /// Client with an in-memory store, signed in as `alice`.
    pub async fn signed_in_client(&self) -> ApiClient {
        let client = self.client(Arc::new(TokenStore::in_memory()));
        client.login("alice", "secret").await.unwrap();
        client
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub expired: AtomicUsize,
}

impl SessionObserver for RecordingObserver {
    fn session_expired(&self, _error: &ApiError) {
        self.expired.fetch_add(1, Ordering::SeqCst);
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn ok(body: Value) -> Response {
    reply(StatusCode::OK, body)
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn not_found() -> Response {
    reply(StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let recorded = Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: header_text(header::AUTHORIZATION),
        content_type: header_text(header::CONTENT_TYPE),
        body: body.to_vec(),
    };
    let authorized = state.is_authorized(recorded.authorization.as_deref());
    state.requests.lock().push(recorded);

    let path = uri.path().strip_prefix("/api").unwrap_or(uri.path()).to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let json_body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    match (&method, segments.as_slice()) {
        (&Method::POST, ["token"]) => return login(&state, &json_body),
        (&Method::POST, ["token", "refresh"]) => return refresh(&state, &json_body),
        (&Method::POST, ["users", "register"]) => {
            return reply(
                StatusCode::CREATED,
                json!({
                    "id": 5,
                    "username": json_body["username"],
                    "email": json_body["email"],
                    "role": json_body["role"],
                }),
            )
        }
        _ => {}
    }

    if !authorized {
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({
                "detail": "Given token not valid for any token type",
                "code": "token_not_valid",
            }),
        );
    }

    protected(&state, &method, &segments, &json_body)
}

fn login(state: &MockState, body: &Value) -> Response {
    let user = match (body["username"].as_str(), body["password"].as_str()) {
        (Some("alice"), Some("secret")) => ("alice", 1),
        (Some("victor"), Some("secret")) => ("victor", 5),
        _ => {
            return reply(
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "No active account found with the given credentials" }),
            )
        }
    };

    let access = state.mint_access(user.0, user.1);
    let refresh = format!("refresh-{}", user.0);
    state.set_valid_access(&access);
    state.set_valid_refresh(&refresh);
    ok(json!({ "access": access, "refresh": refresh }))
}

fn refresh(state: &MockState, body: &Value) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let rejected = || {
        reply(
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" }),
        )
    };

    let mode = *state.refresh_mode.lock();
    match mode {
        RefreshMode::Reject => rejected(),
        RefreshMode::EmptyBody => ok(json!({})),
        RefreshMode::Issue | RefreshMode::IssueUnusable => {
            let presented = body["refresh"].as_str().unwrap_or_default();
            if presented != state.valid_refresh.lock().as_str() {
                return rejected();
            }
            let access = state.mint_access("alice", 1);
            if mode == RefreshMode::Issue {
                state.set_valid_access(&access);
            }
            ok(json!({ "access": access }))
        }
    }
}

fn tender(id: i64) -> Value {
    json!({
        "id": id,
        "title": "Warehouse roof repair",
        "description": "Replace 400 m2 of roofing",
        "category": "construction",
        "budget_min": "5000.00",
        "budget_max": "9000.00",
        "deadline": "2099-01-31",
        "status": "open",
        "client": "alice",
        "skills": ["roofing"],
        "bid_count": 1,
    })
}

fn bid(id: i64, tender: i64) -> Value {
    json!({
        "id": id,
        "tender": tender,
        "vendor": "victor",
        "amount": "6400.00",
        "delivery_days": 14,
        "proposal": "Crew of four, two weeks",
        "status": "pending",
    })
}

fn project(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "title": "Warehouse roof repair",
        "tender": 7,
        "client": "alice",
        "vendor": "victor",
        "price": "6400.00",
        "deadline": "2099-01-31",
        "status": status,
    })
}

fn profile(state: &MockState, id: &str) -> Value {
    match id {
        "5" => json!({
            "id": 5,
            "username": "victor",
            "email": "victor@example.com",
            "first_name": "Victor",
            "role": "vendor",
            "skills": ["roofing"],
            "rating": 4.5,
        }),
        _ => json!({
            "id": 1,
            "username": "alice",
            "email": "alice@example.com",
            "role": state.profile_role.lock().clone(),
        }),
    }
}

fn parse_id(segment: &str) -> i64 {
    segment.parse().unwrap_or_default()
}

fn protected(state: &MockState, method: &Method, segments: &[&str], body: &Value) -> Response {
    match (method, segments) {
        (&Method::GET, [role_path @ ("vendors" | "clients"), "me"]) => {
            let expected = if *role_path == "vendors" {
                Role::Vendor
            } else {
                Role::Client
            };
            if *state.account_role.lock() == Some(expected) {
                ok(json!({ "id": 1 }))
            } else {
                not_found()
            }
        }

        (&Method::GET, ["users", "me"]) => ok(profile(state, "me")),
        (&Method::PATCH, ["users", "me"]) => {
            let mut me = profile(state, "me");
            if let (Some(me), Some(changes)) = (me.as_object_mut(), body.as_object()) {
                me.extend(changes.clone());
            }
            ok(me)
        }
        (&Method::GET, ["users", user, "reviews"]) => ok(json!({
            "count": 2,
            "next": null,
            "previous": null,
            "results": [
                { "id": 1, "reviewer": "alice", "rating": 5, "project": 11, "user": user },
                { "id": 2, "reviewer": "bob", "rating": 4, "comment": "On time" },
            ],
        })),
        (&Method::GET, ["users", _, "portfolio"]) => ok(json!([
            { "id": 31, "title": "Harbour warehouse", "link": "https://example.com/harbour" }
        ])),
        (&Method::GET, ["users", user]) => ok(profile(state, user)),

        (&Method::GET, ["tenders"]) => ok(json!([tender(7)])),
        (&Method::POST, ["tenders"]) => {
            let mut created = tender(42);
            if let Some(title) = body.get("title") {
                created["title"] = title.clone();
            }
            reply(StatusCode::CREATED, created)
        }
        (&Method::GET, ["tenders", "404"]) => not_found(),
        (&Method::GET | &Method::PATCH, ["tenders", tender_id]) => ok(tender(parse_id(tender_id))),
        (&Method::DELETE, ["tenders", _]) => no_content(),
        (&Method::GET, ["tenders", tender_id, "bids"]) => ok(json!([bid(3, parse_id(tender_id))])),
        (&Method::POST, ["tenders", tender_id, "bids"]) => {
            reply(StatusCode::CREATED, bid(4, parse_id(tender_id)))
        }
        (&Method::GET, ["tenders", _, "comments"]) => ok(json!([
            { "id": 1, "author": "victor", "text": "Is the site accessible by truck?" }
        ])),
        (&Method::POST, ["tenders", _, "comments"]) => reply(
            StatusCode::CREATED,
            json!({ "id": 2, "author": "alice", "text": body["text"] }),
        ),

        (&Method::POST, ["bids", _, "accept"]) => ok(project(11, "in_progress")),
        (&Method::POST, ["bids", bid_id, "withdraw"]) => {
            let mut withdrawn = bid(parse_id(bid_id), 7);
            withdrawn["status"] = json!("withdrawn");
            ok(withdrawn)
        }

        (&Method::GET, ["projects"]) => ok(json!([project(11, "in_progress")])),
        (&Method::GET, ["projects", project_id]) => ok(project(parse_id(project_id), "in_progress")),
        (&Method::GET, ["projects", _, "activities"]) => ok(json!([
            { "id": 1, "type": "comment", "author": "alice", "message": "Kick-off call at 10" },
            { "id": 2, "type": "delivery", "author": "victor", "attachments": ["final.zip"] },
        ])),
        (&Method::POST, ["projects", project_id, "review"]) => reply(
            StatusCode::CREATED,
            json!({
                "id": 9,
                "reviewer": "alice",
                "rating": body["rating"],
                "comment": body["comment"],
                "project": parse_id(project_id),
            }),
        ),
        (&Method::POST, ["projects", project_id, action]) => {
            let status = match *action {
                "deliver" => "delivered",
                "request_revision" => "revision_requested",
                "complete" => "completed",
                _ => "in_progress",
            };
            ok(project(parse_id(project_id), status))
        }

        (&Method::POST, ["portfolio"]) => reply(
            StatusCode::CREATED,
            json!({ "id": 31, "title": body.get("title").cloned().unwrap_or(json!("Harbour warehouse")) }),
        ),
        (&Method::DELETE, ["portfolio", _]) => no_content(),

        (&Method::GET, ["categories"]) => ok(json!([
            { "id": 1, "name": "Construction", "slug": "construction" }
        ])),
        (&Method::POST, ["categories"]) | (&Method::DELETE, ["categories", _]) => reply(
            StatusCode::FORBIDDEN,
            json!({ "detail": "You do not have permission to perform this action." }),
        ),
        (&Method::GET, ["skills"]) => ok(json!([
            { "id": 1, "name": "roofing" },
            { "id": 2, "name": "plumbing" },
        ])),
        (&Method::GET, ["tags"]) => ok(json!([{ "id": 1, "name": "urgent" }])),

        _ => not_found(),
    }
}
