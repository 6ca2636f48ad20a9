//! Typed access to the league REST API.
//!
//! `ApiClient` owns the cross-cutting request rules: the bearer token is
//! attached to every call, an expired token ends the session before anything
//! is sent, and 401 (or a token-related 403) clears the session on the way
//! back. The wire format stays behind `Transport` so the in-memory backend
//! and the HTTP client are interchangeable.

use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::model::{
    Credentials, EntityId, Fixture, FixtureStatus, MatchResult, ResultDraft, Role, User, UserDraft,
};
use crate::session::{Session, SessionHandle};
use crate::token;
use crate::wire::{self, Resource};

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Moves one request to the API and returns whatever status came back.
/// Only failures to get any response at all are errors here.
pub trait Transport: Send + Sync {
    fn send(&self, req: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Parent collection for the nested list endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    League(EntityId),
    Team(EntityId),
}

impl Scope {
    fn path(&self, child: &str) -> String {
        match self {
            Scope::League(id) => format!("/leagues/{id}/{child}"),
            Scope::Team(id) => format!("/teams/{id}/{child}"),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: SessionHandle,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: SessionHandle) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let mut body = json!({
            "email": credentials.email.trim(),
            "password": credentials.password,
        });
        if let Some(role) = credentials.role {
            body["role"] = json!(role.as_wire());
        }
        tracing::info!(has_password = !credentials.password.is_empty(), "login attempt");
        let req = ApiRequest::new(Method::POST, "/auth/login").with_body(body);
        let value = self.send_anonymous(req, "login endpoint").map_err(login_error)?;
        let session = session_from_auth(&value)?;
        self.session.set(session.clone());
        Ok(session)
    }

    pub fn register(&self, draft: &UserDraft) -> Result<Session, ApiError> {
        let req = ApiRequest::new(Method::POST, "/auth/register")
            .with_body(User::create_payload(draft));
        let value = self.send_anonymous(req, "register endpoint")?;
        let session = session_from_auth(&value)?;
        self.session.set(session.clone());
        Ok(session)
    }

    /// Refreshes the stored profile from `GET /auth/me`.
    pub fn me(&self) -> Result<User, ApiError> {
        let value = self.send(ApiRequest::new(Method::GET, "/auth/me"), "profile")?;
        let inner = wire::unwrap_envelope(&value);
        let user = User::from_wire(inner)
            .or_else(|| inner.get("user").and_then(User::from_wire))
            .ok_or_else(|| ApiError::Decode("profile without an id".to_string()))?;
        self.session.update_user(user.clone());
        Ok(user)
    }

    pub fn logout(&self) {
        self.session.clear();
    }

    pub fn list<R: Resource>(&self) -> Result<Vec<R>, ApiError> {
        let value = self.send(
            ApiRequest::new(Method::GET, R::KIND.path()),
            R::KIND.plural(),
        )?;
        Ok(wire::parse_list(&value))
    }

    pub fn list_scoped<R: Resource>(&self, scope: &Scope) -> Result<Vec<R>, ApiError> {
        let req = ApiRequest::new(Method::GET, scope.path(R::KIND.plural()));
        let value = self.send(req, R::KIND.plural())?;
        Ok(wire::parse_list(&value))
    }

    pub fn get<R: Resource>(&self, id: &EntityId) -> Result<R, ApiError> {
        let req = ApiRequest::new(Method::GET, format!("{}/{id}", R::KIND.path()));
        let value = self.send(req, R::KIND.label())?;
        expect_one(&value)
    }

    pub fn create<R: Resource>(&self, draft: &R::Draft) -> Result<R, ApiError> {
        let req = ApiRequest::new(Method::POST, R::KIND.path()).with_body(R::create_payload(draft));
        let value = self.send(req, R::KIND.label())?;
        expect_one(&value)
    }

    pub fn update<R: Resource>(&self, id: &EntityId, draft: &R::Draft) -> Result<R, ApiError> {
        let req = ApiRequest::new(Method::PUT, format!("{}/{id}", R::KIND.path()))
            .with_body(R::update_payload(draft));
        let value = self.send(req, R::KIND.label())?;
        expect_one(&value)
    }

    pub fn delete<R: Resource>(&self, id: &EntityId) -> Result<(), ApiError> {
        let req = ApiRequest::new(Method::DELETE, format!("{}/{id}", R::KIND.path()));
        self.send(req, R::KIND.label())?;
        Ok(())
    }

    pub fn set_fixture_status(
        &self,
        id: &EntityId,
        status: &FixtureStatus,
    ) -> Result<Fixture, ApiError> {
        let req = ApiRequest::new(Method::PATCH, format!("/fixtures/{id}/status"))
            .with_body(json!({ "status": status.as_wire() }));
        let value = self.send(req, "fixture")?;
        expect_one(&value)
    }

    pub fn fixtures_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Fixture>, ApiError> {
        let req = ApiRequest::new(Method::GET, "/fixtures/date-range")
            .with_query("startDate", start.format("%Y-%m-%d").to_string())
            .with_query("endDate", end.format("%Y-%m-%d").to_string());
        let value = self.send(req, "fixtures")?;
        Ok(wire::parse_list(&value))
    }

    pub fn fixture_result(&self, fixture_id: &EntityId) -> Result<MatchResult, ApiError> {
        let req = ApiRequest::new(Method::GET, format!("/fixtures/{fixture_id}/result"));
        let value = self.send(req, "fixture result")?;
        result_for_fixture(&value, fixture_id)
    }

    pub fn record_result(
        &self,
        fixture_id: &EntityId,
        draft: &ResultDraft,
    ) -> Result<MatchResult, ApiError> {
        let req = ApiRequest::new(Method::POST, format!("/fixtures/{fixture_id}/result"))
            .with_body(MatchResult::create_payload(draft));
        let value = self.send(req, "fixture")?;
        result_for_fixture(&value, fixture_id)
    }

    pub fn update_fixture_result(
        &self,
        fixture_id: &EntityId,
        draft: &ResultDraft,
    ) -> Result<MatchResult, ApiError> {
        let req = ApiRequest::new(Method::PUT, format!("/fixtures/{fixture_id}/result"))
            .with_body(MatchResult::update_payload(draft));
        let value = self.send(req, "fixture result")?;
        result_for_fixture(&value, fixture_id)
    }

    pub fn delete_fixture_result(&self, fixture_id: &EntityId) -> Result<(), ApiError> {
        let req = ApiRequest::new(Method::DELETE, format!("/fixtures/{fixture_id}/result"));
        self.send(req, "fixture result")?;
        Ok(())
    }

    /// Tries the team-side endpoint first, then sets the coach's `team_id`.
    /// When both fail the first error is reported.
    pub fn assign_coach(&self, team_id: &EntityId, coach_id: &EntityId) -> Result<(), ApiError> {
        let primary = ApiRequest::new(Method::POST, format!("/teams/{team_id}/coaches"))
            .with_body(json!({ "coach_id": wire::id_value(coach_id) }));
        let first_err = match self.send(primary, "team") {
            Ok(_) => return Ok(()),
            Err(err) if err.forces_logout() => return Err(err),
            Err(err) => err,
        };
        tracing::debug!(error = %first_err, "coach endpoint refused, updating the user instead");
        let fallback = ApiRequest::new(Method::PUT, format!("/users/{coach_id}"))
            .with_body(json!({ "team_id": wire::id_value(team_id) }));
        match self.send(fallback, "user") {
            Ok(_) => Ok(()),
            Err(err) if err.forces_logout() => Err(err),
            Err(_) => Err(first_err),
        }
    }

    fn send(&self, mut req: ApiRequest, what: &str) -> Result<Value, ApiError> {
        if let Some(bearer) = self.session.token() {
            if token::is_expired(&bearer) {
                tracing::info!(path = %req.path, "token expired before send, ending session");
                self.session.clear();
                return Err(ApiError::SessionExpired);
            }
            req.bearer = Some(bearer);
        }
        self.dispatch(&req, what)
    }

    fn send_anonymous(&self, req: ApiRequest, what: &str) -> Result<Value, ApiError> {
        self.dispatch(&req, what)
    }

    fn dispatch(&self, req: &ApiRequest, what: &str) -> Result<Value, ApiError> {
        tracing::debug!(method = %req.method, path = %req.path, "api request");
        let resp = self.transport.send(req)?;
        if resp.is_success() {
            let trimmed = resp.body.trim();
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(trimmed)
                .map_err(|err| ApiError::Decode(format!("{} {}: {err}", req.method, req.path)));
        }

        let err = ApiError::from_response(resp.status, &resp.body, what);
        tracing::warn!(
            method = %req.method,
            path = %req.path,
            status = resp.status,
            error = %err,
            "api request failed"
        );
        if err.forces_logout() && req.bearer.is_some() {
            self.session.clear();
        }
        Err(err)
    }
}

fn expect_one<R: Resource>(value: &Value) -> Result<R, ApiError> {
    wire::parse_one(value)
        .ok_or_else(|| ApiError::Decode(format!("response did not contain a {}", R::KIND.label())))
}

/// Result endpoints scoped to a fixture may omit `fixture_id` in the body.
fn result_for_fixture(value: &Value, fixture_id: &EntityId) -> Result<MatchResult, ApiError> {
    let mut inner = wire::unwrap_envelope(value).clone();
    if let Value::Object(map) = &mut inner {
        if !map.contains_key("fixture_id") && !map.contains_key("fixtureId") {
            map.insert("fixture_id".into(), json!(fixture_id.as_str()));
        }
    }
    MatchResult::from_wire(&inner)
        .ok_or_else(|| ApiError::Decode("response did not contain a result".to_string()))
}

fn session_from_auth(value: &Value) -> Result<Session, ApiError> {
    let inner = wire::unwrap_envelope(value);
    let token = inner
        .get("token")
        .and_then(|t| t.as_str())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Decode("login response without a token".to_string()))?
        .to_string();
    let mut user = inner
        .get("user")
        .and_then(User::from_wire)
        .ok_or_else(|| ApiError::Decode("login response without a user".to_string()))?;
    if user.role.is_none() {
        user.role = token::decode_claims(&token)
            .and_then(|claims| claims.role)
            .and_then(|role| Role::parse(&role));
    }
    Ok(Session { token, user })
}

/// Login reports a fixed message per failure class so the form can say what
/// to check.
fn login_error(err: ApiError) -> ApiError {
    match err {
        ApiError::Server { status: 500, .. } => ApiError::Server {
            status: 500,
            message: "Backend server error. Please check if the server is running and database is connected."
                .to_string(),
        },
        ApiError::NotFound(_) => ApiError::NotFound(
            "Login endpoint not found. Please check backend server configuration.".to_string(),
        ),
        ApiError::Unauthorized(_) => ApiError::Unauthorized("Invalid email or password.".to_string()),
        ApiError::Network(_) => ApiError::Network(
            "Cannot connect to server. Please check if the backend is running.".to_string(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Replays canned responses and records what was sent.
    struct Scripted {
        replies: Mutex<Vec<Result<ApiResponse, ApiError>>>,
        seen: Mutex<Vec<ApiRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ApiResponse, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<ApiRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for Scripted {
        fn send(&self, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
            self.seen.lock().unwrap().push(req.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ApiError::Network("no reply scripted".into())))
        }
    }

    fn reply(status: u16, body: &str) -> Result<ApiResponse, ApiError> {
        Ok(ApiResponse {
            status,
            body: body.to_string(),
        })
    }

    fn signed_in(exp: i64) -> SessionHandle {
        let handle = SessionHandle::in_memory();
        handle.set(Session {
            token: token::encode_unsigned("7", "ADMIN", exp),
            user: User {
                id: EntityId::from("7"),
                first_name: "Ada".into(),
                last_name: "Admin".into(),
                email: "ada@example.com".into(),
                role: Some(Role::Admin),
                team_id: None,
            },
        });
        handle
    }

    #[test]
    fn expired_token_never_reaches_the_transport() {
        let transport = Scripted::new(vec![reply(200, "[]")]);
        let session = signed_in(1);
        let client = ApiClient::new(transport.clone(), session.clone());
        let err = client.list::<crate::model::Venue>().unwrap_err();
        assert_eq!(err, ApiError::SessionExpired);
        assert!(transport.seen().is_empty());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn bearer_is_attached_and_401_clears_the_session() {
        let transport = Scripted::new(vec![reply(401, r#"{"message":"jwt malformed"}"#)]);
        let session = signed_in(token::now_secs() + 3600);
        let client = ApiClient::new(transport.clone(), session.clone());
        let err = client.list::<crate::model::Team>().unwrap_err();
        assert!(err.forces_logout());
        assert!(!session.is_authenticated());
        let sent = transport.seen();
        assert_eq!(sent[0].path, "/teams");
        assert!(sent[0].bearer.is_some());
    }

    #[test]
    fn plain_forbidden_keeps_the_session() {
        let transport = Scripted::new(vec![reply(403, r#"{"error":"Admins only"}"#)]);
        let session = signed_in(token::now_secs() + 3600);
        let client = ApiClient::new(transport, session.clone());
        let err = client.delete::<crate::model::Venue>(&EntityId::from("3")).unwrap_err();
        assert_eq!(err.to_string(), "Admins only");
        assert!(session.is_authenticated());
    }

    #[test]
    fn login_maps_statuses_to_fixed_messages() {
        let cases = [
            (500, "Backend server error. Please check if the server is running and database is connected."),
            (404, "Login endpoint not found. Please check backend server configuration."),
            (401, "Invalid email or password."),
        ];
        for (status, expected) in cases {
            let transport = Scripted::new(vec![reply(status, r#"{"message":"raw"}"#)]);
            let client = ApiClient::new(transport, SessionHandle::in_memory());
            let creds = Credentials {
                email: "x@example.com".into(),
                password: "pw".into(),
                role: None,
            };
            assert_eq!(client.login(&creds).unwrap_err().to_string(), expected);
        }
    }

    #[test]
    fn login_stores_user_and_token_from_envelope() {
        let token = token::encode_unsigned("12", "COACH", token::now_secs() + 60);
        let body = json!({
            "success": true,
            "data": {"token": token, "user": {"id": 12, "email": "c@example.com", "first_name": "Casey"}}
        });
        let transport = Scripted::new(vec![reply(200, &body.to_string())]);
        let session = SessionHandle::in_memory();
        let client = ApiClient::new(transport.clone(), session.clone());
        let creds = Credentials {
            email: " c@example.com ".into(),
            password: "pw".into(),
            role: Some(Role::Coach),
        };
        let signed = client.login(&creds).unwrap();
        assert_eq!(signed.user.role, Some(Role::Coach));
        assert_eq!(session.user().map(|u| u.id), Some(EntityId::from("12")));
        let sent = &transport.seen()[0];
        assert_eq!(sent.body.as_ref().unwrap()["email"], json!("c@example.com"));
        assert_eq!(sent.body.as_ref().unwrap()["role"], json!("COACH"));
    }

    #[test]
    fn assign_coach_falls_back_to_user_update() {
        let transport = Scripted::new(vec![
            reply(404, r#"{"error":"Route not found"}"#),
            reply(200, r#"{"success":true}"#),
        ]);
        let client = ApiClient::new(transport.clone(), signed_in(token::now_secs() + 60));
        client
            .assign_coach(&EntityId::from("4"), &EntityId::from("12"))
            .unwrap();
        let sent = transport.seen();
        assert_eq!(sent[0].path, "/teams/4/coaches");
        assert_eq!(sent[1].path, "/users/12");
        assert_eq!(sent[1].body.as_ref().unwrap()["team_id"], json!(4));
    }

    #[test]
    fn fixture_scoped_result_gets_its_fixture_id() {
        let transport = Scripted::new(vec![reply(201, r#"{"data":{"id":5,"home_score":2,"away_score":2}}"#)]);
        let client = ApiClient::new(transport.clone(), signed_in(token::now_secs() + 60));
        let result = client
            .record_result(
                &EntityId::from("31"),
                &ResultDraft {
                    fixture_id: EntityId::from("31"),
                    home_score: 2,
                    away_score: 2,
                },
            )
            .unwrap();
        assert_eq!(result.fixture_id, EntityId::from("31"));
        assert_eq!(transport.seen()[0].method, Method::POST);
    }
}
