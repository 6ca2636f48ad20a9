//! In-process stand-in for the league REST API. Used by `LEAGUE_DEMO=1`, the
//! snapshot tool and the integration tests. Records are kept as raw JSON so
//! responses go through the same normalization as the real server's.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value, json};

use crate::api::{ApiRequest, ApiResponse, Transport};
use crate::error::ApiError;
use crate::token::{self, TokenClaims};

const COLLECTIONS: [&str; 8] = [
    "leagues", "teams", "players", "fixtures", "results", "referees", "venues", "users",
];
const DEFAULT_TOKEN_TTL_SECS: i64 = 8 * 3600;

struct Db {
    collections: HashMap<&'static str, Vec<Value>>,
    passwords: HashMap<String, String>,
    next_id: u64,
    injected: Vec<(String, u16, String)>,
    requests: Vec<String>,
}

pub struct FakeBackend {
    db: Mutex<Db>,
    token_ttl_secs: i64,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::empty()
    }
}

impl FakeBackend {
    pub fn empty() -> Self {
        Self {
            db: Mutex::new(Db {
                collections: COLLECTIONS.iter().map(|c| (*c, Vec::new())).collect(),
                passwords: HashMap::new(),
                next_id: 100,
                injected: Vec::new(),
                requests: Vec::new(),
            }),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }

    /// Two leagues, four teams, one admin and two coaches. The coach
    /// `coach@league.test` runs the Lightning Bolts.
    pub fn seeded() -> Self {
        let backend = Self::empty();
        for league in [
            json!({"id": 1, "name": "Under 12 Premier", "season": "2025", "start_date": "2025-02-01", "end_date": "2025-11-30"}),
            json!({"id": 2, "name": "Under 14 Championship", "season": "2025"}),
        ] {
            backend.insert("leagues", league);
        }
        for team in [
            json!({"id": 4, "name": "Lightning Bolts", "league_id": 1, "coach_id": 12}),
            json!({"id": 5, "name": "Thunder Hawks", "league_id": 1}),
            json!({"id": 6, "name": "Fire Dragons", "league_id": 2, "coach_id": 13}),
            json!({"id": 7, "name": "River Otters", "league_id": 2}),
        ] {
            backend.insert("teams", team);
        }
        for (user, password) in [
            (json!({"id": 7, "first_name": "Ada", "last_name": "Admin", "email": "admin@league.test", "role": "ADMIN"}), "admin123"),
            (json!({"id": 12, "first_name": "Casey", "last_name": "Coach", "email": "coach@league.test", "role": "COACH", "team_id": 4}), "coach123"),
            (json!({"id": 13, "first_name": "Jordan", "last_name": "Lee", "email": "jordan@league.test", "role": "COACH", "team_id": 6}), "coach123"),
        ] {
            backend.insert_user(user, password);
        }
        for player in [
            json!({"id": 41, "first_name": "Mia", "last_name": "Hart", "team_id": 4, "position": "Forward", "jersey_number": 9}),
            json!({"id": 42, "first_name": "Leo", "last_name": "Grant", "team_id": 4, "position": "Goalkeeper", "jersey_number": 1}),
            json!({"id": 43, "first_name": "Ava", "last_name": "Stone", "team_id": 4, "position": "Defender", "jersey_number": 4}),
            json!({"id": 51, "first_name": "Noah", "last_name": "Reed", "team_id": 5, "position": "Midfielder", "jersey_number": 8}),
            json!({"id": 61, "first_name": "Isla", "last_name": "Moss", "team_id": 6, "position": "Forward", "jersey_number": 11}),
        ] {
            backend.insert("players", player);
        }
        backend.insert("venues", json!({"id": 1, "name": "North Park", "city": "Leeds", "country": "UK", "capacity": 800}));
        backend.insert("venues", json!({"id": 2, "name": "Riverside Ground", "city": "York", "country": "UK"}));
        backend.insert("referees", json!({"id": 1, "first_name": "Sam", "last_name": "Whistle", "email": "sam@refs.test", "experience": 6}));
        for fixture in [
            json!({"id": 31, "league_id": 1, "home_team_id": 4, "away_team_id": 5, "venue_id": 1, "referee_id": 1, "match_date": "2025-03-08T10:00:00.000Z", "status": "COMPLETED"}),
            json!({"id": 32, "league_id": 1, "home_team_id": 5, "away_team_id": 4, "venue_id": 2, "match_date": "2025-03-22T10:00:00.000Z", "status": "COMPLETED"}),
            json!({"id": 33, "league_id": 2, "home_team_id": 6, "away_team_id": 7, "venue_id": 2, "match_date": "2025-03-15T11:00:00.000Z", "status": "COMPLETED"}),
            json!({"id": 34, "league_id": 1, "home_team_id": 4, "away_team_id": 5, "venue_id": 1, "match_date": "2026-11-21T10:00:00.000Z", "status": "SCHEDULED"}),
            json!({"id": 35, "league_id": 1, "home_team_id": 5, "away_team_id": 4, "venue_id": 2, "match_date": "2026-11-07T09:30:00.000Z", "status": "SCHEDULED"}),
        ] {
            backend.insert("fixtures", fixture);
        }
        backend.insert("results", json!({"id": 1, "fixture_id": 31, "home_score": 2, "away_score": 1, "recorded_at": "2025-03-08T12:00:00.000Z"}));
        backend.insert("results", json!({"id": 2, "fixture_id": 32, "home_score": 0, "away_score": 0, "recorded_at": "2025-03-22T12:00:00.000Z"}));
        backend
    }

    pub fn with_token_ttl(mut self, secs: i64) -> Self {
        self.token_ttl_secs = secs;
        self
    }

    pub fn insert(&self, collection: &str, record: Value) {
        let mut db = self.lock();
        if let Some(key) = collection_key(collection) {
            db.collections.entry(key).or_default().push(record);
        }
    }

    pub fn insert_user(&self, user: Value, password: &str) {
        if let Some(email) = user.get("email").and_then(Value::as_str) {
            self.lock()
                .passwords
                .insert(email.to_lowercase(), password.to_string());
        }
        self.insert("users", user);
    }

    pub fn records(&self, collection: &str) -> Vec<Value> {
        collection_key(collection)
            .and_then(|key| self.lock().collections.get(key).cloned())
            .unwrap_or_default()
    }

    /// Makes the next request whose path starts with `path_prefix` fail.
    pub fn inject_failure(&self, path_prefix: &str, status: u16, message: &str) {
        self.lock()
            .injected
            .push((path_prefix.to_string(), status, message.to_string()));
    }

    /// "METHOD /path" for every request seen so far.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn issue_token(&self, user_id: &str, role: &str) -> String {
        token::encode_unsigned(user_id, role, token::now_secs() + self.token_ttl_secs)
    }

    fn lock(&self) -> MutexGuard<'_, Db> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, req: &ApiRequest) -> ApiResponse {
        let mut db = self.lock();
        db.requests.push(format!("{} {}", req.method, req.path));
        if let Some(pos) = db
            .injected
            .iter()
            .position(|(prefix, _, _)| req.path.starts_with(prefix.as_str()))
        {
            let (_, status, message) = db.injected.remove(pos);
            return fail(status, &message);
        }

        let segments: Vec<&str> = req
            .path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let body = req.body.clone().unwrap_or(Value::Null);

        let method = req.method.as_str();
        match (method, segments.as_slice()) {
            ("POST", ["auth", "login"]) => return self.login(&db, &body),
            ("POST", ["auth", "register"]) => return self.register(&mut db, &body),
            _ => {}
        }

        let Some(claims) = req
            .bearer
            .as_deref()
            .filter(|t| !token::is_expired(t))
            .and_then(token::decode_claims)
        else {
            return fail(401, "Invalid or expired token");
        };
        let viewer = Viewer::from_claims(&claims);

        match (method, segments.as_slice()) {
            ("GET", ["auth", "me"]) => match find(&db, "users", &viewer.user_id) {
                Some(user) => ok(user.clone()),
                None => fail(404, "User not found"),
            },
            ("GET", ["fixtures", "date-range"]) => {
                let param = |key: &str| {
                    req.query
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                };
                let (start, end) = (param("startDate"), param("endDate"));
                let within: Vec<Value> = rows(&db, "fixtures")
                    .iter()
                    .filter(|f| {
                        let day = f
                            .get("match_date")
                            .and_then(Value::as_str)
                            .map(|d| d.get(..10).unwrap_or(d))
                            .unwrap_or("");
                        !day.is_empty() && day >= start.as_str() && day <= end.as_str()
                    })
                    .cloned()
                    .collect();
                ok(Value::Array(within))
            }
            ("GET", [parent, id, child]) => self.scoped_list(&db, parent, id, child),
            ("GET", [collection]) => match collection_key(collection) {
                Some(key) => ok(Value::Array(rows(&db, key).to_vec())),
                None => fail(404, "Route not found"),
            },
            ("GET", [collection, id]) => match collection_key(collection) {
                Some(key) => match find(&db, key, id) {
                    Some(record) => ok(record.clone()),
                    None => fail(404, &format!("{} not found", singular(key))),
                },
                None => fail(404, "Route not found"),
            },
            (method, path) => {
                if let Err(resp) = authorize(&db, &viewer, method, path, &body) {
                    return resp;
                }
                self.mutate(&mut db, method, path, body)
            }
        }
    }

    fn login(&self, db: &Db, body: &Value) -> ApiResponse {
        let email = body
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_lowercase();
        let password = body.get("password").and_then(Value::as_str).unwrap_or("");
        if db.passwords.get(&email).map(String::as_str) != Some(password) {
            return fail(401, "Invalid credentials");
        }
        let Some(user) = rows(db, "users")
            .iter()
            .find(|u| u.get("email").and_then(Value::as_str).map(str::to_lowercase) == Some(email.clone()))
        else {
            return fail(401, "Invalid credentials");
        };
        let role = user.get("role").and_then(Value::as_str).unwrap_or("COACH");
        let id = id_string(user.get("id")).unwrap_or_default();
        ok(json!({ "token": self.issue_token(&id, role), "user": user }))
    }

    fn register(&self, db: &mut Db, body: &Value) -> ApiResponse {
        let email = body
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_lowercase();
        let password = body.get("password").and_then(Value::as_str).unwrap_or("");
        if email.is_empty() || password.is_empty() {
            return fail(400, "Email and password are required");
        }
        if db.passwords.contains_key(&email) {
            return fail(409, "Email already registered");
        }
        let mut user = body.clone();
        if let Value::Object(map) = &mut user {
            map.remove("password");
            map.insert("email".into(), json!(email));
        }
        let user = insert_new(db, "users", user);
        db.passwords.insert(email, password.to_string());
        let role = user.get("role").and_then(Value::as_str).unwrap_or("COACH");
        let id = id_string(user.get("id")).unwrap_or_default();
        created(json!({ "token": self.issue_token(&id, role), "user": user }))
    }

    fn scoped_list(&self, db: &Db, parent: &str, id: &str, child: &str) -> ApiResponse {
        let matches = |record: &Value, key: &str| id_string(record.get(key)).as_deref() == Some(id);
        let listed: Vec<Value> = match (parent, child) {
            ("leagues", "teams") => rows(db, "teams").iter().filter(|t| matches(t, "league_id")).cloned().collect(),
            ("leagues", "fixtures") => rows(db, "fixtures").iter().filter(|f| matches(f, "league_id")).cloned().collect(),
            ("teams", "players") => rows(db, "players").iter().filter(|p| matches(p, "team_id")).cloned().collect(),
            ("teams", "fixtures") => rows(db, "fixtures")
                .iter()
                .filter(|f| matches(f, "home_team_id") || matches(f, "away_team_id"))
                .cloned()
                .collect(),
            ("leagues", "results") | ("teams", "results") => {
                let fixture_ids: Vec<String> = rows(db, "fixtures")
                    .iter()
                    .filter(|f| match parent {
                        "leagues" => matches(f, "league_id"),
                        _ => matches(f, "home_team_id") || matches(f, "away_team_id"),
                    })
                    .filter_map(|f| id_string(f.get("id")))
                    .collect();
                rows(db, "results")
                    .iter()
                    .filter(|r| {
                        id_string(r.get("fixture_id")).is_some_and(|id| fixture_ids.contains(&id))
                    })
                    .cloned()
                    .collect()
            }
            ("fixtures", "result") => {
                return match rows(db, "results").iter().find(|r| matches(r, "fixture_id")) {
                    Some(result) => ok(result.clone()),
                    None => fail(404, "Result not found"),
                };
            }
            _ => return fail(404, "Route not found"),
        };
        ok(Value::Array(listed))
    }

    fn mutate(&self, db: &mut Db, method: &str, path: &[&str], body: Value) -> ApiResponse {
        match (method, path) {
            ("PATCH", ["fixtures", id, "status"]) => {
                let status = body.get("status").cloned().unwrap_or(Value::Null);
                match find_mut(db, "fixtures", id) {
                    Some(fixture) => {
                        fixture["status"] = status;
                        ok(fixture.clone())
                    }
                    None => fail(404, "Fixture not found"),
                }
            }
            ("POST", ["fixtures", id, "result"]) => {
                if find(db, "fixtures", id).is_none() {
                    return fail(404, "Fixture not found");
                }
                if result_index(db, id).is_some() {
                    return fail(409, "Result already recorded for this fixture");
                }
                let mut record = body;
                record["fixture_id"] = numeric_or_string(id);
                ok(insert_new(db, "results", record))
            }
            ("PUT", ["fixtures", id, "result"]) => match result_index(db, id) {
                Some(index) => {
                    let Some(results) = db.collections.get_mut("results") else {
                        return fail(500, "results collection missing");
                    };
                    merge(&mut results[index], &body);
                    ok(results[index].clone())
                }
                None => fail(404, "Result not found"),
            },
            ("DELETE", ["fixtures", id, "result"]) => {
                let Some(results) = db.collections.get_mut("results") else {
                    return fail(500, "results collection missing");
                };
                let before = results.len();
                results.retain(|r| id_string(r.get("fixture_id")).as_deref() != Some(*id));
                if results.len() == before {
                    return fail(404, "Result not found");
                }
                ok(json!({ "deleted": true }))
            }
            ("POST", ["teams", id, "coaches"]) => {
                let coach = body.get("coach_id").cloned().unwrap_or(Value::Null);
                let Some(coach_id) = id_string(Some(&coach)) else {
                    return fail(400, "coach_id is required");
                };
                match find_mut(db, "teams", id) {
                    Some(team) => team["coach_id"] = coach,
                    None => return fail(404, "Team not found"),
                }
                if let Some(user) = find_mut(db, "users", &coach_id) {
                    user["team_id"] = numeric_or_string(id);
                }
                ok(json!({ "success": true }))
            }
            ("POST", [collection]) => {
                let Some(key) = collection_key(collection) else {
                    return fail(404, "Route not found");
                };
                if let Err(message) = check_record(db, key, &body, None) {
                    return fail(400, &message);
                }
                let mut record = body;
                if key == "users" {
                    if let Some(password) = take_password(&mut record) {
                        if let Some(email) = record.get("email").and_then(Value::as_str) {
                            db.passwords.insert(email.to_lowercase(), password);
                        }
                    }
                }
                created(insert_new(db, key, record))
            }
            ("PUT", [collection, id]) => {
                let Some(key) = collection_key(collection) else {
                    return fail(404, "Route not found");
                };
                if let Err(message) = check_record(db, key, &body, Some(id)) {
                    return fail(400, &message);
                }
                let mut patch = body;
                let password = if key == "users" { take_password(&mut patch) } else { None };
                let Some(record) = find_mut(db, key, id) else {
                    return fail(404, &format!("{} not found", singular(key)));
                };
                merge(record, &patch);
                let updated = record.clone();
                if let (Some(password), Some(email)) =
                    (password, updated.get("email").and_then(Value::as_str))
                {
                    db.passwords.insert(email.to_lowercase(), password);
                }
                ok(updated)
            }
            ("DELETE", [collection, id]) => {
                let Some(key) = collection_key(collection) else {
                    return fail(404, "Route not found");
                };
                let Some(records) = db.collections.get_mut(key) else {
                    return fail(404, "Route not found");
                };
                let before = records.len();
                records.retain(|r| id_string(r.get("id")).as_deref() != Some(*id));
                if records.len() == before {
                    return fail(404, &format!("{} not found", singular(key)));
                }
                ok(json!({ "deleted": true }))
            }
            _ => fail(404, "Route not found"),
        }
    }
}

impl Transport for FakeBackend {
    fn send(&self, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
        Ok(self.handle(req))
    }
}

struct Viewer {
    user_id: String,
    admin: bool,
}

impl Viewer {
    fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            user_id: id_string(claims.user_id.as_ref()).unwrap_or_default(),
            admin: claims
                .role
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case("admin")),
        }
    }
}

/// Admins may write anything. Coaches may only add or edit players on the
/// team they coach.
fn authorize(
    db: &Db,
    viewer: &Viewer,
    method: &str,
    path: &[&str],
    body: &Value,
) -> Result<(), ApiResponse> {
    if viewer.admin {
        return Ok(());
    }
    let own_team = coach_team(db, &viewer.user_id);
    let body_team = id_string(body.get("team_id"));
    let allowed = match (method, path) {
        ("POST", ["players"]) => own_team.is_some() && body_team == own_team,
        ("PUT", ["players", id]) => {
            let current = find(db, "players", id).and_then(|p| id_string(p.get("team_id")));
            own_team.is_some()
                && current == own_team
                && (body_team.is_none() || body_team == own_team)
        }
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(fail(403, "Access denied"))
    }
}

fn coach_team(db: &Db, user_id: &str) -> Option<String> {
    rows(db, "teams")
        .iter()
        .find(|t| id_string(t.get("coach_id")).as_deref() == Some(user_id))
        .and_then(|t| id_string(t.get("id")))
        .or_else(|| find(db, "users", user_id).and_then(|u| id_string(u.get("team_id"))))
}

/// Server-side checks the real API performs on writes.
fn check_record(db: &Db, key: &str, body: &Value, editing: Option<&str>) -> Result<(), String> {
    match key {
        "fixtures" => {
            let league_of = |field: &str| {
                let team = id_string(body.get(field))?;
                find(db, "teams", &team).and_then(|t| id_string(t.get("league_id")))
            };
            if let (Some(home), Some(away)) = (league_of("home_team_id"), league_of("away_team_id")) {
                if home != away {
                    return Err("Teams must belong to the same league".to_string());
                }
            }
            Ok(())
        }
        "users" => {
            let email = body.get("email").and_then(Value::as_str).map(str::to_lowercase);
            let taken = rows(db, "users").iter().any(|u| {
                u.get("email").and_then(Value::as_str).map(str::to_lowercase) == email
                    && id_string(u.get("id")).as_deref() != editing
            });
            if email.is_some() && taken {
                return Err("Email already registered".to_string());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn collection_key(name: &str) -> Option<&'static str> {
    COLLECTIONS.iter().copied().find(|c| *c == name)
}

fn singular(key: &str) -> String {
    let name = key.trim_end_matches('s');
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn rows<'a>(db: &'a Db, key: &str) -> &'a [Value] {
    db.collections.get(key).map(Vec::as_slice).unwrap_or(&[])
}

fn find<'a>(db: &'a Db, key: &str, id: &str) -> Option<&'a Value> {
    rows(db, key)
        .iter()
        .find(|r| id_string(r.get("id")).as_deref() == Some(id))
}

fn find_mut<'a>(db: &'a mut Db, key: &str, id: &str) -> Option<&'a mut Value> {
    db.collections
        .get_mut(key)?
        .iter_mut()
        .find(|r| id_string(r.get("id")).as_deref() == Some(id))
}

fn result_index(db: &Db, fixture_id: &str) -> Option<usize> {
    rows(db, "results")
        .iter()
        .position(|r| id_string(r.get("fixture_id")).as_deref() == Some(fixture_id))
}

fn insert_new(db: &mut Db, key: &'static str, mut record: Value) -> Value {
    db.next_id += 1;
    let id = db.next_id;
    if !record.is_object() {
        record = Value::Object(Map::new());
    }
    if let Value::Object(map) = &mut record {
        map.insert("id".into(), json!(id));
    }
    db.collections.entry(key).or_default().push(record.clone());
    record
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            if key != "id" {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn take_password(record: &mut Value) -> Option<String> {
    let Value::Object(map) = record else {
        return None;
    };
    map.remove("password")
        .and_then(|p| p.as_str().map(str::to_string))
        .filter(|p| !p.is_empty())
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn numeric_or_string(id: &str) -> Value {
    id.parse::<u64>().map(|n| json!(n)).unwrap_or_else(|_| json!(id))
}

fn ok(data: Value) -> ApiResponse {
    respond(200, json!({ "success": true, "data": data }))
}

fn created(data: Value) -> ApiResponse {
    respond(201, json!({ "success": true, "data": data }))
}

fn fail(status: u16, message: &str) -> ApiResponse {
    respond(status, json!({ "success": false, "error": message }))
}

fn respond(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        body: body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;

    fn get(path: &str, bearer: Option<String>) -> ApiRequest {
        let mut req = ApiRequest::new(Method::GET, path);
        req.bearer = bearer;
        req
    }

    #[test]
    fn rejects_requests_without_a_token() {
        let backend = FakeBackend::seeded();
        let resp = backend.send(&get("/teams", None)).unwrap();
        assert_eq!(resp.status, 401);
    }

    #[test]
    fn coach_cannot_create_venues_but_can_add_own_players() {
        let backend = FakeBackend::seeded();
        let token = Some(backend.issue_token("12", "COACH"));
        let mut venue = ApiRequest::new(Method::POST, "/venues").with_body(json!({"name": "X"}));
        venue.bearer = token.clone();
        assert_eq!(backend.send(&venue).unwrap().status, 403);

        let mut player = ApiRequest::new(Method::POST, "/players")
            .with_body(json!({"first_name": "Kai", "last_name": "Moor", "team_id": 4}));
        player.bearer = token.clone();
        assert_eq!(backend.send(&player).unwrap().status, 201);

        let mut other = ApiRequest::new(Method::POST, "/players")
            .with_body(json!({"first_name": "Kai", "last_name": "Moor", "team_id": 5}));
        other.bearer = token;
        assert_eq!(backend.send(&other).unwrap().status, 403);
    }

    #[test]
    fn date_range_is_inclusive_on_both_days() {
        let backend = FakeBackend::seeded();
        let req = get("/fixtures/date-range", Some(backend.issue_token("7", "ADMIN")))
            .with_query("startDate", "2025-03-08")
            .with_query("endDate", "2025-03-15");
        let resp = backend.send(&req).unwrap();
        let body: Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }
}
