//! Request/response adapters between the REST API's loosely shaped JSON and
//! the typed model. Every inbound record is normalized exactly once here:
//! identifier aliases (`id`, `_id`, `team_id`, `teamId`, nested `team.id`),
//! camelCase/snake_case keys and numeric-vs-string values all collapse into
//! the typed fields, so nothing downstream re-derives them.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value, json};

use crate::model::{
    EntityId, Fixture, FixtureDraft, FixtureStatus, League, LeagueDraft, MatchResult, Player,
    PlayerDraft, Referee, RefereeDraft, ResultDraft, Role, Team, TeamDraft, User, UserDraft, Venue,
    VenueDraft,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    League,
    Team,
    Player,
    Fixture,
    Result,
    Referee,
    Venue,
    User,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::League,
        ResourceKind::Team,
        ResourceKind::Player,
        ResourceKind::Fixture,
        ResourceKind::Result,
        ResourceKind::Referee,
        ResourceKind::Venue,
        ResourceKind::User,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::League => "league",
            ResourceKind::Team => "team",
            ResourceKind::Player => "player",
            ResourceKind::Fixture => "fixture",
            ResourceKind::Result => "result",
            ResourceKind::Referee => "referee",
            ResourceKind::Venue => "venue",
            ResourceKind::User => "user",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::League => "leagues",
            ResourceKind::Team => "teams",
            ResourceKind::Player => "players",
            ResourceKind::Fixture => "fixtures",
            ResourceKind::Result => "results",
            ResourceKind::Referee => "referees",
            ResourceKind::Venue => "venues",
            ResourceKind::User => "users",
        }
    }

    pub fn path(self) -> String {
        format!("/{}", self.plural())
    }
}

/// One REST collection and its mapping to and from the typed model.
pub trait Resource: Clone + Send + Sync + 'static {
    const KIND: ResourceKind;
    type Draft: Clone + Send + 'static;

    fn id(&self) -> &EntityId;
    fn from_wire(value: &Value) -> Option<Self>;
    fn create_payload(draft: &Self::Draft) -> Value;

    fn update_payload(draft: &Self::Draft) -> Value {
        Self::create_payload(draft)
    }
}

impl Resource for League {
    const KIND: ResourceKind = ResourceKind::League;
    type Draft = LeagueDraft;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_wire(value: &Value) -> Option<Self> {
        Some(League {
            id: pick_id(value, &["id", "_id", "league_id", "leagueId"])?,
            name: pick_string(value, &["name"])?,
            season: pick_string(value, &["season"]),
            start_date: pick_date(value, &["start_date", "startDate"]),
            end_date: pick_date(value, &["end_date", "endDate"]),
            description: pick_string(value, &["description"]),
        })
    }

    fn create_payload(draft: &LeagueDraft) -> Value {
        let mut body = Map::new();
        body.insert("name".into(), json!(draft.name.trim()));
        if let Some(season) = draft.season.as_deref().and_then(non_empty) {
            body.insert("season".into(), json!(season));
        }
        if let Some(date) = draft.start_date {
            body.insert("start_date".into(), json!(iso_day(date)));
        }
        if let Some(date) = draft.end_date {
            body.insert("end_date".into(), json!(iso_day(date)));
        }
        Value::Object(body)
    }
}

impl Resource for Team {
    const KIND: ResourceKind = ResourceKind::Team;
    type Draft = TeamDraft;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_wire(value: &Value) -> Option<Self> {
        let coach_name = lookup(value, "coach").and_then(|coach| {
            let first = pick_string(coach, &["first_name", "firstName"]).unwrap_or_default();
            let last = pick_string(coach, &["last_name", "lastName"]).unwrap_or_default();
            let joined = format!("{first} {last}").trim().to_string();
            if joined.is_empty() {
                pick_string(coach, &["name"])
            } else {
                Some(joined)
            }
        });
        Some(Team {
            id: pick_id(value, &["id", "_id", "team_id", "teamId"])?,
            name: pick_string(value, &["name", "team_name", "teamName"])?,
            league_id: pick_id(value, &["league_id", "leagueId", "league.id", "league._id"]),
            coach_id: pick_id(value, &["coach_id", "coachId", "coach.id", "coach._id"]),
            league_name: pick_string(value, &["league.name", "league_name", "leagueName"]),
            coach_name,
        })
    }

    fn create_payload(draft: &TeamDraft) -> Value {
        json!({
            "name": draft.name.trim(),
            "league_id": draft.league_id.as_ref().map(id_value),
        })
    }

    // Coach assignment goes through its own endpoint, and the league of an
    // existing team is not editable.
    fn update_payload(draft: &TeamDraft) -> Value {
        json!({ "name": draft.name.trim() })
    }
}

impl Resource for Player {
    const KIND: ResourceKind = ResourceKind::Player;
    type Draft = PlayerDraft;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_wire(value: &Value) -> Option<Self> {
        Some(Player {
            id: pick_id(value, &["id", "_id", "player_id", "playerId"])?,
            first_name: pick_string(value, &["first_name", "firstName"]).unwrap_or_default(),
            last_name: pick_string(value, &["last_name", "lastName"]).unwrap_or_default(),
            team_id: pick_id(value, &["team_id", "teamId", "team.id", "team._id"]),
            position: pick_string(value, &["position"]),
            jersey_number: pick_u32(value, &["jersey_number", "jerseyNumber", "number"]),
        })
    }

    fn create_payload(draft: &PlayerDraft) -> Value {
        json!({
            "first_name": draft.first_name.trim(),
            "last_name": draft.last_name.trim(),
            "position": draft.position.as_deref().and_then(non_empty),
            "jersey_number": draft.jersey_number,
            "team_id": draft.team_id.as_ref().map(id_value),
        })
    }
}

impl Resource for Fixture {
    const KIND: ResourceKind = ResourceKind::Fixture;
    type Draft = FixtureDraft;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_wire(value: &Value) -> Option<Self> {
        Some(Fixture {
            id: pick_id(value, &["id", "_id", "fixture_id", "fixtureId"])?,
            league_id: pick_id(value, &["league_id", "leagueId", "league.id"]),
            home_team_id: pick_id(
                value,
                &["home_team_id", "homeTeamId", "home_team.id", "homeTeam.id"],
            ),
            away_team_id: pick_id(
                value,
                &["away_team_id", "awayTeamId", "away_team.id", "awayTeam.id"],
            ),
            venue_id: pick_id(value, &["venue_id", "venueId", "venue.id"]),
            referee_id: pick_id(value, &["referee_id", "refereeId", "referee.id"]),
            match_date: pick_datetime(value, &["match_date", "matchDate", "date"]),
            status: pick_string(value, &["status"])
                .map(|s| FixtureStatus::parse(&s))
                .unwrap_or(FixtureStatus::Scheduled),
            home_team_name: pick_string(
                value,
                &["home_team.name", "homeTeam.name", "home_team_name"],
            ),
            away_team_name: pick_string(
                value,
                &["away_team.name", "awayTeam.name", "away_team_name"],
            ),
            venue_name: pick_string(value, &["venue.name", "venue_name"]),
        })
    }

    fn create_payload(draft: &FixtureDraft) -> Value {
        json!({
            "league_id": draft.league_id.as_ref().map(|id| id.as_str()),
            "home_team_id": draft.home_team_id.as_str(),
            "away_team_id": draft.away_team_id.as_str(),
            "venue_id": draft.venue_id.as_str(),
            "referee_id": draft.referee_id.as_ref().map(|id| id.as_str()),
            "match_date": iso_instant(draft.match_date),
            "status": draft.status.as_wire(),
        })
    }
}

impl Resource for MatchResult {
    const KIND: ResourceKind = ResourceKind::Result;
    type Draft = ResultDraft;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_wire(value: &Value) -> Option<Self> {
        let fixture_id = pick_id(value, &["fixture_id", "fixtureId", "fixture.id"])?;
        let id = pick_id(value, &["id", "_id", "result_id", "resultId"])
            .unwrap_or_else(|| fixture_id.clone());
        Some(MatchResult {
            id,
            fixture_id,
            home_score: pick_u32(value, &["home_score", "homeScore"]).unwrap_or(0),
            away_score: pick_u32(value, &["away_score", "awayScore"]).unwrap_or(0),
            recorded_at: pick_datetime(value, &["created_at", "createdAt", "recorded_at"]),
        })
    }

    fn create_payload(draft: &ResultDraft) -> Value {
        json!({
            "fixture_id": id_value(&draft.fixture_id),
            "home_score": draft.home_score,
            "away_score": draft.away_score,
        })
    }
}

impl Resource for Referee {
    const KIND: ResourceKind = ResourceKind::Referee;
    type Draft = RefereeDraft;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_wire(value: &Value) -> Option<Self> {
        Some(Referee {
            id: pick_id(value, &["id", "_id", "referee_id", "refereeId"])?,
            first_name: pick_string(value, &["first_name", "firstName"]).unwrap_or_default(),
            last_name: pick_string(value, &["last_name", "lastName"]).unwrap_or_default(),
            email: pick_string(value, &["email"]),
            phone: pick_string(value, &["phone"]),
            experience: pick_u32(value, &["experience", "experience_years", "experienceYears"]),
        })
    }

    fn create_payload(draft: &RefereeDraft) -> Value {
        json!({
            "first_name": draft.first_name.trim(),
            "last_name": draft.last_name.trim(),
            "email": draft.email.as_deref().and_then(non_empty),
            "phone": draft.phone.as_deref().and_then(non_empty),
            "experience": draft.experience,
        })
    }
}

impl Resource for Venue {
    const KIND: ResourceKind = ResourceKind::Venue;
    type Draft = VenueDraft;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_wire(value: &Value) -> Option<Self> {
        Some(Venue {
            id: pick_id(value, &["id", "_id", "venue_id", "venueId"])?,
            name: pick_string(value, &["name"])?,
            location: pick_string(value, &["location", "address"]),
            city: pick_string(value, &["city"]),
            country: pick_string(value, &["country"]),
            capacity: pick_u32(value, &["capacity"]),
        })
    }

    fn create_payload(draft: &VenueDraft) -> Value {
        json!({
            "name": draft.name.trim(),
            "location": draft.location.as_deref().and_then(non_empty),
            "city": draft.city.as_deref().and_then(non_empty),
            "country": draft.country.as_deref().and_then(non_empty),
            "capacity": draft.capacity,
        })
    }
}

impl Resource for User {
    const KIND: ResourceKind = ResourceKind::User;
    type Draft = UserDraft;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_wire(value: &Value) -> Option<Self> {
        Some(User {
            id: pick_id(value, &["id", "_id", "user_id", "userId"])?,
            first_name: pick_string(value, &["first_name", "firstName"]).unwrap_or_default(),
            last_name: pick_string(value, &["last_name", "lastName"]).unwrap_or_default(),
            email: pick_string(value, &["email"]).unwrap_or_default(),
            role: pick_string(value, &["role"]).and_then(|r| Role::parse(&r)),
            team_id: pick_id(value, &["team_id", "teamId", "team.id"]),
        })
    }

    fn create_payload(draft: &UserDraft) -> Value {
        let mut body = Map::new();
        body.insert("first_name".into(), json!(draft.first_name.trim()));
        body.insert("last_name".into(), json!(draft.last_name.trim()));
        body.insert("email".into(), json!(draft.email.trim()));
        body.insert("role".into(), json!(draft.role.as_wire()));
        if let Some(password) = draft.password.as_deref().filter(|p| !p.is_empty()) {
            body.insert("password".into(), json!(password));
        }
        Value::Object(body)
    }
}

/// Strips the `{ "success": .., "data": .. }` envelope when present.
pub fn unwrap_envelope(value: &Value) -> &Value {
    match value.get("data") {
        Some(inner) if !inner.is_null() => inner,
        _ => value,
    }
}

pub fn parse_list<R: Resource>(value: &Value) -> Vec<R> {
    match unwrap_envelope(value) {
        Value::Array(items) => items.iter().filter_map(R::from_wire).collect(),
        // Some list endpoints answer `{ data: { teams: [...] } }`.
        Value::Object(map) => map
            .get(R::KIND.plural())
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(R::from_wire).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

pub fn parse_one<R: Resource>(value: &Value) -> Option<R> {
    let inner = unwrap_envelope(value);
    R::from_wire(inner).or_else(|| inner.get(R::KIND.label()).and_then(R::from_wire))
}

/// Sends ids the way the API stores them: all-digit ids as numbers.
pub fn id_value(id: &EntityId) -> Value {
    if id.is_numeric() {
        if let Ok(n) = id.as_str().parse::<u64>() {
            return json!(n);
        }
    }
    json!(id.as_str())
}

pub fn iso_day(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

pub fn iso_instant(at: NaiveDateTime) -> String {
    format!("{}Z", at.format("%Y-%m-%dT%H:%M:%S%.3f"))
}

pub fn pick_id(value: &Value, keys: &[&str]) -> Option<EntityId> {
    keys.iter()
        .filter_map(|key| lookup(value, key))
        .find_map(as_id)
}

pub fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| lookup(value, key))
        .find_map(|v| match v {
            Value::String(s) => non_empty(s).map(str::to_string),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

pub fn pick_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|key| lookup(value, key))
        .find_map(|v| {
            if let Some(n) = v.as_u64() {
                return u32::try_from(n).ok();
            }
            if let Some(f) = v.as_f64() {
                if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 {
                    return Some(f as u32);
                }
            }
            v.as_str().and_then(|s| s.trim().parse::<u32>().ok())
        })
}

pub fn pick_date(value: &Value, keys: &[&str]) -> Option<NaiveDate> {
    pick_datetime(value, keys).map(|dt| dt.date())
}

pub fn pick_datetime(value: &Value, keys: &[&str]) -> Option<NaiveDateTime> {
    keys.iter()
        .filter_map(|key| lookup(value, key))
        .filter_map(|v| v.as_str())
        .find_map(parse_datetime)
}

/// Accepts RFC 3339 instants (normalized to UTC), the common naive layouts, and
/// bare dates (midnight).
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cleaned) {
        return Some(dt.naive_utc());
    }
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(cleaned, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Dotted lookup: `"home_team.id"` walks into nested objects.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    if current.is_null() { None } else { Some(current) }
}

fn as_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(s) => EntityId::new(s.as_str()),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Some(EntityId::from(u.to_string().as_str()));
            }
            if let Some(i) = n.as_i64() {
                return Some(EntityId::from(i.to_string().as_str()));
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 {
                Some(EntityId::from(format!("{}", f as i64).as_str()))
            } else {
                EntityId::new(n.to_string())
            }
        }
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_coach_id_is_read_from_every_alias() {
        let scalar = json!({"id": 3, "name": "Bolts", "coach_id": 12});
        let camel = json!({"_id": "3", "name": "Bolts", "coachId": "12"});
        let nested = json!({"team_id": 3, "name": "Bolts", "coach": {"id": 12.0}});
        for raw in [scalar, camel, nested] {
            let team = Team::from_wire(&raw).expect("team should parse");
            assert_eq!(team.id.as_str(), "3");
            assert_eq!(team.coach_id, Some(EntityId::from("12")));
        }
    }

    #[test]
    fn fixture_team_ids_come_from_nested_objects_too() {
        let raw = json!({
            "fixtureId": "f1",
            "homeTeam": {"id": 1, "name": "Bolts"},
            "away_team": {"id": "2"},
            "match_date": "2025-04-05T14:30:00.000Z",
            "status": "completed"
        });
        let fixture = Fixture::from_wire(&raw).unwrap();
        assert_eq!(fixture.home_team_id, Some(EntityId::from("1")));
        assert_eq!(fixture.away_team_id, Some(EntityId::from("2")));
        assert_eq!(fixture.home_team_name.as_deref(), Some("Bolts"));
        assert_eq!(fixture.status, FixtureStatus::Completed);
        assert_eq!(
            fixture.match_date.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2025-04-05 14:30"
        );
    }

    #[test]
    fn result_without_own_id_is_keyed_by_fixture() {
        let result = MatchResult::from_wire(&json!({"fixtureId": 9, "homeScore": "3", "away_score": 1}))
            .unwrap();
        assert_eq!(result.id, EntityId::from("9"));
        assert_eq!((result.home_score, result.away_score), (3, 1));
    }

    #[test]
    fn records_without_an_id_are_dropped() {
        let body = json!({"success": true, "data": [{"name": "No id"}, {"id": 1, "name": "Ok"}]});
        let leagues: Vec<League> = parse_list(&body);
        assert_eq!(leagues.len(), 1);
        assert_eq!(leagues[0].name, "Ok");
    }

    #[test]
    fn player_payload_sends_numeric_team_ids_as_numbers() {
        let draft = PlayerDraft {
            first_name: " Ada ".into(),
            last_name: "Stone".into(),
            team_id: Some(EntityId::from("14")),
            position: Some(String::new()),
            jersey_number: Some(9),
        };
        let body = Player::create_payload(&draft);
        assert_eq!(body["team_id"], json!(14));
        assert_eq!(body["first_name"], json!("Ada"));
        assert_eq!(body["position"], Value::Null);

        let text_team = PlayerDraft {
            team_id: Some(EntityId::from("ckx9")),
            ..draft
        };
        assert_eq!(Player::create_payload(&text_team)["team_id"], json!("ckx9"));
    }

    #[test]
    fn league_dates_go_out_as_utc_midnight() {
        let draft = LeagueDraft {
            name: "U12 Spring".into(),
            season: None,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            end_date: None,
        };
        let body = League::create_payload(&draft);
        assert_eq!(body["start_date"], json!("2025-03-01T00:00:00.000Z"));
        assert!(body.get("season").is_none());
        assert!(body.get("end_date").is_none());
    }

    #[test]
    fn user_update_omits_empty_password() {
        let draft = UserDraft {
            first_name: "Sam".into(),
            last_name: "Reed".into(),
            email: "sam@example.com".into(),
            role: Role::Coach,
            password: Some(String::new()),
        };
        let body = User::update_payload(&draft);
        assert!(body.get("password").is_none());
        assert_eq!(body["role"], json!("COACH"));
    }

    #[test]
    fn parse_datetime_accepts_common_layouts() {
        for raw in [
            "2025-05-01T10:00:00Z",
            "2025-05-01T10:00:00.000Z",
            "2025-05-01T12:00:00+02:00",
            "2025-05-01 10:00",
            "2025-05-01T10:00",
        ] {
            let dt = parse_datetime(raw).unwrap_or_else(|| panic!("{raw} should parse"));
            assert_eq!(dt.format("%H:%M").to_string(), "10:00", "{raw}");
        }
        assert!(parse_datetime("2025-05-01").is_some());
        assert!(parse_datetime("soon").is_none());
    }
}
