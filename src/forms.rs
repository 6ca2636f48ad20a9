//! Terminal forms. A form is a list of fields edited in place; `build` turns
//! it into a provider command or an inline error, in which case nothing is
//! sent.

use crate::derive;
use crate::model::{Credentials, EntityId, FixtureStatus, Role, Team};
use crate::state::{AppState, Draft, ProviderCommand};
use crate::validate::{self, FixtureInput};
use crate::wire::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Login,
    Register,
    League,
    Team,
    Player,
    Fixture,
    Result,
    Referee,
    Venue,
    User,
    AssignCoach,
}

impl FormKind {
    pub fn resource(self) -> Option<ResourceKind> {
        match self {
            FormKind::Login | FormKind::Register => None,
            FormKind::League => Some(ResourceKind::League),
            FormKind::Team | FormKind::AssignCoach => Some(ResourceKind::Team),
            FormKind::Player => Some(ResourceKind::Player),
            FormKind::Fixture => Some(ResourceKind::Fixture),
            FormKind::Result => Some(ResourceKind::Result),
            FormKind::Referee => Some(ResourceKind::Referee),
            FormKind::Venue => Some(ResourceKind::Venue),
            FormKind::User => Some(ResourceKind::User),
        }
    }

    fn from_resource(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::League => FormKind::League,
            ResourceKind::Team => FormKind::Team,
            ResourceKind::Player => FormKind::Player,
            ResourceKind::Fixture => FormKind::Fixture,
            ResourceKind::Result => FormKind::Result,
            ResourceKind::Referee => FormKind::Referee,
            ResourceKind::Venue => FormKind::Venue,
            ResourceKind::User => FormKind::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Secret,
    Choice(Vec<Choice>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
    pub kind: FieldKind,
}

impl Field {
    fn text(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            value: String::new(),
            kind: FieldKind::Text,
        }
    }

    fn secret(key: &'static str, label: &'static str) -> Self {
        Self {
            kind: FieldKind::Secret,
            ..Self::text(key, label)
        }
    }

    fn choice(key: &'static str, label: &'static str, options: Vec<Choice>) -> Self {
        let value = options.first().map(|c| c.value.clone()).unwrap_or_default();
        Self {
            key,
            label,
            value,
            kind: FieldKind::Choice(options),
        }
    }

    /// What the UI prints for the field.
    pub fn display(&self) -> String {
        match &self.kind {
            FieldKind::Text => self.value.clone(),
            FieldKind::Secret => "*".repeat(self.value.chars().count()),
            FieldKind::Choice(options) => options
                .iter()
                .find(|c| c.value == self.value)
                .map(|c| c.label.clone())
                .unwrap_or_else(|| "(none)".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub kind: FormKind,
    pub editing: Option<EntityId>,
    pub fields: Vec<Field>,
    pub focus: usize,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl FormState {
    fn with_fields(kind: FormKind, fields: Vec<Field>) -> Self {
        Self {
            kind,
            editing: None,
            fields,
            focus: 0,
            error: None,
            warning: None,
        }
    }

    pub fn login() -> Self {
        Self::with_fields(
            FormKind::Login,
            vec![
                Field::text("email", "Email"),
                Field::secret("password", "Password"),
                Field::choice("role", "Role", role_choices(true)),
            ],
        )
    }

    pub fn register() -> Self {
        Self::with_fields(
            FormKind::Register,
            vec![
                Field::text("first_name", "First name"),
                Field::text("last_name", "Last name"),
                Field::text("email", "Email"),
                Field::secret("password", "Password"),
                Field::choice("role", "Role", role_choices(false)),
            ],
        )
    }

    pub fn title(&self) -> String {
        let verb = if self.editing.is_some() { "Edit" } else { "New" };
        match self.kind {
            FormKind::Login => "Sign in".to_string(),
            FormKind::Register => "Create account".to_string(),
            FormKind::AssignCoach => "Assign coach".to_string(),
            FormKind::Result if self.editing.is_some() => "Edit result".to_string(),
            FormKind::Result => "Record result".to_string(),
            other => match other.resource() {
                Some(kind) => format!("{verb} {}", kind.label()),
                None => verb.to_string(),
            },
        }
    }

    /// Blank form for a new record.
    pub fn create(kind: ResourceKind, state: &AppState) -> Self {
        let mut form = Self::with_fields(FormKind::from_resource(kind), blank_fields(kind, state));
        form.refresh_warning(state);
        form
    }

    /// My Team: a coach adds a player to their own team only.
    pub fn player_for_team(team: &Team) -> Self {
        let mut fields = player_fields(vec![Choice::new(team.id.as_str(), team.name.clone())]);
        set_field(&mut fields, "team_id", team.id.as_str());
        Self::with_fields(FormKind::Player, fields)
    }

    /// Form prefilled from the record `id` in the matching store.
    pub fn edit(kind: ResourceKind, id: &EntityId, state: &AppState) -> Option<Self> {
        let mut fields = blank_fields(kind, state);
        match kind {
            ResourceKind::League => {
                let l = state.leagues.get(id)?;
                set_field(&mut fields, "name", &l.name);
                set_field(&mut fields, "season", l.season.as_deref().unwrap_or(""));
                set_field(&mut fields, "start_date", &fmt_date(l.start_date));
                set_field(&mut fields, "end_date", &fmt_date(l.end_date));
            }
            ResourceKind::Team => {
                let t = state.teams.get(id)?;
                set_field(&mut fields, "name", &t.name);
                // League is fixed once a team exists.
                fields.retain(|f| f.key != "league_id");
            }
            ResourceKind::Player => {
                let p = state.players.get(id)?;
                if state.role() == Some(Role::Coach) {
                    let own: Vec<Choice> = state
                        .coach_team()
                        .map(|t| vec![Choice::new(t.id.as_str(), t.name.clone())])
                        .unwrap_or_default();
                    fields = player_fields(own);
                }
                set_field(&mut fields, "first_name", &p.first_name);
                set_field(&mut fields, "last_name", &p.last_name);
                set_field(&mut fields, "team_id", p.team_id.as_ref().map(|t| t.as_str()).unwrap_or(""));
                set_field(&mut fields, "position", p.position.as_deref().unwrap_or(""));
                set_field(&mut fields, "jersey_number", &fmt_num(p.jersey_number));
            }
            ResourceKind::Fixture => {
                let f = state.fixtures.get(id)?;
                let id_str = |v: &Option<EntityId>| v.as_ref().map(|i| i.as_str().to_string()).unwrap_or_default();
                set_field(&mut fields, "home_team_id", &id_str(&f.home_team_id));
                set_field(&mut fields, "away_team_id", &id_str(&f.away_team_id));
                set_field(&mut fields, "venue_id", &id_str(&f.venue_id));
                set_field(&mut fields, "referee_id", &id_str(&f.referee_id));
                if let Some(at) = f.match_date {
                    set_field(&mut fields, "date", &at.format("%Y-%m-%d").to_string());
                    set_field(&mut fields, "time", &at.format("%H:%M").to_string());
                }
                set_field(&mut fields, "status", f.status.as_wire());
            }
            ResourceKind::Result => {
                let r = state.results.get(id)?;
                let label = derive::find_fixture(&state.fixtures.items, &r.fixture_id)
                    .map(|f| derive::fixture_label(f, &state.teams.items))
                    .unwrap_or_else(|| format!("Fixture {}", r.fixture_id));
                fields = result_fields(vec![Choice::new(r.fixture_id.as_str(), label)]);
                set_field(&mut fields, "home_score", &r.home_score.to_string());
                set_field(&mut fields, "away_score", &r.away_score.to_string());
            }
            ResourceKind::Referee => {
                let r = state.referees.get(id)?;
                set_field(&mut fields, "first_name", &r.first_name);
                set_field(&mut fields, "last_name", &r.last_name);
                set_field(&mut fields, "email", r.email.as_deref().unwrap_or(""));
                set_field(&mut fields, "phone", r.phone.as_deref().unwrap_or(""));
                set_field(&mut fields, "experience", &fmt_num(r.experience));
            }
            ResourceKind::Venue => {
                let v = state.venues.get(id)?;
                set_field(&mut fields, "name", &v.name);
                set_field(&mut fields, "location", v.location.as_deref().unwrap_or(""));
                set_field(&mut fields, "city", v.city.as_deref().unwrap_or(""));
                set_field(&mut fields, "country", v.country.as_deref().unwrap_or(""));
                set_field(&mut fields, "capacity", &fmt_num(v.capacity));
            }
            ResourceKind::User => {
                let u = state.users.get(id)?;
                set_field(&mut fields, "first_name", &u.first_name);
                set_field(&mut fields, "last_name", &u.last_name);
                set_field(&mut fields, "email", &u.email);
                set_field(&mut fields, "role", u.role.map(Role::as_wire).unwrap_or(""));
            }
        }
        let mut form = Self::with_fields(FormKind::from_resource(kind), fields);
        form.editing = Some(match kind {
            // Results are saved through their fixture.
            ResourceKind::Result => state.results.get(id)?.fixture_id.clone(),
            _ => id.clone(),
        });
        form.refresh_warning(state);
        Some(form)
    }

    pub fn assign_coach(team: &Team, state: &AppState) -> Self {
        let coaches: Vec<Choice> = state
            .users
            .items
            .iter()
            .filter(|u| u.role == Some(Role::Coach))
            .map(|u| Choice::new(u.id.as_str(), format!("{} <{}>", u.full_name(), u.email)))
            .collect();
        let mut fields = vec![Field::choice("coach_id", "Coach", coaches)];
        if let Some(current) = &team.coach_id {
            set_field(&mut fields, "coach_id", current.as_str());
        }
        let mut form = Self::with_fields(FormKind::AssignCoach, fields);
        form.editing = Some(team.id.clone());
        form
    }

    pub fn value(&self, key: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
            .unwrap_or("")
    }

    pub fn set_value(&mut self, key: &str, value: &str) {
        set_field(&mut self.fields, key, value);
    }

    pub fn focused(&self) -> Option<&Field> {
        self.fields.get(self.focus)
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn insert_char(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            if !matches!(field.kind, FieldKind::Choice(_)) {
                field.value.push(c);
            }
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            if !matches!(field.kind, FieldKind::Choice(_)) {
                field.value.pop();
            }
        }
    }

    pub fn cycle_choice(&mut self, forward: bool) {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        let FieldKind::Choice(options) = &field.kind else {
            return;
        };
        if options.is_empty() {
            return;
        }
        let current = options.iter().position(|c| c.value == field.value);
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % options.len(),
            (Some(i), false) => (i + options.len() - 1) % options.len(),
            (None, _) => 0,
        };
        field.value = options[next].value.clone();
    }

    /// Live cross-league warning for the fixture form.
    pub fn refresh_warning(&mut self, state: &AppState) {
        if self.kind != FormKind::Fixture {
            return;
        }
        self.warning = match (
            EntityId::new(self.value("home_team_id")),
            EntityId::new(self.value("away_team_id")),
        ) {
            (Some(home), Some(away)) => {
                validate::check_fixture_leagues(&home, &away, &state.teams.items)
                    .warning(&state.leagues.items)
            }
            _ => None,
        };
    }

    pub fn build(&self, state: &AppState) -> Result<ProviderCommand, String> {
        let v = |key: &str| self.value(key);
        let creating = self.editing.is_none();
        let draft = match self.kind {
            FormKind::Login => {
                let email = v("email").trim();
                if email.is_empty() || v("password").is_empty() {
                    return Err("Email and password are required".to_string());
                }
                return Ok(ProviderCommand::Login(Credentials {
                    email: email.to_string(),
                    password: v("password").to_string(),
                    role: Role::parse(v("role")),
                }));
            }
            FormKind::Register => {
                let draft = validate::validate_user(
                    v("first_name"),
                    v("last_name"),
                    v("email"),
                    v("role"),
                    v("password"),
                    true,
                )
                .map_err(|e| e.to_string())?;
                return Ok(ProviderCommand::Register(draft));
            }
            FormKind::AssignCoach => {
                let team_id = self.editing.clone().ok_or("No team selected")?;
                let coach_id = EntityId::new(v("coach_id")).ok_or("Pick a coach")?;
                return Ok(ProviderCommand::AssignCoach { team_id, coach_id });
            }
            FormKind::Result => {
                let draft = validate::validate_result(
                    v("fixture_id"),
                    v("home_score"),
                    v("away_score"),
                    &state.fixtures.items,
                )
                .map_err(|e| e.to_string())?;
                return Ok(ProviderCommand::SaveFixtureResult {
                    draft,
                    existing: !creating,
                });
            }
            FormKind::League => Draft::League(
                validate::validate_league(v("name"), v("season"), v("start_date"), v("end_date"))
                    .map_err(|e| e.to_string())?,
            ),
            FormKind::Team => Draft::Team(
                validate::validate_team(v("name"), v("league_id"), creating)
                    .map_err(|e| e.to_string())?,
            ),
            FormKind::Player => Draft::Player(
                validate::validate_player(
                    v("first_name"),
                    v("last_name"),
                    v("team_id"),
                    v("position"),
                    v("jersey_number"),
                )
                .map_err(|e| e.to_string())?,
            ),
            FormKind::Fixture => {
                let input = FixtureInput {
                    home_team_id: v("home_team_id").to_string(),
                    away_team_id: v("away_team_id").to_string(),
                    venue_id: v("venue_id").to_string(),
                    referee_id: v("referee_id").to_string(),
                    date: v("date").to_string(),
                    time: v("time").to_string(),
                    status: v("status").to_string(),
                };
                Draft::Fixture(
                    validate::validate_fixture(&input, &state.teams.items)
                        .map_err(|e| e.to_string())?,
                )
            }
            FormKind::Referee => Draft::Referee(
                validate::validate_referee(
                    v("first_name"),
                    v("last_name"),
                    v("email"),
                    v("phone"),
                    v("experience"),
                )
                .map_err(|e| e.to_string())?,
            ),
            FormKind::Venue => Draft::Venue(
                validate::validate_venue(v("name"), v("location"), v("city"), v("country"), v("capacity"))
                    .map_err(|e| e.to_string())?,
            ),
            FormKind::User => Draft::User(
                validate::validate_user(
                    v("first_name"),
                    v("last_name"),
                    v("email"),
                    v("role"),
                    v("password"),
                    creating,
                )
                .map_err(|e| e.to_string())?,
            ),
        };
        Ok(match &self.editing {
            Some(id) => ProviderCommand::Update {
                id: id.clone(),
                draft,
            },
            None => ProviderCommand::Create(draft),
        })
    }
}

fn blank_fields(kind: ResourceKind, state: &AppState) -> Vec<Field> {
    match kind {
        ResourceKind::League => vec![
            Field::text("name", "Name"),
            Field::text("season", "Season"),
            Field::text("start_date", "Start date (YYYY-MM-DD)"),
            Field::text("end_date", "End date (YYYY-MM-DD)"),
        ],
        ResourceKind::Team => vec![
            Field::text("name", "Name"),
            Field::choice("league_id", "League", league_choices(state)),
        ],
        ResourceKind::Player => {
            let mut teams = vec![Choice::new("", "(no team)")];
            teams.extend(team_choices(state));
            player_fields(teams)
        }
        ResourceKind::Fixture => {
            let mut referees = vec![Choice::new("", "(none)")];
            referees.extend(
                state
                    .referees
                    .items
                    .iter()
                    .map(|r| Choice::new(r.id.as_str(), r.full_name())),
            );
            let venues: Vec<Choice> = state
                .venues
                .items
                .iter()
                .map(|v| Choice::new(v.id.as_str(), v.name.clone()))
                .collect();
            let statuses = [
                FixtureStatus::Scheduled,
                FixtureStatus::Completed,
                FixtureStatus::Postponed,
                FixtureStatus::Cancelled,
            ]
            .iter()
            .map(|s| Choice::new(s.as_wire(), s.as_wire()))
            .collect();
            let mut home = Field::choice("home_team_id", "Home team", team_choices(state));
            home.value.clear();
            let mut away = Field::choice("away_team_id", "Away team", team_choices(state));
            away.value.clear();
            vec![
                home,
                away,
                Field::choice("venue_id", "Venue", venues),
                Field::choice("referee_id", "Referee", referees),
                Field::text("date", "Date (YYYY-MM-DD)"),
                Field::text("time", "Time (HH:MM)"),
                Field::choice("status", "Status", statuses),
            ]
        }
        ResourceKind::Result => {
            let options = derive::completed_fixtures(&state.fixtures.items, &state.results.items, None)
                .into_iter()
                .map(|f| {
                    let date = f
                        .match_date
                        .map(|d| d.format(" (%Y-%m-%d)").to_string())
                        .unwrap_or_default();
                    Choice::new(f.id.as_str(), format!("{}{date}", derive::fixture_label(f, &state.teams.items)))
                })
                .collect();
            result_fields(options)
        }
        ResourceKind::Referee => vec![
            Field::text("first_name", "First name"),
            Field::text("last_name", "Last name"),
            Field::text("email", "Email"),
            Field::text("phone", "Phone"),
            Field::text("experience", "Experience (years)"),
        ],
        ResourceKind::Venue => vec![
            Field::text("name", "Name"),
            Field::text("location", "Location"),
            Field::text("city", "City"),
            Field::text("country", "Country"),
            Field::text("capacity", "Capacity"),
        ],
        ResourceKind::User => vec![
            Field::text("first_name", "First name"),
            Field::text("last_name", "Last name"),
            Field::text("email", "Email"),
            Field::choice("role", "Role", role_choices(false)),
            Field::secret("password", "Password"),
        ],
    }
}

fn player_fields(teams: Vec<Choice>) -> Vec<Field> {
    vec![
        Field::text("first_name", "First name"),
        Field::text("last_name", "Last name"),
        Field::choice("team_id", "Team", teams),
        Field::text("position", "Position"),
        Field::text("jersey_number", "Jersey number"),
    ]
}

fn result_fields(fixtures: Vec<Choice>) -> Vec<Field> {
    vec![
        Field::choice("fixture_id", "Fixture", fixtures),
        Field::text("home_score", "Home score"),
        Field::text("away_score", "Away score"),
    ]
}

fn role_choices(allow_blank: bool) -> Vec<Choice> {
    let mut roles = Vec::new();
    if allow_blank {
        roles.push(Choice::new("", "(any)"));
    }
    roles.push(Choice::new("COACH", "Coach"));
    roles.push(Choice::new("ADMIN", "Admin"));
    roles
}

fn league_choices(state: &AppState) -> Vec<Choice> {
    state
        .leagues
        .items
        .iter()
        .map(|l| Choice::new(l.id.as_str(), l.name.clone()))
        .collect()
}

fn team_choices(state: &AppState) -> Vec<Choice> {
    state
        .teams
        .items
        .iter()
        .map(|t| {
            let league = t
                .league_id
                .as_ref()
                .map(|id| validate::league_name(&state.leagues.items, id))
                .or(t.league_name.as_deref())
                .unwrap_or("Unknown League");
            Choice::new(t.id.as_str(), format!("{} ({league})", t.name))
        })
        .collect()
}

fn set_field(fields: &mut [Field], key: &str, value: &str) {
    if let Some(field) = fields.iter_mut().find(|f| f.key == key) {
        field.value = value.to_string();
    }
}

fn fmt_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn fmt_num(value: Option<u32>) -> String {
    value.map(|n| n.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{League, Team};

    fn state_with_teams() -> AppState {
        let mut state = AppState::default();
        state.leagues.items = vec![
            League {
                id: EntityId::from("A"),
                name: "A".into(),
                season: None,
                start_date: None,
                end_date: None,
                description: None,
            },
            League {
                id: EntityId::from("B"),
                name: "B".into(),
                season: None,
                start_date: None,
                end_date: None,
                description: None,
            },
        ];
        state.teams.items = ["1:A", "2:B", "3:A"]
            .iter()
            .map(|spec| {
                let (id, league) = spec.split_once(':').unwrap();
                Team {
                    id: EntityId::from(id),
                    name: format!("Team {id}"),
                    league_id: Some(EntityId::from(league)),
                    coach_id: None,
                    league_name: None,
                    coach_name: None,
                }
            })
            .collect();
        state
    }

    #[test]
    fn fixture_form_warns_and_refuses_cross_league() {
        let state = state_with_teams();
        let mut form = FormState::create(ResourceKind::Fixture, &state);
        form.set_value("home_team_id", "1");
        form.set_value("away_team_id", "2");
        form.set_value("venue_id", "v");
        form.set_value("date", "2025-05-01");
        form.set_value("time", "10:00");
        form.refresh_warning(&state);
        let warning = form.warning.clone().unwrap();
        assert!(warning.contains("assigned to the A league"), "{warning}");
        assert!(form.build(&state).is_err());

        form.set_value("away_team_id", "3");
        form.refresh_warning(&state);
        assert!(form.warning.is_none());
        match form.build(&state).unwrap() {
            ProviderCommand::Create(Draft::Fixture(d)) => {
                assert_eq!(d.league_id, Some(EntityId::from("A")))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn choice_fields_cycle_and_ignore_typing() {
        let mut form = FormState::login();
        form.focus = 2;
        form.insert_char('x');
        assert_eq!(form.value("role"), "");
        form.cycle_choice(true);
        assert_eq!(form.value("role"), "COACH");
        form.cycle_choice(false);
        form.cycle_choice(false);
        assert_eq!(form.value("role"), "ADMIN");
    }

    #[test]
    fn login_requires_both_fields() {
        let state = AppState::default();
        let mut form = FormState::login();
        form.set_value("email", "coach@example.com");
        assert!(form.build(&state).is_err());
        form.set_value("password", "secret");
        assert!(matches!(form.build(&state), Ok(ProviderCommand::Login(_))));
        assert_eq!(form.fields[1].display(), "******");
    }
}
