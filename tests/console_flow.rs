use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::NaiveDate;
use serde_json::Value;

use league_console::access::Route;
use league_console::api::{ApiClient, Scope};
use league_console::derive;
use league_console::fake_backend::FakeBackend;
use league_console::forms::{FieldKind, FormState};
use league_console::model::{Credentials, EntityId, FixtureDraft, FixtureStatus, VenueDraft};
use league_console::provider;
use league_console::session::SessionHandle;
use league_console::state::{AppState, Delta, Draft, ProviderCommand, Tone, ViewScope, apply_delta};
use league_console::wire::ResourceKind;

struct Console {
    backend: Arc<FakeBackend>,
    client: ApiClient,
    pool: Option<rayon::ThreadPool>,
    state: AppState,
    tx: Sender<Delta>,
    rx: Receiver<Delta>,
}

impl Console {
    fn new(backend: FakeBackend) -> Self {
        let backend = Arc::new(backend);
        let client = ApiClient::new(backend.clone(), SessionHandle::in_memory());
        let (tx, rx) = mpsc::channel();
        Self {
            backend,
            client,
            pool: provider::build_fetch_pool(2),
            state: AppState::new(None, ViewScope::new()),
            tx,
            rx,
        }
    }

    fn seeded() -> Self {
        Self::new(FakeBackend::seeded())
    }

    /// Runs a command the way the UI sends it and applies every delta.
    fn send(&mut self, cmd: ProviderCommand) {
        self.state.mark_pending(&cmd);
        self.run(cmd);
    }

    fn run(&mut self, cmd: ProviderCommand) {
        provider::run_command(&self.client, &self.state.scope, &self.pool, cmd, &self.tx);
        while let Ok(delta) = self.rx.try_recv() {
            apply_delta(&mut self.state, delta);
        }
        if let Some(route) = self.state.take_pending_route() {
            self.go(route);
        }
    }

    fn go(&mut self, route: Route) {
        if let Some(cmd) = self.state.navigate(route) {
            self.run(cmd);
        }
    }

    fn login(&mut self, email: &str, password: &str) {
        self.send(ProviderCommand::Login(Credentials {
            email: email.to_string(),
            password: password.to_string(),
            role: None,
        }));
    }

    fn submit_form(&mut self) {
        let built = self
            .state
            .form
            .as_ref()
            .expect("form should be open")
            .build(&self.state);
        match built {
            Ok(cmd) => self.send(cmd),
            Err(message) => {
                if let Some(form) = self.state.form.as_mut() {
                    form.error = Some(message);
                }
            }
        }
    }
}

fn id(raw: &str) -> EntityId {
    EntityId::from(raw)
}

#[test]
fn coach_lands_on_own_team_dashboard() {
    let mut console = Console::seeded();
    console.login("coach@league.test", "coach123");

    assert_eq!(console.state.route, Route::Coach);
    assert!(!console.state.is_loading());
    let team = console.state.coach_team().expect("coach team should resolve");
    assert_eq!(team.name, "Lightning Bolts");
    assert_eq!(console.state.visible_players().len(), 3);

    let fixtures = derive::team_fixtures(&console.state.fixtures.items, team);
    let upcoming: Vec<&str> = derive::upcoming_fixtures(&fixtures, derive::DEFAULT_SLICE)
        .iter()
        .map(|f| f.id.as_str())
        .collect();
    assert_eq!(upcoming, vec!["35", "34"]);

    let results = derive::team_results(&console.state.results.items, &console.state.fixtures.items, team);
    let recent: Vec<&str> = derive::recent_results(&results, &console.state.fixtures.items, derive::DEFAULT_SLICE)
        .iter()
        .map(|r| r.fixture_id.as_str())
        .collect();
    assert_eq!(recent, vec!["32", "31"]);
}

#[test]
fn wrong_password_stays_on_login_with_message() {
    let mut console = Console::seeded();
    console.login("coach@league.test", "nope");

    assert_eq!(console.state.route, Route::Login);
    assert!(console.state.session.is_none());
    assert!(!console.state.auth_loading);
    assert_eq!(console.state.auth_error.as_deref(), Some("Invalid email or password."));
}

#[test]
fn coach_is_kept_off_admin_screens() {
    let mut console = Console::seeded();
    console.login("coach@league.test", "coach123");
    console.go(Route::Users);
    assert_eq!(console.state.route, Route::Leagues);
    assert!(console.state.users.items.is_empty());
}

#[test]
fn coach_adds_player_to_own_team() {
    let mut console = Console::seeded();
    console.login("coach@league.test", "coach123");
    console.go(Route::MyTeam);

    let team = console.state.coach_team().cloned().expect("coach team");
    let mut form = FormState::player_for_team(&team);
    form.set_value("first_name", "Remy");
    form.set_value("last_name", "Cole");
    form.set_value("jersey_number", "7");
    console.state.form = Some(form);
    console.submit_form();

    assert!(console.state.form.is_none());
    assert_eq!(console.state.visible_players().len(), 4);
    assert_eq!(console.backend.records("players").len(), 6);
    assert_eq!(
        console.state.banner.as_ref().map(|b| b.tone),
        Some(Tone::Info)
    );
}

#[test]
fn coach_writing_to_another_team_gets_form_error() {
    let mut console = Console::seeded();
    console.login("coach@league.test", "coach123");
    console.go(Route::Players);

    let mut form = FormState::create(ResourceKind::Player, &console.state);
    form.set_value("first_name", "Sly");
    form.set_value("last_name", "Fox");
    form.set_value("team_id", "5");
    console.state.form = Some(form);
    console.submit_form();

    let form = console.state.form.as_ref().expect("form stays open");
    assert_eq!(form.error.as_deref(), Some("Access denied"));
    assert_eq!(console.backend.records("players").len(), 5);
    assert!(console.state.session.is_some());
}

#[test]
fn cross_league_fixture_is_refused_before_sending() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Fixtures);
    let sent_before = console.backend.requests().len();

    let mut form = FormState::create(ResourceKind::Fixture, &console.state);
    form.set_value("home_team_id", "4");
    form.set_value("away_team_id", "6");
    form.set_value("date", "2026-12-05");
    form.set_value("time", "10:00");
    form.refresh_warning(&console.state);
    assert_eq!(
        form.warning.as_deref(),
        Some(
            "Cross-league fixture between teams from different leagues: Under 12 Premier vs \
             Under 14 Championship. The fixture would be assigned to the Under 12 Premier league."
        )
    );
    console.state.form = Some(form);
    console.submit_form();

    let form = console.state.form.as_ref().expect("form stays open");
    assert_eq!(
        form.error.as_deref(),
        Some("Home and Away teams must be in the same league")
    );
    assert_eq!(console.backend.requests().len(), sent_before);
}

#[test]
fn fixture_against_itself_is_refused_before_sending() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Fixtures);
    let sent_before = console.backend.requests().len();
    let fixtures_before = console.backend.records("fixtures").len();

    let mut form = FormState::create(ResourceKind::Fixture, &console.state);
    form.set_value("home_team_id", "4");
    form.set_value("away_team_id", "4");
    form.set_value("date", "2026-12-05");
    form.set_value("time", "10:00");
    console.state.form = Some(form);
    console.submit_form();

    let form = console.state.form.as_ref().expect("form stays open");
    assert_eq!(
        form.error.as_deref(),
        Some("Home team and away team must be different")
    );
    assert_eq!(console.backend.requests().len(), sent_before);
    assert_eq!(console.backend.records("fixtures").len(), fixtures_before);
}

#[test]
fn stale_page_load_sends_no_requests() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    let sent_before = console.backend.requests().len();

    let stale = console.state.scope.ticket();
    console.state.advance_scope();
    console.run(ProviderCommand::Load {
        ticket: stale,
        kinds: vec![ResourceKind::Venue, ResourceKind::Referee],
    });

    assert_eq!(console.backend.requests().len(), sent_before);
    assert!(console.state.venues.items.is_empty());
}

#[test]
fn backend_also_rejects_cross_league_fixture() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Fixtures);

    let draft = FixtureDraft {
        league_id: Some(id("1")),
        home_team_id: id("4"),
        away_team_id: id("6"),
        venue_id: id("1"),
        referee_id: None,
        match_date: NaiveDate::from_ymd_opt(2026, 12, 5)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid date"),
        status: FixtureStatus::Scheduled,
    };
    console.send(ProviderCommand::Create(Draft::Fixture(draft)));

    let banner = console.state.banner.as_ref().expect("error banner");
    assert_eq!(banner.tone, Tone::Error);
    assert_eq!(banner.message, "Teams must belong to the same league");
    assert_eq!(console.state.fixtures.items.len(), 5);
}

#[test]
fn same_league_fixture_is_created_with_league_of_home_team() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Fixtures);

    let mut form = FormState::create(ResourceKind::Fixture, &console.state);
    form.set_value("home_team_id", "6");
    form.set_value("away_team_id", "7");
    form.set_value("date", "2026-12-05");
    form.set_value("time", "10:00");
    form.refresh_warning(&console.state);
    assert!(form.warning.is_none());
    console.state.form = Some(form);
    console.submit_form();

    assert!(console.state.form.is_none());
    let created = console
        .state
        .fixtures
        .items
        .iter()
        .find(|f| f.home_team_id == Some(id("6")) && f.away_team_id == Some(id("7")) && f.status == FixtureStatus::Scheduled)
        .expect("new fixture in store");
    assert_eq!(created.league_id, Some(id("2")));
}

#[test]
fn result_form_offers_only_unscored_completed_fixtures() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Results);

    let form = FormState::create(ResourceKind::Result, &console.state);
    let FieldKind::Choice(options) = &form.fields[0].kind else {
        panic!("fixture field should be a choice");
    };
    let values: Vec<&str> = options.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values, vec!["33"]);

    let mut form = form;
    form.set_value("home_score", "4");
    form.set_value("away_score", "2");
    console.state.form = Some(form);
    console.submit_form();

    assert!(console.state.form.is_none());
    let saved = console.state.results.for_fixture(&id("33")).expect("result stored");
    assert_eq!((saved.home_score, saved.away_score), (4, 2));

    let again = FormState::create(ResourceKind::Result, &console.state);
    let FieldKind::Choice(options) = &again.fields[0].kind else {
        panic!("fixture field should be a choice");
    };
    assert!(options.is_empty());
}

#[test]
fn clearing_a_result_reopens_the_fixture() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Results);

    console.send(ProviderCommand::DeleteFixtureResult { fixture_id: id("31") });
    assert!(console.state.results.for_fixture(&id("31")).is_none());
    assert_eq!(console.backend.records("results").len(), 1);

    let open: Vec<&str> = derive::completed_fixtures(&console.state.fixtures.items, &console.state.results.items, None)
        .iter()
        .map(|f| f.id.as_str())
        .collect();
    assert_eq!(open, vec!["31", "33"]);
}

#[test]
fn fixture_status_change_updates_store() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Fixtures);

    console.send(ProviderCommand::SetFixtureStatus {
        id: id("34"),
        status: FixtureStatus::Postponed,
    });
    let fixture = console.state.fixtures.get(&id("34")).expect("fixture 34");
    assert_eq!(fixture.status, FixtureStatus::Postponed);
}

#[test]
fn assigning_a_coach_patches_team_and_user() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Teams);

    console.send(ProviderCommand::AssignCoach {
        team_id: id("7"),
        coach_id: id("13"),
    });

    let otters = console.state.teams.get(&id("7")).expect("team 7");
    assert_eq!(otters.coach_id, Some(id("13")));
    let jordan = console.state.users.get(&id("13")).expect("user 13");
    assert_eq!(jordan.team_id, Some(id("7")));
    // Jordan now coaches two teams; the first in collection order wins.
    let resolved = derive::resolve_coach_team(&console.state.teams.items, jordan).expect("team");
    assert_eq!(resolved.name, "Fire Dragons");
    assert_eq!(derive::coach_teams(&console.state.teams.items, jordan).len(), 2);
}

#[test]
fn scoped_lists_and_date_range_hit_nested_endpoints() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");

    let ticket = console.state.scope.ticket();
    console.send(ProviderCommand::LoadScoped {
        ticket,
        kind: ResourceKind::Player,
        scope: Scope::Team(id("4")),
    });
    assert_eq!(console.state.players.items.len(), 3);

    console.send(ProviderCommand::LoadScoped {
        ticket,
        kind: ResourceKind::Fixture,
        scope: Scope::League(id("2")),
    });
    let ids: Vec<&str> = console.state.fixtures.items.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["33"]);

    console.send(ProviderCommand::LoadScoped {
        ticket,
        kind: ResourceKind::Result,
        scope: Scope::League(id("1")),
    });
    let mut fixtures: Vec<&str> = console
        .state
        .results
        .items
        .iter()
        .map(|r| r.fixture_id.as_str())
        .collect();
    fixtures.sort();
    assert_eq!(fixtures, vec!["31", "32"]);

    console.send(ProviderCommand::LoadFixturesInRange {
        ticket,
        start: NaiveDate::from_ymd_opt(2026, 11, 1).expect("date"),
        end: NaiveDate::from_ymd_opt(2026, 11, 7).expect("date"),
    });
    let ids: Vec<&str> = console.state.fixtures.items.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["35"]);

    let requests = console.backend.requests();
    assert!(requests.contains(&"GET /teams/4/players".to_string()));
    assert!(requests.contains(&"GET /leagues/2/fixtures".to_string()));
    assert!(requests.contains(&"GET /fixtures/date-range".to_string()));
    assert!(requests.contains(&"GET /leagues/1/results".to_string()));
}

#[test]
fn created_venue_reads_back_with_same_fields() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");

    console.send(ProviderCommand::Create(Draft::Venue(VenueDraft {
        name: "Harbour Ground".to_string(),
        location: Some("Quay Road".to_string()),
        city: Some("Hull".to_string()),
        country: Some("UK".to_string()),
        capacity: Some(450),
    })));
    let created = console
        .state
        .venues
        .items
        .iter()
        .find(|v| v.name == "Harbour Ground")
        .cloned()
        .expect("created venue in store");

    console.send(ProviderCommand::Fetch {
        kind: ResourceKind::Venue,
        id: created.id.clone(),
    });
    let fetched = console.state.venues.current.clone().expect("fetched venue");
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.city.as_deref(), Some("Hull"));
    assert_eq!(fetched.capacity, Some(450));
}

#[test]
fn expired_token_sends_viewer_back_to_login() {
    let mut console = Console::new(FakeBackend::seeded().with_token_ttl(-10));
    console.login("admin@league.test", "admin123");

    assert_eq!(console.state.route, Route::Login);
    assert!(console.state.session.is_none());
    assert!(!console.client.session().is_authenticated());
    let banner = console.state.banner.as_ref().expect("expiry banner");
    assert_eq!(banner.tone, Tone::Warn);
    assert!(console.state.leagues.items.is_empty());
    assert!(console.state.logs.iter().any(|l| l.contains("Session expired")));
}

#[test]
fn server_side_401_ends_the_session() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Venues);
    console
        .backend
        .inject_failure("/venues", 401, "Invalid or expired token");

    console.send(ProviderCommand::Delete {
        kind: ResourceKind::Venue,
        id: id("2"),
    });

    assert_eq!(console.state.route, Route::Login);
    assert!(console.state.session.is_none());
    assert_eq!(console.backend.records("venues").len(), 2);
}

#[test]
fn load_failure_keeps_previous_items_and_shows_error() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");
    console.go(Route::Venues);
    assert_eq!(console.state.venues.items.len(), 2);

    console.backend.inject_failure("/venues", 500, "database unavailable");
    let cmd = console.state.refresh().expect("venues reload");
    console.run(cmd);

    assert_eq!(console.state.venues.items.len(), 2);
    assert_eq!(console.state.venues.error.as_deref(), Some("database unavailable"));
    assert_eq!(console.state.route, Route::Venues);
}

#[test]
fn register_signs_in_new_coach_without_team() {
    let mut console = Console::seeded();
    let mut form = FormState::register();
    form.set_value("first_name", "Pat");
    form.set_value("last_name", "Newman");
    form.set_value("email", "pat@league.test");
    form.set_value("role", "COACH");
    form.set_value("password", "secret1");
    console.state.form = Some(form);
    console.submit_form();

    assert_eq!(console.state.route, Route::Coach);
    assert!(console.state.coach_team().is_none());
    assert!(console.state.visible_players().is_empty());
    let stored: Vec<Value> = console.backend.records("users");
    assert_eq!(stored.len(), 4);
}

#[test]
fn fixture_result_endpoint_reads_one_result() {
    let mut console = Console::seeded();
    console.login("admin@league.test", "admin123");

    let result = console.client.fixture_result(&id("32")).expect("result for 32");
    assert_eq!(result.fixture_id, id("32"));
    assert_eq!((result.home_score, result.away_score), (0, 0));

    let missing = console.client.fixture_result(&id("33")).expect_err("33 has no result");
    assert_eq!(missing.status(), Some(404));
    assert!(!missing.forces_logout());
}
