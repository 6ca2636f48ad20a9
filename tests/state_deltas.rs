use league_console::access::Route;
use league_console::forms::FormState;
use league_console::model::{EntityId, MatchResult, Player, Role, Team, User, Venue};
use league_console::session::Session;
use league_console::state::{AppState, Delta, Record, Records, Tone, ViewScope, apply_delta};
use league_console::store::LoadStatus;
use league_console::wire::ResourceKind;

fn id(raw: &str) -> EntityId {
    EntityId::from(raw)
}

fn coach_session() -> Session {
    Session {
        token: "token".to_string(),
        user: User {
            id: id("12"),
            first_name: "Casey".to_string(),
            last_name: "Coach".to_string(),
            email: "coach@league.test".to_string(),
            role: Some(Role::Coach),
            team_id: None,
        },
    }
}

fn team(team_id: &str, name: &str, coach: Option<&str>) -> Team {
    Team {
        id: id(team_id),
        name: name.to_string(),
        league_id: Some(id("1")),
        coach_id: coach.map(id),
        league_name: None,
        coach_name: None,
    }
}

fn player(player_id: &str, team_id: &str) -> Player {
    Player {
        id: id(player_id),
        first_name: format!("P{player_id}"),
        last_name: "Test".to_string(),
        team_id: Some(id(team_id)),
        position: None,
        jersey_number: None,
    }
}

fn venue(venue_id: &str, name: &str) -> Venue {
    Venue {
        id: id(venue_id),
        name: name.to_string(),
        location: None,
        city: None,
        country: None,
        capacity: None,
    }
}

fn result(fixture_id: &str, home: u32, away: u32) -> MatchResult {
    MatchResult {
        id: id(&format!("r{fixture_id}")),
        fixture_id: id(fixture_id),
        home_score: home,
        away_score: away,
        recorded_at: None,
    }
}

fn coach_state() -> AppState {
    let mut state = AppState::new(Some(coach_session()), ViewScope::new());
    state.route = Route::MyTeam;
    state
}

#[test]
fn stale_load_is_discarded_after_navigation() {
    let mut state = coach_state();
    let old = state.scope.advance();
    let _ = state.navigate(Route::Venues);

    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket: old,
            records: Records::Venue(vec![venue("1", "North Park")]),
        },
    );
    assert!(state.venues.items.is_empty());

    let current = state.scope.ticket();
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket: current,
            records: Records::Venue(vec![venue("2", "Riverside Ground")]),
        },
    );
    assert_eq!(state.venues.items.len(), 1);
    assert_eq!(state.venues.status, LoadStatus::Succeeded);
}

#[test]
fn navigating_away_mid_load_settles_abandoned_stores() {
    let mut state = coach_state();
    let ticket = state.scope.ticket();
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket,
            records: Records::Venue(vec![venue("1", "North Park")]),
        },
    );

    let _ = state.navigate(Route::Fixtures);
    assert_eq!(state.venues.status, LoadStatus::Loading);
    assert_eq!(state.fixtures.status, LoadStatus::Loading);

    let _ = state.navigate(Route::Leagues);
    assert_eq!(state.leagues.status, LoadStatus::Loading);
    assert_eq!(state.venues.status, LoadStatus::Succeeded);
    assert_eq!(state.venues.items.len(), 1);
    assert_eq!(state.fixtures.status, LoadStatus::Idle);

    let current = state.scope.ticket();
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket: current,
            records: Records::League(Vec::new()),
        },
    );
    for kind in ResourceKind::ALL {
        assert_ne!(state.store_status(kind), LoadStatus::Loading, "{}", kind.label());
    }
    assert!(!state.is_loading());
}

#[test]
fn stale_load_failure_does_not_touch_banner() {
    let mut state = coach_state();
    let old = state.scope.advance();
    state.scope.advance();
    apply_delta(
        &mut state,
        Delta::LoadFailed {
            ticket: old,
            kind: ResourceKind::Venue,
            message: "boom".to_string(),
        },
    );
    assert!(state.banner.is_none());
    assert!(state.venues.error.is_none());
}

#[test]
fn my_team_shows_only_the_resolved_team_players() {
    let mut state = coach_state();
    let ticket = state.scope.ticket();
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket,
            records: Records::Team(vec![
                team("5", "Thunder Hawks", None),
                team("4", "Lightning Bolts", Some("12")),
                team("9", "Second Side", Some("12")),
            ]),
        },
    );
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket,
            records: Records::Player(vec![
                player("41", "4"),
                player("42", "4"),
                player("51", "5"),
                player("91", "9"),
            ]),
        },
    );

    assert_eq!(state.coach_team().map(|t| t.name.as_str()), Some("Lightning Bolts"));
    let names: Vec<String> = state.visible_players().iter().map(|p| p.id.to_string()).collect();
    assert_eq!(names, vec!["41", "42"]);
    assert_eq!(state.visible_teams().len(), 2);

    let own = state.capabilities(ResourceKind::Player, Some(&id("4")));
    assert!(own.create && own.edit && !own.delete);
    let other = state.capabilities(ResourceKind::Player, Some(&id("5")));
    assert!(other.view && !other.any_write());
}

#[test]
fn coach_without_team_sees_no_players() {
    let mut state = coach_state();
    let ticket = state.scope.ticket();
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket,
            records: Records::Player(vec![player("41", "4")]),
        },
    );
    assert!(state.coach_team().is_none());
    assert!(state.visible_players().is_empty());
}

#[test]
fn mutation_failure_goes_to_matching_form() {
    let mut state = coach_state();
    state.form = Some(FormState::create(ResourceKind::Player, &state));
    apply_delta(
        &mut state,
        Delta::MutationFailed {
            kind: ResourceKind::Player,
            message: "Access denied".to_string(),
        },
    );
    let form = state.form.as_ref().expect("form stays open");
    assert_eq!(form.error.as_deref(), Some("Access denied"));
    assert!(state.banner.is_none());
    assert_eq!(state.players.error.as_deref(), Some("Access denied"));
}

#[test]
fn mutation_failure_without_form_becomes_banner() {
    let mut state = coach_state();
    apply_delta(
        &mut state,
        Delta::MutationFailed {
            kind: ResourceKind::Venue,
            message: "Venue not found (it may already have been deleted)".to_string(),
        },
    );
    let banner = state.banner.as_ref().expect("banner");
    assert_eq!(banner.tone, Tone::Error);

    state.dismiss_error();
    assert!(state.banner.is_none());
    assert!(state.venues.error.is_none());
}

#[test]
fn result_created_then_cleared_by_fixture() {
    let mut state = coach_state();
    apply_delta(&mut state, Delta::Created(Record::Result(result("31", 2, 1))));
    apply_delta(&mut state, Delta::Updated(Record::Result(result("31", 3, 1))));
    assert_eq!(state.results.items.len(), 1);
    assert_eq!(state.results.for_fixture(&id("31")).map(|r| r.home_score), Some(3));

    apply_delta(&mut state, Delta::ResultCleared { fixture_id: id("31") });
    assert!(state.results.items.is_empty());
}

#[test]
fn deleted_record_leaves_store_and_clamps_selection() {
    let mut state = coach_state();
    state.route = Route::Venues;
    let ticket = state.scope.ticket();
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket,
            records: Records::Venue(vec![venue("1", "North Park"), venue("2", "Riverside Ground")]),
        },
    );
    state.select_next();
    assert_eq!(state.selected, 1);

    apply_delta(
        &mut state,
        Delta::Deleted {
            kind: ResourceKind::Venue,
            id: id("2"),
        },
    );
    assert_eq!(state.venues.items.len(), 1);
    assert_eq!(state.selected, 0);
}

#[test]
fn session_end_resets_everything() {
    let mut state = coach_state();
    let ticket = state.scope.ticket();
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket,
            records: Records::Player(vec![player("41", "4")]),
        },
    );
    apply_delta(
        &mut state,
        Delta::SessionEnded(Some("Session expired, please log in again".to_string())),
    );

    assert!(state.session.is_none());
    assert_eq!(state.route, Route::Login);
    assert!(state.players.items.is_empty());
    assert!(!state.scope.is_current(ticket));
    let banner = state.banner.as_ref().expect("banner");
    assert_eq!(banner.tone, Tone::Warn);
    assert_eq!(banner.message, "Session expired, please log in again");
}

#[test]
fn authenticated_requests_home_navigation() {
    let mut state = AppState::default();
    apply_delta(&mut state, Delta::AuthFailed("Invalid email or password.".to_string()));
    assert_eq!(state.auth_error.as_deref(), Some("Invalid email or password."));

    apply_delta(&mut state, Delta::Authenticated(coach_session()));
    assert!(state.auth_error.is_none());
    let route = state.take_pending_route().expect("pending route");
    let _ = state.navigate(route);
    assert_eq!(state.route, Route::Coach);
}

#[test]
fn coach_assignment_patches_team_and_user() {
    let mut state = coach_state();
    state.route = Route::Teams;
    let ticket = state.scope.ticket();
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket,
            records: Records::Team(vec![team("7", "River Otters", None)]),
        },
    );
    apply_delta(
        &mut state,
        Delta::Loaded {
            ticket,
            records: Records::User(vec![coach_session().user]),
        },
    );
    apply_delta(
        &mut state,
        Delta::CoachAssigned {
            team_id: id("7"),
            coach_id: id("12"),
        },
    );
    assert_eq!(state.teams.items[0].coach_id, Some(id("12")));
    assert_eq!(state.users.items[0].team_id, Some(id("7")));
    assert_eq!(state.coach_team().map(|t| t.name.as_str()), Some("River Otters"));
}

#[test]
fn log_is_capped() {
    let mut state = AppState::default();
    for i in 0..250 {
        apply_delta(&mut state, Delta::Log(format!("[INFO] line {i}")));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.logs.front().map(String::as_str), Some("[INFO] line 50"));
}
