use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;

use crate::access::{self, Capabilities, Route};
use crate::api::Scope;
use crate::derive;
use crate::forms::FormState;
use crate::model::{
    Credentials, EntityId, Fixture, FixtureDraft, FixtureStatus, League, LeagueDraft, MatchResult,
    Player, PlayerDraft, Referee, RefereeDraft, ResultDraft, Role, Team, TeamDraft, User,
    UserDraft, Venue, VenueDraft,
};
use crate::session::Session;
use crate::store::{LoadStatus, ResourceStore};
use crate::wire::{Resource, ResourceKind};

const MAX_LOGS: usize = 200;

/// Navigation epoch shared with the provider thread. Every navigation
/// advances it; loads issued under an older epoch are dropped.
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    epoch: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeTicket(u64);

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> ScopeTicket {
        ScopeTicket(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn ticket(&self) -> ScopeTicket {
        ScopeTicket(self.epoch.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, ticket: ScopeTicket) -> bool {
        self.epoch.load(Ordering::SeqCst) == ticket.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub kind: ResourceKind,
    pub id: EntityId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    League(LeagueDraft),
    Team(TeamDraft),
    Player(PlayerDraft),
    Fixture(FixtureDraft),
    Result(ResultDraft),
    Referee(RefereeDraft),
    Venue(VenueDraft),
    User(UserDraft),
}

impl Draft {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Draft::League(_) => ResourceKind::League,
            Draft::Team(_) => ResourceKind::Team,
            Draft::Player(_) => ResourceKind::Player,
            Draft::Fixture(_) => ResourceKind::Fixture,
            Draft::Result(_) => ResourceKind::Result,
            Draft::Referee(_) => ResourceKind::Referee,
            Draft::Venue(_) => ResourceKind::Venue,
            Draft::User(_) => ResourceKind::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    League(League),
    Team(Team),
    Player(Player),
    Fixture(Fixture),
    Result(MatchResult),
    Referee(Referee),
    Venue(Venue),
    User(User),
}

impl Record {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Record::League(_) => ResourceKind::League,
            Record::Team(_) => ResourceKind::Team,
            Record::Player(_) => ResourceKind::Player,
            Record::Fixture(_) => ResourceKind::Fixture,
            Record::Result(_) => ResourceKind::Result,
            Record::Referee(_) => ResourceKind::Referee,
            Record::Venue(_) => ResourceKind::Venue,
            Record::User(_) => ResourceKind::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Records {
    League(Vec<League>),
    Team(Vec<Team>),
    Player(Vec<Player>),
    Fixture(Vec<Fixture>),
    Result(Vec<MatchResult>),
    Referee(Vec<Referee>),
    Venue(Vec<Venue>),
    User(Vec<User>),
}

impl Records {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Records::League(_) => ResourceKind::League,
            Records::Team(_) => ResourceKind::Team,
            Records::Player(_) => ResourceKind::Player,
            Records::Fixture(_) => ResourceKind::Fixture,
            Records::Result(_) => ResourceKind::Result,
            Records::Referee(_) => ResourceKind::Referee,
            Records::Venue(_) => ResourceKind::Venue,
            Records::User(_) => ResourceKind::User,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Records::League(v) => v.len(),
            Records::Team(v) => v.len(),
            Records::Player(v) => v.len(),
            Records::Fixture(v) => v.len(),
            Records::Result(v) => v.len(),
            Records::Referee(v) => v.len(),
            Records::Venue(v) => v.len(),
            Records::User(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCommand {
    Login(Credentials),
    Register(UserDraft),
    RefreshProfile,
    Logout,
    Load {
        ticket: ScopeTicket,
        kinds: Vec<ResourceKind>,
    },
    LoadScoped {
        ticket: ScopeTicket,
        kind: ResourceKind,
        scope: Scope,
    },
    LoadFixturesInRange {
        ticket: ScopeTicket,
        start: NaiveDate,
        end: NaiveDate,
    },
    Fetch {
        kind: ResourceKind,
        id: EntityId,
    },
    Create(Draft),
    Update {
        id: EntityId,
        draft: Draft,
    },
    Delete {
        kind: ResourceKind,
        id: EntityId,
    },
    SetFixtureStatus {
        id: EntityId,
        status: FixtureStatus,
    },
    SaveFixtureResult {
        draft: ResultDraft,
        existing: bool,
    },
    DeleteFixtureResult {
        fixture_id: EntityId,
    },
    AssignCoach {
        team_id: EntityId,
        coach_id: EntityId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Log(String),
    Authenticated(Session),
    AuthFailed(String),
    ProfileRefreshed(User),
    /// The session is gone (logout, expiry, 401); go back to the login screen.
    SessionEnded(Option<String>),
    Loaded {
        ticket: ScopeTicket,
        records: Records,
    },
    LoadFailed {
        ticket: ScopeTicket,
        kind: ResourceKind,
        message: String,
    },
    Fetched(Record),
    Created(Record),
    Updated(Record),
    Deleted {
        kind: ResourceKind,
        id: EntityId,
    },
    ResultCleared {
        fixture_id: EntityId,
    },
    MutationFailed {
        kind: ResourceKind,
        message: String,
    },
    CoachAssigned {
        team_id: EntityId,
        coach_id: EntityId,
    },
}

macro_rules! with_store {
    ($state:expr, $kind:expr, $store:ident => $body:expr) => {
        match $kind {
            ResourceKind::League => {
                let $store = &mut $state.leagues;
                $body
            }
            ResourceKind::Team => {
                let $store = &mut $state.teams;
                $body
            }
            ResourceKind::Player => {
                let $store = &mut $state.players;
                $body
            }
            ResourceKind::Fixture => {
                let $store = &mut $state.fixtures;
                $body
            }
            ResourceKind::Result => {
                let $store = &mut $state.results;
                $body
            }
            ResourceKind::Referee => {
                let $store = &mut $state.referees;
                $body
            }
            ResourceKind::Venue => {
                let $store = &mut $state.venues;
                $body
            }
            ResourceKind::User => {
                let $store = &mut $state.users;
                $body
            }
        }
    };
}

pub struct AppState {
    pub route: Route,
    pub session: Option<Session>,
    pub auth_loading: bool,
    pub auth_error: Option<String>,
    pub leagues: ResourceStore<League>,
    pub teams: ResourceStore<Team>,
    pub players: ResourceStore<Player>,
    pub fixtures: ResourceStore<Fixture>,
    pub results: ResourceStore<MatchResult>,
    pub referees: ResourceStore<Referee>,
    pub venues: ResourceStore<Venue>,
    pub users: ResourceStore<User>,
    pub selected: usize,
    pub logs: VecDeque<String>,
    pub banner: Option<Banner>,
    pub help_overlay: bool,
    pub form: Option<FormState>,
    pub confirm_delete: Option<PendingDelete>,
    pub standings_league: Option<EntityId>,
    /// Navigation requested by a delta; the UI loop carries it out.
    pub pending_route: Option<Route>,
    pub scope: ViewScope,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(None, ViewScope::new())
    }
}

impl AppState {
    pub fn new(session: Option<Session>, scope: ViewScope) -> Self {
        Self {
            route: Route::Login,
            session,
            auth_loading: false,
            auth_error: None,
            leagues: ResourceStore::default(),
            teams: ResourceStore::default(),
            players: ResourceStore::default(),
            fixtures: ResourceStore::default(),
            results: ResourceStore::default(),
            referees: ResourceStore::default(),
            venues: ResourceStore::default(),
            users: ResourceStore::default(),
            selected: 0,
            logs: VecDeque::new(),
            banner: None,
            help_overlay: false,
            form: None,
            confirm_delete: None,
            standings_league: None,
            pending_route: None,
            scope,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn role(&self) -> Option<Role> {
        self.user().and_then(|u| u.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    /// Moves to `requested` (or wherever the gate sends the viewer) and returns
    /// the loads the landing screen needs.
    pub fn navigate(&mut self, requested: Route) -> Option<ProviderCommand> {
        let target = access::landing(self.user(), requested);
        if target != requested {
            self.push_log(format!(
                "[INFO] {} redirected to {}",
                requested.path(),
                target.path()
            ));
        }
        let ticket = self.advance_scope();
        self.route = target;
        self.selected = 0;
        self.form = None;
        self.confirm_delete = None;

        let kinds = page_loads(target, self.role());
        if kinds.is_empty() {
            return None;
        }
        let cmd = ProviderCommand::Load { ticket, kinds };
        self.mark_pending(&cmd);
        Some(cmd)
    }

    /// Re-issues the current screen's loads under a fresh ticket.
    pub fn refresh(&mut self) -> Option<ProviderCommand> {
        let kinds = page_loads(self.route, self.role());
        if kinds.is_empty() {
            return None;
        }
        let ticket = self.advance_scope();
        let cmd = ProviderCommand::Load { ticket, kinds };
        self.mark_pending(&cmd);
        Some(cmd)
    }

    /// Opens a new view scope. Loads still running under the old one will be
    /// dropped, so their stores fall back to their last settled status.
    pub fn advance_scope(&mut self) -> ScopeTicket {
        for kind in ResourceKind::ALL {
            with_store!(self, kind, store => store.settle());
        }
        self.scope.advance()
    }

    /// Bookkeeping for a command about to be sent to the provider.
    pub fn mark_pending(&mut self, cmd: &ProviderCommand) {
        match cmd {
            ProviderCommand::Login(_) | ProviderCommand::Register(_) => {
                self.auth_loading = true;
                self.auth_error = None;
            }
            ProviderCommand::Load { kinds, .. } => {
                for kind in kinds {
                    with_store!(self, *kind, store => store.begin());
                }
            }
            ProviderCommand::LoadScoped { kind, .. } | ProviderCommand::Fetch { kind, .. } => {
                with_store!(self, *kind, store => store.begin());
            }
            ProviderCommand::LoadFixturesInRange { .. }
            | ProviderCommand::SetFixtureStatus { .. } => self.fixtures.begin(),
            ProviderCommand::Create(draft) | ProviderCommand::Update { draft, .. } => {
                with_store!(self, draft.kind(), store => store.begin());
            }
            ProviderCommand::Delete { kind, .. } => {
                with_store!(self, *kind, store => store.begin());
            }
            ProviderCommand::SaveFixtureResult { .. }
            | ProviderCommand::DeleteFixtureResult { .. } => self.results.begin(),
            ProviderCommand::AssignCoach { .. } => self.teams.begin(),
            ProviderCommand::RefreshProfile | ProviderCommand::Logout => {}
        }
    }

    pub fn take_pending_route(&mut self) -> Option<Route> {
        self.pending_route.take()
    }

    pub fn coach_team(&self) -> Option<&Team> {
        if self.role() != Some(Role::Coach) {
            return None;
        }
        derive::resolve_coach_team(&self.teams.items, self.user()?)
    }

    pub fn owns_team(&self, team_id: Option<&EntityId>) -> bool {
        match (self.coach_team(), team_id) {
            (Some(team), Some(id)) => &team.id == id,
            _ => false,
        }
    }

    pub fn capabilities(&self, kind: ResourceKind, team_id: Option<&EntityId>) -> Capabilities {
        access::capabilities(self.role(), kind, self.owns_team(team_id))
    }

    pub fn store_error(&self, kind: ResourceKind) -> Option<&str> {
        match kind {
            ResourceKind::League => self.leagues.error.as_deref(),
            ResourceKind::Team => self.teams.error.as_deref(),
            ResourceKind::Player => self.players.error.as_deref(),
            ResourceKind::Fixture => self.fixtures.error.as_deref(),
            ResourceKind::Result => self.results.error.as_deref(),
            ResourceKind::Referee => self.referees.error.as_deref(),
            ResourceKind::Venue => self.venues.error.as_deref(),
            ResourceKind::User => self.users.error.as_deref(),
        }
    }

    pub fn store_status(&self, kind: ResourceKind) -> LoadStatus {
        match kind {
            ResourceKind::League => self.leagues.status,
            ResourceKind::Team => self.teams.status,
            ResourceKind::Player => self.players.status,
            ResourceKind::Fixture => self.fixtures.status,
            ResourceKind::Result => self.results.status,
            ResourceKind::Referee => self.referees.status,
            ResourceKind::Venue => self.venues.status,
            ResourceKind::User => self.users.status,
        }
    }

    pub fn is_loading(&self) -> bool {
        ResourceKind::ALL
            .into_iter()
            .any(|kind| self.store_status(kind) == LoadStatus::Loading)
    }

    pub fn dismiss_error(&mut self) {
        for kind in ResourceKind::ALL {
            with_store!(self, kind, store => store.clear_error());
        }
        self.banner = None;
    }

    /// Players listed on the current screen.
    pub fn visible_players(&self) -> Vec<&Player> {
        match self.route {
            Route::MyTeam | Route::Coach => match self.coach_team() {
                Some(team) => derive::team_players(&self.players.items, team),
                None => Vec::new(),
            },
            _ => self.players.items.iter().collect(),
        }
    }

    pub fn visible_teams(&self) -> Vec<&Team> {
        match (self.role(), self.user()) {
            (Some(Role::Coach), Some(user)) if self.route == Route::MyTeam => {
                derive::coach_teams(&self.teams.items, user)
            }
            _ => self.teams.items.iter().collect(),
        }
    }

    pub fn visible_len(&self) -> usize {
        match self.route {
            Route::Leagues => self.leagues.items.len(),
            Route::Teams => self.visible_teams().len(),
            Route::Players | Route::MyTeam => self.visible_players().len(),
            Route::Fixtures => self.fixtures.items.len(),
            Route::Results => self.results.items.len(),
            Route::Referees => self.referees.items.len(),
            Route::Venues => self.venues.items.len(),
            Route::Users => self.users.items.len(),
            Route::Standings => self.leagues.items.len(),
            _ => 0,
        }
    }

    pub fn select_next(&mut self) {
        let len = self.visible_len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1).min(len - 1);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn clamp_selection(&mut self) {
        let len = self.visible_len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn set_banner(&mut self, tone: Tone, message: impl Into<String>) {
        self.banner = Some(Banner {
            message: message.into(),
            tone,
        });
    }

    fn end_session(&mut self, reason: Option<String>) {
        self.session = None;
        self.auth_loading = false;
        for kind in ResourceKind::ALL {
            with_store!(self, kind, store => store.reset());
        }
        self.form = None;
        self.confirm_delete = None;
        self.selected = 0;
        self.scope.advance();
        self.route = Route::Login;
        match reason {
            Some(reason) => {
                self.push_log(format!("[WARN] Signed out: {reason}"));
                self.set_banner(Tone::Warn, reason);
            }
            None => {
                self.push_log("[INFO] Signed out");
                self.banner = None;
            }
        }
    }

    fn close_form_for(&mut self, kind: ResourceKind) {
        if self.form.as_ref().is_some_and(|f| f.kind.resource() == Some(kind)) {
            self.form = None;
        }
    }
}

/// Collections each screen needs on mount.
pub fn page_loads(route: Route, role: Option<Role>) -> Vec<ResourceKind> {
    use ResourceKind::*;
    match route {
        Route::Dashboard => vec![League, Team, Player, Fixture, Result],
        Route::Coach | Route::MyTeam => vec![Team, Player, Fixture, Result],
        Route::Leagues => vec![League],
        Route::Teams if role == Some(Role::Admin) => vec![Team, League, User],
        Route::Teams => vec![Team, League],
        Route::Players => vec![Player, Team],
        Route::Fixtures => vec![Fixture, Team, League, Venue, Referee],
        Route::Results => vec![Result, Fixture, Team],
        Route::Referees => vec![Referee],
        Route::Venues => vec![Venue],
        Route::Users => vec![User, Team],
        Route::Standings => vec![League, Team, Fixture, Result],
        Route::Root | Route::Login | Route::Register => Vec::new(),
    }
}

fn finish_fetch<R: Resource>(store: &mut ResourceStore<R>, items: Vec<R>) {
    store.finish_fetch(items);
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::Log(msg) => state.push_log(msg),
        Delta::Authenticated(session) => {
            state.auth_loading = false;
            state.auth_error = None;
            state.banner = None;
            state.push_log(format!(
                "[INFO] Signed in as {} ({})",
                session.user.email,
                session.user.role.map(Role::as_wire).unwrap_or("no role")
            ));
            state.session = Some(session);
            state.pending_route = Some(Route::Login);
        }
        Delta::AuthFailed(message) => {
            state.auth_loading = false;
            state.push_log(format!("[WARN] Sign-in failed: {message}"));
            state.auth_error = Some(message);
        }
        Delta::ProfileRefreshed(user) => {
            if let Some(session) = state.session.as_mut() {
                session.user = user;
            }
        }
        Delta::SessionEnded(reason) => state.end_session(reason),
        Delta::Loaded { ticket, records } => {
            if !state.scope.is_current(ticket) {
                tracing::debug!(kind = records.kind().label(), "discarding stale load");
                return;
            }
            match records {
                Records::League(items) => finish_fetch(&mut state.leagues, items),
                Records::Team(items) => finish_fetch(&mut state.teams, items),
                Records::Player(items) => finish_fetch(&mut state.players, items),
                Records::Fixture(items) => finish_fetch(&mut state.fixtures, items),
                Records::Result(items) => finish_fetch(&mut state.results, items),
                Records::Referee(items) => finish_fetch(&mut state.referees, items),
                Records::Venue(items) => finish_fetch(&mut state.venues, items),
                Records::User(items) => finish_fetch(&mut state.users, items),
            }
            state.clamp_selection();
        }
        Delta::LoadFailed {
            ticket,
            kind,
            message,
        } => {
            if !state.scope.is_current(ticket) {
                return;
            }
            state.push_log(format!("[WARN] Loading {} failed: {message}", kind.plural()));
            with_store!(state, kind, store => store.fail(message.clone()));
            state.set_banner(Tone::Error, message);
        }
        Delta::Fetched(record) => match record {
            Record::League(item) => state.leagues.finish_fetch_one(item),
            Record::Team(item) => state.teams.finish_fetch_one(item),
            Record::Player(item) => state.players.finish_fetch_one(item),
            Record::Fixture(item) => state.fixtures.finish_fetch_one(item),
            Record::Result(item) => state.results.finish_fetch_one(item),
            Record::Referee(item) => state.referees.finish_fetch_one(item),
            Record::Venue(item) => state.venues.finish_fetch_one(item),
            Record::User(item) => state.users.finish_fetch_one(item),
        },
        Delta::Created(record) => {
            let kind = record.kind();
            match record {
                Record::League(item) => state.leagues.finish_create(item),
                Record::Team(item) => state.teams.finish_create(item),
                Record::Player(item) => state.players.finish_create(item),
                Record::Fixture(item) => state.fixtures.finish_create(item),
                Record::Result(item) => state.results.upsert_for_fixture(item),
                Record::Referee(item) => state.referees.finish_create(item),
                Record::Venue(item) => state.venues.finish_create(item),
                Record::User(item) => state.users.finish_create(item),
            }
            state.close_form_for(kind);
            state.push_log(format!("[INFO] Created {}", kind.label()));
            state.set_banner(Tone::Info, format!("{} created", capitalize(kind.label())));
        }
        Delta::Updated(record) => {
            let kind = record.kind();
            match record {
                Record::League(item) => state.leagues.finish_update(item),
                Record::Team(item) => state.teams.finish_update(item),
                Record::Player(item) => state.players.finish_update(item),
                Record::Fixture(item) => state.fixtures.finish_update(item),
                Record::Result(item) => state.results.upsert_for_fixture(item),
                Record::Referee(item) => state.referees.finish_update(item),
                Record::Venue(item) => state.venues.finish_update(item),
                Record::User(item) => state.users.finish_update(item),
            }
            state.close_form_for(kind);
            state.push_log(format!("[INFO] Updated {}", kind.label()));
            state.set_banner(Tone::Info, format!("{} updated", capitalize(kind.label())));
        }
        Delta::Deleted { kind, id } => {
            with_store!(state, kind, store => store.finish_delete(&id));
            state.confirm_delete = None;
            state.clamp_selection();
            state.push_log(format!("[INFO] Deleted {} {id}", kind.label()));
            state.set_banner(Tone::Info, format!("{} deleted", capitalize(kind.label())));
        }
        Delta::ResultCleared { fixture_id } => {
            state.results.finish_delete_for_fixture(&fixture_id);
            state.confirm_delete = None;
            state.clamp_selection();
            state.push_log(format!("[INFO] Cleared result for fixture {fixture_id}"));
        }
        Delta::MutationFailed { kind, message } => {
            with_store!(state, kind, store => store.fail(message.clone()));
            state.confirm_delete = None;
            state.push_log(format!("[WARN] {} change failed: {message}", capitalize(kind.label())));
            match state.form.as_mut() {
                Some(form) if form.kind.resource() == Some(kind) => {
                    form.error = Some(message);
                }
                _ => state.set_banner(Tone::Error, message),
            }
        }
        Delta::CoachAssigned { team_id, coach_id } => {
            if let Some(team) = state.teams.items.iter_mut().find(|t| t.id == team_id) {
                team.coach_id = Some(coach_id.clone());
            }
            state.teams.status = LoadStatus::Succeeded;
            if let Some(user) = state.users.items.iter_mut().find(|u| u.id == coach_id) {
                user.team_id = Some(team_id.clone());
            }
            state.form = None;
            state.push_log(format!("[INFO] Coach {coach_id} assigned to team {team_id}"));
            state.set_banner(Tone::Info, "Coach assigned");
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
