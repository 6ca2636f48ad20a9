use std::fs::{self, OpenOptions};
use std::io;
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tracing_subscriber::EnvFilter;

use league_console::access::{self, Route, RouteDecision};
use league_console::api::{ApiClient, Transport};
use league_console::config::{self, ConsoleConfig};
use league_console::derive::{self, DashboardCounts};
use league_console::error::ApiError;
use league_console::fake_backend::FakeBackend;
use league_console::forms::{FieldKind, FormKind, FormState};
use league_console::http_client::HttpTransport;
use league_console::model::{EntityId, Fixture, MatchResult, Role};
use league_console::provider;
use league_console::session::{SessionHandle, SessionStore};
use league_console::standings;
use league_console::state::{
    AppState, Delta, PendingDelete, ProviderCommand, Tone, ViewScope, apply_delta,
};
use league_console::token;
use league_console::validate;
use league_console::wire::ResourceKind;

struct Selection {
    kind: ResourceKind,
    id: EntityId,
    label: String,
    team_id: Option<EntityId>,
}

struct App {
    state: AppState,
    session: SessionHandle,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(session: SessionHandle, scope: ViewScope, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state: AppState::new(session.current(), scope),
            session,
            should_quit: false,
            cmd_tx,
        }
    }

    fn send(&mut self, cmd: ProviderCommand) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[WARN] Provider unavailable");
            return;
        };
        self.state.mark_pending(&cmd);
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Provider request failed");
        }
    }

    fn go(&mut self, route: Route) {
        if let Some(cmd) = self.state.navigate(route) {
            self.send_prepared(cmd);
        }
        self.ensure_auth_form();
    }

    fn ensure_auth_form(&mut self) {
        let wanted = match self.state.route {
            Route::Login => FormKind::Login,
            Route::Register => FormKind::Register,
            _ => return,
        };
        if self.state.form.as_ref().map(|f| f.kind) != Some(wanted) {
            self.state.form = Some(match wanted {
                FormKind::Register => FormState::register(),
                _ => FormState::login(),
            });
        }
    }

    fn check_token_expiry(&mut self) {
        let expired = self
            .state
            .session
            .as_ref()
            .is_some_and(|s| token::is_expired(&s.token));
        if expired {
            self.session.clear();
            apply_delta(
                &mut self.state,
                Delta::SessionEnded(Some(ApiError::SessionExpired.to_string())),
            );
            self.ensure_auth_form();
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if self.state.help_overlay {
            self.state.help_overlay = false;
            return;
        }
        if self.state.confirm_delete.is_some() {
            self.on_confirm_key(key);
            return;
        }
        if self.state.form.is_some() {
            self.on_form_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => self.cycle_route(true),
            KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => self.cycle_route(false),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('r') => {
                if let Some(cmd) = self.state.refresh() {
                    self.send_prepared(cmd);
                }
            }
            KeyCode::Char('x') | KeyCode::Esc => self.state.dismiss_error(),
            KeyCode::Char('n') => self.open_create(),
            KeyCode::Char('e') | KeyCode::Enter => self.open_edit(),
            KeyCode::Char('d') => self.ask_delete(),
            KeyCode::Char('s') => self.cycle_fixture_status(),
            KeyCode::Char('a') => self.open_assign_coach(),
            KeyCode::Char('w') => self.load_fortnight(),
            KeyCode::Char('L') => self.cycle_standings_league(),
            KeyCode::Char('p') => self.send(ProviderCommand::RefreshProfile),
            KeyCode::Char('o') => self.send(ProviderCommand::Logout),
            _ => {}
        }
    }

    /// For commands whose bookkeeping `AppState` already did.
    fn send_prepared(&mut self, cmd: ProviderCommand) {
        if let Some(tx) = &self.cmd_tx {
            if tx.send(cmd).is_err() {
                self.state.push_log("[WARN] Provider request failed");
            }
        }
    }

    fn on_form_key(&mut self, key: KeyEvent) {
        let Some(mut form) = self.state.form.take() else {
            return;
        };
        let auth_form = matches!(form.kind, FormKind::Login | FormKind::Register);
        match key.code {
            KeyCode::Esc if auth_form => {
                let target = if form.kind == FormKind::Login {
                    Route::Register
                } else {
                    Route::Login
                };
                self.state.auth_error = None;
                self.go(target);
                return;
            }
            KeyCode::Esc => {
                self.state.push_log("[INFO] Form closed");
                return;
            }
            KeyCode::Tab | KeyCode::Down => form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
            KeyCode::Left => form.cycle_choice(false),
            KeyCode::Right => form.cycle_choice(true),
            KeyCode::Char(' ')
                if form
                    .focused()
                    .is_some_and(|f| matches!(f.kind, FieldKind::Choice(_))) =>
            {
                form.cycle_choice(true)
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(c) => form.insert_char(c),
            KeyCode::Enter => match form.build(&self.state) {
                Ok(cmd) => {
                    form.error = None;
                    self.state.form = Some(form);
                    self.send(cmd);
                    return;
                }
                Err(message) => form.error = Some(message),
            },
            _ => {}
        }
        form.refresh_warning(&self.state);
        self.state.form = Some(form);
    }

    fn on_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                let Some(pending) = self.state.confirm_delete.clone() else {
                    return;
                };
                let cmd = match pending.kind {
                    ResourceKind::Result => {
                        match self.state.results.get(&pending.id) {
                            Some(result) => ProviderCommand::DeleteFixtureResult {
                                fixture_id: result.fixture_id.clone(),
                            },
                            None => ProviderCommand::Delete {
                                kind: pending.kind,
                                id: pending.id,
                            },
                        }
                    }
                    kind => ProviderCommand::Delete {
                        kind,
                        id: pending.id,
                    },
                };
                self.send(cmd);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.state.confirm_delete = None;
            }
            _ => {}
        }
    }

    fn cycle_route(&mut self, forward: bool) {
        let user = self.state.user().cloned();
        let allowed: Vec<Route> = Route::NAV
            .into_iter()
            .filter(|r| matches!(access::resolve_route(user.as_ref(), *r), RouteDecision::Render(_)))
            .collect();
        if allowed.is_empty() {
            return;
        }
        let current = allowed.iter().position(|r| *r == self.state.route);
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % allowed.len(),
            (Some(i), false) => (i + allowed.len() - 1) % allowed.len(),
            (None, _) => 0,
        };
        self.go(allowed[next]);
    }

    fn open_create(&mut self) {
        let coach_players = self.state.route == Route::MyTeam
            || (self.state.route == Route::Players && self.state.role() == Some(Role::Coach));
        if coach_players {
            match self.state.coach_team().cloned() {
                Some(team) => self.state.form = Some(FormState::player_for_team(&team)),
                None => self.state.set_banner(Tone::Warn, "No team assigned to your account"),
            }
            return;
        }
        let Some(kind) = self.state.route.resource() else {
            return;
        };
        let own_team = self.state.coach_team().map(|t| t.id.clone());
        if !self.state.capabilities(kind, own_team.as_ref()).create {
            self.state.set_banner(Tone::Warn, format!("You cannot add {}", kind.plural()));
            return;
        }
        self.state.form = Some(FormState::create(kind, &self.state));
    }

    fn open_edit(&mut self) {
        let Some(sel) = selected_record(&self.state) else {
            return;
        };
        if !self.state.capabilities(sel.kind, sel.team_id.as_ref()).edit {
            self.state.set_banner(Tone::Warn, format!("You cannot edit this {}", sel.kind.label()));
            return;
        }
        match FormState::edit(sel.kind, &sel.id, &self.state) {
            Some(form) => self.state.form = Some(form),
            None => self.state.push_log(format!("[WARN] {} {} is gone", sel.kind.label(), sel.id)),
        }
    }

    fn ask_delete(&mut self) {
        let Some(sel) = selected_record(&self.state) else {
            return;
        };
        if !self.state.capabilities(sel.kind, sel.team_id.as_ref()).delete {
            self.state.set_banner(Tone::Warn, format!("You cannot delete this {}", sel.kind.label()));
            return;
        }
        if sel.kind == ResourceKind::User {
            if let Some(current) = self.state.user() {
                if let Err(err) = validate::check_user_delete(current, &sel.id) {
                    self.state.set_banner(Tone::Error, err.to_string());
                    return;
                }
            }
        }
        self.state.confirm_delete = Some(PendingDelete {
            kind: sel.kind,
            id: sel.id,
            label: sel.label,
        });
    }

    fn cycle_fixture_status(&mut self) {
        if self.state.route != Route::Fixtures {
            return;
        }
        if !self.state.capabilities(ResourceKind::Fixture, None).change_status {
            return;
        }
        let Some(fixture) = self.state.fixtures.items.get(self.state.selected) else {
            return;
        };
        let cmd = ProviderCommand::SetFixtureStatus {
            id: fixture.id.clone(),
            status: fixture.status.next(),
        };
        self.send(cmd);
    }

    fn open_assign_coach(&mut self) {
        if self.state.route != Route::Teams || !self.state.is_admin() {
            return;
        }
        let Some(team) = self.state.visible_teams().get(self.state.selected).map(|t| (*t).clone()) else {
            return;
        };
        self.state.form = Some(FormState::assign_coach(&team, &self.state));
    }

    fn load_fortnight(&mut self) {
        if self.state.route != Route::Fixtures {
            return;
        }
        let start = Local::now().date_naive();
        let end = start + ChronoDuration::days(14);
        let ticket = self.state.advance_scope();
        self.state
            .push_log(format!("[INFO] Fixtures from {start} to {end}"));
        self.send(ProviderCommand::LoadFixturesInRange { ticket, start, end });
    }

    fn cycle_standings_league(&mut self) {
        if self.state.route != Route::Standings || self.state.leagues.items.is_empty() {
            return;
        }
        let leagues = &self.state.leagues.items;
        let next = match &self.state.standings_league {
            Some(current) => leagues
                .iter()
                .position(|l| &l.id == current)
                .map(|i| (i + 1) % (leagues.len() + 1)),
            None => Some(0),
        };
        self.state.standings_league = next.and_then(|i| leagues.get(i)).map(|l| l.id.clone());
    }
}

fn main() -> Result<()> {
    config::load_dotenv();
    let cfg = ConsoleConfig::from_env();
    init_tracing(&cfg);

    let session = match &cfg.session_path {
        Some(path) => {
            let store = SessionStore::new(path, cfg.session_secret.clone());
            tracing::info!(
                path = %store.path().display(),
                sealed = cfg.session_secret.is_some(),
                "session file"
            );
            SessionHandle::with_store(store)
        }
        None => SessionHandle::in_memory(),
    };
    if session.token().is_some_and(|t| token::is_expired(&t)) {
        tracing::info!("stored session expired, starting signed out");
        session.clear();
    }

    let transport: Arc<dyn Transport> = if cfg.demo {
        Arc::new(FakeBackend::seeded())
    } else {
        Arc::new(HttpTransport::new(&cfg.api_url, cfg.timeout)?)
    };
    let client = ApiClient::new(transport, session.clone());
    let scope = ViewScope::new();

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(client, scope.clone(), cfg.fetch_parallelism, tx, cmd_rx);

    let mut app = App::new(session, scope, Some(cmd_tx));
    app.state.push_log(if cfg.demo {
        "[INFO] Demo mode: in-memory league data".to_string()
    } else {
        format!("[INFO] API {}", cfg.api_url)
    });
    app.go(Route::Login);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

/// The terminal belongs to the UI, so tracing goes to a file when one is
/// configured and is dropped otherwise.
fn init_tracing(cfg: &ConsoleConfig) {
    let Some(path) = &cfg.log_path else {
        return;
    };
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("logging disabled: {err:#}");
            return;
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }
        if let Some(route) = app.state.take_pending_route() {
            app.go(route);
        }
        app.ensure_auth_form();

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.check_token_expiry();
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let state = &app.state;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match state.route {
        Route::Login | Route::Register | Route::Root => render_auth_screen(frame, chunks[1], state),
        Route::Dashboard => render_dashboard(frame, chunks[1], state),
        Route::Coach => render_coach(frame, chunks[1], state),
        Route::Standings => render_standings(frame, chunks[1], state),
        _ => render_list(frame, chunks[1], state),
    }

    if let Some(banner) = &state.banner {
        let color = match banner.tone {
            Tone::Info => Color::Green,
            Tone::Warn => Color::Yellow,
            Tone::Error => Color::Red,
        };
        let line = Paragraph::new(format!(" {} (x to dismiss)", banner.message))
            .style(Style::default().fg(color));
        frame.render_widget(line, chunks[2]);
    }

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[3]);

    let footer = Paragraph::new(footer_text(state));
    frame.render_widget(footer, chunks[4]);

    if let Some(form) = &state.form {
        if !matches!(form.kind, FormKind::Login | FormKind::Register) {
            render_form(frame, centered_rect(60, 70, frame.size()), form, None);
        }
    }
    if let Some(pending) = &state.confirm_delete {
        render_confirm(frame, centered_rect(50, 20, frame.size()), pending);
    }
    if state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let who = match state.user() {
        Some(user) => format!(
            "{} ({})",
            user.email,
            user.role.map(Role::as_wire).unwrap_or("no role")
        ),
        None => "signed out".to_string(),
    };
    let busy = if state.is_loading() || state.auth_loading {
        " | loading..."
    } else {
        ""
    };
    let line1 = format!("LEAGUE CONSOLE | {} | {who}{busy}", state.route.label());
    let user = state.user();
    let nav = Route::NAV
        .iter()
        .filter(|r| matches!(access::resolve_route(user, **r), RouteDecision::Render(_)))
        .map(|r| {
            if *r == state.route {
                format!("[{}]", r.label())
            } else {
                r.label().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    format!("{line1}\n{nav}")
}

fn footer_text(state: &AppState) -> String {
    if state.form.is_some() {
        return "Tab/↑/↓ Field | ←/→/Space Choose | Enter Save | Esc Cancel".to_string();
    }
    match state.route {
        Route::Login | Route::Register | Route::Root => {
            "Tab Field | Enter Submit | Esc Login/Register | Ctrl-C Quit".to_string()
        }
        Route::Fixtures if state.is_admin() => {
            "Tab Screen | j/k Move | n New | e Edit | d Delete | s Status | w Next 14 days | r Reload | o Logout | ? Help | q Quit".to_string()
        }
        Route::Teams if state.is_admin() => {
            "Tab Screen | j/k Move | n New | e Edit | d Delete | a Assign coach | r Reload | o Logout | ? Help | q Quit".to_string()
        }
        Route::Standings => "Tab Screen | L League | r Reload | o Logout | ? Help | q Quit".to_string(),
        _ => "Tab Screen | j/k Move | n New | e Edit | d Delete | r Reload | o Logout | ? Help | q Quit".to_string(),
    }
}

fn render_auth_screen(frame: &mut Frame, area: Rect, state: &AppState) {
    let popup = centered_rect(50, 80, area);
    if let Some(form) = &state.form {
        render_form(frame, popup, form, state.auth_error.as_deref());
    }
}

fn render_form(frame: &mut Frame, area: Rect, form: &FormState, outer_error: Option<&str>) {
    frame.render_widget(Clear, area);
    let mut lines: Vec<Line> = Vec::new();
    for (i, field) in form.fields.iter().enumerate() {
        let focused = i == form.focus;
        let marker = if focused { "> " } else { "  " };
        let hint = match field.kind {
            FieldKind::Choice(_) if focused => "  ◂ ▸",
            _ => "",
        };
        let style = if focused {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::styled(
            format!("{marker}{:<24} {}{hint}", field.label, field.display()),
            style,
        ));
    }
    if let Some(warning) = &form.warning {
        lines.push(Line::raw(""));
        lines.push(Line::styled(warning.clone(), Style::default().fg(Color::Yellow)));
    }
    if let Some(error) = form.error.as_deref().or(outer_error) {
        lines.push(Line::raw(""));
        lines.push(Line::styled(error.to_string(), Style::default().fg(Color::Red)));
    }
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().title(form.title()).borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_confirm(frame: &mut Frame, area: Rect, pending: &PendingDelete) {
    frame.render_widget(Clear, area);
    let text = format!(
        "Delete {} \"{}\"?\n\ny / Enter to confirm, n / Esc to keep it",
        pending.kind.label(),
        pending.label
    );
    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().title("Confirm").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_dashboard(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(1)])
        .split(area);
    let counts = DashboardCounts::compute(
        state.leagues.items.len(),
        &state.teams.items,
        &state.players.items,
        &state.fixtures.items,
        &state.results.items,
    );
    let summary = format!(
        "Leagues {}   Teams {}   Players {}   Scheduled fixtures {}   Results {}",
        counts.leagues, counts.teams, counts.players, counts.scheduled_fixtures, counts.results
    );
    frame.render_widget(
        Paragraph::new(summary).block(Block::default().title("Overview").borders(Borders::ALL)),
        sections[0],
    );

    let all_fixtures: Vec<&Fixture> = state.fixtures.items.iter().collect();
    let all_results: Vec<&MatchResult> = state.results.items.iter().collect();
    render_fixture_panels(frame, sections[1], state, &all_fixtures, &all_results);
}

fn render_coach(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(team) = state.coach_team() else {
        let text = if state.teams.is_loading() {
            "Loading your team..."
        } else {
            "No team is assigned to your account yet. Ask a league administrator to assign you."
        };
        frame.render_widget(
            Paragraph::new(text).block(Block::default().title("My Team").borders(Borders::ALL)),
            area,
        );
        return;
    };
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(1)])
        .split(area);
    let players = derive::team_players(&state.players.items, team);
    let league = team
        .league_id
        .as_ref()
        .map(|id| validate::league_name(&state.leagues.items, id))
        .or(team.league_name.as_deref())
        .unwrap_or("Unknown League");
    let summary = format!("{} | {league} | {} players", team.name, players.len());
    frame.render_widget(
        Paragraph::new(summary).block(Block::default().title("My Team").borders(Borders::ALL)),
        sections[0],
    );

    let fixtures = derive::team_fixtures(&state.fixtures.items, team);
    let results = derive::team_results(&state.results.items, &state.fixtures.items, team);
    render_fixture_panels(frame, sections[1], state, &fixtures, &results);
}

fn render_fixture_panels(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    fixtures: &[&Fixture],
    results: &[&MatchResult],
) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let upcoming = derive::upcoming_fixtures(fixtures, derive::DEFAULT_SLICE);
    let upcoming_text = if upcoming.is_empty() {
        "No upcoming fixtures".to_string()
    } else {
        upcoming
            .iter()
            .map(|f| fixture_line(f, state))
            .collect::<Vec<_>>()
            .join("\n")
    };
    frame.render_widget(
        Paragraph::new(upcoming_text)
            .block(Block::default().title("Upcoming").borders(Borders::ALL)),
        cols[0],
    );

    let recent = derive::recent_results(results, &state.fixtures.items, derive::DEFAULT_SLICE);
    let recent_text = if recent.is_empty() {
        "No results yet".to_string()
    } else {
        recent
            .iter()
            .map(|r| result_line(r, state))
            .collect::<Vec<_>>()
            .join("\n")
    };
    frame.render_widget(
        Paragraph::new(recent_text)
            .block(Block::default().title("Recent results").borders(Borders::ALL)),
        cols[1],
    );
}

fn render_standings(frame: &mut Frame, area: Rect, state: &AppState) {
    let league = state.standings_league.as_ref();
    let title = match league {
        Some(id) => format!("Standings: {}", validate::league_name(&state.leagues.items, id)),
        None => "Standings: all leagues".to_string(),
    };
    let table = standings::compute_standings(
        &state.teams.items,
        &state.fixtures.items,
        &state.results.items,
        league,
    );
    let mut lines = vec![format!(
        "{:>3} {:<24} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>4} {:>4}  Form",
        "#", "Team", "P", "W", "D", "L", "GF", "GA", "GD", "Pts"
    )];
    lines.extend(table.iter().map(|row| {
        format!(
            "{:>3} {:<24} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>+4} {:>4}  {}",
            row.position,
            truncate(&row.team, 24),
            row.played,
            row.won,
            row.drawn,
            row.lost,
            row.goals_for,
            row.goals_against,
            row.goal_difference(),
            row.points,
            row.form_string()
        )
    }));
    if table.is_empty() {
        lines.push("No teams in this league".to_string());
    }
    frame.render_widget(
        Paragraph::new(lines.join("\n")).block(Block::default().title(title).borders(Borders::ALL)),
        area,
    );
}

fn render_list(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = match state.route {
        Route::MyTeam => state
            .coach_team()
            .map(|t| format!("My Team: {}", t.name))
            .unwrap_or_else(|| "My Team".to_string()),
        other => other.label().to_string(),
    };
    let rows = list_lines(state);
    let block = Block::default().title(title).borders(Borders::ALL);
    if rows.is_empty() {
        let empty = if state.is_loading() {
            "Loading..."
        } else if let Some(err) = state.route.resource().and_then(|k| state.store_error(k)) {
            err
        } else if state.route == Route::MyTeam && state.coach_team().is_none() {
            "No team is assigned to your account yet."
        } else {
            "Nothing here yet"
        };
        frame.render_widget(Paragraph::new(empty).block(block), area);
        return;
    }
    let visible = area.height.saturating_sub(2) as usize;
    let (start, end) = visible_range(state.selected, rows.len(), visible.max(1));
    let lines: Vec<Line> = rows[start..end]
        .iter()
        .enumerate()
        .map(|(offset, text)| {
            if start + offset == state.selected {
                Line::styled(
                    text.clone(),
                    Style::default()
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Line::raw(text.clone())
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn list_lines(state: &AppState) -> Vec<String> {
    let teams = &state.teams.items;
    match state.route {
        Route::Leagues => state
            .leagues
            .items
            .iter()
            .map(|l| {
                let dates = match (l.start_date, l.end_date) {
                    (Some(s), Some(e)) => format!("{s} to {e}"),
                    (Some(s), None) => format!("from {s}"),
                    _ => String::new(),
                };
                format!("{:<28} {:<8} {dates}", truncate(&l.name, 28), l.season.as_deref().unwrap_or("-"))
            })
            .collect(),
        Route::Teams => state
            .visible_teams()
            .iter()
            .map(|t| {
                let league = t
                    .league_id
                    .as_ref()
                    .map(|id| validate::league_name(&state.leagues.items, id))
                    .or(t.league_name.as_deref())
                    .unwrap_or("Unknown League");
                let coach = t
                    .coach_id
                    .as_ref()
                    .and_then(|id| state.users.get(id).map(|u| u.full_name()))
                    .or_else(|| t.coach_name.clone())
                    .unwrap_or_else(|| "-".to_string());
                format!("{:<24} {:<26} coach: {coach}", truncate(&t.name, 24), truncate(league, 26))
            })
            .collect(),
        Route::Players | Route::MyTeam => state
            .visible_players()
            .iter()
            .map(|p| {
                let number = p.jersey_number.map(|n| format!("#{n:>2}")).unwrap_or_else(|| "   ".to_string());
                let team = derive::team_name(teams, p.team_id.as_ref()).unwrap_or("-");
                format!(
                    "{number} {:<26} {:<12} {team}",
                    truncate(&p.full_name(), 26),
                    p.position.as_deref().unwrap_or("-")
                )
            })
            .collect(),
        Route::Fixtures => state.fixtures.items.iter().map(|f| fixture_line(f, state)).collect(),
        Route::Results => state.results.items.iter().map(|r| result_line(r, state)).collect(),
        Route::Referees => state
            .referees
            .items
            .iter()
            .map(|r| {
                let exp = r.experience.map(|y| format!("{y}y")).unwrap_or_default();
                format!("{:<26} {:<28} {exp}", truncate(&r.full_name(), 26), r.email.as_deref().unwrap_or("-"))
            })
            .collect(),
        Route::Venues => state
            .venues
            .items
            .iter()
            .map(|v| {
                let place = [v.city.as_deref(), v.country.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", ");
                let capacity = v.capacity.map(|c| format!("cap {c}")).unwrap_or_default();
                format!("{:<26} {:<24} {capacity}", truncate(&v.name, 26), place)
            })
            .collect(),
        Route::Users => state
            .users
            .items
            .iter()
            .map(|u| {
                let team = derive::team_name(teams, u.team_id.as_ref()).unwrap_or("-");
                format!(
                    "{:<24} {:<28} {:<6} {team}",
                    truncate(&u.full_name(), 24),
                    truncate(&u.email, 28),
                    u.role.map(Role::as_wire).unwrap_or("-")
                )
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn selected_record(state: &AppState) -> Option<Selection> {
    let i = state.selected;
    match state.route {
        Route::Leagues => state.leagues.items.get(i).map(|l| Selection {
            kind: ResourceKind::League,
            id: l.id.clone(),
            label: l.name.clone(),
            team_id: None,
        }),
        Route::Teams => state.visible_teams().get(i).map(|t| Selection {
            kind: ResourceKind::Team,
            id: t.id.clone(),
            label: t.name.clone(),
            team_id: Some(t.id.clone()),
        }),
        Route::Players | Route::MyTeam => state.visible_players().get(i).map(|p| Selection {
            kind: ResourceKind::Player,
            id: p.id.clone(),
            label: p.full_name(),
            team_id: p.team_id.clone(),
        }),
        Route::Fixtures => state.fixtures.items.get(i).map(|f| Selection {
            kind: ResourceKind::Fixture,
            id: f.id.clone(),
            label: derive::fixture_label(f, &state.teams.items),
            team_id: None,
        }),
        Route::Results => state.results.items.get(i).map(|r| Selection {
            kind: ResourceKind::Result,
            id: r.id.clone(),
            label: result_line(r, state),
            team_id: None,
        }),
        Route::Referees => state.referees.items.get(i).map(|r| Selection {
            kind: ResourceKind::Referee,
            id: r.id.clone(),
            label: r.full_name(),
            team_id: None,
        }),
        Route::Venues => state.venues.items.get(i).map(|v| Selection {
            kind: ResourceKind::Venue,
            id: v.id.clone(),
            label: v.name.clone(),
            team_id: None,
        }),
        Route::Users => state.users.items.get(i).map(|u| Selection {
            kind: ResourceKind::User,
            id: u.id.clone(),
            label: u.full_name(),
            team_id: None,
        }),
        _ => None,
    }
}

fn fixture_line(fixture: &Fixture, state: &AppState) -> String {
    let when = fixture
        .match_date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "TBD".to_string());
    let venue = fixture
        .venue_id
        .as_ref()
        .and_then(|id| state.venues.get(id).map(|v| v.name.clone()))
        .or_else(|| fixture.venue_name.clone())
        .unwrap_or_default();
    let status = fixture.status.as_wire();
    format!(
        "{when}  {:<36} {status:<10} {venue}",
        truncate(&derive::fixture_label(fixture, &state.teams.items), 36)
    )
}

fn result_line(result: &MatchResult, state: &AppState) -> String {
    let fixture = derive::find_fixture(&state.fixtures.items, &result.fixture_id);
    let label = fixture
        .map(|f| derive::fixture_label(f, &state.teams.items))
        .unwrap_or_else(|| format!("Fixture {}", result.fixture_id));
    let date = fixture
        .and_then(|f| f.match_date)
        .or(result.recorded_at)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!("{:<36} {}-{}  {date}", truncate(&label, 36), result.home_score, result.away_score)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No activity yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "League Console - Help",
        "",
        "Global:",
        "  Tab / h / l     Previous / next screen",
        "  j/k or ↑/↓      Move selection",
        "  r               Reload this screen",
        "  x / Esc         Dismiss message",
        "  p               Refresh profile",
        "  o               Log out",
        "  ?               Toggle help",
        "  q / Ctrl-C      Quit",
        "",
        "Lists:",
        "  n               New record",
        "  e / Enter       Edit selected",
        "  d               Delete selected",
        "  s               Next fixture status (admin)",
        "  w               Fixtures in the next 14 days",
        "  a               Assign coach to team (admin)",
        "  L               Cycle standings league",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
