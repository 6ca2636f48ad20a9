use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use rayon::prelude::*;

use crate::api::{ApiClient, Scope};
use crate::error::ApiError;
use crate::model::{
    EntityId, Fixture, League, MatchResult, Player, Referee, Team, User, Venue,
};
use crate::state::{Delta, Draft, ProviderCommand, Record, Records, ScopeTicket, ViewScope};
use crate::wire::ResourceKind;

/// Runs API calls off the UI thread. Commands arrive on `cmd_rx`, results go
/// back as deltas on `tx`. The loop ends when the UI drops its sender.
pub fn spawn_provider(
    client: ApiClient,
    scope: ViewScope,
    parallelism: usize,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let pool = build_fetch_pool(parallelism);
        if pool.is_none() {
            let _ = tx.send(Delta::Log(
                "[WARN] Fetch pool unavailable, loading sequentially".to_string(),
            ));
        }
        while let Ok(cmd) = cmd_rx.recv() {
            run_command(&client, &scope, &pool, cmd, &tx);
        }
        tracing::debug!("provider channel closed");
    })
}

/// Executes one command and sends its deltas. Exposed so headless tools and
/// tests can drive the same code path synchronously.
pub fn run_command(
    client: &ApiClient,
    scope: &ViewScope,
    pool: &Option<rayon::ThreadPool>,
    cmd: ProviderCommand,
    tx: &Sender<Delta>,
) {
    match cmd {
        ProviderCommand::Login(credentials) => match client.login(&credentials) {
            Ok(session) => {
                let _ = tx.send(Delta::Authenticated(session));
            }
            Err(err) => {
                let _ = tx.send(Delta::AuthFailed(err.to_string()));
            }
        },
        ProviderCommand::Register(draft) => match client.register(&draft) {
            Ok(session) => {
                let _ = tx.send(Delta::Authenticated(session));
            }
            Err(err) => {
                let _ = tx.send(Delta::AuthFailed(err.to_string()));
            }
        },
        ProviderCommand::RefreshProfile => match client.me() {
            Ok(user) => {
                let _ = tx.send(Delta::ProfileRefreshed(user));
            }
            Err(err) if err.forces_logout() => {
                let _ = tx.send(Delta::SessionEnded(Some(err.to_string())));
            }
            Err(err) => {
                let _ = tx.send(Delta::Log(format!("[WARN] Profile refresh failed: {err}")));
            }
        },
        ProviderCommand::Logout => {
            client.logout();
            let _ = tx.send(Delta::SessionEnded(None));
        }
        ProviderCommand::Load { ticket, kinds } => {
            if !scope.is_current(ticket) {
                return;
            }
            let outcomes: Vec<(ResourceKind, Result<Records, ApiError>)> =
                with_fetch_pool(pool, || {
                    kinds
                        .par_iter()
                        .map(|kind| (*kind, load_kind(client, *kind)))
                        .collect()
                });
            for (kind, outcome) in outcomes {
                send_load(tx, scope, ticket, kind, outcome);
            }
        }
        ProviderCommand::LoadScoped {
            ticket,
            kind,
            scope: parent,
        } => {
            if !scope.is_current(ticket) {
                return;
            }
            let outcome = load_scoped(client, kind, &parent);
            send_load(tx, scope, ticket, kind, outcome);
        }
        ProviderCommand::LoadFixturesInRange { ticket, start, end } => {
            if !scope.is_current(ticket) {
                return;
            }
            let outcome = client.fixtures_in_range(start, end).map(Records::Fixture);
            send_load(tx, scope, ticket, ResourceKind::Fixture, outcome);
        }
        ProviderCommand::Fetch { kind, id } => match fetch_one(client, kind, &id) {
            Ok(record) => {
                let _ = tx.send(Delta::Fetched(record));
            }
            Err(err) => send_mutation_error(tx, kind, err),
        },
        ProviderCommand::Create(draft) => {
            let kind = draft.kind();
            match create(client, &draft) {
                Ok(record) => {
                    let _ = tx.send(Delta::Created(record));
                }
                Err(err) => send_mutation_error(tx, kind, err),
            }
        }
        ProviderCommand::Update { id, draft } => {
            let kind = draft.kind();
            match update(client, &id, &draft) {
                Ok(record) => {
                    let _ = tx.send(Delta::Updated(record));
                }
                Err(err) => send_mutation_error(tx, kind, err),
            }
        }
        ProviderCommand::Delete { kind, id } => match delete(client, kind, &id) {
            Ok(()) => {
                let _ = tx.send(Delta::Deleted { kind, id });
            }
            Err(err) => send_mutation_error(tx, kind, err),
        },
        ProviderCommand::SetFixtureStatus { id, status } => {
            match client.set_fixture_status(&id, &status) {
                Ok(fixture) => {
                    let _ = tx.send(Delta::Updated(Record::Fixture(fixture)));
                }
                Err(err) => send_mutation_error(tx, ResourceKind::Fixture, err),
            }
        }
        ProviderCommand::SaveFixtureResult { draft, existing } => {
            let saved = if existing {
                client.update_fixture_result(&draft.fixture_id, &draft)
            } else {
                client.record_result(&draft.fixture_id, &draft)
            };
            match saved {
                Ok(result) if existing => {
                    let _ = tx.send(Delta::Updated(Record::Result(result)));
                }
                Ok(result) => {
                    let _ = tx.send(Delta::Created(Record::Result(result)));
                }
                Err(err) => send_mutation_error(tx, ResourceKind::Result, err),
            }
        }
        ProviderCommand::DeleteFixtureResult { fixture_id } => {
            match client.delete_fixture_result(&fixture_id) {
                Ok(()) => {
                    let _ = tx.send(Delta::ResultCleared { fixture_id });
                }
                Err(err) => send_mutation_error(tx, ResourceKind::Result, err),
            }
        }
        ProviderCommand::AssignCoach { team_id, coach_id } => {
            match client.assign_coach(&team_id, &coach_id) {
                Ok(()) => {
                    let _ = tx.send(Delta::CoachAssigned { team_id, coach_id });
                }
                Err(err) => send_mutation_error(tx, ResourceKind::Team, err),
            }
        }
    }
}

fn send_load(
    tx: &Sender<Delta>,
    scope: &ViewScope,
    ticket: ScopeTicket,
    kind: ResourceKind,
    outcome: Result<Records, ApiError>,
) {
    if !scope.is_current(ticket) {
        tracing::debug!(kind = kind.label(), "view changed before load finished");
        return;
    }
    match outcome {
        Ok(records) => {
            let _ = tx.send(Delta::Loaded { ticket, records });
        }
        Err(err) if err.forces_logout() => {
            let _ = tx.send(Delta::SessionEnded(Some(err.to_string())));
        }
        Err(err) => {
            let _ = tx.send(Delta::LoadFailed {
                ticket,
                kind,
                message: err.to_string(),
            });
        }
    }
}

fn send_mutation_error(tx: &Sender<Delta>, kind: ResourceKind, err: ApiError) {
    let delta = if err.forces_logout() {
        Delta::SessionEnded(Some(err.to_string()))
    } else {
        Delta::MutationFailed {
            kind,
            message: err.to_string(),
        }
    };
    let _ = tx.send(delta);
}

fn load_kind(client: &ApiClient, kind: ResourceKind) -> Result<Records, ApiError> {
    Ok(match kind {
        ResourceKind::League => Records::League(client.list::<League>()?),
        ResourceKind::Team => Records::Team(client.list::<Team>()?),
        ResourceKind::Player => Records::Player(client.list::<Player>()?),
        ResourceKind::Fixture => Records::Fixture(client.list::<Fixture>()?),
        ResourceKind::Result => Records::Result(client.list::<MatchResult>()?),
        ResourceKind::Referee => Records::Referee(client.list::<Referee>()?),
        ResourceKind::Venue => Records::Venue(client.list::<Venue>()?),
        ResourceKind::User => Records::User(client.list::<User>()?),
    })
}

fn load_scoped(client: &ApiClient, kind: ResourceKind, scope: &Scope) -> Result<Records, ApiError> {
    Ok(match kind {
        ResourceKind::Team => Records::Team(client.list_scoped::<Team>(scope)?),
        ResourceKind::Player => Records::Player(client.list_scoped::<Player>(scope)?),
        ResourceKind::Fixture => Records::Fixture(client.list_scoped::<Fixture>(scope)?),
        ResourceKind::Result => Records::Result(client.list_scoped::<MatchResult>(scope)?),
        other => {
            return Err(ApiError::Validation(format!(
                "{} cannot be listed per league or team",
                other.plural()
            )));
        }
    })
}

fn fetch_one(client: &ApiClient, kind: ResourceKind, id: &EntityId) -> Result<Record, ApiError> {
    Ok(match kind {
        ResourceKind::League => Record::League(client.get(id)?),
        ResourceKind::Team => Record::Team(client.get(id)?),
        ResourceKind::Player => Record::Player(client.get(id)?),
        ResourceKind::Fixture => Record::Fixture(client.get(id)?),
        ResourceKind::Result => Record::Result(client.get(id)?),
        ResourceKind::Referee => Record::Referee(client.get(id)?),
        ResourceKind::Venue => Record::Venue(client.get(id)?),
        ResourceKind::User => Record::User(client.get(id)?),
    })
}

fn create(client: &ApiClient, draft: &Draft) -> Result<Record, ApiError> {
    Ok(match draft {
        Draft::League(d) => Record::League(client.create::<League>(d)?),
        Draft::Team(d) => Record::Team(client.create::<Team>(d)?),
        Draft::Player(d) => Record::Player(client.create::<Player>(d)?),
        Draft::Fixture(d) => Record::Fixture(client.create::<Fixture>(d)?),
        Draft::Result(d) => Record::Result(client.create::<MatchResult>(d)?),
        Draft::Referee(d) => Record::Referee(client.create::<Referee>(d)?),
        Draft::Venue(d) => Record::Venue(client.create::<Venue>(d)?),
        Draft::User(d) => Record::User(client.create::<User>(d)?),
    })
}

fn update(client: &ApiClient, id: &EntityId, draft: &Draft) -> Result<Record, ApiError> {
    Ok(match draft {
        Draft::League(d) => Record::League(client.update::<League>(id, d)?),
        Draft::Team(d) => Record::Team(client.update::<Team>(id, d)?),
        Draft::Player(d) => Record::Player(client.update::<Player>(id, d)?),
        Draft::Fixture(d) => Record::Fixture(client.update::<Fixture>(id, d)?),
        Draft::Result(d) => Record::Result(client.update::<MatchResult>(id, d)?),
        Draft::Referee(d) => Record::Referee(client.update::<Referee>(id, d)?),
        Draft::Venue(d) => Record::Venue(client.update::<Venue>(id, d)?),
        Draft::User(d) => Record::User(client.update::<User>(id, d)?),
    })
}

fn delete(client: &ApiClient, kind: ResourceKind, id: &EntityId) -> Result<(), ApiError> {
    match kind {
        ResourceKind::League => client.delete::<League>(id),
        ResourceKind::Team => client.delete::<Team>(id),
        ResourceKind::Player => client.delete::<Player>(id),
        ResourceKind::Fixture => client.delete::<Fixture>(id),
        ResourceKind::Result => client.delete::<MatchResult>(id),
        ResourceKind::Referee => client.delete::<Referee>(id),
        ResourceKind::Venue => client.delete::<Venue>(id),
        ResourceKind::User => client.delete::<User>(id),
    }
}

pub fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("league-fetch-{i}"))
        .build()
        .ok()
}

fn with_fetch_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
