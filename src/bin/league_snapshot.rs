use std::sync::Arc;

use anyhow::{Context, Result, bail};

use league_console::api::{ApiClient, Scope, Transport};
use league_console::config::{self, ConsoleConfig};
use league_console::derive;
use league_console::fake_backend::FakeBackend;
use league_console::http_client::HttpTransport;
use league_console::model::{Credentials, Fixture, League, MatchResult, Player, Role, Team};
use league_console::session::SessionHandle;
use league_console::standings;

/// Signs in once and prints what the console would show on the viewer's home
/// screen: the coach's team summary, or league tables for an admin.
fn main() -> Result<()> {
    config::load_dotenv();
    let cfg = ConsoleConfig::from_env();
    let email = arg_value("--email").context("missing --email=<address>")?;
    let password = arg_value("--password")
        .or_else(|| std::env::var("LEAGUE_PASSWORD").ok())
        .context("missing --password=<secret> (or LEAGUE_PASSWORD)")?;
    let demo = cfg.demo || has_flag("--demo");

    let transport: Arc<dyn Transport> = if demo {
        Arc::new(FakeBackend::seeded())
    } else {
        Arc::new(HttpTransport::new(&cfg.api_url, cfg.timeout)?)
    };
    let client = ApiClient::new(transport, SessionHandle::in_memory());
    let session = client.login(&Credentials {
        email,
        password,
        role: None,
    })?;
    println!(
        "Signed in: {} {} <{}> ({})",
        session.user.first_name,
        session.user.last_name,
        session.user.email,
        session.user.role.map(Role::as_wire).unwrap_or("no role")
    );

    let teams: Vec<Team> = client.list()?;
    let fixtures: Vec<Fixture> = client.list()?;
    let results: Vec<MatchResult> = client.list()?;

    match session.user.role {
        Some(Role::Coach) => {
            let Some(team) = derive::resolve_coach_team(&teams, &session.user) else {
                bail!("no team is assigned to {}", session.user.email);
            };
            let players: Vec<Player> = client.list_scoped(&Scope::Team(team.id.clone()))?;
            println!("Team: {} ({} players)", team.name, players.len());
            for player in &players {
                let number = player
                    .jersey_number
                    .map(|n| format!("#{n}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(" {number:>4} {}", player.full_name());
            }

            let own = derive::team_fixtures(&fixtures, team);
            println!("Upcoming:");
            for fixture in derive::upcoming_fixtures(&own, derive::DEFAULT_SLICE) {
                println!(" - {}", describe_fixture(fixture, &teams));
            }
            println!("Recent results:");
            let own_results = derive::team_results(&results, &fixtures, team);
            for result in derive::recent_results(&own_results, &fixtures, derive::DEFAULT_SLICE) {
                let label = derive::find_fixture(&fixtures, &result.fixture_id)
                    .map(|f| derive::fixture_label(f, &teams))
                    .unwrap_or_else(|| format!("Fixture {}", result.fixture_id));
                println!(" - {label} {}-{}", result.home_score, result.away_score);
            }
        }
        _ => {
            let leagues: Vec<League> = client.list()?;
            for league in &leagues {
                println!("{}", league.name);
                for row in standings::compute_standings(&teams, &fixtures, &results, Some(&league.id)) {
                    println!(
                        " {:>2}. {:<24} P{:<2} Pts {:<3} GD {:+}",
                        row.position,
                        row.team,
                        row.played,
                        row.points,
                        row.goal_difference()
                    );
                }
            }
        }
    }
    Ok(())
}

fn describe_fixture(fixture: &Fixture, teams: &[Team]) -> String {
    let when = fixture
        .match_date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "TBD".to_string());
    format!("{when} {}", derive::fixture_label(fixture, teams))
}

fn arg_value(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            if let Some(next) = args.get(idx + 1) {
                if !next.trim().is_empty() {
                    return Some(next.clone());
                }
            }
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
