//! Which screens a viewer may open and what they may do on them.

use crate::model::{Role, User};
use crate::wire::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Root,
    Login,
    Register,
    Dashboard,
    Coach,
    MyTeam,
    Leagues,
    Teams,
    Players,
    Fixtures,
    Results,
    Referees,
    Venues,
    Users,
    Standings,
}

impl Route {
    /// Screens reachable from the navigation bar, in display order.
    pub const NAV: [Route; 12] = [
        Route::Dashboard,
        Route::Coach,
        Route::MyTeam,
        Route::Leagues,
        Route::Teams,
        Route::Players,
        Route::Fixtures,
        Route::Results,
        Route::Standings,
        Route::Referees,
        Route::Venues,
        Route::Users,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
            Route::Coach => "/coach",
            Route::MyTeam => "/my-team",
            Route::Leagues => "/leagues",
            Route::Teams => "/teams",
            Route::Players => "/players",
            Route::Fixtures => "/fixtures",
            Route::Results => "/results",
            Route::Referees => "/referees",
            Route::Venues => "/venues",
            Route::Users => "/users",
            Route::Standings => "/standings",
        }
    }

    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Some(Route::Root);
        }
        [Route::Login, Route::Register]
            .into_iter()
            .chain(Route::NAV)
            .find(|r| r.path() == trimmed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Route::Root => "Home",
            Route::Login => "Login",
            Route::Register => "Register",
            Route::Dashboard => "Dashboard",
            Route::Coach => "Coach",
            Route::MyTeam => "My Team",
            Route::Leagues => "Leagues",
            Route::Teams => "Teams",
            Route::Players => "Players",
            Route::Fixtures => "Fixtures",
            Route::Results => "Results",
            Route::Referees => "Referees",
            Route::Venues => "Venues",
            Route::Users => "Users",
            Route::Standings => "Standings",
        }
    }

    pub fn is_public(self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    /// The collection a list screen manages, if any.
    pub fn resource(self) -> Option<ResourceKind> {
        match self {
            Route::Leagues => Some(ResourceKind::League),
            Route::Teams => Some(ResourceKind::Team),
            Route::Players => Some(ResourceKind::Player),
            Route::Fixtures => Some(ResourceKind::Fixture),
            Route::Results => Some(ResourceKind::Result),
            Route::Referees => Some(ResourceKind::Referee),
            Route::Venues => Some(ResourceKind::Venue),
            Route::Users => Some(ResourceKind::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(Route),
}

pub fn home_route(role: Option<Role>) -> Route {
    match role {
        Some(Role::Admin) => Route::Dashboard,
        Some(Role::Coach) => Route::Coach,
        None => Route::Leagues,
    }
}

/// Gate for navigating to `route` as `viewer` (`None` when signed out).
pub fn resolve_route(viewer: Option<&User>, route: Route) -> RouteDecision {
    let Some(user) = viewer else {
        return if route.is_public() {
            RouteDecision::Render(route)
        } else {
            RouteDecision::Redirect(Route::Login)
        };
    };
    let role = user.role;
    match route {
        Route::Login | Route::Register => RouteDecision::Redirect(home_route(role)),
        Route::Root => RouteDecision::Redirect(Route::Leagues),
        Route::Dashboard | Route::Users if role != Some(Role::Admin) => {
            RouteDecision::Redirect(Route::Leagues)
        }
        Route::Coach | Route::MyTeam if role != Some(Role::Coach) => {
            RouteDecision::Redirect(Route::Leagues)
        }
        other => RouteDecision::Render(other),
    }
}

/// Follows redirects until a screen renders.
pub fn landing(viewer: Option<&User>, route: Route) -> Route {
    let mut current = route;
    for _ in 0..4 {
        match resolve_route(viewer, current) {
            RouteDecision::Render(r) => return r,
            RouteDecision::Redirect(next) => current = next,
        }
    }
    current
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub view: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
    pub change_status: bool,
}

impl Capabilities {
    const NONE: Capabilities = Capabilities {
        view: false,
        create: false,
        edit: false,
        delete: false,
        change_status: false,
    };

    const READ_ONLY: Capabilities = Capabilities {
        view: true,
        ..Capabilities::NONE
    };

    pub fn any_write(&self) -> bool {
        self.create || self.edit || self.delete || self.change_status
    }
}

/// `owns_team` is true when the record (or the screen) belongs to the coach's
/// resolved team.
pub fn capabilities(role: Option<Role>, kind: ResourceKind, owns_team: bool) -> Capabilities {
    match role {
        Some(Role::Admin) => Capabilities {
            view: true,
            create: true,
            edit: true,
            delete: true,
            change_status: kind == ResourceKind::Fixture,
        },
        Some(Role::Coach) => match kind {
            ResourceKind::User => Capabilities::NONE,
            ResourceKind::Player if owns_team => Capabilities {
                create: true,
                edit: true,
                ..Capabilities::READ_ONLY
            },
            _ => Capabilities::READ_ONLY,
        },
        None => Capabilities::NONE,
    }
}
