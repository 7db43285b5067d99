//! Route table, route guard and the role-aware navigation bar.
//!
//! The guard only asks whether a session is authenticated. Role is used to
//! choose which links are shown, never to allow or refuse a route.

use std::fmt;
use tracing::debug;

use crate::session::{Role, SessionStore};

/// Every navigation target the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Signup,
    AdminDashboard,
    ShareLocation,
    UserDashboard,
    EmergencyContact,
    DetailsPage,
    UpdateReportStatus,
    Map,
}

impl Route {
    pub const ALL: [Route; 10] = [
        Route::Home,
        Route::Login,
        Route::Signup,
        Route::AdminDashboard,
        Route::ShareLocation,
        Route::UserDashboard,
        Route::EmergencyContact,
        Route::DetailsPage,
        Route::UpdateReportStatus,
        Route::Map,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::AdminDashboard => "/AdminDashboard",
            Route::ShareLocation => "/share-location",
            Route::UserDashboard => "/user-dashboard",
            Route::EmergencyContact => "/emergency-contact",
            Route::DetailsPage => "/details-page",
            Route::UpdateReportStatus => "/UpdateReportStatus",
            Route::Map => "/map",
        }
    }

    /// Look up a path. Matching ignores case, the query string and a
    /// trailing slash.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.trim();
        let path = path.split(['?', '#']).next().unwrap_or("");
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        Route::ALL
            .into_iter()
            .find(|route| route.path().eq_ignore_ascii_case(path))
    }

    /// Routes that require an authenticated session.
    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Home | Route::Login | Route::Signup)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
}

pub fn can_access(route: Route, sessions: &SessionStore) -> bool {
    !route.is_protected() || sessions.is_authenticated()
}

/// Decide whether to render `route` or send the user to the login page.
/// The redirect never carries a return path.
pub fn resolve(route: Route, sessions: &SessionStore) -> Navigation {
    if can_access(route, sessions) {
        Navigation::Render(route)
    } else {
        debug!(route = %route, "Unauthenticated access, redirecting to login");
        Navigation::Redirect(Route::Login)
    }
}

/// Action attached to the trailing navbar button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    Go(Route),
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub action: NavAction,
}

impl NavItem {
    const fn link(label: &'static str, route: Route) -> Self {
        Self {
            label,
            action: NavAction::Go(route),
        }
    }
}

/// Links shown in the navigation bar for this session on the `current` page.
pub fn nav_links(sessions: &SessionStore, current: Route) -> Vec<NavItem> {
    let login = NavItem::link("Login", Route::Login);

    if current == Route::Home {
        return vec![login];
    }

    let mut items = vec![NavItem::link("Home", Route::Home)];

    match sessions.role() {
        Some(Role::Admin) => {
            items.push(NavItem::link("Reports", Route::AdminDashboard));
            items.push(NavItem::link("Update Status", Route::UpdateReportStatus));
        }
        Some(Role::User) => {
            items.push(NavItem::link("Reports", Route::UserDashboard));
            items.push(NavItem::link("Map", Route::Map));
            items.push(NavItem::link("Emergency Contacts", Route::EmergencyContact));
        }
        None => {}
    }

    if sessions.is_authenticated() {
        items.push(NavItem {
            label: "Logout",
            action: NavAction::Logout,
        });
    } else {
        items.push(login);
    }

    items
}
