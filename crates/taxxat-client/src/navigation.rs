use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    ForgotPassword,
    /// Carries the email typed on the previous step, if the user came from it.
    ResetPassword { email: Option<String> },
    Dashboard,
}

impl Route {
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::ForgotPassword => "/forgot-password",
            Self::ResetPassword { .. } => "/reset-password",
            Self::Dashboard => "/dashboard",
        }
    }

    pub const fn is_protected(&self) -> bool {
        matches!(self, Self::Dashboard)
    }

    /// Pages a signed-in user has no business seeing.
    pub const fn is_entry(&self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A navigation that should happen after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub route: Route,
    pub delay: Duration,
}

impl Redirect {
    pub fn after(route: Route, delay: Duration) -> Self {
        Self { route, delay }
    }

    pub async fn follow(self) -> Route {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.route
    }
}

#[derive(Clone)]
pub struct NavigationGate {
    session: Arc<dyn SessionStore>,
}

impl NavigationGate {
    pub fn new(session: Arc<dyn SessionStore>) -> Self {
        Self { session }
    }

    /// Where the client starts after a restart.
    pub fn initial_route(&self) -> Route {
        if self.session.is_authenticated() {
            Route::Dashboard
        } else {
            Route::Landing
        }
    }

    /// Resolves the page actually shown when `requested` is entered.
    pub fn enter(&self, requested: Route) -> Route {
        let authenticated = self.session.is_authenticated();
        if requested.is_protected() && !authenticated {
            debug!(from = %requested, "anonymous access redirected to login");
            return Route::Login;
        }
        if requested.is_entry() && authenticated {
            debug!(from = %requested, "signed-in user redirected to dashboard");
            return Route::Dashboard;
        }
        requested
    }
}
