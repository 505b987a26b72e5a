//! Page access checks based on the current session

use std::sync::Arc;

use tracing::{debug, warn};

use crate::gateway::Gateway;

/// Pages a guard can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Logout,
    Booking,
    MyAppointments,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::Login => "login",
            Route::Logout => "logout",
            Route::Booking => "booking",
            Route::MyAppointments => "my-appointments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(Route),
}

pub struct SessionGuard {
    gateway: Arc<dyn Gateway>,
}

impl SessionGuard {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// For pages that need a signed-in user. A failed lookup counts as
    /// signed out.
    pub async fn protect_page(&self) -> GuardOutcome {
        match self.gateway.get_session().await {
            Ok(Some(_)) => GuardOutcome::Allow,
            Ok(None) => {
                debug!("no session, redirecting to login");
                GuardOutcome::Redirect(Route::Login)
            }
            Err(e) => {
                warn!("session lookup failed: {}", e);
                GuardOutcome::Redirect(Route::Login)
            }
        }
    }

    /// For the login and registration pages: a signed-in user is sent to
    /// the logout page instead.
    pub async fn redirect_if_logged_in(&self) -> GuardOutcome {
        match self.gateway.get_session().await {
            Ok(Some(_)) => GuardOutcome::Redirect(Route::Logout),
            Ok(None) => GuardOutcome::Allow,
            Err(e) => {
                warn!("session lookup failed: {}", e);
                GuardOutcome::Allow
            }
        }
    }
}
