//! Login, registration and logout form handling

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use clinic_booking_auth::AuthError;

use crate::error::Error;
use crate::gateway::Gateway;
use crate::messages::StatusMessage;
use crate::session_guard::Route;
use crate::validation::{LoginForm, RegistrationForm};

pub const SIGNING_IN: &str = "Signing you in...";
pub const CREATING_ACCOUNT: &str = "Creating your account...";

const LOGIN_REJECTED: &str = "Invalid email or password. Please try again.";
const LOGIN_UNREACHABLE: &str = "Login failed. Please check your connection and try again.";
const REGISTRATION_FAILED: &str = "Registration failed. Please try again.";
const REGISTRATION_UNREACHABLE: &str =
    "Registration failed. Please check your connection and try again.";
const LOGOUT_FAILED: &str = "Logout failed. Please try again.";

/// Where to go once an action finished, and after what delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub route: Route,
    pub after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub message: Option<StatusMessage>,
    pub redirect: Option<Redirect>,
}

impl AuthOutcome {
    fn error(text: impl Into<String>) -> Self {
        Self {
            message: Some(StatusMessage::error(text)),
            redirect: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.redirect.is_some()
    }
}

fn is_network(err: &Error) -> bool {
    matches!(err, Error::Http(_) | Error::Auth(AuthError::NetworkError(_)))
}

pub struct AuthFlow {
    gateway: Arc<dyn Gateway>,
}

impl AuthFlow {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn login(&self, form: &LoginForm) -> AuthOutcome {
        if let Err(e) = form.validate() {
            return AuthOutcome::error(e.to_string());
        }

        match self.gateway.sign_in(&form.email, &form.password).await {
            Ok(session) => {
                info!(user_id = %session.user.id, "login succeeded");
                AuthOutcome {
                    message: Some(StatusMessage::success("Login successful! Redirecting...")),
                    redirect: Some(Redirect {
                        route: Route::Home,
                        after: Duration::from_millis(1000),
                    }),
                }
            }
            Err(e) if is_network(&e) => {
                error!("login error: {}", e);
                AuthOutcome::error(LOGIN_UNREACHABLE)
            }
            Err(e) => {
                warn!("login rejected: {}", e);
                AuthOutcome::error(LOGIN_REJECTED)
            }
        }
    }

    pub async fn register(&self, form: &RegistrationForm) -> AuthOutcome {
        if let Err(e) = form.validate() {
            return AuthOutcome::error(e.to_string());
        }

        let result = self
            .gateway
            .sign_up(&form.email, &form.password, &form.first_name, &form.last_name)
            .await;
        match result {
            Ok(user) => {
                info!(user_id = %user.id, "registration succeeded");
                AuthOutcome {
                    message: Some(StatusMessage::success(
                        "Registration successful! Redirecting to login...",
                    )),
                    redirect: Some(Redirect {
                        route: Route::Login,
                        after: Duration::from_millis(1500),
                    }),
                }
            }
            Err(e) if is_network(&e) => {
                error!("registration error: {}", e);
                AuthOutcome::error(REGISTRATION_UNREACHABLE)
            }
            Err(Error::Auth(e)) => {
                warn!("registration rejected: {}", e);
                let text = e.user_message();
                if text.trim().is_empty() {
                    AuthOutcome::error(REGISTRATION_FAILED)
                } else {
                    AuthOutcome::error(text)
                }
            }
            Err(e) => {
                error!("registration error: {}", e);
                AuthOutcome::error(REGISTRATION_FAILED)
            }
        }
    }

    pub async fn logout(&self) -> AuthOutcome {
        match self.gateway.sign_out().await {
            Ok(()) => AuthOutcome {
                message: None,
                redirect: Some(Redirect {
                    route: Route::Login,
                    after: Duration::ZERO,
                }),
            },
            Err(e) => {
                error!("logout failed: {}", e);
                AuthOutcome::error(LOGOUT_FAILED)
            }
        }
    }

    /// "Stay signed in" on the logout page: back home if the session is live.
    pub async fn stay_signed_in(&self) -> Option<Redirect> {
        match self.gateway.get_session().await {
            Ok(Some(_)) => Some(Redirect {
                route: Route::Home,
                after: Duration::ZERO,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::messages::StatusKind;

    fn flow() -> (Arc<InMemoryGateway>, AuthFlow) {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.add_account("ana@clinic.org", "Passw0rd", "Ana", "Lopez");
        (gateway.clone(), AuthFlow::new(gateway))
    }

    fn text(outcome: &AuthOutcome) -> &str {
        outcome.message.as_ref().map(|m| m.text.as_str()).unwrap_or("")
    }

    #[tokio::test]
    async fn login_checks_fields_before_calling_backend() {
        let (_, flow) = flow();
        let outcome = flow.login(&LoginForm::new("", "")).await;
        assert_eq!(text(&outcome), "Please fill in all fields");
        let outcome = flow.login(&LoginForm::new("ana", "Passw0rd")).await;
        assert_eq!(text(&outcome), "Please enter a valid email address");
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn login_with_bad_password() {
        let (_, flow) = flow();
        let outcome = flow.login(&LoginForm::new("ana@clinic.org", "Wrong123")).await;
        assert_eq!(text(&outcome), LOGIN_REJECTED);
        assert_eq!(outcome.message.unwrap().kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn login_then_logout() {
        let (gateway, flow) = flow();
        let outcome = flow.login(&LoginForm::new("ana@clinic.org", "Passw0rd")).await;
        assert_eq!(text(&outcome), "Login successful! Redirecting...");
        assert_eq!(outcome.redirect.unwrap().route, Route::Home);
        assert_eq!(flow.stay_signed_in().await.map(|r| r.route), Some(Route::Home));

        let outcome = flow.logout().await;
        assert_eq!(outcome.redirect.unwrap().route, Route::Login);
        assert!(gateway.get_session().await.unwrap().is_none());
        assert_eq!(flow.stay_signed_in().await, None);
    }

    #[tokio::test]
    async fn register_reports_backend_message() {
        let (_, flow) = flow();
        let form = RegistrationForm {
            email: "ana@clinic.org".into(),
            password: "Passw0rd".into(),
            confirm_password: "Passw0rd".into(),
            first_name: "Ana".into(),
            last_name: "Lopez".into(),
        };
        let outcome = flow.register(&form).await;
        assert_eq!(text(&outcome), "User already registered");

        let form = RegistrationForm {
            email: "new@clinic.org".into(),
            ..form
        };
        let outcome = flow.register(&form).await;
        assert_eq!(text(&outcome), "Registration successful! Redirecting to login...");
        assert_eq!(outcome.redirect.unwrap().route, Route::Login);
    }

    #[tokio::test]
    async fn register_rejects_mismatch() {
        let (_, flow) = flow();
        let form = RegistrationForm {
            email: "new@clinic.org".into(),
            password: "Passw0rd".into(),
            confirm_password: "Passw0rd1".into(),
            first_name: "Ana".into(),
            last_name: "Lopez".into(),
        };
        assert_eq!(text(&flow.register(&form).await), "Passwords do not match");
    }
}
