//! Clinic appointment booking client
//!
//! A client for a clinic booking service hosted on Supabase: sign up and sign
//! in, browse doctors, book appointments and cancel them. All durable state
//! lives in the backend; this crate holds the page workflows and talks to the
//! backend through a [`gateway::Gateway`].

pub mod auth_flow;
pub mod booking;
pub mod calendar;
pub mod config;
pub mod error;
pub mod gateway;
pub mod home;
pub mod inflight;
pub mod management;
pub mod messages;
pub mod models;
pub mod session_guard;
pub mod session_store;
pub mod validation;

use std::sync::Arc;

use crate::auth_flow::AuthFlow;
use crate::booking::BookingWorkflow;
use crate::config::ClinicConfig;
use crate::gateway::{Gateway, SupabaseGateway};
use crate::home::DoctorProfile;
use crate::management::AppointmentManager;
use crate::session_guard::SessionGuard;

pub use clinic_booking_auth::{Session, User};
pub use error::{Error, Result};

/// The main entry point: hands out page workflows sharing one gateway.
#[derive(Clone)]
pub struct Clinic {
    gateway: Arc<dyn Gateway>,
    lookahead_months: u32,
}

impl Clinic {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            lookahead_months: 3,
        }
    }

    /// Connects to the Supabase project described by `config`.
    ///
    /// # Example
    ///
    /// ```
    /// use clinic_booking::{config::ClinicConfig, Clinic};
    ///
    /// let config = ClinicConfig::new("https://your-project.supabase.co", "your-anon-key").unwrap();
    /// let clinic = Clinic::from_config(config).unwrap();
    /// ```
    pub fn from_config(config: ClinicConfig) -> Result<Self> {
        let lookahead_months = config.options.lookahead_months;
        let gateway = SupabaseGateway::new(config)?;
        Ok(Self {
            gateway: Arc::new(gateway),
            lookahead_months,
        })
    }

    pub fn gateway(&self) -> Arc<dyn Gateway> {
        self.gateway.clone()
    }

    pub fn guard(&self) -> SessionGuard {
        SessionGuard::new(self.gateway())
    }

    pub fn auth(&self) -> AuthFlow {
        AuthFlow::new(self.gateway())
    }

    pub fn booking(&self) -> BookingWorkflow {
        BookingWorkflow::new(self.gateway()).with_lookahead(self.lookahead_months)
    }

    pub fn appointments(&self) -> AppointmentManager {
        AppointmentManager::new(self.gateway())
    }

    pub async fn doctor_directory(&self) -> Result<Vec<DoctorProfile>> {
        home::doctor_directory(self.gateway.as_ref()).await
    }
}

pub mod prelude {
    pub use crate::auth_flow::{AuthFlow, AuthOutcome};
    pub use crate::booking::{BookingRejection, BookingState, BookingWorkflow, DoctorCard};
    pub use crate::config::{ClientOptions, ClinicConfig};
    pub use crate::error::{Error, Result};
    pub use crate::gateway::{Gateway, InMemoryGateway, SupabaseGateway};
    pub use crate::management::{AppointmentManager, AppointmentsView, CancelOutcome};
    pub use crate::models::{AppointmentEntry, AppointmentRecord, Doctor};
    pub use crate::session_guard::{GuardOutcome, Route, SessionGuard};
    pub use crate::validation::{LoginForm, RegistrationForm};
    pub use crate::Clinic;
}
