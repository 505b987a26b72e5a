//! Backend operations the pages depend on
//!
//! Everything the workflows need from the backend goes through [`Gateway`],
//! so they can run against the hosted project ([`SupabaseGateway`]) or an
//! in-process stand-in ([`InMemoryGateway`]).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AppointmentEntry, AppointmentRecord, Doctor};
use clinic_booking_auth::{Session, User};

mod memory;
mod supabase;

pub use memory::InMemoryGateway;
pub use supabase::SupabaseGateway;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Signs in and makes sure the user owns an appointment record.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Registers a user with their names stored as profile metadata. No
    /// appointment record is created until the first sign in.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User>;

    async fn sign_out(&self) -> Result<()>;

    /// The current session, if there is one that has not expired.
    async fn get_session(&self) -> Result<Option<Session>>;

    async fn get_current_user(&self) -> Result<User>;

    /// Records visible to the caller, newest first.
    async fn read_appointments(&self) -> Result<Vec<AppointmentRecord>>;

    /// Appends `entry` to the caller's record, creating the record if needed.
    async fn add_appointment(&self, entry: AppointmentEntry) -> Result<AppointmentRecord>;

    async fn remove_appointment(&self, record_id: &str, entry_id: Uuid)
        -> Result<AppointmentRecord>;

    /// Positional removal for callers that only know where the entry sits.
    async fn remove_appointment_at(&self, record_id: &str, index: usize)
        -> Result<AppointmentRecord>;

    /// All doctors ordered by name.
    async fn get_all_doctors(&self) -> Result<Vec<Doctor>>;
}

/// Profile fields copied onto a new appointment record.
pub(crate) fn profile_of(user: &User) -> (Option<String>, Option<String>, Option<String>) {
    let meta = |key: &str| user.metadata_str(key).map(str::to_string);
    (
        meta("first_name"),
        meta("last_name"),
        meta("email").or_else(|| user.email.clone()),
    )
}
