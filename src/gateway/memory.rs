use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use clinic_booking_auth::{AuthError, Session, User};

use super::{profile_of, Gateway};
use crate::error::{Error, Result};
use crate::models::{
    append_entry, remove_entry, remove_entry_at, AppointmentEntry, AppointmentRecord, Doctor,
};

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    records: Vec<AppointmentRecord>,
    doctors: Vec<Doctor>,
    next_record_id: u64,
    writes: usize,
    unavailable: bool,
}

/// A gateway that keeps everything in process.
///
/// Reads take a snapshot, wait for the configured latency, then commit only
/// if the record version is unchanged, so it reports conflicts the same way
/// the hosted backend does. Visibility follows the row-level security rules:
/// a user only sees their own record.
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(self, doctors: Vec<Doctor>) -> Self {
        self.lock().doctors = doctors;
        self
    }

    /// Delay applied between reading and committing a write.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.lock().unavailable {
            return Err(Error::general("backend unavailable"));
        }
        Ok(())
    }

    /// Creates an account directly, bypassing validation.
    pub fn add_account(&self, email: &str, password: &str, first_name: &str, last_name: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            phone: None,
            app_metadata: json!({}),
            user_metadata: json!({
                "first_name": first_name,
                "last_name": last_name,
                "email": email,
            }),
            created_at: Some(Utc::now().to_rfc3339()),
            updated_at: None,
        };
        self.lock().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Makes every following call fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Every stored record, regardless of owner.
    pub fn records(&self) -> Vec<AppointmentRecord> {
        self.lock().records.clone()
    }

    /// Stores a record as-is, e.g. one holding legacy entries.
    pub fn insert_record(&self, record: AppointmentRecord) {
        self.lock().records.push(record);
    }

    /// Bumps a record's version, as a write from another session would.
    pub fn touch_record(&self, record_id: &str) {
        if let Some(record) = self.lock().records.iter_mut().find(|r| r.id == record_id) {
            record.version += 1;
        }
    }

    /// Number of committed appointment writes.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn current_user(&self) -> Result<User> {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(Error::NotAuthenticated)
    }

    fn snapshot(&self, user: &User, record_id: &str) -> Result<AppointmentRecord> {
        self.lock()
            .records
            .iter()
            .find(|r| r.id == record_id && r.user_id == user.id)
            .cloned()
            .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))
    }

    async fn write_entries<F>(&self, read: AppointmentRecord, edit: F) -> Result<AppointmentRecord>
    where
        F: FnOnce(&mut Vec<AppointmentEntry>) -> Result<()> + Send,
    {
        let mut entries = read.appointments;
        edit(&mut entries)?;
        self.wait().await;

        let mut state = self.lock();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == read.id && r.version == read.version)
            .ok_or(Error::Conflict)?;
        record.appointments = entries;
        record.version += 1;
        let updated = record.clone();
        state.writes += 1;
        Ok(updated)
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.check_available()?;
        let mut state = self.lock();
        let user = match state.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => {
                return Err(AuthError::ApiError(
                    r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#
                        .to_string(),
                )
                .into())
            }
        };

        if !state.records.iter().any(|r| r.user_id == user.id) {
            state.next_record_id += 1;
            let (first_name, last_name, email) = profile_of(&user);
            let record = AppointmentRecord {
                id: state.next_record_id.to_string(),
                user_id: user.id.clone(),
                first_name,
                last_name,
                email,
                appointments: Vec::new(),
                version: 0,
                created_at: Some(Utc::now().to_rfc3339()),
            };
            debug!(record_id = %record.id, "appointment record created");
            state.records.push(record);
        }

        let session = Session {
            access_token: format!("memory-{}", Uuid::new_v4()),
            refresh_token: format!("memory-{}", Uuid::new_v4()),
            expires_in: 3600,
            expires_at: Some(Utc::now().timestamp() + 3600),
            token_type: "bearer".to_string(),
            user,
        };
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User> {
        self.check_available()?;
        if self.lock().accounts.contains_key(email) {
            return Err(AuthError::ApiError(
                r#"{"code":422,"msg":"User already registered"}"#.to_string(),
            )
            .into());
        }
        Ok(self.add_account(email, password, first_name, last_name))
    }

    async fn sign_out(&self) -> Result<()> {
        self.check_available()?;
        self.lock().session = None;
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>> {
        self.check_available()?;
        Ok(self.lock().session.clone().filter(|s| !s.is_expired()))
    }

    async fn get_current_user(&self) -> Result<User> {
        self.check_available()?;
        self.current_user()
    }

    async fn read_appointments(&self) -> Result<Vec<AppointmentRecord>> {
        self.check_available()?;
        let user_id = match self.lock().session.as_ref() {
            Some(session) => session.user.id.clone(),
            None => return Ok(Vec::new()),
        };
        let mut records: Vec<_> = self
            .lock()
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn add_appointment(&self, entry: AppointmentEntry) -> Result<AppointmentRecord> {
        self.check_available()?;
        let user = self.current_user()?;
        let existing = self
            .lock()
            .records
            .iter()
            .find(|r| r.user_id == user.id)
            .cloned();

        match existing {
            Some(record) => {
                self.write_entries(record, |entries| {
                    append_entry(entries, entry);
                    Ok(())
                })
                .await
            }
            None => {
                let mut state = self.lock();
                state.next_record_id += 1;
                let (first_name, last_name, email) = profile_of(&user);
                let record = AppointmentRecord {
                    id: state.next_record_id.to_string(),
                    user_id: user.id.clone(),
                    first_name,
                    last_name,
                    email,
                    appointments: vec![entry],
                    version: 0,
                    created_at: Some(Utc::now().to_rfc3339()),
                };
                state.records.push(record.clone());
                state.writes += 1;
                Ok(record)
            }
        }
    }

    async fn remove_appointment(
        &self,
        record_id: &str,
        entry_id: Uuid,
    ) -> Result<AppointmentRecord> {
        self.check_available()?;
        let user = self.current_user()?;
        let record = self.snapshot(&user, record_id)?;
        self.write_entries(record, |entries| remove_entry(entries, entry_id).map(|_| ()))
            .await
    }

    async fn remove_appointment_at(
        &self,
        record_id: &str,
        index: usize,
    ) -> Result<AppointmentRecord> {
        self.check_available()?;
        let user = self.current_user()?;
        let record = self.snapshot(&user, record_id)?;
        self.write_entries(record, |entries| remove_entry_at(entries, index).map(|_| ()))
            .await
    }

    async fn get_all_doctors(&self) -> Result<Vec<Doctor>> {
        self.check_available()?;
        let mut doctors = self.lock().doctors.clone();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(doctor: &str) -> AppointmentEntry {
        AppointmentEntry {
            id: Uuid::new_v4(),
            doctor_name: doctor.to_string(),
            doctor_expertise: "GP".to_string(),
            month: "May".to_string(),
            year: Some(2026),
            week: 1,
            date: "Mon".to_string(),
            time: "10:00".to_string(),
            reason: String::new(),
        }
    }

    async fn signed_in() -> InMemoryGateway {
        let gw = InMemoryGateway::new();
        gw.add_account("ana@clinic.org", "Passw0rd", "Ana", "Lopez");
        gw.sign_in("ana@clinic.org", "Passw0rd").await.unwrap();
        gw
    }

    #[tokio::test]
    async fn sign_in_twice_keeps_one_record() {
        let gw = signed_in().await;
        gw.sign_in("ana@clinic.org", "Passw0rd").await.unwrap();
        let records = gw.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first_name.as_deref(), Some("Ana"));
        assert_eq!(records[0].email.as_deref(), Some("ana@clinic.org"));
    }

    #[tokio::test]
    async fn wrong_password_is_an_auth_error() {
        let gw = signed_in().await;
        let err = gw.sign_in("ana@clinic.org", "nope").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn records_of_other_users_are_hidden() {
        let gw = signed_in().await;
        gw.add_account("bo@clinic.org", "Passw0rd", "Bo", "Kim");
        gw.sign_in("bo@clinic.org", "Passw0rd").await.unwrap();

        let visible = gw.read_appointments().await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].first_name.as_deref(), Some("Bo"));

        let ana_record = gw
            .records()
            .into_iter()
            .find(|r| r.first_name.as_deref() == Some("Ana"))
            .unwrap();
        assert!(matches!(
            gw.remove_appointment_at(&ana_record.id, 0).await,
            Err(Error::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn add_then_remove_bumps_version() {
        let gw = signed_in().await;
        let first = entry("X");
        let record = gw.add_appointment(first.clone()).await.unwrap();
        assert_eq!(record.version, 1);

        let record = gw.remove_appointment(&record.id, first.id).await.unwrap();
        assert!(record.appointments.is_empty());
        assert_eq!(record.version, 2);
        assert_eq!(gw.write_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_backend_fails_calls() {
        let gw = signed_in().await;
        gw.set_unavailable(true);
        assert!(gw.read_appointments().await.is_err());
        gw.set_unavailable(false);
        assert!(gw.read_appointments().await.is_ok());
    }
}
