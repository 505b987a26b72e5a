use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clinic_booking_auth::{Auth, AuthOptions, Session, User};
use clinic_booking_postgrest::{DuplicateResolution, PostgrestClient, SortOrder};

use super::{profile_of, Gateway};
use crate::config::ClinicConfig;
use crate::error::{Error, Result};
use crate::models::{
    append_entry, remove_entry, remove_entry_at, AppointmentEntry, AppointmentRecord, Doctor,
};

/// Gateway backed by a Supabase project.
pub struct SupabaseGateway {
    config: ClinicConfig,
    http_client: Client,
    auth: Auth,
}

impl SupabaseGateway {
    pub fn new(config: ClinicConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let auth = Auth::new(
            config.base_url(),
            &config.anon_key,
            http_client.clone(),
            AuthOptions {
                auto_refresh_token: config.options.auto_refresh_token,
                persist_session: config.options.persist_session,
            },
        );

        Ok(Self {
            config,
            http_client,
            auth,
        })
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Reinstalls a session saved by an earlier run.
    pub fn restore_session(&self, session: Session) {
        self.auth.set_session(session);
    }

    /// The stored session, expired or not.
    pub fn current_session(&self) -> Option<Session> {
        self.auth.get_session()
    }

    fn table(&self, name: &str, token: &str) -> Result<PostgrestClient> {
        let client = PostgrestClient::new(
            self.config.base_url(),
            &self.config.anon_key,
            name,
            self.http_client.clone(),
        )?
        .with_auth(token)?;
        Ok(client)
    }

    fn appointments(&self, token: &str) -> Result<PostgrestClient> {
        self.table(&self.config.options.appointments_table, token)
    }

    async fn require_session(&self) -> Result<Session> {
        self.auth
            .get_session_or_refresh()
            .await?
            .ok_or(Error::NotAuthenticated)
    }

    // Signed-in requests carry the user's token; anonymous ones the anon key.
    async fn bearer(&self) -> Result<String> {
        Ok(match self.auth.get_session_or_refresh().await? {
            Some(session) => session.access_token,
            None => self.config.anon_key.clone(),
        })
    }

    /// Inserts the user's record unless one already exists. Returns the new
    /// record, or `None` when the unique `user_id` made it a no-op.
    async fn provision_record(
        &self,
        session: &Session,
        entries: Vec<AppointmentEntry>,
    ) -> Result<Option<AppointmentRecord>> {
        let (first_name, last_name, email) = profile_of(&session.user);
        let row = json!({
            "user_id": session.user.id,
            "first_name": first_name,
            "last_name": last_name,
            "email": email,
            "appointments": entries,
            "version": 0,
        });

        let value = self
            .appointments(&session.access_token)?
            .on_conflict("user_id")
            .upsert(row, DuplicateResolution::Ignore)
            .await?;
        let created = first_row(value)?;
        match &created {
            Some(record) => info!(user_id = %session.user.id, record_id = %record.id, "appointment record created"),
            None => debug!(user_id = %session.user.id, "appointment record already exists"),
        }
        Ok(created)
    }

    async fn own_record(&self, session: &Session) -> Result<Option<AppointmentRecord>> {
        let result = self
            .appointments(&session.access_token)?
            .select("*")
            .eq("user_id", &session.user.id)
            .single::<AppointmentRecord>()
            .await;
        match result {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_no_rows() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_by_id(&self, session: &Session, record_id: &str) -> Result<AppointmentRecord> {
        let result = self
            .appointments(&session.access_token)?
            .select("*")
            .eq("id", record_id)
            .single::<AppointmentRecord>()
            .await;
        match result {
            Ok(record) => Ok(record),
            Err(e) if e.is_no_rows() => Err(Error::RecordNotFound(record_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies `edit` to the record's entries and writes them back, but only
    /// if the row still has the version that was read.
    async fn write_entries<F>(
        &self,
        session: &Session,
        record: AppointmentRecord,
        edit: F,
    ) -> Result<AppointmentRecord>
    where
        F: FnOnce(&mut Vec<AppointmentEntry>) -> Result<()> + Send,
    {
        let mut entries = record.appointments;
        edit(&mut entries)?;

        let body = json!({
            "appointments": entries,
            "version": record.version + 1,
        });
        let value = self
            .appointments(&session.access_token)?
            .eq("id", &record.id)
            .eq("version", &record.version.to_string())
            .update(body)
            .await?;

        first_row(value)?.ok_or_else(|| {
            warn!(record_id = %record.id, version = record.version, "record changed since it was read");
            Error::Conflict
        })
    }
}

fn first_row(value: Value) -> Result<Option<AppointmentRecord>> {
    if value.is_null() {
        return Ok(None);
    }
    let rows: Vec<AppointmentRecord> = serde_json::from_value(value)?;
    Ok(rows.into_iter().next())
}

#[async_trait]
impl Gateway for SupabaseGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .auth
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| {
                warn!("sign in failed: {}", e);
                e
            })?;
        info!(user_id = %session.user.id, "signed in");

        if let Err(e) = self.provision_record(&session, Vec::new()).await {
            error!(user_id = %session.user.id, "could not provision appointment record: {}", e);
            return Err(e);
        }
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User> {
        let metadata = json!({
            "first_name": first_name,
            "last_name": last_name,
            "email": email,
        });
        let user = self
            .auth
            .sign_up(email, password, Some(metadata))
            .await
            .map_err(|e| {
                warn!("sign up failed: {}", e);
                e
            })?;
        info!(user_id = %user.id, "registered");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.auth.get_session().is_none() {
            debug!("sign out without a session");
            return Ok(());
        }
        self.auth.sign_out().await?;
        info!("signed out");
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(self.auth.get_session_or_refresh().await?)
    }

    async fn get_current_user(&self) -> Result<User> {
        self.require_session().await?;
        Ok(self.auth.get_user().await?)
    }

    async fn read_appointments(&self) -> Result<Vec<AppointmentRecord>> {
        let token = self.bearer().await?;
        let records = self
            .appointments(&token)?
            .select("*")
            .order("created_at", SortOrder::Descending)
            .execute::<AppointmentRecord>()
            .await
            .map_err(|e| {
                error!("read appointments failed: {}", e);
                e
            })?;
        Ok(records)
    }

    async fn add_appointment(&self, entry: AppointmentEntry) -> Result<AppointmentRecord> {
        let session = self.require_session().await?;
        let entry_id = entry.id;

        let record = match self.own_record(&session).await? {
            Some(record) => {
                self.write_entries(&session, record, |entries| {
                    append_entry(entries, entry);
                    Ok(())
                })
                .await?
            }
            None => match self.provision_record(&session, vec![entry.clone()]).await? {
                Some(created) => created,
                // Another session created the record in between.
                None => {
                    let record = self
                        .own_record(&session)
                        .await?
                        .ok_or_else(|| Error::RecordNotFound(session.user.id.clone()))?;
                    self.write_entries(&session, record, |entries| {
                        append_entry(entries, entry);
                        Ok(())
                    })
                    .await?
                }
            },
        };

        info!(record_id = %record.id, entry_id = %entry_id, "appointment added");
        Ok(record)
    }

    async fn remove_appointment(
        &self,
        record_id: &str,
        entry_id: Uuid,
    ) -> Result<AppointmentRecord> {
        let session = self.require_session().await?;
        let record = self.record_by_id(&session, record_id).await?;
        let updated = self
            .write_entries(&session, record, |entries| {
                remove_entry(entries, entry_id).map(|_| ())
            })
            .await?;
        info!(record_id, entry_id = %entry_id, "appointment removed");
        Ok(updated)
    }

    async fn remove_appointment_at(
        &self,
        record_id: &str,
        index: usize,
    ) -> Result<AppointmentRecord> {
        let session = self.require_session().await?;
        let record = self.record_by_id(&session, record_id).await?;
        let updated = self
            .write_entries(&session, record, |entries| {
                remove_entry_at(entries, index).map(|_| ())
            })
            .await?;
        info!(record_id, index, "appointment removed");
        Ok(updated)
    }

    async fn get_all_doctors(&self) -> Result<Vec<Doctor>> {
        let token = self.bearer().await?;
        let doctors = self
            .table(&self.config.options.doctors_table, &token)?
            .select("*")
            .order("name", SortOrder::Ascending)
            .execute::<Doctor>()
            .await
            .map_err(|e| {
                error!("get doctors failed: {}", e);
                e
            })?;
        Ok(doctors)
    }
}
