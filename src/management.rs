//! "My appointments" page: list the caller's bookings and cancel them

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::inflight::InFlightSet;
use crate::models::AppointmentRecord;

pub const LOAD_FAILED: &str = "Could not load appointments. Please try again later.";
pub const CANCEL_FAILED: &str = "Failed to cancel appointment. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentCard {
    pub record_id: String,
    pub entry_id: Uuid,
    pub index: usize,
    pub doctor_name: String,
    pub specialty: String,
    pub reason: String,
    /// e.g. "Mon, 2nd week of March 2026"
    pub when: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentsView {
    Empty,
    List(Vec<AppointmentCard>),
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The entry is gone; load the list again.
    Reload,
    Failed(String),
}

fn cards(record: &AppointmentRecord) -> Vec<AppointmentCard> {
    record
        .appointments
        .iter()
        .enumerate()
        .map(|(index, entry)| AppointmentCard {
            record_id: record.id.clone(),
            entry_id: entry.id,
            index,
            doctor_name: entry.doctor_name.clone(),
            specialty: entry.doctor_expertise.clone(),
            reason: entry.reason.clone(),
            when: entry.date_line(),
            time: entry.time.clone(),
        })
        .collect()
}

pub struct AppointmentManager {
    gateway: Arc<dyn Gateway>,
    cancelling: InFlightSet<Uuid>,
}

impl AppointmentManager {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            cancelling: InFlightSet::default(),
        }
    }

    /// Reads the caller's record and lays out one card per appointment.
    pub async fn load(&self) -> AppointmentsView {
        let records = match self.gateway.read_appointments().await {
            Ok(records) => records,
            Err(e) => {
                error!("failed to load appointments: {}", e);
                return AppointmentsView::Unavailable(LOAD_FAILED.to_string());
            }
        };

        match records.first().map(cards) {
            Some(cards) if !cards.is_empty() => AppointmentsView::List(cards),
            _ => AppointmentsView::Empty,
        }
    }

    /// True while a cancel for this entry is waiting on the backend.
    pub fn is_cancelling(&self, entry_id: Uuid) -> bool {
        self.cancelling.contains(&entry_id)
    }

    /// Cancels one appointment. A second cancel of the same entry while the
    /// first is pending fails with [`Error::Busy`].
    pub async fn cancel(&self, record_id: &str, entry_id: Uuid) -> Result<CancelOutcome> {
        let _guard = self.cancelling.try_begin(entry_id).ok_or(Error::Busy)?;

        match self.gateway.remove_appointment(record_id, entry_id).await {
            Ok(_) => {
                info!(record_id, entry_id = %entry_id, "appointment cancelled");
                Ok(CancelOutcome::Reload)
            }
            Err(e) => {
                error!(record_id, entry_id = %entry_id, "cancellation failed: {}", e);
                Ok(CancelOutcome::Failed(CANCEL_FAILED.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::models::AppointmentEntry;

    fn entry(doctor: &str, week: u8) -> AppointmentEntry {
        AppointmentEntry {
            id: Uuid::new_v4(),
            doctor_name: doctor.to_string(),
            doctor_expertise: "GP".to_string(),
            month: "March".to_string(),
            year: None,
            week,
            date: "Mon".to_string(),
            time: "10:00".to_string(),
            reason: "Checkup".to_string(),
        }
    }

    async fn signed_in() -> Arc<InMemoryGateway> {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.add_account("ana@clinic.org", "Passw0rd", "Ana", "Lopez");
        gateway.sign_in("ana@clinic.org", "Passw0rd").await.unwrap();
        gateway
    }

    #[tokio::test]
    async fn new_user_sees_empty_state() {
        let gateway = signed_in().await;
        let manager = AppointmentManager::new(gateway);
        assert_eq!(manager.load().await, AppointmentsView::Empty);
    }

    #[tokio::test]
    async fn cards_carry_ids_and_date_line() {
        let gateway = signed_in().await;
        gateway.add_appointment(entry("Dr. A", 2)).await.unwrap();
        let manager = AppointmentManager::new(gateway.clone());

        let AppointmentsView::List(cards) = manager.load().await else {
            panic!("expected a list");
        };
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].when, "Mon, 2nd week of March");
        assert_eq!(cards[0].record_id, gateway.records()[0].id);
        assert_eq!(cards[0].index, 0);
    }

    #[tokio::test]
    async fn load_failure_shows_message() {
        let gateway = signed_in().await;
        gateway.set_unavailable(true);
        let manager = AppointmentManager::new(gateway);
        assert_eq!(
            manager.load().await,
            AppointmentsView::Unavailable(LOAD_FAILED.to_string())
        );
    }

    #[tokio::test]
    async fn failed_cancel_can_be_retried() {
        let gateway = signed_in().await;
        let booked = entry("Dr. A", 1);
        let record = gateway.add_appointment(booked.clone()).await.unwrap();
        let manager = AppointmentManager::new(gateway.clone());

        gateway.set_unavailable(true);
        let outcome = manager.cancel(&record.id, booked.id).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Failed(CANCEL_FAILED.to_string()));
        assert!(!manager.is_cancelling(booked.id));

        gateway.set_unavailable(false);
        let outcome = manager.cancel(&record.id, booked.id).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Reload);
        assert_eq!(manager.load().await, AppointmentsView::Empty);
    }
}
