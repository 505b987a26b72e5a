//! Booking page: doctor cards, the booking form and its confirmation

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{error, info};

use crate::calendar::{lookahead_months, YearMonth, WEEKS};
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::inflight::InFlight;
use crate::models::{AppointmentEntry, Doctor};

/// Why a booking form was not submitted. The display text is shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingRejection {
    #[error("Please select a month within the next {} months: {}", .ahead, .allowed.join(", "))]
    MonthOutsideWindow { ahead: u32, allowed: Vec<String> },
    #[error("Please select a valid time from the list.")]
    InvalidTime,
    #[error("Please select a valid day from the list.")]
    InvalidDay,
    #[error("Please select a week from 1 to 4.")]
    InvalidWeek,
    #[error("No doctor named {0}")]
    UnknownDoctor(String),
    #[error("No booking form is open")]
    NoOpenForm,
}

/// What the doctor listing shows for one doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorCard {
    pub name: String,
    pub specialty: String,
    pub image: Option<String>,
    pub days: String,
    pub time_range: String,
}

impl From<&Doctor> for DoctorCard {
    fn from(doctor: &Doctor) -> Self {
        Self {
            name: doctor.name.clone(),
            specialty: doctor.doctor_expertise.clone(),
            image: doctor.image.clone(),
            days: doctor.available_days.join(", "),
            time_range: doctor.time_range(),
        }
    }
}

/// The open booking form: the options offered and what has been picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingForm {
    pub doctor: Doctor,
    pub day_options: Vec<String>,
    pub time_options: Vec<String>,
    pub month_options: Vec<YearMonth>,
    pub week_options: Vec<u8>,
    pub day: Option<String>,
    pub time: Option<String>,
    pub month: Option<String>,
    pub week: Option<u8>,
    pub reason: String,
}

impl BookingForm {
    fn open(doctor: Doctor, months: Vec<YearMonth>) -> Self {
        Self {
            day_options: doctor.available_days.clone(),
            time_options: doctor.available_times.clone(),
            month_options: months,
            week_options: WEEKS.to_vec(),
            doctor,
            day: None,
            time: None,
            month: None,
            week: None,
            reason: String::new(),
        }
    }

    // Checked in the order the page reports problems: month, time, day, week.
    fn validate(&self, window: &[YearMonth], ahead: u32) -> std::result::Result<(YearMonth, u8), BookingRejection> {
        let month = self
            .month
            .as_deref()
            .and_then(|m| YearMonth::parse_name_in(window, m))
            .ok_or_else(|| BookingRejection::MonthOutsideWindow {
                ahead,
                allowed: window.iter().map(|m| m.name().to_string()).collect(),
            })?;

        let offered = |options: &[String], picked: &Option<String>| {
            picked.as_ref().is_some_and(|p| options.contains(p))
        };
        if !offered(&self.time_options, &self.time) {
            return Err(BookingRejection::InvalidTime);
        }
        if !offered(&self.day_options, &self.day) {
            return Err(BookingRejection::InvalidDay);
        }

        let week = self
            .week
            .filter(|w| self.week_options.contains(w))
            .ok_or(BookingRejection::InvalidWeek)?;
        Ok((month, week))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingState {
    Browsing,
    ModalOpen(BookingForm),
    Confirmed(AppointmentEntry),
}

pub struct BookingWorkflow {
    gateway: Arc<dyn Gateway>,
    doctors: Mutex<Vec<Doctor>>,
    state: Mutex<BookingState>,
    submitting: InFlight,
    lookahead: u32,
    today: Option<NaiveDate>,
}

impl BookingWorkflow {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            doctors: Mutex::new(Vec::new()),
            state: Mutex::new(BookingState::Browsing),
            submitting: InFlight::default(),
            lookahead: 3,
            today: None,
        }
    }

    pub fn with_lookahead(mut self, months: u32) -> Self {
        self.lookahead = months;
        self
    }

    /// Fixes the date the month window is computed from.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn state(&self) -> MutexGuard<'_, BookingState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn window(&self) -> Vec<YearMonth> {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        lookahead_months(today, self.lookahead)
    }

    pub fn current(&self) -> BookingState {
        self.state().clone()
    }

    /// Flag a front end can bind its confirm button to.
    pub fn submitting(&self) -> InFlight {
        self.submitting.clone()
    }

    /// Fetches the doctor listing and shows it.
    pub async fn load_doctors(&self) -> Result<Vec<DoctorCard>> {
        let doctors = self.gateway.get_all_doctors().await?;
        let cards = doctors.iter().map(DoctorCard::from).collect();
        *self.doctors.lock().unwrap_or_else(|p| p.into_inner()) = doctors;
        *self.state() = BookingState::Browsing;
        Ok(cards)
    }

    /// Opens the booking form for the named doctor.
    pub fn select_doctor(&self, name: &str) -> Result<BookingForm> {
        let doctor = self
            .doctors
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| BookingRejection::UnknownDoctor(name.to_string()))?;

        let form = BookingForm::open(doctor, self.window());
        *self.state() = BookingState::ModalOpen(form.clone());
        Ok(form)
    }

    fn edit_form(&self, edit: impl FnOnce(&mut BookingForm)) -> Result<()> {
        match &mut *self.state() {
            BookingState::ModalOpen(form) => {
                edit(form);
                Ok(())
            }
            _ => Err(BookingRejection::NoOpenForm.into()),
        }
    }

    pub fn choose_day(&self, day: &str) -> Result<()> {
        self.edit_form(|f| f.day = Some(day.to_string()))
    }

    pub fn choose_time(&self, time: &str) -> Result<()> {
        self.edit_form(|f| f.time = Some(time.to_string()))
    }

    pub fn choose_month(&self, month: &str) -> Result<()> {
        self.edit_form(|f| f.month = Some(month.to_string()))
    }

    pub fn choose_week(&self, week: u8) -> Result<()> {
        self.edit_form(|f| f.week = Some(week))
    }

    pub fn set_reason(&self, reason: &str) -> Result<()> {
        self.edit_form(|f| f.reason = reason.to_string())
    }

    /// Closes the form, discarding anything picked.
    pub fn close(&self) {
        *self.state() = BookingState::Browsing;
    }

    /// Validates the open form and, if it passes, adds the appointment.
    ///
    /// The form stays open on any failure. While one confirmation is waiting
    /// on the backend, further calls fail with [`Error::Busy`].
    pub async fn confirm(&self) -> Result<AppointmentEntry> {
        let form = match &*self.state() {
            BookingState::ModalOpen(form) => form.clone(),
            _ => return Err(BookingRejection::NoOpenForm.into()),
        };

        let (month, week) = form.validate(&self.window(), self.lookahead)?;
        let day = form.day.as_deref().unwrap_or_default();
        let time = form.time.as_deref().unwrap_or_default();
        let entry = AppointmentEntry::new(&form.doctor, month, week, day, time, &form.reason);

        let _guard = self.submitting.try_begin().ok_or(Error::Busy)?;
        match self.gateway.add_appointment(entry.clone()).await {
            Ok(record) => {
                info!(record_id = %record.id, entry_id = %entry.id, "appointment booked");
                let mut state = self.state();
                // The form may have been closed or switched while the write was pending.
                let still_open = matches!(
                    &*state,
                    BookingState::ModalOpen(open) if open.doctor.name == form.doctor.name
                );
                if still_open {
                    *state = BookingState::Confirmed(entry.clone());
                }
                Ok(entry)
            }
            Err(e) => {
                error!("booking failed: {}", e);
                Err(e)
            }
        }
    }
}
