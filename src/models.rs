//! Rows of the `doctors` and `appointments` tables

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::calendar::{ordinal, YearMonth};
use crate::error::{Error, Result};

/// A doctor as listed by the clinic. Read-only for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub doctor_expertise: String,
    #[serde(default)]
    pub doctor_info: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "availability")]
    pub available_days: Vec<String>,
    #[serde(default, deserialize_with = "availability")]
    pub available_times: Vec<String>,
}

impl Doctor {
    /// "first - last" of the time slots, or an empty string when there are none.
    pub fn time_range(&self) -> String {
        match (self.available_times.first(), self.available_times.last()) {
            (Some(first), Some(last)) => format!("{} - {}", first, last),
            _ => String::new(),
        }
    }
}

// Availability is stored either as a JSON array or as one comma-separated string.
fn availability<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    let items = match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::List(items)) => items,
        Some(Raw::Text(text)) => text.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// One booked appointment inside a user's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentEntry {
    /// Nil until a legacy entry is given its derived id by [`AppointmentRecord`].
    #[serde(default = "Uuid::nil")]
    pub id: Uuid,
    pub doctor_name: String,
    pub doctor_expertise: String,
    pub month: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// 1 to 4, or [`UNKNOWN_WEEK`] for older rows saved without a week.
    #[serde(default, deserialize_with = "week_number")]
    pub week: u8,
    /// Day name, e.g. "Mon"
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub reason: String,
}

impl AppointmentEntry {
    pub fn new(
        doctor: &Doctor,
        month: YearMonth,
        week: u8,
        day: &str,
        time: &str,
        reason: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_name: doctor.name.clone(),
            doctor_expertise: doctor.doctor_expertise.clone(),
            month: month.name().to_string(),
            year: Some(month.year),
            week,
            date: day.to_string(),
            time: time.to_string(),
            reason: reason.to_string(),
        }
    }

    /// "Mon, 2nd week of March", with the year appended when known.
    pub fn date_line(&self) -> String {
        let mut line = if self.week == UNKNOWN_WEEK {
            format!("{}, {}", self.date, self.month)
        } else {
            format!(
                "{}, {} week of {}",
                self.date,
                ordinal(self.week as u32),
                self.month
            )
        };
        if let Some(year) = self.year {
            line.push_str(&format!(" {}", year));
        }
        line
    }
}

/// Week of an entry whose row never recorded one.
pub const UNKNOWN_WEEK: u8 = 0;

// Older rows store the week as the string value of the form field, which
// was left blank when nothing was picked. Anything unreadable maps to
// UNKNOWN_WEEK so the rest of the record still loads.
fn week_number<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u8),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().parse().unwrap_or(UNKNOWN_WEEK),
        Raw::Other(_) => UNKNOWN_WEEK,
    })
}

/// The single appointments row a user owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    #[serde(deserialize_with = "record_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "entries")]
    pub appointments: Vec<AppointmentEntry>,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AppointmentRecord {
    pub fn entry(&self, entry_id: Uuid) -> Option<&AppointmentEntry> {
        self.appointments.iter().find(|e| e.id == entry_id)
    }
}

// Identity columns arrive as numbers, uuid keys as strings.
fn record_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid record id: {}",
            other
        ))),
    }
}

// A null or missing list reads as empty. Entries written before ids existed
// get one derived from their position and content, so the same snapshot
// always yields the same ids.
fn entries<'de, D>(deserializer: D) -> std::result::Result<Vec<AppointmentEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut entries = Option::<Vec<AppointmentEntry>>::deserialize(deserializer)?.unwrap_or_default();
    for (index, entry) in entries.iter_mut().enumerate() {
        if entry.id.is_nil() {
            entry.id = legacy_entry_id(index, entry);
        }
    }
    Ok(entries)
}

fn legacy_entry_id(index: usize, entry: &AppointmentEntry) -> Uuid {
    let name = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        index,
        entry.doctor_name,
        entry.doctor_expertise,
        entry.month,
        entry.week,
        entry.date,
        entry.time,
        entry.reason
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Appends `entry` as the last element.
pub fn append_entry(entries: &mut Vec<AppointmentEntry>, entry: AppointmentEntry) {
    entries.push(entry);
}

/// Removes the entry with `entry_id`, keeping the order of the others.
pub fn remove_entry(entries: &mut Vec<AppointmentEntry>, entry_id: Uuid) -> Result<AppointmentEntry> {
    let index = entries
        .iter()
        .position(|e| e.id == entry_id)
        .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;
    Ok(entries.remove(index))
}

/// Removes the entry at `index`, keeping the order of the others.
pub fn remove_entry_at(entries: &mut Vec<AppointmentEntry>, index: usize) -> Result<AppointmentEntry> {
    if index >= entries.len() {
        return Err(Error::EntryNotFound(format!("index {}", index)));
    }
    Ok(entries.remove(index))
}
