// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::fmt;

use shared_config::ProviderConfig;

// ==============================================================================
// CORE APPOINTMENT MODEL
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub provider_id: String,
    pub title: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub external_calendar_ref: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Client-side edits are only possible before the appointment starts and
    /// while it is still Pending or Confirmed.
    pub fn is_editable(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
            && now < self.start_time
    }

    pub fn can_be_cancelled_by_client(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed | AppointmentStatus::Rescheduled
        ) && now < self.start_time
    }

    /// Only cancelled appointments release their provider's time.
    pub fn blocks_provider_time(&self) -> bool {
        self.status != AppointmentStatus::Cancelled && self.deleted_at.is_none()
    }

    /// Moves the appointment, keeping `end_time == start_time + duration`.
    pub fn reschedule(&mut self, start_time: DateTime<Utc>, duration_minutes: i32) {
        self.start_time = start_time;
        self.duration_minutes = duration_minutes;
        self.end_time = start_time + Duration::minutes(duration_minutes as i64);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Rescheduled,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

// ==============================================================================
// DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub display_name: String,
    pub title: Option<String>,
}

impl From<ProviderConfig> for ProviderProfile {
    fn from(config: ProviderConfig) -> Self {
        Self {
            id: config.id,
            display_name: config.display_name,
            title: config.title,
        }
    }
}

/// A client as the client directory knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

impl ClientRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: Uuid,
    pub display_name: String,
}

impl From<&ClientRecord> for ClientSummary {
    fn from(client: &ClientRecord) -> Self {
        Self {
            id: client.id,
            display_name: client.full_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub client: Option<ClientSummary>,
    pub provider: Option<ProviderProfile>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_TEXT_LENGTH: usize = 2000;
pub const MAX_REASON_LENGTH: usize = 500;
pub const MAX_EXTERNAL_REF_LENGTH: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub client_id: Uuid,
    pub provider_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub external_calendar_ref: Option<String>,
}

impl CreateAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if self.title.trim().is_empty() {
            return Err(AppointmentError::ValidationError("title is required".to_string()));
        }
        check_length("title", Some(&self.title), MAX_TITLE_LENGTH)?;
        check_length("description", self.description.as_deref(), MAX_TEXT_LENGTH)?;
        check_length("notes", self.notes.as_deref(), MAX_TEXT_LENGTH)?;
        check_length("external_calendar_ref", self.external_calendar_ref.as_deref(), MAX_EXTERNAL_REF_LENGTH)
    }
}

/// Partial update. Absent fields are left untouched; for the nullable text
/// fields an explicit `null` clears the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub external_calendar_ref: Option<Option<String>>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
}

impl UpdateAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(AppointmentError::ValidationError("title cannot be blank".to_string()));
            }
        }
        check_length("title", self.title.as_deref(), MAX_TITLE_LENGTH)?;
        check_length("description", self.description.clone().flatten().as_deref(), MAX_TEXT_LENGTH)?;
        check_length("notes", self.notes.clone().flatten().as_deref(), MAX_TEXT_LENGTH)?;
        check_length(
            "external_calendar_ref",
            self.external_calendar_ref.clone().flatten().as_deref(),
            MAX_EXTERNAL_REF_LENGTH,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

impl CancelAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        check_length("reason", Some(&self.reason), MAX_REASON_LENGTH)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmAppointmentRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

impl ConfirmAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        check_length("notes", self.notes.as_deref(), MAX_TEXT_LENGTH)
    }
}

/// Listing filters as they arrive on the query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentListQuery {
    pub client_id: Option<Uuid>,
    pub provider_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized store filter. `from`/`to` bound the start time, inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentFilter {
    pub client_id: Option<Uuid>,
    pub provider_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: u32,
    pub page_size: u32,
}

impl AppointmentFilter {
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }

    pub fn limit(&self) -> u64 {
        self.page_size as u64
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.client_id.map_or(true, |id| appointment.client_id == id)
            && self.provider_id.as_ref().map_or(true, |id| &appointment.provider_id == id)
            && self.status.map_or(true, |status| appointment.status == status)
            && self.from.map_or(true, |from| appointment.start_time >= from)
            && self.to.map_or(true, |to| appointment.start_time <= to)
    }
}

impl From<AppointmentListQuery> for AppointmentFilter {
    fn from(query: AppointmentListQuery) -> Self {
        Self {
            client_id: query.client_id,
            provider_id: query.provider_id,
            status: query.status,
            from: query.from_date,
            to: query.to_date,
            page: query.page.unwrap_or(1).max(1),
            page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentPage {
    pub items: Vec<Appointment>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsQuery {
    pub provider_id: String,
    pub date: NaiveDate,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub provider_id: String,
    pub date: NaiveDate,
    pub duration_minutes: i32,
    pub slots: Vec<DateTime<Utc>>,
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub allowed_durations: Vec<i32>,
    pub buffer_minutes: i64,
    pub slot_step_minutes: i64,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            allowed_durations: vec![45, 60],
            buffer_minutes: 15,
            slot_step_minutes: 15,
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl SchedulingRules {
    pub fn buffer(&self) -> Duration {
        Duration::minutes(self.buffer_minutes)
    }

    pub fn slot_step(&self) -> Duration {
        Duration::minutes(self.slot_step_minutes)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Unknown provider: {0}")]
    InvalidProvider(String),

    #[error("Client not found")]
    ClientNotFound,

    #[error("Client account is inactive")]
    ClientInactive,

    #[error("Invalid duration of {0} minutes; appointments last 45 or 60 minutes")]
    InvalidDuration(i32),

    #[error("Outside business hours: {0}")]
    OutOfBusinessHours(String),

    #[error("Appointments must be scheduled in the future")]
    PastSchedulingError,

    #[error("The provider already has an appointment within 15 minutes of this time")]
    SchedulingConflict,

    #[error("Appointment cannot be edited: {0}")]
    NotEditable(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Appointment cannot be cancelled: {0}")]
    NotCancellable(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AppointmentError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppointmentError::NotFound => "not_found",
            AppointmentError::InvalidProvider(_) => "invalid_provider",
            AppointmentError::ClientNotFound => "client_not_found",
            AppointmentError::ClientInactive => "client_inactive",
            AppointmentError::InvalidDuration(_) => "invalid_duration",
            AppointmentError::OutOfBusinessHours(_) => "out_of_business_hours",
            AppointmentError::PastSchedulingError => "past_scheduling",
            AppointmentError::SchedulingConflict => "scheduling_conflict",
            AppointmentError::NotEditable(_) => "not_editable",
            AppointmentError::Forbidden(_) => "forbidden",
            AppointmentError::NotCancellable(_) => "not_cancellable",
            AppointmentError::InvalidTransition { .. } => "invalid_transition",
            AppointmentError::ValidationError(_) => "validation_error",
            AppointmentError::DatabaseError(_) => "database_error",
        }
    }

    /// Wraps a collaborator failure with what was being attempted.
    pub fn database(context: &str, err: anyhow::Error) -> Self {
        AppointmentError::DatabaseError(format!("{}: {:#}", context, err))
    }
}

fn check_length(field: &str, value: Option<&str>, max: usize) -> Result<(), AppointmentError> {
    match value {
        Some(text) if text.chars().count() > max => Err(AppointmentError::ValidationError(
            format!("{} must be at most {} characters", field, max),
        )),
        _ => Ok(()),
    }
}

/// Maps a present field (including an explicit `null`) to `Some`.
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
