// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::services::store::AppointmentStore;

/// Two windows conflict when they come closer than `buffer` to each other.
/// Touching at exactly `buffer` apart is allowed.
pub fn buffered_overlap(
    candidate_start: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    existing_start: DateTime<Utc>,
    existing_end: DateTime<Utc>,
    buffer: Duration,
) -> bool {
    existing_start < candidate_end + buffer && existing_end > candidate_start - buffer
}

/// Whether `existing` stands in the way of a candidate window.
pub fn conflicts_with(
    existing: &Appointment,
    candidate_start: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    buffer: Duration,
) -> bool {
    existing.blocks_provider_time()
        && buffered_overlap(candidate_start, candidate_end, existing.start_time, existing.end_time, buffer)
}

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
    buffer: Duration,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>, buffer: Duration) -> Self {
        Self { store, buffer }
    }

    /// True if the provider already has a non-cancelled appointment within the
    /// buffer of `[start_time, end_time)`.
    pub async fn check_conflicts(
        &self,
        provider_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        debug!("Checking conflicts for provider {} from {} to {}", provider_id, start_time, end_time);

        let has_conflict = self.store
            .has_overlap(
                provider_id,
                start_time - self.buffer,
                end_time + self.buffer,
                exclude_appointment_id,
            )
            .await
            .map_err(|e| AppointmentError::database("overlap check failed", e))?;

        if has_conflict {
            warn!("Conflict detected for provider {} at {}", provider_id, start_time);
        }

        Ok(has_conflict)
    }

    /// Same as `check_conflicts`, but reports a conflict as an error.
    pub async fn ensure_available(
        &self,
        provider_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        if self.check_conflicts(provider_id, start_time, end_time, exclude_appointment_id).await? {
            return Err(AppointmentError::SchedulingConflict);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, hour, minute, 0).unwrap()
    }

    #[test]
    fn windows_inside_buffer_conflict() {
        let buffer = Duration::minutes(15);
        // Existing 10:00-11:00.
        assert!(buffered_overlap(at(10, 50), at(11, 50), at(10, 0), at(11, 0), buffer));
        assert!(buffered_overlap(at(9, 0), at(9, 50), at(10, 0), at(11, 0), buffer));
        assert!(buffered_overlap(at(10, 15), at(10, 45), at(10, 0), at(11, 0), buffer));
    }

    #[test]
    fn windows_exactly_one_buffer_apart_do_not_conflict() {
        let buffer = Duration::minutes(15);
        assert!(!buffered_overlap(at(11, 15), at(12, 15), at(10, 0), at(11, 0), buffer));
        assert!(!buffered_overlap(at(8, 45), at(9, 45), at(10, 0), at(11, 0), buffer));
        assert!(!buffered_overlap(at(11, 20), at(12, 20), at(10, 0), at(11, 0), buffer));
    }
}
