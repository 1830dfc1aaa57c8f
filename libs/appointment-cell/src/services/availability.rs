// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::models::AppointmentError;
use crate::services::clock::Clock;
use crate::services::conflict::conflicts_with;
use crate::services::store::AppointmentStore;
use crate::services::validation::{is_business_day, TimeWindowValidator};

pub struct AvailabilityService {
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
    validator: TimeWindowValidator,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
        validator: TimeWindowValidator,
    ) -> Self {
        Self { store, clock, validator }
    }

    /// Free start times for `provider_id` on `date`, in chronological order.
    /// Any returned start lies in the future and can be booked for
    /// `duration_minutes`, as long as nothing else is booked in between.
    pub async fn generate_slots(
        &self,
        provider_id: &str,
        date: NaiveDate,
        duration_minutes: i32,
    ) -> Result<Vec<DateTime<Utc>>, AppointmentError> {
        if !is_business_day(date) {
            debug!("{} is not a business day, no slots", date);
            return Ok(Vec::new());
        }

        self.validator.validate_duration(duration_minutes)?;

        let rules = self.validator.rules();
        let (day_start, day_end) = self.validator.business_day_bounds(date)?;
        let buffer = rules.buffer();
        let duration = Duration::minutes(duration_minutes as i64);

        let existing = self.store
            .list_by_date_range(provider_id, day_start - buffer, day_end + buffer)
            .await
            .map_err(|e| AppointmentError::database("failed to load provider schedule", e))?;

        let now = self.clock.now();
        let mut slots = Vec::new();
        let mut candidate = day_start;
        while candidate + duration <= day_end {
            let candidate_end = candidate + duration;
            let free = !existing.iter().any(|a| conflicts_with(a, candidate, candidate_end, buffer));
            if candidate > now && free {
                slots.push(candidate);
            }
            candidate += rules.slot_step();
        }

        debug!(
            "Provider {} has {} free {}-minute slots on {}",
            provider_id, slots.len(), duration_minutes, date
        );

        Ok(slots)
    }
}
