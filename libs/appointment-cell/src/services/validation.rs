// libs/appointment-cell/src/services/validation.rs
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc, Weekday};
use tracing::debug;

use crate::models::{AppointmentError, SchedulingRules};

/// Business-time placement checks. Timestamps are stored in UTC and judged in
/// the practice's local time, given as a fixed UTC offset.
#[derive(Debug, Clone)]
pub struct TimeWindowValidator {
    offset: FixedOffset,
    rules: SchedulingRules,
}

impl TimeWindowValidator {
    pub fn new(utc_offset_minutes: i32, rules: SchedulingRules) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| {
            tracing::warn!("UTC offset of {} minutes is out of range, using UTC", utc_offset_minutes);
            Utc.fix()
        });
        Self { offset, rules }
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    pub fn validate_business_hours(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        let local_start = start.with_timezone(&self.offset);
        let local_end = end.with_timezone(&self.offset);

        if !is_business_day(local_start.date_naive()) {
            return Err(AppointmentError::OutOfBusinessHours(
                "appointments can only be booked Monday to Friday".to_string(),
            ));
        }

        // End may touch closing time exactly; a window running past midnight
        // would otherwise look like an early-morning end.
        if local_start.time() < self.rules.day_start
            || local_end.date_naive() != local_start.date_naive()
            || local_end.time() > self.rules.day_end
        {
            debug!("Rejected window {} - {} outside business hours", local_start, local_end);
            return Err(AppointmentError::OutOfBusinessHours(format!(
                "appointments must fall between {} and {}",
                self.rules.day_start.format("%H:%M"),
                self.rules.day_end.format("%H:%M"),
            )));
        }

        Ok(())
    }

    pub fn validate_duration(&self, minutes: i32) -> Result<(), AppointmentError> {
        if self.rules.allowed_durations.contains(&minutes) {
            Ok(())
        } else {
            Err(AppointmentError::InvalidDuration(minutes))
        }
    }

    pub fn validate_future(
        &self,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if start > now {
            Ok(())
        } else {
            Err(AppointmentError::PastSchedulingError)
        }
    }

    /// Opening and closing instants of `date` in business time.
    pub fn business_day_bounds(&self, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), AppointmentError> {
        let to_utc = |time: NaiveTime| {
            self.offset
                .from_local_datetime(&date.and_time(time))
                .single()
                .map(|local| local.with_timezone(&Utc))
                .ok_or_else(|| AppointmentError::ValidationError(format!("{} has no unambiguous local time", date)))
        };

        Ok((to_utc(self.rules.day_start)?, to_utc(self.rules.day_end)?))
    }
}

impl Default for TimeWindowValidator {
    fn default() -> Self {
        Self::new(0, SchedulingRules::default())
    }
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        // October 2026: the 19th is a Monday, the 24th a Saturday.
        Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn accepts_window_inside_business_hours() {
        let validator = TimeWindowValidator::default();
        assert!(validator.validate_business_hours(at(20, 9, 0), at(20, 10, 0)).is_ok());
        assert!(validator.validate_business_hours(at(23, 17, 0), at(23, 18, 0)).is_ok());
    }

    #[test]
    fn rejects_weekend_and_out_of_hours() {
        let validator = TimeWindowValidator::default();

        let saturday = validator.validate_business_hours(at(24, 10, 0), at(24, 11, 0));
        assert!(matches!(saturday, Err(AppointmentError::OutOfBusinessHours(_))));

        let early = validator.validate_business_hours(at(20, 8, 45), at(20, 9, 45));
        assert!(matches!(early, Err(AppointmentError::OutOfBusinessHours(_))));

        let late = validator.validate_business_hours(at(20, 17, 15), at(20, 18, 15));
        assert!(matches!(late, Err(AppointmentError::OutOfBusinessHours(_))));

        let seconds_past_close = at(20, 18, 0) + Duration::seconds(30);
        let late_by_seconds = validator.validate_business_hours(at(20, 17, 0), seconds_past_close);
        assert!(matches!(late_by_seconds, Err(AppointmentError::OutOfBusinessHours(_))));
    }

    #[test]
    fn rejects_window_crossing_midnight() {
        let validator = TimeWindowValidator::default();
        let result = validator.validate_business_hours(at(20, 23, 30), at(21, 0, 30));
        assert!(matches!(result, Err(AppointmentError::OutOfBusinessHours(_))));
    }

    #[test]
    fn business_hours_follow_local_offset() {
        // UTC+2: 08:00Z is 10:00 local.
        let validator = TimeWindowValidator::new(120, SchedulingRules::default());
        assert!(validator.validate_business_hours(at(20, 8, 0), at(20, 9, 0)).is_ok());
        assert!(validator.validate_business_hours(at(20, 16, 0), at(20, 17, 0)).is_err());

        let (open, close) = validator
            .business_day_bounds(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap())
            .unwrap();
        assert_eq!(open, at(20, 7, 0));
        assert_eq!(close, at(20, 16, 0));
    }

    #[test]
    fn only_45_and_60_minutes_are_allowed() {
        let validator = TimeWindowValidator::default();
        assert!(validator.validate_duration(45).is_ok());
        assert!(validator.validate_duration(60).is_ok());
        assert_eq!(validator.validate_duration(30), Err(AppointmentError::InvalidDuration(30)));
        assert_eq!(validator.validate_duration(90), Err(AppointmentError::InvalidDuration(90)));
    }

    #[test]
    fn start_must_be_strictly_in_the_future() {
        let validator = TimeWindowValidator::default();
        let now = at(20, 10, 0);

        assert!(validator.validate_future(now + Duration::minutes(1), now).is_ok());
        assert_eq!(validator.validate_future(now, now), Err(AppointmentError::PastSchedulingError));
        assert_eq!(
            validator.validate_future(now - Duration::hours(1), now),
            Err(AppointmentError::PastSchedulingError)
        );
    }

    #[test]
    fn weekends_are_not_business_days() {
        assert!(is_business_day(NaiveDate::from_ymd_opt(2026, 10, 23).unwrap()));
        assert!(!is_business_day(NaiveDate::from_ymd_opt(2026, 10, 24).unwrap()));
        assert!(!is_business_day(NaiveDate::from_ymd_opt(2026, 10, 25).unwrap()));
    }
}
