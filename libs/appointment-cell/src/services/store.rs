// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header::{HeaderMap, HeaderValue}, Method};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus};

/// Durable appointment records. Soft-deleted rows are invisible to every read.
///
/// The overlap query and the subsequent write are separate calls, so an
/// implementation that must hold up under concurrent bookings has to enforce
/// buffered disjointness itself (an exclusion constraint or a serializable
/// transaction).
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>>;

    async fn update(&self, appointment: &Appointment) -> Result<Appointment>;

    /// Matching appointments ordered by start time, newest first, one page.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>>;

    /// Total number of matches, ignoring pagination.
    async fn count(&self, filter: &AppointmentFilter) -> Result<u64>;

    /// Appointments of `provider_id` whose window intersects `[start, end)`,
    /// oldest first, cancelled ones included.
    async fn list_by_date_range(
        &self,
        provider_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>>;

    /// True if a non-cancelled appointment of `provider_id`, other than
    /// `exclude_id`, satisfies `start < buffered_end AND end > buffered_start`.
    async fn has_overlap(
        &self,
        provider_id: &str,
        buffered_start: DateTime<Utc>,
        buffered_end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool>;

    /// Marks the appointment deleted. Returns false if it was not found.
    async fn soft_delete(&self, id: Uuid, deleted_at: DateTime<Utc>) -> Result<bool>;
}

// ==============================================================================
// POSTGREST IMPLEMENTATION
// ==============================================================================

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";

/// Appointment store backed by the Supabase REST API, acting with the
/// service-role key.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    access_token: String,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(
            Arc::new(SupabaseClient::new(config)),
            config.supabase_service_role_key.clone(),
        )
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, access_token: String) -> Self {
        Self { supabase, access_token }
    }

    fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(&self.access_token),
            None,
        ).await?;

        parse_rows(rows)
    }

    async fn write(&self, method: Method, path: &str, body: Value) -> Result<Vec<Appointment>> {
        let rows: Vec<Value> = self.supabase.request_with_headers(
            method,
            path,
            Some(&self.access_token),
            Some(body),
            Some(Self::return_representation()),
        ).await?;

        parse_rows(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment> {
        debug!("Inserting appointment {}", appointment.id);

        self.write(Method::POST, APPOINTMENTS_PATH, json!(appointment))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Insert of appointment {} returned no row", appointment.id))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>> {
        let path = format!("{}?id=eq.{}&deleted_at=is.null&limit=1", APPOINTMENTS_PATH, id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment> {
        debug!("Updating appointment {}", appointment.id);

        let body = json!({
            "provider_id": appointment.provider_id,
            "title": appointment.title,
            "description": appointment.description,
            "notes": appointment.notes,
            "cancellation_reason": appointment.cancellation_reason,
            "external_calendar_ref": appointment.external_calendar_ref,
            "start_time": appointment.start_time,
            "end_time": appointment.end_time,
            "duration_minutes": appointment.duration_minutes,
            "status": appointment.status,
            "updated_at": appointment.updated_at,
        });

        let path = format!("{}?id=eq.{}&deleted_at=is.null", APPOINTMENTS_PATH, appointment.id);
        self.write(Method::PATCH, &path, body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Appointment {} disappeared during update", appointment.id))
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        let mut query_parts = filter_query(filter);
        query_parts.push("order=start_time.desc".to_string());
        query_parts.push(format!("limit={}", filter.limit()));
        query_parts.push(format!("offset={}", filter.offset()));

        self.fetch(&format!("{}?{}", APPOINTMENTS_PATH, query_parts.join("&"))).await
    }

    async fn count(&self, filter: &AppointmentFilter) -> Result<u64> {
        let mut query_parts = vec!["select=id".to_string()];
        query_parts.extend(filter_query(filter));

        self.supabase
            .count(&format!("{}?{}", APPOINTMENTS_PATH, query_parts.join("&")), Some(&self.access_token))
            .await
    }

    async fn list_by_date_range(
        &self,
        provider_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>> {
        let query_parts = [
            format!("provider_id=eq.{}", urlencoding::encode(provider_id)),
            "deleted_at=is.null".to_string(),
            format!("start_time=lt.{}", encode_time(end)),
            format!("end_time=gt.{}", encode_time(start)),
            "order=start_time.asc".to_string(),
        ];

        self.fetch(&format!("{}?{}", APPOINTMENTS_PATH, query_parts.join("&"))).await
    }

    async fn has_overlap(
        &self,
        provider_id: &str,
        buffered_start: DateTime<Utc>,
        buffered_end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool> {
        let mut query_parts = vec![
            "select=id".to_string(),
            format!("provider_id=eq.{}", urlencoding::encode(provider_id)),
            format!("status=neq.{}", AppointmentStatus::Cancelled),
            "deleted_at=is.null".to_string(),
            format!("start_time=lt.{}", encode_time(buffered_end)),
            format!("end_time=gt.{}", encode_time(buffered_start)),
        ];
        if let Some(exclude_id) = exclude_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }
        query_parts.push("limit=1".to_string());

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &format!("{}?{}", APPOINTMENTS_PATH, query_parts.join("&")),
            Some(&self.access_token),
            None,
        ).await?;

        Ok(!rows.is_empty())
    }

    async fn soft_delete(&self, id: Uuid, deleted_at: DateTime<Utc>) -> Result<bool> {
        let path = format!("{}?id=eq.{}&deleted_at=is.null", APPOINTMENTS_PATH, id);
        let body = json!({ "deleted_at": deleted_at, "updated_at": deleted_at });

        Ok(!self.write(Method::PATCH, &path, body).await?.is_empty())
    }
}

fn filter_query(filter: &AppointmentFilter) -> Vec<String> {
    let mut query_parts = vec!["deleted_at=is.null".to_string()];

    if let Some(client_id) = filter.client_id {
        query_parts.push(format!("client_id=eq.{}", client_id));
    }
    if let Some(provider_id) = &filter.provider_id {
        query_parts.push(format!("provider_id=eq.{}", urlencoding::encode(provider_id)));
    }
    if let Some(status) = filter.status {
        query_parts.push(format!("status=eq.{}", status));
    }
    if let Some(from) = filter.from {
        query_parts.push(format!("start_time=gte.{}", encode_time(from)));
    }
    if let Some(to) = filter.to {
        query_parts.push(format!("start_time=lte.{}", encode_time(to)));
    }

    query_parts
}

fn encode_time(time: DateTime<Utc>) -> String {
    urlencoding::encode(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true)).into_owned()
}

fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| anyhow!("Failed to parse appointment: {}", e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn encoded_bounds_keep_sub_second_precision() {
        let whole = Utc.with_ymd_and_hms(2026, 10, 20, 9, 45, 0).unwrap();

        assert_eq!(encode_time(whole), "2026-10-20T09%3A45%3A00Z");
        assert_eq!(
            encode_time(whole + Duration::milliseconds(250)),
            "2026-10-20T09%3A45%3A00.250Z"
        );
    }
}
