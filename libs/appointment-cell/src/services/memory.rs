// libs/appointment-cell/src/services/memory.rs
//! Process-local collaborators for tests and for running without Supabase.
//!
//! `InMemoryAppointmentStore` does not make the overlap check and the write
//! atomic: two concurrent bookings for one provider can both pass the check.
use std::collections::HashMap;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_config::ClientSeedConfig;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, ClientRecord};
use crate::services::directory::ClientDirectory;
use crate::services::store::AppointmentStore;

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record as-is, bypassing every scheduling rule.
    pub async fn seed(&self, appointment: Appointment) {
        self.appointments.write().await.insert(appointment.id, appointment);
    }

    fn matching(appointments: &HashMap<Uuid, Appointment>, filter: &AppointmentFilter) -> Vec<Appointment> {
        let mut matches: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.deleted_at.is_none() && filter.matches(a))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        matches
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.id) {
            return Err(anyhow!("Duplicate appointment id {}", appointment.id));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>> {
        let appointments = self.appointments.read().await;
        Ok(appointments.get(&id).filter(|a| a.deleted_at.is_none()).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(stored) if stored.deleted_at.is_none() => {
                *stored = appointment.clone();
                Ok(appointment.clone())
            }
            _ => Err(anyhow!("Appointment {} disappeared during update", appointment.id)),
        }
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        Ok(Self::matching(&appointments, filter)
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }

    async fn count(&self, filter: &AppointmentFilter) -> Result<u64> {
        let appointments = self.appointments.read().await;
        Ok(Self::matching(&appointments, filter).len() as u64)
    }

    async fn list_by_date_range(
        &self,
        provider_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut matches: Vec<Appointment> = appointments
            .values()
            .filter(|a| {
                a.deleted_at.is_none()
                    && a.provider_id == provider_id
                    && a.start_time < end
                    && a.end_time > start
            })
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.start_time);
        Ok(matches)
    }

    async fn has_overlap(
        &self,
        provider_id: &str,
        buffered_start: DateTime<Utc>,
        buffered_end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool> {
        let appointments = self.appointments.read().await;
        Ok(appointments.values().any(|a| {
            a.deleted_at.is_none()
                && a.provider_id == provider_id
                && a.status != AppointmentStatus::Cancelled
                && Some(a.id) != exclude_id
                && a.start_time < buffered_end
                && a.end_time > buffered_start
        }))
    }

    async fn soft_delete(&self, id: Uuid, deleted_at: DateTime<Utc>) -> Result<bool> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(stored) if stored.deleted_at.is_none() => {
                stored.deleted_at = Some(deleted_at);
                stored.updated_at = deleted_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryClientDirectory {
    clients: RwLock<HashMap<Uuid, ClientRecord>>,
}

impl InMemoryClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from configured seeds. Seeds with a malformed id are skipped.
    pub fn from_seeds(seeds: &[ClientSeedConfig]) -> Self {
        let mut clients = HashMap::new();
        for seed in seeds {
            match Uuid::parse_str(&seed.id) {
                Ok(id) => {
                    clients.insert(id, ClientRecord {
                        id,
                        user_id: seed.user_id.clone(),
                        first_name: seed.first_name.clone(),
                        last_name: seed.last_name.clone(),
                        is_active: seed.is_active,
                    });
                }
                Err(e) => warn!("Skipping seed client with invalid id {:?}: {}", seed.id, e),
            }
        }

        Self { clients: RwLock::new(clients) }
    }

    pub async fn add(&self, client: ClientRecord) {
        self.clients.write().await.insert(client.id, client);
    }
}

#[async_trait]
impl ClientDirectory for InMemoryClientDirectory {
    async fn get_by_id(&self, client_id: Uuid) -> Result<Option<ClientRecord>> {
        Ok(self.clients.read().await.get(&client_id).cloned())
    }

    async fn get_by_acting_user(&self, user_id: &str) -> Result<Option<ClientRecord>> {
        Ok(self.clients
            .read()
            .await
            .values()
            .find(|c| c.user_id.as_deref() == Some(user_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn appointment(provider_id: &str, hour: u32, status: AppointmentStatus) -> Appointment {
        let start = Utc.with_ymd_and_hms(2026, 10, 20, hour, 0, 0).unwrap();
        Appointment {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            provider_id: provider_id.to_string(),
            title: "Session".to_string(),
            description: None,
            notes: None,
            cancellation_reason: None,
            external_calendar_ref: None,
            start_time: start,
            end_time: start + Duration::minutes(60),
            duration_minutes: 60,
            status,
            created_by: "user-1".to_string(),
            created_at: start - Duration::days(1),
            updated_at: start - Duration::days(1),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn overlap_ignores_cancelled_excluded_and_other_providers() {
        let store = InMemoryAppointmentStore::new();
        let booked = appointment("therapist-1", 10, AppointmentStatus::Pending);
        store.seed(booked.clone()).await;
        store.seed(appointment("therapist-1", 14, AppointmentStatus::Cancelled)).await;
        store.seed(appointment("therapist-2", 12, AppointmentStatus::Confirmed)).await;

        let day = |h, m| Utc.with_ymd_and_hms(2026, 10, 20, h, m, 0).unwrap();

        assert!(store.has_overlap("therapist-1", day(10, 35), day(11, 50), None).await.unwrap());
        assert!(!store.has_overlap("therapist-1", day(10, 35), day(11, 50), Some(booked.id)).await.unwrap());
        assert!(!store.has_overlap("therapist-1", day(13, 45), day(15, 15), None).await.unwrap());
        assert!(!store.has_overlap("therapist-1", day(11, 45), day(12, 45), None).await.unwrap());
    }

    #[tokio::test]
    async fn soft_deleted_records_vanish_from_reads() {
        let store = InMemoryAppointmentStore::new();
        let booked = appointment("therapist-1", 10, AppointmentStatus::Pending);
        store.seed(booked.clone()).await;

        assert!(store.soft_delete(booked.id, Utc::now()).await.unwrap());
        assert!(store.get(booked.id).await.unwrap().is_none());
        assert!(!store.soft_delete(booked.id, Utc::now()).await.unwrap());

        let filter = AppointmentFilter::from(crate::models::AppointmentListQuery::default());
        assert_eq!(store.count(&filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn seeded_directory_resolves_configured_clients() {
        let id = Uuid::new_v4();
        let directory = InMemoryClientDirectory::from_seeds(&[
            ClientSeedConfig {
                id: id.to_string(),
                user_id: Some("user-1".to_string()),
                first_name: "Mara".to_string(),
                last_name: "Client".to_string(),
                is_active: true,
            },
            ClientSeedConfig {
                id: "not-a-uuid".to_string(),
                user_id: Some("user-2".to_string()),
                first_name: "Lukas".to_string(),
                last_name: "Client".to_string(),
                is_active: true,
            },
        ]);

        let client = directory.get_by_acting_user("user-1").await.unwrap().unwrap();
        assert_eq!(client.id, id);
        assert!(directory.get_by_id(id).await.unwrap().is_some());
        assert!(directory.get_by_acting_user("user-2").await.unwrap().is_none());
    }
}
