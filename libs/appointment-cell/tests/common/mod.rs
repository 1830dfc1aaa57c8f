#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{ClientRecord, CreateAppointmentRequest, SchedulingRules};
use appointment_cell::services::booking::{Actor, AppointmentBookingService};
use appointment_cell::services::clock::FixedClock;
use appointment_cell::services::directory::ConfiguredProviderDirectory;
use appointment_cell::services::memory::{InMemoryAppointmentStore, InMemoryClientDirectory};
use appointment_cell::services::validation::TimeWindowValidator;
use shared_utils::test_utils::TestConfig;

pub const CLIENT_USER: &str = "client-user-1";
pub const OTHER_CLIENT_USER: &str = "client-user-2";
pub const STAFF_USER: &str = "staff-user-1";
pub const PROVIDER: &str = "therapist-1";
pub const OTHER_PROVIDER: &str = "therapist-2";

/// Monday 2026-10-19 08:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
}

/// A time on Tuesday 2026-10-20, UTC.
pub fn tuesday(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 20, hour, minute, 0).unwrap()
}

pub fn client_actor() -> Actor<'static> {
    Actor::new(CLIENT_USER, false)
}

pub fn other_client_actor() -> Actor<'static> {
    Actor::new(OTHER_CLIENT_USER, false)
}

pub fn staff_actor() -> Actor<'static> {
    Actor::new(STAFF_USER, true)
}

pub struct Harness {
    pub service: Arc<AppointmentBookingService>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub client: ClientRecord,
    pub other_client: ClientRecord,
    pub inactive_client: ClientRecord,
}

fn client(user_id: Option<&str>, first_name: &str, is_active: bool) -> ClientRecord {
    ClientRecord {
        id: Uuid::new_v4(),
        user_id: user_id.map(str::to_string),
        first_name: first_name.to_string(),
        last_name: "Client".to_string(),
        is_active,
    }
}

pub async fn harness() -> Harness {
    harness_at(now()).await
}

pub async fn harness_at(current_time: DateTime<Utc>) -> Harness {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let clients = Arc::new(InMemoryClientDirectory::new());

    let primary = client(Some(CLIENT_USER), "Mara", true);
    let other = client(Some(OTHER_CLIENT_USER), "Lukas", true);
    let inactive = client(None, "Ines", false);
    for record in [&primary, &other, &inactive] {
        clients.add(record.clone()).await;
    }

    let service = AppointmentBookingService::with_collaborators(
        store.clone(),
        clients,
        Arc::new(ConfiguredProviderDirectory::new(TestConfig::default().providers)),
        Arc::new(FixedClock(current_time)),
        TimeWindowValidator::new(0, SchedulingRules::default()),
    );

    Harness {
        service: Arc::new(service),
        store,
        client: primary,
        other_client: other,
        inactive_client: inactive,
    }
}

pub fn create_request(client_id: Uuid, start_time: DateTime<Utc>, duration_minutes: i32) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        client_id,
        provider_id: PROVIDER.to_string(),
        title: "Back pain assessment".to_string(),
        description: Some("Lower back, two weeks".to_string()),
        start_time,
        duration_minutes,
        notes: None,
        external_calendar_ref: None,
    }
}
