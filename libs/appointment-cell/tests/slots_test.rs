mod common;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, TimeZone, Utc};

use appointment_cell::models::{AppointmentError, CancelAppointmentRequest};
use appointment_cell::services::conflict::ConflictDetectionService;

use common::*;

fn tuesday_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
}

#[tokio::test]
async fn saturday_has_no_slots() {
    let h = harness().await;

    let response = h.service
        .get_available_slots(PROVIDER, NaiveDate::from_ymd_opt(2026, 10, 24).unwrap(), 60)
        .await
        .unwrap();

    assert!(response.slots.is_empty());
}

#[tokio::test]
async fn slots_skip_the_buffered_window_of_a_booking() {
    let h = harness().await;
    h.service
        .create_appointment(create_request(h.client.id, tuesday(10, 0), 60), client_actor())
        .await
        .unwrap();

    let response = h.service.get_available_slots(PROVIDER, tuesday_date(), 60).await.unwrap();
    let slots = response.slots;

    assert!(!slots.contains(&tuesday(9, 0)));
    assert!(!slots.contains(&tuesday(10, 45)));
    assert!(!slots.contains(&tuesday(11, 0)));
    assert!(slots.contains(&tuesday(11, 15)));
    assert!(slots.contains(&tuesday(17, 0)));
    assert!(!slots.contains(&tuesday(17, 15)));
    assert!(slots.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn forty_five_minute_slots_fit_before_a_booking() {
    let h = harness().await;
    h.service
        .create_appointment(create_request(h.client.id, tuesday(10, 0), 60), client_actor())
        .await
        .unwrap();

    let slots = h.service.get_available_slots(PROVIDER, tuesday_date(), 45).await.unwrap().slots;

    // 09:00-09:45 leaves exactly the 15-minute gap.
    assert_eq!(slots.first(), Some(&tuesday(9, 0)));
    assert!(!slots.contains(&tuesday(9, 15)));
    assert!(slots.contains(&tuesday(17, 15)));
}

#[tokio::test]
async fn every_returned_slot_is_bookable() {
    let h = harness().await;
    for (hour, minute, duration) in [(9, 30, 45), (12, 0, 60), (15, 20, 60)] {
        h.service
            .create_appointment(create_request(h.client.id, tuesday(hour, minute), duration), client_actor())
            .await
            .unwrap();
    }

    let conflicts = ConflictDetectionService::new(h.store.clone(), Duration::minutes(15));

    for duration in [45, 60] {
        let slots = h.service.get_available_slots(PROVIDER, tuesday_date(), duration).await.unwrap().slots;
        assert!(!slots.is_empty());

        // Slots and the overlap detector agree on every grid point.
        let mut candidate = tuesday(9, 0);
        while candidate + Duration::minutes(duration as i64) <= tuesday(18, 0) {
            let end = candidate + Duration::minutes(duration as i64);
            let blocked = conflicts.check_conflicts(PROVIDER, candidate, end, None).await.unwrap();
            assert_eq!(slots.contains(&candidate), !blocked, "grid point {}", candidate);
            candidate += Duration::minutes(15);
        }
    }

    let slots = h.service.get_available_slots(PROVIDER, tuesday_date(), 60).await.unwrap().slots;
    let booked = h.service
        .create_appointment(create_request(h.other_client.id, slots[0], 60), other_client_actor())
        .await;
    assert!(booked.is_ok());
}

#[tokio::test]
async fn same_day_slots_start_after_the_current_time() {
    let noon = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

    let h = harness_at(noon).await;
    let slots = h.service.get_available_slots(PROVIDER, monday, 60).await.unwrap().slots;

    assert_eq!(slots.first(), Some(&Utc.with_ymd_and_hms(2026, 10, 19, 12, 15, 0).unwrap()));
    assert!(slots.iter().all(|slot| *slot > noon));

    for slot in slots {
        let fresh = harness_at(noon).await;
        let booked = fresh.service
            .create_appointment(create_request(fresh.client.id, slot, 60), client_actor())
            .await;
        assert!(booked.is_ok(), "slot {} was not bookable: {:?}", slot, booked.err());
    }
}

#[tokio::test]
async fn bookings_just_outside_the_day_still_block_edge_slots() {
    let h = harness().await;
    let created = h.service
        .create_appointment(create_request(h.client.id, tuesday(12, 0), 45), client_actor())
        .await
        .unwrap();

    // Seeded directly, business rules would refuse an 08:00 start.
    let mut early = created.appointment;
    early.id = uuid::Uuid::new_v4();
    early.reschedule(tuesday(8, 0), 50);
    h.store.seed(early).await;

    let slots = h.service.get_available_slots(PROVIDER, tuesday_date(), 60).await.unwrap().slots;
    assert!(!slots.contains(&tuesday(9, 0)));
    assert!(slots.contains(&tuesday(9, 15)));

    let conflicts = ConflictDetectionService::new(h.store.clone(), Duration::minutes(15));
    assert!(conflicts.check_conflicts(PROVIDER, tuesday(9, 0), tuesday(10, 0), None).await.unwrap());
    assert!(!conflicts.check_conflicts(PROVIDER, tuesday(9, 15), tuesday(10, 15), None).await.unwrap());
}

#[tokio::test]
async fn cancelled_bookings_free_their_slots() {
    let h = harness().await;
    let created = h.service
        .create_appointment(create_request(h.client.id, tuesday(10, 0), 60), client_actor())
        .await
        .unwrap();
    h.service
        .cancel_appointment(
            created.appointment.id,
            CancelAppointmentRequest { reason: "feeling better".to_string() },
            client_actor(),
        )
        .await
        .unwrap();

    let slots = h.service.get_available_slots(PROVIDER, tuesday_date(), 60).await.unwrap().slots;
    assert_eq!(slots.len(), 33);
    assert!(slots.contains(&tuesday(10, 0)));
}

#[tokio::test]
async fn other_providers_have_their_own_calendar() {
    let h = harness().await;
    h.service
        .create_appointment(create_request(h.client.id, tuesday(10, 0), 60), client_actor())
        .await
        .unwrap();

    let slots = h.service.get_available_slots(OTHER_PROVIDER, tuesday_date(), 60).await.unwrap().slots;
    assert_eq!(slots.len(), 33);
}

#[tokio::test]
async fn unknown_provider_and_duration_are_rejected() {
    let h = harness().await;

    assert_matches!(
        h.service.get_available_slots("therapist-404", tuesday_date(), 60).await,
        Err(AppointmentError::InvalidProvider(_))
    );
    assert_matches!(
        h.service.get_available_slots(PROVIDER, tuesday_date(), 30).await,
        Err(AppointmentError::InvalidDuration(30))
    );
}

#[tokio::test]
async fn slot_generation_is_recomputed_per_call() {
    let h = harness().await;
    let before = h.service.get_available_slots(PROVIDER, tuesday_date(), 60).await.unwrap().slots;

    h.service
        .create_appointment(create_request(h.client.id, tuesday(14, 0), 60), client_actor())
        .await
        .unwrap();

    let after = h.service.get_available_slots(PROVIDER, tuesday_date(), 60).await.unwrap().slots;
    assert!(after.len() < before.len());
    assert!(!after.contains(&tuesday(14, 0)));
}
