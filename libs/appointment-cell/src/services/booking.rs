// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentDetails, AppointmentError, AppointmentFilter, AppointmentListQuery,
    AppointmentPage, AppointmentStatus, AvailableSlotsResponse, CancelAppointmentRequest,
    ClientRecord, ClientSummary, ConfirmAppointmentRequest, CreateAppointmentRequest,
    ProviderProfile, SchedulingRules, UpdateAppointmentRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::clock::{Clock, SystemClock};
use crate::services::conflict::ConflictDetectionService;
use crate::services::directory::{
    ClientDirectory, ConfiguredProviderDirectory, ProviderDirectory, SupabaseClientDirectory,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};
use crate::services::validation::TimeWindowValidator;

/// Who is acting on an appointment.
#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub user_id: &'a str,
    pub is_privileged: bool,
}

impl<'a> Actor<'a> {
    pub fn new(user_id: &'a str, is_privileged: bool) -> Self {
        Self { user_id, is_privileged }
    }
}

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    clients: Arc<dyn ClientDirectory>,
    providers: Arc<dyn ProviderDirectory>,
    clock: Arc<dyn Clock>,
    validator: TimeWindowValidator,
    conflict_service: ConflictDetectionService,
    availability_service: AvailabilityService,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    /// Wires the Supabase-backed store and client directory.
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let service_key = config.supabase_service_role_key.clone();

        Self::with_collaborators(
            Arc::new(SupabaseAppointmentStore::with_client(Arc::clone(&supabase), service_key.clone())),
            Arc::new(SupabaseClientDirectory::with_client(supabase, service_key)),
            Arc::new(ConfiguredProviderDirectory::new(config.scheduling.providers.clone())),
            Arc::new(SystemClock),
            TimeWindowValidator::new(config.scheduling.business_utc_offset_minutes, SchedulingRules::default()),
        )
    }

    pub fn with_collaborators(
        store: Arc<dyn AppointmentStore>,
        clients: Arc<dyn ClientDirectory>,
        providers: Arc<dyn ProviderDirectory>,
        clock: Arc<dyn Clock>,
        validator: TimeWindowValidator,
    ) -> Self {
        let conflict_service = ConflictDetectionService::new(Arc::clone(&store), validator.rules().buffer());
        let availability_service = AvailabilityService::new(Arc::clone(&store), Arc::clone(&clock), validator.clone());

        Self {
            store,
            clients,
            providers,
            clock,
            validator,
            conflict_service,
            availability_service,
            lifecycle_service: AppointmentLifecycleService::new(),
        }
    }

    // ==============================================================================
    // MUTATIONS
    // ==============================================================================

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        actor: Actor<'_>,
    ) -> Result<AppointmentDetails, AppointmentError> {
        debug!("Creating appointment for client {} with provider {}", request.client_id, request.provider_id);

        request.validate()?;

        if !actor.is_privileged {
            let own_client = self.client_for_user(actor.user_id).await?;
            if own_client.map(|c| c.id) != Some(request.client_id) {
                warn!("User {} tried to book for client {}", actor.user_id, request.client_id);
                return Err(AppointmentError::Forbidden(
                    "clients can only book appointments for themselves".to_string(),
                ));
            }
        }

        let client = self.clients
            .get_by_id(request.client_id)
            .await
            .map_err(|e| self.persistence_failure("client lookup failed", e))?
            .ok_or(AppointmentError::ClientNotFound)?;
        if !client.is_active {
            return Err(AppointmentError::ClientInactive);
        }

        let provider = self.providers
            .get(&request.provider_id)
            .ok_or_else(|| AppointmentError::InvalidProvider(request.provider_id.clone()))?;

        self.validator.validate_duration(request.duration_minutes)?;
        let end_time = request.start_time + Duration::minutes(request.duration_minutes as i64);
        self.validator.validate_business_hours(request.start_time, end_time)?;

        let now = self.clock.now();
        self.validator.validate_future(request.start_time, now)?;

        self.conflict_service
            .ensure_available(&request.provider_id, request.start_time, end_time, None)
            .await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            client_id: request.client_id,
            provider_id: request.provider_id,
            title: request.title,
            description: request.description,
            notes: request.notes,
            cancellation_reason: None,
            external_calendar_ref: request.external_calendar_ref,
            start_time: request.start_time,
            end_time,
            duration_minutes: request.duration_minutes,
            status: AppointmentStatus::Pending,
            created_by: actor.user_id.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let created = self.store
            .insert(&appointment)
            .await
            .map_err(|e| self.persistence_failure("failed to save appointment", e))?;

        info!("Appointment {} booked with provider {} at {}", created.id, created.provider_id, created.start_time);

        Ok(AppointmentDetails {
            appointment: created,
            client: Some(ClientSummary::from(&client)),
            provider: Some(provider),
        })
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        actor: Actor<'_>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", appointment_id);

        request.validate()?;

        let mut appointment = self.get_appointment(appointment_id).await?;
        self.ensure_owner(&appointment, actor.user_id).await?;

        let now = self.clock.now();
        if !appointment.is_editable(now) {
            return Err(AppointmentError::NotEditable(format!(
                "a {} appointment starting at {} can no longer be changed",
                appointment.status, appointment.start_time
            )));
        }

        let provider_changed = match &request.provider_id {
            Some(provider_id) if *provider_id != appointment.provider_id => {
                if appointment.status != AppointmentStatus::Pending {
                    return Err(AppointmentError::NotEditable(
                        "the provider can only be changed while the appointment is pending".to_string(),
                    ));
                }
                if !self.providers.is_valid(provider_id) {
                    return Err(AppointmentError::InvalidProvider(provider_id.clone()));
                }
                true
            }
            _ => false,
        };

        let new_start = request.start_time.unwrap_or(appointment.start_time);
        let new_duration = request.duration_minutes.unwrap_or(appointment.duration_minutes);
        let time_changed = new_start != appointment.start_time || new_duration != appointment.duration_minutes;
        let new_end = new_start + Duration::minutes(new_duration as i64);

        if time_changed {
            self.validator.validate_duration(new_duration)?;
            self.validator.validate_business_hours(new_start, new_end)?;
            self.validator.validate_future(new_start, now)?;
        }

        let provider_id = request.provider_id.clone().unwrap_or_else(|| appointment.provider_id.clone());
        if time_changed || provider_changed {
            self.conflict_service
                .ensure_available(&provider_id, new_start, new_end, Some(appointment.id))
                .await?;
        }

        appointment.provider_id = provider_id;
        if let Some(title) = request.title {
            appointment.title = title;
        }
        if let Some(description) = request.description {
            appointment.description = description;
        }
        if let Some(notes) = request.notes {
            appointment.notes = notes;
        }
        if let Some(external_calendar_ref) = request.external_calendar_ref {
            appointment.external_calendar_ref = external_calendar_ref;
        }

        if time_changed {
            appointment.reschedule(new_start, new_duration);
            if appointment.status == AppointmentStatus::Confirmed {
                self.lifecycle_service
                    .validate_status_transition(appointment.status, AppointmentStatus::Rescheduled)?;
                appointment.status = AppointmentStatus::Rescheduled;
            }
        }
        appointment.updated_at = now;

        let updated = self.store
            .update(&appointment)
            .await
            .map_err(|e| self.persistence_failure("failed to update appointment", e))?;

        info!("Appointment {} updated (status {})", updated.id, updated.status);
        Ok(updated)
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        actor: Actor<'_>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        if request.reason.trim().is_empty() {
            return Err(AppointmentError::ValidationError("a cancellation reason is required".to_string()));
        }
        request.validate()?;

        let mut appointment = self.get_appointment(appointment_id).await?;
        let now = self.clock.now();

        if actor.is_privileged {
            self.lifecycle_service
                .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;
        } else {
            self.ensure_owner(&appointment, actor.user_id).await?;
            if !appointment.can_be_cancelled_by_client(now) {
                warn!("Client cancellation refused for appointment {} ({})", appointment.id, appointment.status);
                return Err(AppointmentError::NotCancellable(format!(
                    "a {} appointment starting at {} cannot be cancelled",
                    appointment.status, appointment.start_time
                )));
            }
        }

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancellation_reason = Some(request.reason);
        appointment.updated_at = now;

        let cancelled = self.store
            .update(&appointment)
            .await
            .map_err(|e| self.persistence_failure("failed to cancel appointment", e))?;

        info!("Appointment {} cancelled by {}", cancelled.id, actor.user_id);
        Ok(cancelled)
    }

    /// Staff confirmation of a pending booking.
    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        request: ConfirmAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        request.validate()?;

        let mut appointment = self.get_appointment(appointment_id).await?;
        self.lifecycle_service
            .validate_status_transition(appointment.status, AppointmentStatus::Confirmed)?;

        appointment.status = AppointmentStatus::Confirmed;
        if let Some(notes) = request.notes {
            appointment.notes = Some(notes);
        }
        appointment.updated_at = self.clock.now();

        let confirmed = self.store
            .update(&appointment)
            .await
            .map_err(|e| self.persistence_failure("failed to confirm appointment", e))?;

        info!("Appointment {} confirmed", confirmed.id);
        Ok(confirmed)
    }

    pub async fn complete_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.get_appointment(appointment_id).await?;
        self.lifecycle_service
            .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        appointment.status = AppointmentStatus::Completed;
        appointment.updated_at = self.clock.now();

        let completed = self.store
            .update(&appointment)
            .await
            .map_err(|e| self.persistence_failure("failed to complete appointment", e))?;

        info!("Appointment {} completed", completed.id);
        Ok(completed)
    }

    /// Administrative removal. The record stays in storage but is no longer
    /// visible to any read.
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let deleted = self.store
            .soft_delete(appointment_id, self.clock.now())
            .await
            .map_err(|e| self.persistence_failure("failed to delete appointment", e))?;

        if !deleted {
            return Err(AppointmentError::NotFound);
        }

        info!("Appointment {} soft-deleted", appointment_id);
        Ok(())
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await
            .map_err(|e| self.persistence_failure("failed to load appointment", e))?
            .ok_or(AppointmentError::NotFound)
    }

    /// The appointment with its client and provider resolved. Visible to the
    /// owning client and to privileged users.
    pub async fn get_appointment_details(
        &self,
        appointment_id: Uuid,
        actor: Actor<'_>,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;
        if !actor.is_privileged {
            self.ensure_owner(&appointment, actor.user_id).await?;
        }

        let client = self.clients
            .get_by_id(appointment.client_id)
            .await
            .map_err(|e| self.persistence_failure("client lookup failed", e))?;
        let provider = self.providers.get(&appointment.provider_id);

        Ok(AppointmentDetails {
            client: client.as_ref().map(ClientSummary::from),
            provider,
            appointment,
        })
    }

    pub async fn list_appointments(&self, query: AppointmentListQuery) -> Result<AppointmentPage, AppointmentError> {
        self.list_filtered(AppointmentFilter::from(query)).await
    }

    pub async fn count_appointments(&self, query: AppointmentListQuery) -> Result<u64, AppointmentError> {
        self.store
            .count(&AppointmentFilter::from(query))
            .await
            .map_err(|e| self.persistence_failure("failed to count appointments", e))
    }

    /// The acting user's own appointments; any `client_id` in the query is
    /// replaced by theirs.
    pub async fn get_my_appointments(
        &self,
        user_id: &str,
        query: AppointmentListQuery,
    ) -> Result<AppointmentPage, AppointmentError> {
        let client = self.client_for_user(user_id).await?.ok_or(AppointmentError::ClientNotFound)?;

        let mut filter = AppointmentFilter::from(query);
        filter.client_id = Some(client.id);
        self.list_filtered(filter).await
    }

    pub async fn get_available_slots(
        &self,
        provider_id: &str,
        date: NaiveDate,
        duration_minutes: i32,
    ) -> Result<AvailableSlotsResponse, AppointmentError> {
        if !self.providers.is_valid(provider_id) {
            return Err(AppointmentError::InvalidProvider(provider_id.to_string()));
        }

        let slots = self.availability_service
            .generate_slots(provider_id, date, duration_minutes)
            .await?;

        Ok(AvailableSlotsResponse {
            provider_id: provider_id.to_string(),
            date,
            duration_minutes,
            slots,
        })
    }

    pub fn list_providers(&self) -> Vec<ProviderProfile> {
        self.providers.list()
    }

    pub async fn client_for_user(&self, user_id: &str) -> Result<Option<ClientRecord>, AppointmentError> {
        self.clients
            .get_by_acting_user(user_id)
            .await
            .map_err(|e| self.persistence_failure("client lookup failed", e))
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn list_filtered(&self, filter: AppointmentFilter) -> Result<AppointmentPage, AppointmentError> {
        let items = self.store
            .list(&filter)
            .await
            .map_err(|e| self.persistence_failure("failed to list appointments", e))?;
        let total = self.store
            .count(&filter)
            .await
            .map_err(|e| self.persistence_failure("failed to count appointments", e))?;

        Ok(AppointmentPage {
            items,
            total,
            page: filter.page,
            page_size: filter.page_size,
        })
    }

    async fn ensure_owner(&self, appointment: &Appointment, user_id: &str) -> Result<(), AppointmentError> {
        let client = self.client_for_user(user_id).await?;
        if client.map(|c| c.id) != Some(appointment.client_id) {
            warn!("User {} is not the owner of appointment {}", user_id, appointment.id);
            return Err(AppointmentError::Forbidden(
                "appointment belongs to another client".to_string(),
            ));
        }
        Ok(())
    }

    fn persistence_failure(&self, context: &str, err: anyhow::Error) -> AppointmentError {
        error!("{}: {:#}", context, err);
        AppointmentError::database(context, err)
    }
}
