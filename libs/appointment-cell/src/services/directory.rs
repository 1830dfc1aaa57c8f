// libs/appointment-cell/src/services/directory.rs
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::{AppConfig, ProviderConfig};
use shared_database::supabase::SupabaseClient;

use crate::models::{ClientRecord, ProviderProfile};

// ==============================================================================
// CLIENT DIRECTORY
// ==============================================================================

#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn get_by_id(&self, client_id: Uuid) -> Result<Option<ClientRecord>>;

    /// The client record the authenticated user acts as, if any.
    async fn get_by_acting_user(&self, user_id: &str) -> Result<Option<ClientRecord>>;
}

pub struct SupabaseClientDirectory {
    supabase: Arc<SupabaseClient>,
    access_token: String,
}

impl SupabaseClientDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(
            Arc::new(SupabaseClient::new(config)),
            config.supabase_service_role_key.clone(),
        )
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, access_token: String) -> Self {
        Self { supabase, access_token }
    }

    async fn fetch_one(&self, path: &str) -> Result<Option<ClientRecord>> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(&self.access_token),
            None,
        ).await?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| anyhow!("Failed to parse client: {}", e)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ClientDirectory for SupabaseClientDirectory {
    async fn get_by_id(&self, client_id: Uuid) -> Result<Option<ClientRecord>> {
        debug!("Looking up client {}", client_id);
        let path = format!(
            "/rest/v1/clients?id=eq.{}&select=id,user_id,first_name,last_name,is_active&limit=1",
            client_id
        );
        self.fetch_one(&path).await
    }

    async fn get_by_acting_user(&self, user_id: &str) -> Result<Option<ClientRecord>> {
        debug!("Resolving client for user {}", user_id);
        let path = format!(
            "/rest/v1/clients?user_id=eq.{}&select=id,user_id,first_name,last_name,is_active&limit=1",
            urlencoding::encode(user_id)
        );
        self.fetch_one(&path).await
    }
}

// ==============================================================================
// PROVIDER DIRECTORY
// ==============================================================================

pub trait ProviderDirectory: Send + Sync {
    fn is_valid(&self, provider_id: &str) -> bool;

    fn get(&self, provider_id: &str) -> Option<ProviderProfile>;

    fn list(&self) -> Vec<ProviderProfile>;
}

/// Providers as configured through `SCHEDULING_PROVIDERS`, kept in
/// configuration order.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredProviderDirectory {
    providers: Vec<ProviderProfile>,
    index: HashMap<String, usize>,
}

impl ConfiguredProviderDirectory {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        let mut profiles: Vec<ProviderProfile> = Vec::with_capacity(providers.len());
        let mut index = HashMap::new();

        for provider in providers {
            if index.contains_key(&provider.id) {
                tracing::warn!("Duplicate provider id {} in configuration, keeping the first", provider.id);
                continue;
            }
            index.insert(provider.id.clone(), profiles.len());
            profiles.push(provider.into());
        }

        Self { providers: profiles, index }
    }
}

impl ProviderDirectory for ConfiguredProviderDirectory {
    fn is_valid(&self, provider_id: &str) -> bool {
        self.index.contains_key(provider_id)
    }

    fn get(&self, provider_id: &str) -> Option<ProviderProfile> {
        self.index.get(provider_id).map(|&i| self.providers[i].clone())
    }

    fn list(&self) -> Vec<ProviderProfile> {
        self.providers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, name: &str) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            display_name: name.to_string(),
            title: None,
        }
    }

    #[test]
    fn configured_providers_are_resolvable() {
        let directory = ConfiguredProviderDirectory::new(vec![
            provider("therapist-1", "Anna Weber"),
            provider("therapist-2", "Jonas Keller"),
        ]);

        assert!(directory.is_valid("therapist-1"));
        assert!(!directory.is_valid("therapist-9"));
        assert_eq!(directory.get("therapist-2").map(|p| p.display_name), Some("Jonas Keller".to_string()));
        assert_eq!(directory.list().len(), 2);
    }

    #[test]
    fn duplicate_ids_keep_first_entry() {
        let directory = ConfiguredProviderDirectory::new(vec![
            provider("therapist-1", "Anna Weber"),
            provider("therapist-1", "Someone Else"),
        ]);

        assert_eq!(directory.list().len(), 1);
        assert_eq!(directory.get("therapist-1").map(|p| p.display_name), Some("Anna Weber".to_string()));
    }
}
