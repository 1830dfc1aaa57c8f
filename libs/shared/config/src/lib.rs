use std::env;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A bookable provider as listed in `SCHEDULING_PROVIDERS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// A client preloaded from `SCHEDULING_SEED_CLIENTS` when running without Supabase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSeedConfig {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct SchedulingConfig {
    /// Offset of the practice's local business time from UTC, in minutes.
    pub business_utc_offset_minutes: i32,
    pub providers: Vec<ProviderConfig>,
    pub seed_clients: Vec<ClientSeedConfig>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub scheduling: SchedulingConfig,
    pub request_timeout_secs: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            scheduling: SchedulingConfig {
                business_utc_offset_minutes: parse_var("BUSINESS_UTC_OFFSET_MINUTES", 0),
                providers: env::var("SCHEDULING_PROVIDERS")
                    .map(|raw| parse_providers(&raw))
                    .unwrap_or_else(|_| {
                        warn!("SCHEDULING_PROVIDERS not set, no providers will be bookable");
                        Vec::new()
                    }),
                seed_clients: env::var("SCHEDULING_SEED_CLIENTS")
                    .map(|raw| parse_seed_clients(&raw))
                    .unwrap_or_default(),
            },
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30),
            port: parse_var("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_role_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

/// Parses the JSON provider list. An unparsable value yields an empty list.
pub fn parse_providers(raw: &str) -> Vec<ProviderConfig> {
    parse_json_list("SCHEDULING_PROVIDERS", raw)
}

/// Parses the JSON list of clients to preload. An unparsable value yields an empty list.
pub fn parse_seed_clients(raw: &str) -> Vec<ClientSeedConfig> {
    parse_json_list("SCHEDULING_SEED_CLIENTS", raw)
}

fn parse_json_list<T: serde::de::DeserializeOwned>(name: &str, raw: &str) -> Vec<T> {
    match serde_json::from_str::<Vec<T>>(raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("{} is not valid JSON ({}), ignoring it", name, e);
            Vec::new()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value {:?}, using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_list() {
        let providers = parse_providers(
            r#"[{"id":"therapist-1","display_name":"Anna Weber","title":"Physiotherapist"},
                {"id":"therapist-2","display_name":"Jonas Keller"}]"#,
        );

        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].id, "therapist-1");
        assert_eq!(providers[0].title.as_deref(), Some("Physiotherapist"));
        assert_eq!(providers[1].title, None);
    }

    #[test]
    fn invalid_provider_json_is_ignored() {
        assert!(parse_providers("therapist-1,therapist-2").is_empty());
    }

    #[test]
    fn parses_seed_clients_with_active_default() {
        let clients = parse_seed_clients(
            r#"[{"id":"6f1c2a0e-3d4b-4c5d-8e9f-0a1b2c3d4e5f","user_id":"user-1","first_name":"Mara","last_name":"Client"},
                {"id":"0d9e8f7a-6b5c-4d3e-9f2a-1b0c9d8e7f6a","first_name":"Ines","last_name":"Client","is_active":false}]"#,
        );

        assert_eq!(clients.len(), 2);
        assert!(clients[0].is_active);
        assert_eq!(clients[0].user_id.as_deref(), Some("user-1"));
        assert!(!clients[1].is_active);
        assert_eq!(clients[1].user_id, None);
        assert!(parse_seed_clients("{}").is_empty());
    }
}
