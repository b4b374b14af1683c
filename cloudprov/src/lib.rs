pub mod api;
pub mod provider_data;
pub mod resources;

pub use provider_data::ProviderData;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tfrecon::{Diagnostic, Dynamic, ResourceDescriptor, Schema, TfreconError};

pub const DEFAULT_REGION: &str = "us-west-2";

/// Settings needed to reach the control plane
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_token: String,
    pub region: String,
    pub account_id: Option<String>,
    pub insecure: bool,
}

fn string_setting(values: &HashMap<String, Dynamic>, key: &str, env: &str) -> Option<String> {
    values
        .get(key)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
        .or_else(|| std::env::var(env).ok())
        .filter(|s| !s.is_empty())
}

impl ProviderConfig {
    /// Reads each setting from `values` first, then from the environment
    pub fn from_values(values: &HashMap<String, Dynamic>) -> Result<Self, Vec<Diagnostic>> {
        let endpoint = string_setting(values, "endpoint", "CLOUDPROV_ENDPOINT");
        let api_token = string_setting(values, "api_token", "CLOUDPROV_API_TOKEN");
        let region = string_setting(values, "region", "CLOUDPROV_REGION")
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let account_id = string_setting(values, "account_id", "CLOUDPROV_ACCOUNT_ID");

        let insecure = values
            .get("insecure")
            .and_then(|v| v.as_bool())
            .or_else(|| {
                std::env::var("CLOUDPROV_INSECURE")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok())
            })
            .unwrap_or(false);

        match (endpoint, api_token) {
            (Some(endpoint), Some(api_token)) => Ok(Self {
                endpoint,
                api_token,
                region,
                account_id,
                insecure,
            }),
            (endpoint, api_token) => {
                let mut diags = Vec::new();
                if endpoint.is_none() {
                    diags.push(Diagnostic::error(
                        "endpoint is required (set in provider config or CLOUDPROV_ENDPOINT env var)",
                        "",
                    ));
                }
                if api_token.is_none() {
                    diags.push(Diagnostic::error(
                        "api_token is required (set in provider config or CLOUDPROV_API_TOKEN env var)",
                        "",
                    ));
                }
                Err(diags)
            }
        }
    }
}

/// Verbosity of the binary's log output, read from `CLOUDPROV_LOG`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn from_env() -> Self {
        std::env::var("CLOUDPROV_LOG")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

pub struct CloudProvider {
    data: Option<ProviderData>,
}

impl Default for CloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudProvider {
    pub fn new() -> Self {
        Self { data: None }
    }

    /// Builds the shared client. Returns the problems found, if any; the
    /// provider stays unconfigured when there are errors.
    pub fn configure(&mut self, values: &HashMap<String, Dynamic>) -> Vec<Diagnostic> {
        let config = match ProviderConfig::from_values(values) {
            Ok(config) => config,
            Err(diags) => return diags,
        };

        match api::Client::new(&config.endpoint, &config.api_token, config.insecure) {
            Ok(client) => {
                tracing::info!(
                    "Configured provider for {} in {}",
                    config.endpoint,
                    config.region
                );
                self.data = Some(ProviderData::new(client, config.region, config.account_id));
                Vec::new()
            }
            Err(e) => vec![Diagnostic::error(
                "Failed to create API client",
                e.to_string(),
            )],
        }
    }

    pub fn data(&self) -> Option<&ProviderData> {
        self.data.as_ref()
    }

    /// Resource types keyed by type name, wired to the configured client
    pub fn descriptors(&self) -> tfrecon::Result<HashMap<String, ResourceDescriptor>> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| TfreconError::InvalidState("Provider not configured".to_string()))?;
        Ok(descriptors_for(data))
    }

    pub fn resource_schemas() -> HashMap<String, Schema> {
        let mut schemas = HashMap::new();
        schemas.insert(
            resources::devicefarm_upload::TYPE_NAME.to_string(),
            resources::DeviceFarmUploadResource::schema(),
        );
        schemas.insert(
            resources::sagemaker_endpoint_configuration::TYPE_NAME.to_string(),
            resources::EndpointConfigurationResource::schema(),
        );
        schemas
    }
}

/// Registers every resource type against the given API handles
pub fn descriptors_for(data: &ProviderData) -> HashMap<String, ResourceDescriptor> {
    [
        resources::DeviceFarmUploadResource::descriptor(data.devicefarm()),
        resources::EndpointConfigurationResource::descriptor(data.sagemaker()),
    ]
    .into_iter()
    .map(|d| (d.type_name.clone(), d))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "CLOUDPROV_ENDPOINT",
            "CLOUDPROV_API_TOKEN",
            "CLOUDPROV_REGION",
            "CLOUDPROV_ACCOUNT_ID",
            "CLOUDPROV_INSECURE",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn provider_configures_successfully_with_env_vars() {
        clear_env();
        std::env::set_var("CLOUDPROV_ENDPOINT", "https://localhost:8443");
        std::env::set_var("CLOUDPROV_API_TOKEN", "secret");
        std::env::set_var("CLOUDPROV_INSECURE", "true");

        let mut provider = CloudProvider::new();
        let diags = provider.configure(&HashMap::new());
        assert!(diags.is_empty());

        let data = provider.data().unwrap();
        assert_eq!(data.region, DEFAULT_REGION);
        assert_eq!(data.account_id, None);

        clear_env();
    }

    #[test]
    #[serial]
    fn explicit_values_take_precedence_over_env() {
        clear_env();
        std::env::set_var("CLOUDPROV_ENDPOINT", "https://env.example.com");
        std::env::set_var("CLOUDPROV_REGION", "eu-west-1");

        let values = HashMap::from([
            ("endpoint".to_string(), Dynamic::string("https://config.example.com")),
            ("api_token".to_string(), Dynamic::string("secret")),
            ("account_id".to_string(), Dynamic::string("123456789012")),
        ]);
        let config = ProviderConfig::from_values(&values).unwrap();
        assert_eq!(config.endpoint, "https://config.example.com");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.account_id.as_deref(), Some("123456789012"));
        assert!(!config.insecure);

        clear_env();
    }

    #[test]
    #[serial]
    fn provider_configure_requires_endpoint() {
        clear_env();
        std::env::set_var("CLOUDPROV_API_TOKEN", "secret");

        let mut provider = CloudProvider::new();
        let diags = provider.configure(&HashMap::new());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("endpoint is required"));
        assert!(provider.data().is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn provider_configure_requires_api_token() {
        clear_env();
        std::env::set_var("CLOUDPROV_ENDPOINT", "https://localhost:8443");

        let mut provider = CloudProvider::new();
        let diags = provider.configure(&HashMap::new());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("api_token is required"));

        clear_env();
    }

    #[test]
    #[serial]
    fn provider_rejects_invalid_endpoint() {
        clear_env();

        let values = HashMap::from([
            ("endpoint".to_string(), Dynamic::string("ftp://localhost")),
            ("api_token".to_string(), Dynamic::string("secret")),
        ]);
        let mut provider = CloudProvider::new();
        let diags = provider.configure(&values);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_error());
        assert_eq!(diags[0].summary, "Failed to create API client");
    }

    #[test]
    #[serial]
    fn descriptors_require_configuration() {
        clear_env();
        let provider = CloudProvider::new();
        let err = provider.descriptors().err().unwrap();
        assert!(err.to_string().contains("Provider not configured"));
    }

    #[test]
    #[serial]
    fn descriptors_cover_every_resource_type() {
        clear_env();
        let values = HashMap::from([
            ("endpoint".to_string(), Dynamic::string("https://localhost:8443")),
            ("api_token".to_string(), Dynamic::string("secret")),
        ]);
        let mut provider = CloudProvider::new();
        assert!(provider.configure(&values).is_empty());

        let descriptors = provider.descriptors().unwrap();
        let schemas = CloudProvider::resource_schemas();
        assert_eq!(descriptors.len(), schemas.len());
        assert_eq!(descriptors["cloudprov_devicefarm_upload"].id_attribute, "arn");
        assert_eq!(
            descriptors["cloudprov_sagemaker_endpoint_configuration"].id_attribute,
            "name"
        );
    }

    #[test]
    #[serial]
    fn log_level_parses_from_env() {
        std::env::remove_var("CLOUDPROV_LOG");
        assert_eq!(LogLevel::from_env(), LogLevel::Info);

        std::env::set_var("CLOUDPROV_LOG", "DEBUG");
        assert_eq!(LogLevel::from_env(), LogLevel::Debug);

        std::env::set_var("CLOUDPROV_LOG", "verbose");
        assert_eq!(LogLevel::from_env(), LogLevel::Info);

        std::env::remove_var("CLOUDPROV_LOG");
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
    }
}
