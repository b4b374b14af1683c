//! Default value providers for attributes
//!
//! A default fills in an optional attribute the configuration leaves unset.
//! It is applied before diffing, so an unset attribute with a default plans
//! exactly as if the default had been written out.
//!
//! ```no_run
//! use tfrecon::schema::{AttributeBuilder, AttributeType};
//! use tfrecon::defaults::{StaticDefault, EnvDefault};
//!
//! let ssm = AttributeBuilder::new("enable_ssm_access", AttributeType::Bool)
//!     .optional()
//!     .default(StaticDefault::bool(false))
//!     .build();
//!
//! let region = AttributeBuilder::new("region", AttributeType::String)
//!     .optional()
//!     .default(EnvDefault::create("CLOUDPROV_REGION", "us-west-2"))
//!     .build();
//! ```

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};
use std::env;
use std::sync::Arc;

/// StaticDefault provides a fixed value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Arc<dyn Default> {
        Arc::new(Self { value })
    }

    pub fn string(value: &str) -> Arc<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Arc<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Arc<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

/// EnvDefault reads the default from an environment variable
pub struct EnvDefault {
    env_var: String,
    fallback: Option<String>,
}

impl EnvDefault {
    pub fn create(env_var: &str, fallback: &str) -> Arc<dyn Default> {
        Arc::new(Self {
            env_var: env_var.to_string(),
            fallback: Some(fallback.to_string()),
        })
    }

    /// No fallback: the attribute stays null when the variable is unset
    pub fn create_required(env_var: &str) -> Arc<dyn Default> {
        Arc::new(Self {
            env_var: env_var.to_string(),
            fallback: None,
        })
    }
}

impl Default for EnvDefault {
    fn description(&self) -> String {
        match &self.fallback {
            Some(fallback) => format!(
                "default from environment variable {} (fallback: {})",
                self.env_var, fallback
            ),
            None => format!("default from environment variable {}", self.env_var),
        }
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        let value = match env::var(&self.env_var) {
            Ok(val) if !val.is_empty() => Dynamic::String(val),
            _ => match &self.fallback {
                Some(fallback) => Dynamic::String(fallback.clone()),
                None => Dynamic::Null,
            },
        };

        DefaultResponse {
            value: DynamicValue::new(value),
        }
    }
}
