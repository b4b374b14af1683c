//! Resource operations trait and the static descriptor of a resource type
//!
//! A resource type plugs into the framework by implementing
//! [`ResourceOperations`] against its control-plane API and registering a
//! [`ResourceDescriptor`]. Diffing, polling, retries and the state machine
//! are all handled by the lifecycle controller.

use crate::context::Context;
use crate::diff::AttributeDiff;
use crate::error::Result;
use crate::schema::Schema;
use crate::types::{Config, State};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Remote calls for one resource type
///
/// Implementations are stateless apart from injected API handles and may be
/// shared by many controllers at once.
#[async_trait]
pub trait ResourceOperations: Send + Sync {
    /// Submits the desired configuration and returns the identifier the
    /// remote system assigned. MUST NOT wait for the object to become ready.
    async fn create(&self, ctx: Context, request: CreateRequest) -> Result<CreateResponse>;

    /// Remote state accessor: returns the observed state, or None when the
    /// object does not exist. Throttling and transport failures are errors,
    /// never None.
    async fn find(&self, ctx: Context, id: &str) -> Result<Option<State>>;

    /// Applies in-place changes. Only called with mutable attributes, and
    /// must be safe to call again with the same changes.
    async fn update(&self, ctx: Context, request: UpdateRequest) -> Result<()>;

    /// Requests removal. A NotFound error is treated as success.
    async fn delete(&self, ctx: Context, request: DeleteRequest) -> Result<()>;

    /// Classifies observed state while waiting after create or update
    fn readiness(&self, _state: &State) -> Readiness {
        Readiness::Ready
    }
}

pub struct CreateRequest {
    pub type_name: String,
    /// Desired configuration with defaults applied
    pub config: Config,
}

pub struct CreateResponse {
    pub id: String,
}

pub struct UpdateRequest {
    pub type_name: String,
    pub id: String,
    pub config: Config,
    pub prior_state: State,
    /// Changed mutable attributes only
    pub changes: Vec<AttributeDiff>,
}

pub struct DeleteRequest {
    pub type_name: String,
    pub id: String,
    pub prior_state: Option<State>,
}

/// Status of a remote object while it settles
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Ready,
    Pending(String),
    Failed(String),
}

/// Per-operation wait limits
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(20 * 60),
            update: Duration::from_secs(20 * 60),
            delete: Duration::from_secs(20 * 60),
        }
    }
}

/// Static description of a resource type, built once at registration
#[derive(Clone)]
pub struct ResourceDescriptor {
    pub type_name: String,
    pub schema: Arc<Schema>,
    /// Attribute of the observed state holding the remote identifier
    pub id_attribute: String,
    pub operations: Arc<dyn ResourceOperations>,
    pub timeouts: Timeouts,
}

impl ResourceDescriptor {
    pub fn new(
        type_name: &str,
        schema: Schema,
        id_attribute: &str,
        operations: Arc<dyn ResourceOperations>,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            schema: Arc::new(schema),
            id_attribute: id_attribute.to_string(),
            operations,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Identifier held by an observed state, if any
    pub fn id_of(&self, state: &State) -> Option<String> {
        state
            .attr(&self.id_attribute)
            .as_string()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }
}

impl std::fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("type_name", &self.type_name)
            .field("id_attribute", &self.id_attribute)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}
