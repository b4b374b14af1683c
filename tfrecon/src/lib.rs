//! tfrecon - declarative resource reconciliation for Rust
//!
//! Resource types describe their attributes with a [`Schema`] and implement
//! [`ResourceOperations`] against a control-plane API. The framework validates
//! desired configuration, diffs it against observed state, plans the remote
//! operations and drives each instance through its lifecycle.

// Core modules
pub mod context;
pub mod error;
pub mod normalize;
pub mod schema;
pub mod types;

// Reconciliation
pub mod diff;
pub mod lifecycle;
pub mod resource;
pub mod retry;

// Helper modules
pub mod defaults;
pub mod naming;
pub mod plan_modifier;
pub mod validator;

// Test support
pub mod acctest;

// Re-exports for convenience
pub use context::Context;
pub use diff::{diff, plan, AttrAction, AttributeDiff, Diff, Operation, ResourceAction};
pub use error::{Result, TfreconError, Violation, ViolationKind, Violations};
pub use lifecycle::{ApplyResult, LifecycleController, LifecycleState, PollConfig};
pub use resource::{
    CreateRequest, CreateResponse, DeleteRequest, Readiness, ResourceDescriptor,
    ResourceOperations, Timeouts, UpdateRequest,
};
pub use retry::RetryPolicy;
pub use schema::{
    AttributeBuilder, AttributeType, BlockBuilder, ConfigConstraint, NestedBlock, NestingMode,
    Schema, SchemaBuilder,
};
pub use types::{AttributePath, Config, Diagnostic, Dynamic, DynamicValue, State};
