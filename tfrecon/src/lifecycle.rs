//! Lifecycle controller
//!
//! One generic controller drives every resource type through
//! `absent -> creating -> active -> (updating -> active)* -> deleting -> absent`,
//! with `creating`, `updating` and `deleting` able to fall into `error`.
//! A controller owns exactly one resource instance; its operations take
//! `&mut self`, so calls against one instance are always sequential while
//! separate controllers run concurrently.

use crate::context::Context;
use crate::diff::{self, AttributeDiff, Diff, Operation, ResourceAction};
use crate::error::{Result, TfreconError, Violations};
use crate::resource::{CreateRequest, DeleteRequest, Readiness, ResourceDescriptor, UpdateRequest};
use crate::retry::RetryPolicy;
use crate::types::{Config, State};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Absent,
    Creating,
    Active,
    Updating,
    Deleting,
    Error,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Absent => "absent",
            LifecycleState::Creating => "creating",
            LifecycleState::Active => "active",
            LifecycleState::Updating => "updating",
            LifecycleState::Deleting => "deleting",
            LifecycleState::Error => "error",
        };
        f.write_str(s)
    }
}

/// How often to poll while waiting for an object to settle
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Outcome of [`LifecycleController::apply`]
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub action: ResourceAction,
    /// Observed state read back after the last operation
    pub state: State,
}

pub struct LifecycleController {
    descriptor: ResourceDescriptor,
    retry: RetryPolicy,
    poll: PollConfig,
    state: LifecycleState,
    id: Option<String>,
    observed: Option<State>,
}

enum WaitFor {
    Ready,
    Gone,
}

impl LifecycleController {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            retry: RetryPolicy::default(),
            poll: PollConfig::default(),
            state: LifecycleState::Absent,
            id: None,
            observed: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Tracks an object created earlier. Its existence is confirmed on the
    /// next read.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self.state = LifecycleState::Active;
        self
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// State from the most recent successful read
    pub fn observed(&self) -> Option<&State> {
        self.observed.as_ref()
    }

    fn transition(&mut self, to: LifecycleState) {
        if self.state != to {
            tracing::info!(
                "{} ({}): {} -> {}",
                self.descriptor.type_name,
                self.id.as_deref().unwrap_or("<no id>"),
                self.state,
                to
            );
        }
        self.state = to;
    }

    fn annotate(&self, err: TfreconError) -> TfreconError {
        match err {
            TfreconError::Lifecycle { .. } => err,
            other => TfreconError::Lifecycle {
                type_name: self.descriptor.type_name.clone(),
                id: self.id.clone(),
                state: self.state,
                source: Box::new(other),
            },
        }
    }

    fn fail(&mut self, err: TfreconError) -> TfreconError {
        tracing::error!(
            "{} ({}) failed while {}: {}",
            self.descriptor.type_name,
            self.id.as_deref().unwrap_or("<no id>"),
            self.state,
            err
        );
        let err = self.annotate(err);
        if matches!(
            self.state,
            LifecycleState::Creating | LifecycleState::Updating | LifecycleState::Deleting
        ) {
            self.state = LifecycleState::Error;
        }
        err
    }

    /// Checks a configuration against the schema without any remote call
    pub fn validate(&self, config: &Config) -> Result<()> {
        let violations = self.descriptor.schema.validate(config);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(self.annotate(TfreconError::Validation(Violations(violations))))
        }
    }

    async fn find(&self, ctx: &Context, id: &str) -> Result<Option<State>> {
        let ops = &self.descriptor.operations;
        let operation = format!("read of {} {}", self.descriptor.type_name, id);
        self.retry
            .run(ctx, &operation, || ops.find(ctx.clone(), id))
            .await
    }

    /// Refreshes the observed state. None means the object no longer
    /// exists, which the caller treats as drift.
    pub async fn read(&mut self, ctx: &Context) -> Result<Option<State>> {
        let Some(id) = self.id.clone() else {
            return Ok(None);
        };

        match self.find(ctx, &id).await {
            Ok(Some(state)) => {
                self.observed = Some(state.clone());
                if self.state == LifecycleState::Absent {
                    self.transition(LifecycleState::Active);
                }
                Ok(Some(state))
            }
            Ok(None) => {
                tracing::warn!(
                    "{} {} not found, removing from state",
                    self.descriptor.type_name,
                    id
                );
                self.transition(LifecycleState::Absent);
                self.id = None;
                self.observed = None;
                Ok(None)
            }
            Err(e) => Err(self.annotate(e)),
        }
    }

    /// Takes over an existing object by identifier
    pub async fn import(&mut self, ctx: &Context, id: &str) -> Result<State> {
        self.id = Some(id.to_string());
        match self.read(ctx).await? {
            Some(state) => Ok(state),
            None => Err(self.annotate(TfreconError::not_found(
                self.descriptor.type_name.clone(),
                id,
            ))),
        }
    }

    /// Validates, refreshes and diffs without changing anything remotely
    pub async fn plan(&mut self, ctx: &Context, config: &Config) -> Result<Diff> {
        self.validate(config)?;
        let observed = self.read(ctx).await?;
        let diff = diff::diff(&self.descriptor.schema, config, observed.as_ref());
        tracing::debug!(
            "{} plan: {} ({:?})",
            self.descriptor.type_name,
            diff.action,
            diff.changed_attributes()
        );
        Ok(diff)
    }

    /// Brings the remote object in line with `config` and returns the
    /// observed state afterwards
    pub async fn apply(&mut self, ctx: &Context, config: &Config) -> Result<ApplyResult> {
        let diff = self.plan(ctx, config).await?;
        let action = diff.action;

        for operation in diff::plan(&diff) {
            tracing::debug!("{} executing {}", self.descriptor.type_name, operation.name());
            match operation {
                Operation::Delete => self.delete(ctx).await?,
                Operation::Create => {
                    self.create_resolved(ctx, &diff.desired).await?;
                }
                Operation::Update { changes } => {
                    self.update_resolved(ctx, &diff.desired, changes).await?;
                }
            }
        }

        let state = match &self.observed {
            Some(state) => state.clone(),
            None => self.read(ctx).await?.ok_or_else(|| {
                self.annotate(TfreconError::not_found(
                    self.descriptor.type_name.clone(),
                    self.id.clone().unwrap_or_default(),
                ))
            })?,
        };

        Ok(ApplyResult { action, state })
    }

    /// Submits the configuration and waits until the object is ready
    pub async fn create(&mut self, ctx: &Context, config: &Config) -> Result<State> {
        self.validate(config)?;
        let desired = diff::apply_defaults(&self.descriptor.schema, config);
        self.create_resolved(ctx, &desired).await
    }

    async fn create_resolved(&mut self, ctx: &Context, desired: &Config) -> Result<State> {
        self.transition(LifecycleState::Creating);
        self.observed = None;

        let ops = &self.descriptor.operations;
        let operation = format!("create of {}", self.descriptor.type_name);
        let response = self
            .retry
            .run(ctx, &operation, || {
                ops.create(
                    ctx.clone(),
                    CreateRequest {
                        type_name: self.descriptor.type_name.clone(),
                        config: desired.clone(),
                    },
                )
            })
            .await;

        let id = match response {
            Ok(response) => response.id,
            Err(e) => return Err(self.fail(e)),
        };
        self.id = Some(id.clone());
        tracing::info!("{} created with id {}", self.descriptor.type_name, id);

        let timeout = self.descriptor.timeouts.create;
        match self.wait(ctx, &id, WaitFor::Ready, timeout, "creation").await {
            Ok(state) => {
                self.observed = state.clone();
                self.transition(LifecycleState::Active);
                state.ok_or_else(|| TfreconError::not_found(self.descriptor.type_name.clone(), id))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Applies in-place changes to the tracked object
    pub async fn update(
        &mut self,
        ctx: &Context,
        config: &Config,
        changes: Vec<AttributeDiff>,
    ) -> Result<State> {
        self.validate(config)?;
        let desired = diff::apply_defaults(&self.descriptor.schema, config);
        self.update_resolved(ctx, &desired, changes).await
    }

    async fn update_resolved(
        &mut self,
        ctx: &Context,
        desired: &Config,
        changes: Vec<AttributeDiff>,
    ) -> Result<State> {
        let Some(id) = self.id.clone() else {
            return Err(self.annotate(TfreconError::InvalidState(
                "update requires an existing object".to_string(),
            )));
        };
        let prior_state = self.observed.clone().unwrap_or_default();

        self.transition(LifecycleState::Updating);

        let ops = &self.descriptor.operations;
        let operation = format!("update of {} {}", self.descriptor.type_name, id);
        let result = self
            .retry
            .run(ctx, &operation, || {
                ops.update(
                    ctx.clone(),
                    UpdateRequest {
                        type_name: self.descriptor.type_name.clone(),
                        id: id.clone(),
                        config: desired.clone(),
                        prior_state: prior_state.clone(),
                        changes: changes.clone(),
                    },
                )
            })
            .await;
        if let Err(e) = result {
            return Err(self.fail(e));
        }

        let timeout = self.descriptor.timeouts.update;
        match self.wait(ctx, &id, WaitFor::Ready, timeout, "update").await {
            Ok(Some(state)) => {
                self.observed = Some(state.clone());
                self.transition(LifecycleState::Active);
                Ok(state)
            }
            Ok(None) => {
                let err = TfreconError::not_found(self.descriptor.type_name.clone(), id);
                Err(self.fail(err))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Removes the tracked object and waits until it is gone. Deleting an
    /// object that is already absent succeeds.
    pub async fn delete(&mut self, ctx: &Context) -> Result<()> {
        let Some(id) = self.id.clone() else {
            self.transition(LifecycleState::Absent);
            return Ok(());
        };

        self.transition(LifecycleState::Deleting);
        if let Err(e) = self.remove(ctx, &id).await {
            return Err(self.fail(e));
        }

        self.transition(LifecycleState::Absent);
        self.id = None;
        self.observed = None;
        Ok(())
    }

    async fn remove(&self, ctx: &Context, id: &str) -> Result<()> {
        let ops = &self.descriptor.operations;
        let prior_state = self.observed.clone();
        let operation = format!("delete of {} {}", self.descriptor.type_name, id);
        let result = self
            .retry
            .run(ctx, &operation, || {
                ops.delete(
                    ctx.clone(),
                    DeleteRequest {
                        type_name: self.descriptor.type_name.clone(),
                        id: id.to_string(),
                        prior_state: prior_state.clone(),
                    },
                )
            })
            .await;

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} {} already absent", self.descriptor.type_name, id);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let timeout = self.descriptor.timeouts.delete;
        self.wait(ctx, id, WaitFor::Gone, timeout, "deletion")
            .await
            .map(|_| ())
    }

    /// Test hook: whether an object with this identifier exists remotely
    pub async fn exists(&self, ctx: &Context, id: &str) -> Result<bool> {
        Ok(self.find(ctx, id).await?.is_some())
    }

    /// Test hook: removes an object out of band, without touching the state
    /// this controller tracks
    pub async fn destroy(&self, ctx: &Context, id: &str) -> Result<()> {
        self.remove(ctx, id).await
    }

    /// Polls the accessor until the object is ready (or gone). Returns the
    /// last observed state. Running out of time, or cancellation of `ctx`,
    /// is a Timeout; nothing already done remotely is rolled back.
    async fn wait(
        &self,
        ctx: &Context,
        id: &str,
        target: WaitFor,
        timeout: Duration,
        what: &str,
    ) -> Result<Option<State>> {
        let started = Instant::now();
        let ctx = ctx.with_timeout(timeout);
        let operation = format!("{} of {} {}", what, self.descriptor.type_name, id);

        loop {
            let observed = self.find(&ctx, id).await?;

            match (&target, observed) {
                (WaitFor::Gone, None) => return Ok(None),
                (WaitFor::Gone, Some(_)) => {
                    tracing::debug!("{} still exists", operation);
                }
                (WaitFor::Ready, None) => {
                    // Newly created objects may not be visible yet
                    tracing::debug!("{} not visible yet", operation);
                }
                (WaitFor::Ready, Some(state)) => {
                    match self.descriptor.operations.readiness(&state) {
                        Readiness::Ready => return Ok(Some(state)),
                        Readiness::Pending(status) => {
                            tracing::debug!("{} pending: {}", operation, status);
                        }
                        Readiness::Failed(reason) => {
                            return Err(TfreconError::InvalidState(format!(
                                "{} failed: {}",
                                operation, reason
                            )));
                        }
                    }
                }
            }

            if !ctx.sleep(self.poll.interval).await {
                return Err(TfreconError::Timeout {
                    operation,
                    elapsed: started.elapsed(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{CreateResponse, ResourceOperations, Timeouts};
    use crate::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
    use crate::types::{AttributePath, DynamicValue};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Fake {
        objects: Mutex<HashMap<String, State>>,
        remote_calls: AtomicU32,
        pending_polls: AtomicU32,
        fail_readiness: bool,
    }

    #[async_trait]
    impl ResourceOperations for Fake {
        async fn create(&self, _ctx: Context, request: CreateRequest) -> Result<CreateResponse> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            let id = format!("w-{}", self.remote_calls.load(Ordering::SeqCst));
            let mut state = request.config.clone();
            state.set_string(&AttributePath::new("id"), id.clone())?;
            self.objects.lock().unwrap().insert(id.clone(), state);
            Ok(CreateResponse { id })
        }

        async fn find(&self, _ctx: Context, id: &str) -> Result<Option<State>> {
            Ok(self.objects.lock().unwrap().get(id).cloned())
        }

        async fn update(&self, _ctx: Context, request: crate::resource::UpdateRequest) -> Result<()> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            let mut objects = self.objects.lock().unwrap();
            let state = objects
                .get_mut(&request.id)
                .ok_or_else(|| TfreconError::not_found("test_widget", &request.id))?;
            for change in request.changes {
                state.set_value(&AttributePath::new(&change.attribute), change.new)?;
            }
            Ok(())
        }

        async fn delete(&self, _ctx: Context, request: DeleteRequest) -> Result<()> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            match self.objects.lock().unwrap().remove(&request.id) {
                Some(_) => Ok(()),
                None => Err(TfreconError::not_found("test_widget", request.id)),
            }
        }

        fn readiness(&self, _state: &State) -> Readiness {
            if self.fail_readiness {
                return Readiness::Failed("quota exceeded".to_string());
            }
            let remaining = self.pending_polls.load(Ordering::SeqCst);
            if remaining > 0 {
                self.pending_polls.store(remaining - 1, Ordering::SeqCst);
                Readiness::Pending("Creating".to_string())
            } else {
                Readiness::Ready
            }
        }
    }

    fn controller(fake: Arc<Fake>, timeouts: Timeouts) -> LifecycleController {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .build();
        let descriptor =
            ResourceDescriptor::new("test_widget", schema, "id", fake).with_timeouts(timeouts);
        LifecycleController::new(descriptor).with_poll(PollConfig {
            interval: Duration::from_millis(1),
        })
    }

    fn config(name: &str) -> Config {
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("name"), name)
            .unwrap();
        config
    }

    #[tokio::test]
    async fn create_waits_for_readiness() {
        let fake = Arc::new(Fake::default());
        fake.pending_polls.store(3, Ordering::SeqCst);
        let mut controller = controller(fake.clone(), Timeouts::default());

        let state = controller.create(&Context::new(), &config("x")).await.unwrap();

        assert_eq!(controller.state(), LifecycleState::Active);
        assert_eq!(state.attr("name").as_string(), Some("x"));
        assert_eq!(fake.pending_polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_timeout_is_fatal_and_keeps_id() {
        let fake = Arc::new(Fake::default());
        fake.pending_polls.store(u32::MAX, Ordering::SeqCst);
        let timeouts = Timeouts {
            create: Duration::from_millis(30),
            ..Timeouts::default()
        };
        let mut controller = controller(fake, timeouts);

        let err = controller
            .create(&Context::new(), &config("x"))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("manual intervention"));
        assert_eq!(controller.state(), LifecycleState::Error);
        assert!(controller.id().is_some());
    }

    #[tokio::test]
    async fn failed_readiness_moves_to_error() {
        let fake = Arc::new(Fake {
            fail_readiness: true,
            ..Fake::default()
        });
        let mut controller = controller(fake, Timeouts::default());

        let err = controller
            .create(&Context::new(), &config("x"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(controller.state(), LifecycleState::Error);
    }

    #[tokio::test]
    async fn validation_fails_before_any_remote_call() {
        let fake = Arc::new(Fake::default());
        let mut controller = controller(fake.clone(), Timeouts::default());

        let err = controller
            .apply(&Context::new(), &DynamicValue::object())
            .await
            .unwrap_err();

        assert!(err.violations().is_some());
        assert_eq!(fake.remote_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delete_of_absent_object_succeeds() {
        let fake = Arc::new(Fake::default());
        let ctx = Context::new();
        let mut controller = controller(fake, Timeouts::default()).with_id("w-404");

        controller.delete(&ctx).await.unwrap();

        assert_eq!(controller.state(), LifecycleState::Absent);
        assert!(controller.read(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn apply_is_idempotent() {
        let fake = Arc::new(Fake::default());
        let ctx = Context::new();
        let mut controller = controller(fake.clone(), Timeouts::default());

        let first = controller.apply(&ctx, &config("x")).await.unwrap();
        assert_eq!(first.action, ResourceAction::Create);

        let second = controller.apply(&ctx, &config("x")).await.unwrap();
        assert_eq!(second.action, ResourceAction::NoOp);
        assert_eq!(fake.remote_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_detects_out_of_band_deletion() {
        let fake = Arc::new(Fake::default());
        let ctx = Context::new();
        let mut controller = controller(fake.clone(), Timeouts::default());

        controller.create(&ctx, &config("x")).await.unwrap();
        let id = controller.id().unwrap().to_string();
        controller.destroy(&ctx, &id).await.unwrap();

        assert!(!controller.exists(&ctx, &id).await.unwrap());
        assert!(controller.read(&ctx).await.unwrap().is_none());
        assert_eq!(controller.state(), LifecycleState::Absent);

        // Next apply recreates it
        let result = controller.apply(&ctx, &config("x")).await.unwrap();
        assert_eq!(result.action, ResourceAction::Create);
    }

    #[tokio::test]
    async fn cancelled_context_reports_timeout() {
        let fake = Arc::new(Fake::default());
        fake.pending_polls.store(u32::MAX, Ordering::SeqCst);
        let ctx = Context::new();
        let mut controller = controller(fake, Timeouts::default());

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = controller.create(&ctx, &config("x")).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
