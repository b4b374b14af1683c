//! Acceptance test harness
//!
//! Drives a resource type through a sequence of configurations the way a
//! user would: apply, check the observed state, re-plan to make sure nothing
//! drifts, optionally import and compare, and finally destroy.
//!
//! ```no_run
//! # use tfrecon::acctest::{Check, TestCase, TestStep};
//! # async fn example(descriptor: tfrecon::resource::ResourceDescriptor, config: tfrecon::Config) {
//! TestCase::new(descriptor)
//!     .check_destroy()
//!     .step(
//!         TestStep::config(config)
//!             .check(Check::Exists)
//!             .check(Check::attr("name", "x")),
//!     )
//!     .step(TestStep::import(&["url"]))
//!     .run()
//!     .await
//!     .unwrap();
//! # }
//! ```

use crate::context::Context;
use crate::diff::ResourceAction;
use crate::error::{Result, TfreconError};
use crate::lifecycle::{LifecycleController, PollConfig};
use crate::resource::ResourceDescriptor;
use crate::retry::RetryPolicy;
use crate::types::{Config, State};
use regex::Regex;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type CheckFn = Arc<dyn Fn(&State) -> std::result::Result<(), String> + Send + Sync>;

pub type ActionFn = Arc<
    dyn Fn(Context, State) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync,
>;

/// Assertion run against the observed state after a step is applied.
/// Attribute keys use the flattened form: `list.#`, `list.0.attr`, `map.%`.
#[derive(Clone)]
pub enum Check {
    /// The object exists remotely
    Exists,
    Attr(String, String),
    /// Present and non-empty
    AttrSet(String),
    AttrAbsent(String),
    AttrMatches(String, String),
    /// Number of elements of a list, set or map; zero also accepts absence
    AttrCount(String, usize),
    Custom(CheckFn),
    /// Any async side effect, such as removing a dependency out of band
    Action(ActionFn),
    /// Removes the object out of band
    Disappears,
}

impl Check {
    pub fn attr(key: &str, value: &str) -> Self {
        Check::Attr(key.to_string(), value.to_string())
    }

    pub fn attr_set(key: &str) -> Self {
        Check::AttrSet(key.to_string())
    }

    pub fn attr_absent(key: &str) -> Self {
        Check::AttrAbsent(key.to_string())
    }

    pub fn attr_matches(key: &str, pattern: &str) -> Self {
        Check::AttrMatches(key.to_string(), pattern.to_string())
    }

    pub fn attr_count(key: &str, count: usize) -> Self {
        Check::AttrCount(key.to_string(), count)
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&State) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Check::Custom(Arc::new(f))
    }

    pub fn action<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, State) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Check::Action(Arc::new(
            move |ctx: Context, state: State| -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
                Box::pin(f(ctx, state))
            },
        ))
    }

    fn describe(&self) -> String {
        match self {
            Check::Exists => "exists".to_string(),
            Check::Attr(k, v) => format!("{} = {:?}", k, v),
            Check::AttrSet(k) => format!("{} is set", k),
            Check::AttrAbsent(k) => format!("{} is absent", k),
            Check::AttrMatches(k, p) => format!("{} matches {:?}", k, p),
            Check::AttrCount(k, n) => format!("{} has {} elements", k, n),
            Check::Custom(_) => "custom check".to_string(),
            Check::Action(_) => "action".to_string(),
            Check::Disappears => "disappears".to_string(),
        }
    }
}

/// One configuration applied during a test case
#[derive(Clone, Default)]
pub struct TestStep {
    pub config: Option<Config>,
    pub checks: Vec<Check>,
    /// Pattern the apply error must match; the step then expects failure
    pub expect_error: Option<String>,
    /// The re-plan after the checks must show changes
    pub expect_non_empty_plan: bool,
    pub expect_action: Option<ResourceAction>,
    pub import_state_verify: bool,
    /// Flattened key prefixes excluded from import verification
    pub import_ignore: Vec<String>,
}

impl TestStep {
    pub fn config(config: Config) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// Imports the object created by the previous step and compares it with
    /// the state that step observed
    pub fn import(ignore: &[&str]) -> Self {
        Self {
            import_state_verify: true,
            import_ignore: ignore.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn expect_error(mut self, pattern: &str) -> Self {
        self.expect_error = Some(pattern.to_string());
        self
    }

    pub fn expect_non_empty_plan(mut self) -> Self {
        self.expect_non_empty_plan = true;
        self
    }

    pub fn expect_action(mut self, action: ResourceAction) -> Self {
        self.expect_action = Some(action);
        self
    }
}

pub struct TestCase {
    descriptor: ResourceDescriptor,
    steps: Vec<TestStep>,
    check_destroy: bool,
    poll: PollConfig,
    retry: RetryPolicy,
}

fn failure(step: usize, message: impl std::fmt::Display) -> TfreconError {
    TfreconError::Custom(format!("step {}: {}", step + 1, message))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| TfreconError::Custom(format!("invalid pattern {:?}: {}", pattern, e)))
}

impl TestCase {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            steps: Vec::new(),
            check_destroy: false,
            poll: PollConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    /// After the last step, every object created must be gone
    pub fn check_destroy(mut self) -> Self {
        self.check_destroy = true;
        self
    }

    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn controller(&self) -> LifecycleController {
        LifecycleController::new(self.descriptor.clone())
            .with_poll(self.poll.clone())
            .with_retry(self.retry.clone())
    }

    /// Runs every step, then destroys what was created even when a step
    /// failed. The first failure is returned.
    pub async fn run(self) -> Result<()> {
        let ctx = Context::new();
        let mut controller = self.controller();
        let mut created: Vec<String> = Vec::new();

        let outcome = self.run_steps(&ctx, &mut controller, &mut created).await;

        let destroyed = controller.delete(&ctx).await;
        let outcome = outcome.and(destroyed);

        if outcome.is_ok() && self.check_destroy {
            for id in &created {
                if controller.exists(&ctx, id).await? {
                    return Err(TfreconError::Custom(format!(
                        "{} {} still exists after destroy",
                        self.descriptor.type_name, id
                    )));
                }
            }
        }

        outcome
    }

    async fn run_steps(
        &self,
        ctx: &Context,
        controller: &mut LifecycleController,
        created: &mut Vec<String>,
    ) -> Result<()> {
        let mut last_state: Option<State> = None;

        for (i, step) in self.steps.iter().enumerate() {
            tracing::info!("{} step {}", self.descriptor.type_name, i + 1);

            let Some(config) = &step.config else {
                if step.import_state_verify {
                    let Some(state) = &last_state else {
                        return Err(failure(i, "import requires a previous step"));
                    };
                    self.verify_import(ctx, i, step, state).await?;
                }
                continue;
            };

            let result = controller.apply(ctx, config).await;
            let applied = match (result, &step.expect_error) {
                (Err(e), Some(pattern)) => {
                    let re = compile(pattern)?;
                    if re.is_match(&e.to_string()) {
                        continue;
                    }
                    return Err(failure(
                        i,
                        format!("expected error matching {:?}, got: {}", pattern, e),
                    ));
                }
                (Ok(_), Some(pattern)) => {
                    return Err(failure(
                        i,
                        format!("expected error matching {:?}, apply succeeded", pattern),
                    ));
                }
                (Err(e), None) => return Err(failure(i, e)),
                (Ok(applied), None) => applied,
            };

            if let Some(expected) = step.expect_action {
                if applied.action != expected {
                    return Err(failure(
                        i,
                        format!("expected {} but planned {}", expected, applied.action),
                    ));
                }
            }

            if let Some(id) = controller.id() {
                if !created.iter().any(|c| c == id) {
                    created.push(id.to_string());
                }
            }

            let state = applied.state;
            self.run_checks(ctx, i, controller, step, &state).await?;

            let replan = controller.plan(ctx, config).await.map_err(|e| failure(i, e))?;
            match (step.expect_non_empty_plan, replan.is_empty()) {
                (true, true) => {
                    return Err(failure(i, "expected a non-empty plan after apply"));
                }
                (false, false) => {
                    return Err(failure(
                        i,
                        format!(
                            "plan not empty after apply: {} of {:?}",
                            replan.action,
                            replan.changed_attributes()
                        ),
                    ));
                }
                _ => {}
            }

            if step.import_state_verify {
                self.verify_import(ctx, i, step, &state).await?;
            }
            last_state = controller.observed().cloned().or(Some(state));
        }

        Ok(())
    }

    async fn run_checks(
        &self,
        ctx: &Context,
        i: usize,
        controller: &LifecycleController,
        step: &TestStep,
        state: &State,
    ) -> Result<()> {
        let flat = state.flatten();
        let id = controller
            .id()
            .map(|s| s.to_string())
            .ok_or_else(|| failure(i, "no identifier after apply"))?;

        for check in &step.checks {
            let outcome: std::result::Result<(), String> = match check {
                Check::Exists => match controller.exists(ctx, &id).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(format!("{} not found", id)),
                    Err(e) => Err(e.to_string()),
                },
                Check::Attr(key, expected) => match flat.get(key) {
                    Some(actual) if actual == expected => Ok(()),
                    Some(actual) => Err(format!("got {:?}", actual)),
                    None => Err("attribute not set".to_string()),
                },
                Check::AttrSet(key) => match flat.get(key) {
                    Some(v) if !v.is_empty() => Ok(()),
                    _ => Err("attribute not set".to_string()),
                },
                Check::AttrAbsent(key) => match flat.get(key) {
                    None => Ok(()),
                    Some(v) => Err(format!("got {:?}", v)),
                },
                Check::AttrMatches(key, pattern) => {
                    let re = compile(pattern)?;
                    match flat.get(key) {
                        Some(v) if re.is_match(v) => Ok(()),
                        Some(v) => Err(format!("got {:?}", v)),
                        None => Err("attribute not set".to_string()),
                    }
                }
                Check::AttrCount(key, expected) => count(&flat, key, *expected),
                Check::Custom(f) => (**f)(state),
                Check::Action(f) => (**f)(ctx.clone(), state.clone())
                    .await
                    .map_err(|e| e.to_string()),
                Check::Disappears => controller.destroy(ctx, &id).await.map_err(|e| e.to_string()),
            };

            outcome.map_err(|message| failure(i, format!("check {} failed: {}", check.describe(), message)))?;
        }

        Ok(())
    }

    async fn verify_import(&self, ctx: &Context, i: usize, step: &TestStep, state: &State) -> Result<()> {
        let id = self
            .descriptor
            .id_of(state)
            .ok_or_else(|| failure(i, "applied state has no identifier"))?;

        let mut importer = self.controller();
        let imported = importer.import(ctx, &id).await.map_err(|e| failure(i, e))?;

        let ignored = |key: &str| step.import_ignore.iter().any(|p| key.starts_with(p.as_str()));
        let expected: BTreeMap<String, String> =
            state.flatten().into_iter().filter(|(k, _)| !ignored(k.as_str())).collect();
        let actual: BTreeMap<String, String> =
            imported.flatten().into_iter().filter(|(k, _)| !ignored(k.as_str())).collect();

        if expected != actual {
            let mut differences = Vec::new();
            for key in expected.keys().chain(actual.keys()) {
                if expected.get(key) != actual.get(key) && !differences.contains(key) {
                    differences.push(key.clone());
                }
            }
            return Err(failure(
                i,
                format!("imported state differs at {:?}", differences),
            ));
        }
        Ok(())
    }
}

fn count(flat: &BTreeMap<String, String>, key: &str, expected: usize) -> std::result::Result<(), String> {
    let actual = flat
        .get(&format!("{}.#", key))
        .or_else(|| flat.get(&format!("{}.%", key)));
    match actual {
        None if expected == 0 => Ok(()),
        None => Err("attribute not set".to_string()),
        Some(n) if n == &expected.to_string() => Ok(()),
        Some(n) => Err(format!("got {}", n)),
    }
}
