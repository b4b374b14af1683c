//! End-to-end reconciliation of an in-memory widget service

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tfrecon::acctest::{Check, TestCase, TestStep};
use tfrecon::validator::OneOfValidator;
use tfrecon::{
    AttributeBuilder, AttributePath, AttributeType, BlockBuilder, ConfigConstraint, Context,
    CreateRequest, CreateResponse, DeleteRequest, DynamicValue, LifecycleController, NestedBlock,
    NestingMode, Operation, PollConfig, ResourceAction, ResourceDescriptor, ResourceOperations,
    Result, RetryPolicy, Schema, SchemaBuilder, State, TfreconError, UpdateRequest, ViolationKind,
};

#[derive(Default)]
struct WidgetService {
    widgets: Mutex<HashMap<String, State>>,
    next_id: AtomicU32,
    creates: AtomicU32,
    updates: AtomicU32,
    deletes: AtomicU32,
    throttle_next: AtomicU32,
}

impl WidgetService {
    fn throttled(&self) -> bool {
        let remaining = self.throttle_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.throttle_next.store(remaining - 1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn remote_calls(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceOperations for WidgetService {
    async fn create(&self, _ctx: Context, request: CreateRequest) -> Result<CreateResponse> {
        if self.throttled() {
            return Err(TfreconError::Throttled("rate exceeded".to_string()));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);

        let id = format!("widget-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut state = request.config.clone();
        state.set_string(&AttributePath::new("id"), id.clone())?;
        state.set_string(
            &AttributePath::new("url"),
            format!("https://widgets.example.com/{}", id),
        )?;
        self.widgets.lock().unwrap().insert(id.clone(), state);
        Ok(CreateResponse { id })
    }

    async fn find(&self, _ctx: Context, id: &str) -> Result<Option<State>> {
        if self.throttled() {
            return Err(TfreconError::Throttled("rate exceeded".to_string()));
        }
        Ok(self.widgets.lock().unwrap().get(id).cloned())
    }

    async fn update(&self, _ctx: Context, request: UpdateRequest) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut widgets = self.widgets.lock().unwrap();
        let widget = widgets
            .get_mut(&request.id)
            .ok_or_else(|| TfreconError::not_found("test_widget", &request.id))?;
        for change in request.changes {
            widget.set_value(&AttributePath::new(&change.attribute), change.new)?;
        }
        Ok(())
    }

    async fn delete(&self, _ctx: Context, request: DeleteRequest) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        match self.widgets.lock().unwrap().remove(&request.id) {
            Some(_) => Ok(()),
            None => Err(TfreconError::not_found("test_widget", request.id)),
        }
    }
}

fn widget_schema() -> Schema {
    let sizing = |name: &str, attr: &str| {
        NestedBlock::new(
            name,
            NestingMode::List,
            BlockBuilder::new()
                .attribute(
                    AttributeBuilder::new(attr, AttributeType::Number)
                        .required()
                        .build(),
                )
                .build(),
        )
        .max_items(1)
        .requires_replace()
    };

    SchemaBuilder::new()
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
        .attribute(
            AttributeBuilder::new("type", AttributeType::String)
                .required()
                .requires_replace()
                .validator(OneOfValidator::create(&["A", "B"]))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("url", AttributeType::String)
                .computed()
                .sensitive()
                .build(),
        )
        .block(sizing("instance", "count"))
        .block(sizing("serverless", "memory_size_in_mb"))
        .constraint(ConfigConstraint::ConflictsWith(vec![
            "instance".to_string(),
            "serverless".to_string(),
        ]))
        .build()
}

fn descriptor(service: Arc<WidgetService>) -> ResourceDescriptor {
    ResourceDescriptor::new("test_widget", widget_schema(), "id", service)
}

fn controller(service: Arc<WidgetService>) -> LifecycleController {
    LifecycleController::new(descriptor(service))
        .with_poll(PollConfig {
            interval: Duration::from_millis(1),
        })
        .with_retry(RetryPolicy {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        })
}

fn config(json: &str) -> DynamicValue {
    serde_json::from_str(json).unwrap()
}

#[tokio::test]
async fn create_read_then_rename_updates_in_place() {
    let service = Arc::new(WidgetService::default());
    let ctx = Context::new();
    let mut controller = controller(service.clone());

    let created = controller
        .apply(&ctx, &config(r#"{"name": "x", "type": "A"}"#))
        .await
        .unwrap();
    assert_eq!(created.action, ResourceAction::Create);

    let state = controller.read(&ctx).await.unwrap().unwrap();
    assert_eq!(state.attr("name").as_string(), Some("x"));
    assert_eq!(state.attr("type").as_string(), Some("A"));
    assert!(!state.attr("url").as_string().unwrap().is_empty());
    let id = controller.id().unwrap().to_string();

    let renamed = config(r#"{"name": "y", "type": "A"}"#);
    let diff = controller.plan(&ctx, &renamed).await.unwrap();
    let operations = tfrecon::plan(&diff);
    assert_eq!(operations.len(), 1);
    assert!(matches!(&operations[0], Operation::Update { changes } if changes.len() == 1));

    let updated = controller.apply(&ctx, &renamed).await.unwrap();
    assert_eq!(updated.action, ResourceAction::Update);
    assert_eq!(controller.id(), Some(id.as_str()));
    assert_eq!(service.updates.load(Ordering::SeqCst), 1);
    assert_eq!(service.deletes.load(Ordering::SeqCst), 0);

    let state = controller.read(&ctx).await.unwrap().unwrap();
    assert_eq!(state.attr("name").as_string(), Some("y"));
}

#[tokio::test]
async fn repeated_update_converges() {
    let service = Arc::new(WidgetService::default());
    let ctx = Context::new();
    let mut controller = controller(service.clone());

    controller
        .apply(&ctx, &config(r#"{"name": "x", "type": "A"}"#))
        .await
        .unwrap();

    let renamed = config(r#"{"name": "y", "type": "A"}"#);
    let first = controller.apply(&ctx, &renamed).await.unwrap();
    let second = controller.apply(&ctx, &renamed).await.unwrap();

    assert_eq!(second.action, ResourceAction::NoOp);
    assert_eq!(first.state, second.state);
    assert_eq!(service.updates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn changing_immutable_attribute_replaces() {
    let service = Arc::new(WidgetService::default());
    let ctx = Context::new();
    let mut controller = controller(service.clone());

    controller
        .apply(&ctx, &config(r#"{"name": "x", "type": "A"}"#))
        .await
        .unwrap();
    let old_id = controller.id().unwrap().to_string();

    let retyped = config(r#"{"name": "y", "type": "B"}"#);
    let diff = controller.plan(&ctx, &retyped).await.unwrap();
    assert_eq!(
        tfrecon::plan(&diff),
        vec![Operation::Delete, Operation::Create]
    );

    let result = controller.apply(&ctx, &retyped).await.unwrap();
    assert_eq!(result.action, ResourceAction::Replace);
    assert_ne!(controller.id(), Some(old_id.as_str()));
    assert!(!controller.exists(&ctx, &old_id).await.unwrap());
    assert_eq!(service.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mutually_exclusive_blocks_fail_before_remote_calls() {
    let service = Arc::new(WidgetService::default());
    let mut controller = controller(service.clone());

    let err = controller
        .apply(
            &Context::new(),
            &config(
                r#"{"name": "x", "type": "A",
                    "instance": [{"count": 1}],
                    "serverless": [{"memory_size_in_mb": 1024}]}"#,
            ),
        )
        .await
        .unwrap_err();

    let violations = err.violations().unwrap();
    assert!(violations
        .iter()
        .any(|v| v.kind == ViolationKind::MutuallyExclusive));
    assert_eq!(service.remote_calls(), 0);
}

#[tokio::test]
async fn delete_of_absent_widget_is_a_no_op() {
    let service = Arc::new(WidgetService::default());
    let ctx = Context::new();
    let mut controller = controller(service.clone());

    controller
        .apply(&ctx, &config(r#"{"name": "x", "type": "A"}"#))
        .await
        .unwrap();
    let id = controller.id().unwrap().to_string();

    controller.destroy(&ctx, &id).await.unwrap();
    tokio_test::assert_ok!(controller.delete(&ctx).await);
    assert!(controller.read(&ctx).await.unwrap().is_none());
}

#[tokio::test]
async fn throttling_is_retried_with_backoff() {
    let service = Arc::new(WidgetService::default());
    service.throttle_next.store(2, Ordering::SeqCst);
    let mut controller = controller(service.clone());

    let result = controller
        .apply(&Context::new(), &config(r#"{"name": "x", "type": "A"}"#))
        .await;

    tokio_test::assert_ok!(result);
    assert_eq!(service.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distinct_instances_reconcile_concurrently() {
    let service = Arc::new(WidgetService::default());

    let tasks = (0..8).map(|i| {
        let service = service.clone();
        async move {
            let mut controller = controller(service);
            controller
                .apply(
                    &Context::new(),
                    &config(&format!(r#"{{"name": "w{}", "type": "A"}}"#, i)),
                )
                .await
        }
    });

    let results = futures::future::join_all(tasks).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(service.widgets.lock().unwrap().len(), 8);
}

#[tokio::test]
async fn acceptance_harness_round_trip() {
    let service = Arc::new(WidgetService::default());

    TestCase::new(descriptor(service.clone()))
        .poll(PollConfig {
            interval: Duration::from_millis(1),
        })
        .check_destroy()
        .step(
            TestStep::config(config(r#"{"name": "x", "type": "A"}"#))
                .expect_action(ResourceAction::Create)
                .check(Check::Exists)
                .check(Check::attr("name", "x"))
                .check(Check::attr_matches("url", "^https://widgets.example.com/"))
                .check(Check::attr_count("instance", 0)),
        )
        .step(TestStep::import(&[]))
        .step(
            TestStep::config(config(r#"{"name": "y", "type": "A"}"#))
                .expect_action(ResourceAction::Update)
                .check(Check::attr("name", "y")),
        )
        .step(
            TestStep::config(config(r#"{"name": "y", "type": "C"}"#))
                .expect_error("expected one of \\[A, B\\]"),
        )
        .step(
            TestStep::config(config(r#"{"name": "y", "type": "A"}"#))
                .check(Check::Disappears)
                .expect_non_empty_plan(),
        )
        .run()
        .await
        .unwrap();

    assert!(service.widgets.lock().unwrap().is_empty());
}
