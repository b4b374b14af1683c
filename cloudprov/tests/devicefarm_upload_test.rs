//! Acceptance tests for cloudprov_devicefarm_upload

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

mod common;

use cloudprov::api::devicefarm::{CreateProjectRequest, CreateUploadRequest};
use cloudprov::api::DeviceFarmApi;
use cloudprov::resources::DeviceFarmUploadResource;
use common::{fast_poll, fast_retry, FakeDeviceFarm};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tfrecon::acctest::{Check, TestCase, TestStep};
use tfrecon::{
    AttrAction, AttributeDiff, Config, Context, Dynamic, LifecycleController, ResourceAction,
    ResourceOperations, TfreconError, UpdateRequest,
};

const PACKAGE: &str = "APPIUM_JAVA_TESTNG_TEST_PACKAGE";

async fn setup() -> (Arc<FakeDeviceFarm>, String) {
    let api = Arc::new(FakeDeviceFarm::default());
    let project = api
        .create_project(&CreateProjectRequest {
            name: "tf-acc-project".to_string(),
            default_job_timeout_minutes: None,
        })
        .await
        .unwrap();
    (api, project.arn)
}

fn upload_config(name: &str, project_arn: &str, upload_type: &str) -> Config {
    serde_json::from_value(json!({
        "name": name,
        "project_arn": project_arn,
        "type": upload_type,
    }))
    .unwrap()
}

fn case(api: &Arc<FakeDeviceFarm>) -> TestCase {
    TestCase::new(DeviceFarmUploadResource::descriptor(api.clone()))
        .poll(fast_poll())
        .retry(fast_retry())
        .check_destroy()
}

#[tokio::test]
async fn upload_basic() {
    let (api, project_arn) = setup().await;

    case(&api)
        .step(
            TestStep::config(upload_config("tf-acc-upload", &project_arn, PACKAGE))
                .expect_action(ResourceAction::Create)
                .check(Check::Exists)
                .check(Check::attr("name", "tf-acc-upload"))
                .check(Check::attr("type", PACKAGE))
                .check(Check::attr("project_arn", &project_arn))
                .check(Check::attr("category", "PRIVATE"))
                .check(Check::attr_matches(
                    "arn",
                    r"^arn:aws:devicefarm:us-west-2:123456789012:upload:[^/]+/.+$",
                ))
                .check(Check::attr_set("url"))
                .check(Check::attr_set("content_type")),
        )
        .step(TestStep::import(&["url"]))
        .run()
        .await
        .unwrap();

    assert_eq!(api.upload_count(), 0);
}

#[tokio::test]
async fn upload_rename_updates_in_place() {
    let (api, project_arn) = setup().await;

    case(&api)
        .step(TestStep::config(upload_config("tf-acc-upload", &project_arn, PACKAGE)))
        .step(
            TestStep::config(upload_config("tf-acc-upload-renamed", &project_arn, PACKAGE))
                .expect_action(ResourceAction::Update)
                .check(Check::attr("name", "tf-acc-upload-renamed")),
        )
        .run()
        .await
        .unwrap();

    assert_eq!(api.update_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upload_type_change_forces_replacement() {
    let (api, project_arn) = setup().await;

    case(&api)
        .step(TestStep::config(upload_config("tf-acc-upload", &project_arn, PACKAGE)))
        .step(
            TestStep::config(upload_config(
                "tf-acc-upload",
                &project_arn,
                "APPIUM_NODE_TEST_PACKAGE",
            ))
            .expect_action(ResourceAction::Replace)
            .check(Check::attr("type", "APPIUM_NODE_TEST_PACKAGE")),
        )
        .run()
        .await
        .unwrap();

    assert_eq!(api.update_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_disappears() {
    let (api, project_arn) = setup().await;

    case(&api)
        .step(
            TestStep::config(upload_config("tf-acc-upload", &project_arn, PACKAGE))
                .check(Check::Exists)
                .check(Check::Disappears)
                .expect_non_empty_plan(),
        )
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn upload_disappears_with_project() {
    let (api, project_arn) = setup().await;

    let remover = api.clone();
    let project = project_arn.clone();
    case(&api)
        .step(
            TestStep::config(upload_config("tf-acc-upload", &project_arn, PACKAGE))
                .check(Check::Exists)
                .check(Check::action(move |_ctx, _state| {
                    let api = remover.clone();
                    let project = project.clone();
                    async move {
                        api.delete_project(&project)
                            .await
                            .map_err(TfreconError::from)
                    }
                }))
                .expect_non_empty_plan(),
        )
        .run()
        .await
        .unwrap();

    assert_eq!(api.upload_count(), 0);
}

#[tokio::test]
async fn upload_rejects_unknown_type_without_remote_calls() {
    let (api, project_arn) = setup().await;

    case(&api)
        .step(
            TestStep::config(upload_config("tf-acc-upload", &project_arn, "ZIP"))
                .expect_error(r"Invalid configuration: .*expected one of"),
        )
        .run()
        .await
        .unwrap();

    assert_eq!(api.upload_count(), 0);
}

#[tokio::test]
async fn upload_in_missing_project_fails() {
    let (api, _) = setup().await;
    let missing = "arn:aws:devicefarm:us-west-2:123456789012:project:missing";

    case(&api)
        .step(
            TestStep::config(upload_config("tf-acc-upload", missing, PACKAGE))
                .expect_error("not found"),
        )
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn upload_import_existing_derives_project() {
    let (api, project_arn) = setup().await;
    let upload = api
        .create_upload(&CreateUploadRequest {
            project_arn: project_arn.clone(),
            name: "tf-acc-upload".to_string(),
            upload_type: PACKAGE.to_string(),
            content_type: None,
        })
        .await
        .unwrap();

    let ctx = Context::new();
    let mut controller = LifecycleController::new(DeviceFarmUploadResource::descriptor(api.clone()))
        .with_poll(fast_poll())
        .with_retry(fast_retry());
    let state = controller.import(&ctx, &upload.arn).await.unwrap();

    assert_eq!(state.attr("arn"), &Dynamic::string(&upload.arn));
    assert_eq!(state.attr("project_arn"), &Dynamic::string(&project_arn));
    assert_eq!(state.attr("type"), &Dynamic::string(PACKAGE));

    let diff = controller
        .plan(&ctx, &upload_config("tf-acc-upload", &project_arn, PACKAGE))
        .await
        .unwrap();
    assert!(diff.is_empty(), "unexpected changes: {:?}", diff.changes);
}

#[tokio::test]
async fn upload_numeric_name_is_sent_as_string() {
    let (api, project_arn) = setup().await;

    let config: Config = serde_json::from_value(json!({
        "name": 123,
        "project_arn": project_arn,
        "type": PACKAGE,
    }))
    .unwrap();

    case(&api)
        .step(
            TestStep::config(config)
                .expect_action(ResourceAction::Create)
                .check(Check::attr("name", "123")),
        )
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn upload_update_rejects_replace_only_attribute() {
    let (api, project_arn) = setup().await;
    let upload = api
        .create_upload(&CreateUploadRequest {
            project_arn: project_arn.clone(),
            name: "tf-acc-upload".to_string(),
            upload_type: PACKAGE.to_string(),
            content_type: None,
        })
        .await
        .unwrap();

    let resource = DeviceFarmUploadResource::new(api.clone());
    let err = resource
        .update(
            Context::new(),
            UpdateRequest {
                type_name: "cloudprov_devicefarm_upload".to_string(),
                id: upload.arn.clone(),
                config: upload_config("tf-acc-upload", &project_arn, "APPIUM_NODE_TEST_PACKAGE"),
                prior_state: upload_config("tf-acc-upload", &project_arn, PACKAGE),
                changes: vec![AttributeDiff {
                    attribute: "type".to_string(),
                    old: Dynamic::string(PACKAGE),
                    new: Dynamic::string("APPIUM_NODE_TEST_PACKAGE"),
                    action: AttrAction::Replace,
                }],
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TfreconError::InvalidState(_)));
    assert!(err.to_string().contains("type cannot be changed in place"));
    assert_eq!(api.update_calls.load(Ordering::SeqCst), 0);
}
