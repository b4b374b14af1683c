//! In-memory control planes for acceptance tests

#![allow(dead_code)]

use async_trait::async_trait;
use cloudprov::api::devicefarm::{
    CreateProjectRequest, CreateUploadRequest, Project, UpdateUploadRequest, Upload,
};
use cloudprov::api::sagemaker::{CreateEndpointConfigRequest, EndpointConfig};
use cloudprov::api::{ApiError, DeviceFarmApi, ErrorBody, SageMakerApi};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tfrecon::{PollConfig, RetryPolicy};

pub const REGION: &str = "us-west-2";
pub const ACCOUNT: &str = "123456789012";

/// Poll and retry settings that keep acceptance tests fast
pub fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(10),
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 10,
    }
}

fn not_found(what: &str, id: &str) -> ApiError {
    ApiError::NotFound {
        code: "NotFoundException".to_string(),
        message: format!("{} {} not found", what, id),
    }
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Default)]
pub struct FakeDeviceFarm {
    projects: Mutex<HashMap<String, Project>>,
    uploads: Mutex<HashMap<String, Upload>>,
    pub update_calls: AtomicU32,
}

impl FakeDeviceFarm {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceFarmApi for FakeDeviceFarm {
    async fn create_upload(&self, request: &CreateUploadRequest) -> Result<Upload, ApiError> {
        if !self.projects.lock().unwrap().contains_key(&request.project_arn) {
            return Err(not_found("project", &request.project_arn));
        }

        let project_id = request
            .project_arn
            .rsplit(':')
            .next()
            .unwrap_or_default()
            .to_string();
        let arn = format!(
            "arn:aws:devicefarm:{}:{}:upload:{}/{}",
            REGION,
            ACCOUNT,
            project_id,
            fresh_id()
        );
        let upload = Upload {
            arn: arn.clone(),
            name: request.name.clone(),
            upload_type: request.upload_type.clone(),
            status: Some("INITIALIZED".to_string()),
            url: Some(format!("https://uploads.example.com/{}?signature=abc", fresh_id())),
            metadata: None,
            content_type: Some(
                request
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            ),
            category: Some("PRIVATE".to_string()),
            message: None,
        };
        self.uploads.lock().unwrap().insert(arn, upload.clone());
        Ok(upload)
    }

    async fn get_upload(&self, arn: &str) -> Result<Upload, ApiError> {
        self.uploads
            .lock()
            .unwrap()
            .get(arn)
            .cloned()
            .ok_or_else(|| not_found("upload", arn))
    }

    async fn update_upload(&self, request: &UpdateUploadRequest) -> Result<Upload, ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(&request.arn)
            .ok_or_else(|| not_found("upload", &request.arn))?;
        if let Some(name) = &request.name {
            upload.name = name.clone();
        }
        if let Some(content_type) = &request.content_type {
            upload.content_type = Some(content_type.clone());
        }
        Ok(upload.clone())
    }

    async fn delete_upload(&self, arn: &str) -> Result<(), ApiError> {
        self.uploads
            .lock()
            .unwrap()
            .remove(arn)
            .map(|_| ())
            .ok_or_else(|| not_found("upload", arn))
    }

    async fn create_project(&self, request: &CreateProjectRequest) -> Result<Project, ApiError> {
        let arn = format!(
            "arn:aws:devicefarm:{}:{}:project:{}",
            REGION,
            ACCOUNT,
            fresh_id()
        );
        let project = Project {
            arn: arn.clone(),
            name: request.name.clone(),
            default_job_timeout_minutes: request.default_job_timeout_minutes.or(Some(150)),
        };
        self.projects.lock().unwrap().insert(arn, project.clone());
        Ok(project)
    }

    async fn get_project(&self, arn: &str) -> Result<Project, ApiError> {
        self.projects
            .lock()
            .unwrap()
            .get(arn)
            .cloned()
            .ok_or_else(|| not_found("project", arn))
    }

    async fn delete_project(&self, arn: &str) -> Result<(), ApiError> {
        if self.projects.lock().unwrap().remove(arn).is_none() {
            return Err(not_found("project", arn));
        }
        let prefix = format!("{}/", arn.replacen(":project:", ":upload:", 1));
        self.uploads
            .lock()
            .unwrap()
            .retain(|upload_arn, _| !upload_arn.starts_with(&prefix));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSageMaker {
    configs: Mutex<HashMap<String, EndpointConfig>>,
    tags: Mutex<HashMap<String, HashMap<String, String>>>,
    pub create_calls: AtomicU32,
    pub tag_calls: AtomicU32,
}

impl FakeSageMaker {
    pub fn last_tags(&self, arn: &str) -> HashMap<String, String> {
        self.tags
            .lock()
            .unwrap()
            .get(arn)
            .cloned()
            .unwrap_or_default()
    }
}

fn missing_config(name: &str) -> ApiError {
    let body: ErrorBody = serde_json::from_value(serde_json::json!({
        "__type": "ValidationException",
        "Message": format!("Could not find endpoint configuration \"{}\".", name),
    }))
    .unwrap();
    ApiError::from_response(400, body)
}

#[async_trait]
impl SageMakerApi for FakeSageMaker {
    async fn create_endpoint_config(
        &self,
        request: &CreateEndpointConfigRequest,
    ) -> Result<String, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let name = request.endpoint_config_name.clone();
        let mut configs = self.configs.lock().unwrap();
        if configs.contains_key(&name) {
            let body: ErrorBody = serde_json::from_value(serde_json::json!({
                "__type": "ValidationException",
                "Message": format!("Cannot create already existing endpoint configuration \"{}\".", name),
            }))
            .unwrap();
            return Err(ApiError::from_response(400, body));
        }

        let arn = format!(
            "arn:aws:sagemaker:{}:{}:endpoint-config/{}",
            REGION,
            ACCOUNT,
            name.to_lowercase()
        );

        let settle = |mut variant: cloudprov::api::sagemaker::ProductionVariant| {
            if variant.initial_variant_weight.is_none() && variant.serverless_config.is_none() {
                variant.initial_variant_weight = Some(1.0);
            }
            variant
        };

        let config = EndpointConfig {
            endpoint_config_name: name.clone(),
            endpoint_config_arn: arn.clone(),
            production_variants: request
                .production_variants
                .iter()
                .cloned()
                .map(settle)
                .collect(),
            shadow_production_variants: request
                .shadow_production_variants
                .iter()
                .cloned()
                .map(settle)
                .collect(),
            data_capture_config: request.data_capture_config.clone(),
            async_inference_config: request.async_inference_config.clone().map(|mut c| {
                if let Some(client) = c.client_config.as_mut() {
                    client
                        .max_concurrent_invocations_per_instance
                        .get_or_insert(4);
                }
                c
            }),
            kms_key_id: request.kms_key_id.clone(),
        };
        configs.insert(name, config);

        let tags: HashMap<String, String> = request
            .tags
            .iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect();
        self.tags.lock().unwrap().insert(arn.clone(), tags);
        Ok(arn)
    }

    async fn describe_endpoint_config(&self, name: &str) -> Result<EndpointConfig, ApiError> {
        self.configs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| missing_config(name))
    }

    async fn delete_endpoint_config(&self, name: &str) -> Result<(), ApiError> {
        let config = self
            .configs
            .lock()
            .unwrap()
            .remove(name)
            .ok_or_else(|| missing_config(name))?;
        self.tags
            .lock()
            .unwrap()
            .remove(&config.endpoint_config_arn);
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> Result<HashMap<String, String>, ApiError> {
        Ok(self.last_tags(arn))
    }

    async fn add_tags(&self, arn: &str, tags: &HashMap<String, String>) -> Result<(), ApiError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        let mut all = self.tags.lock().unwrap();
        let entry = all.entry(arn.to_string()).or_default();
        entry.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn delete_tags(&self, arn: &str, keys: &[String]) -> Result<(), ApiError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(existing) = self.tags.lock().unwrap().get_mut(arn) {
            for key in keys {
                existing.remove(key);
            }
        }
        Ok(())
    }
}
