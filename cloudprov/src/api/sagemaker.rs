//! Model hosting endpoint configurations and resource tags

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::client::Client;
use super::error::ApiError;

pub const SERVICE: &str = "SageMaker";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductionVariant {
    #[serde(default)]
    pub variant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_instance_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_variant_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_ami_version: Option<String>,
    #[serde(rename = "VolumeSizeInGB", skip_serializing_if = "Option::is_none")]
    pub volume_size_in_gb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_data_download_timeout_in_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_startup_health_check_timeout_in_seconds: Option<i64>,
    #[serde(rename = "EnableSSMAccess", skip_serializing_if = "Option::is_none")]
    pub enable_ssm_access: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_dump_config: Option<CoreDumpConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serverless_config: Option<ServerlessConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_config: Option<RoutingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_instance_scaling: Option<ManagedInstanceScaling>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoreDumpConfig {
    pub destination_s3_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerlessConfig {
    pub max_concurrency: i64,
    #[serde(rename = "MemorySizeInMB")]
    pub memory_size_in_mb: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_concurrency: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoutingConfig {
    pub routing_strategy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedInstanceScaling {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_instance_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instance_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataCaptureConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_capture: Option<bool>,
    pub initial_sampling_percentage: i64,
    pub destination_s3_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub capture_options: Vec<CaptureOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_content_type_header: Option<CaptureContentTypeHeader>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaptureOption {
    pub capture_mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaptureContentTypeHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_content_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_content_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AsyncInferenceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_config: Option<AsyncInferenceClientConfig>,
    pub output_config: AsyncInferenceOutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AsyncInferenceClientConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_invocations_per_instance: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AsyncInferenceOutputConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_failure_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_config: Option<AsyncInferenceNotificationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AsyncInferenceNotificationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_inference_response_in: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointConfigRequest {
    pub endpoint_config_name: String,
    pub production_variants: Vec<ProductionVariant>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub shadow_production_variants: Vec<ProductionVariant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_capture_config: Option<DataCaptureConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_inference_config: Option<AsyncInferenceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointConfig {
    pub endpoint_config_name: String,
    pub endpoint_config_arn: String,
    #[serde(default)]
    pub production_variants: Vec<ProductionVariant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shadow_production_variants: Vec<ProductionVariant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_capture_config: Option<DataCaptureConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_inference_config: Option<AsyncInferenceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EndpointConfigNameRequest<'a> {
    endpoint_config_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateEndpointConfigResponse {
    endpoint_config_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AddTagsRequest<'a> {
    resource_arn: &'a str,
    tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteTagsRequest<'a> {
    resource_arn: &'a str,
    tag_keys: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListTagsRequest<'a> {
    resource_arn: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListTagsResponse {
    #[serde(default)]
    tags: Vec<Tag>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmptyResponse {}

pub fn tags_from_map(tags: &HashMap<String, String>) -> Vec<Tag> {
    let mut out: Vec<Tag> = tags
        .iter()
        .map(|(k, v)| Tag {
            key: k.clone(),
            value: v.clone(),
        })
        .collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

/// Model hosting operations used by the provider
#[async_trait]
pub trait SageMakerApi: Send + Sync {
    /// Returns the ARN of the new endpoint configuration
    async fn create_endpoint_config(
        &self,
        request: &CreateEndpointConfigRequest,
    ) -> Result<String, ApiError>;
    async fn describe_endpoint_config(&self, name: &str) -> Result<EndpointConfig, ApiError>;
    async fn delete_endpoint_config(&self, name: &str) -> Result<(), ApiError>;

    async fn list_tags(&self, arn: &str) -> Result<HashMap<String, String>, ApiError>;
    async fn add_tags(&self, arn: &str, tags: &HashMap<String, String>) -> Result<(), ApiError>;
    async fn delete_tags(&self, arn: &str, keys: &[String]) -> Result<(), ApiError>;
}

#[async_trait]
impl SageMakerApi for Client {
    async fn create_endpoint_config(
        &self,
        request: &CreateEndpointConfigRequest,
    ) -> Result<String, ApiError> {
        let response: CreateEndpointConfigResponse =
            self.call(SERVICE, "CreateEndpointConfig", request).await?;
        Ok(response.endpoint_config_arn)
    }

    async fn describe_endpoint_config(&self, name: &str) -> Result<EndpointConfig, ApiError> {
        self.call(
            SERVICE,
            "DescribeEndpointConfig",
            &EndpointConfigNameRequest {
                endpoint_config_name: name,
            },
        )
        .await
    }

    async fn delete_endpoint_config(&self, name: &str) -> Result<(), ApiError> {
        let _: EmptyResponse = self
            .call(
                SERVICE,
                "DeleteEndpointConfig",
                &EndpointConfigNameRequest {
                    endpoint_config_name: name,
                },
            )
            .await?;
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> Result<HashMap<String, String>, ApiError> {
        let mut tags = HashMap::new();
        let mut next_token = None;
        loop {
            let response: ListTagsResponse = self
                .call(
                    SERVICE,
                    "ListTags",
                    &ListTagsRequest {
                        resource_arn: arn,
                        next_token,
                    },
                )
                .await?;
            tags.extend(response.tags.into_iter().map(|t| (t.key, t.value)));
            match response.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }
        Ok(tags)
    }

    async fn add_tags(&self, arn: &str, tags: &HashMap<String, String>) -> Result<(), ApiError> {
        let _: EmptyResponse = self
            .call(
                SERVICE,
                "AddTags",
                &AddTagsRequest {
                    resource_arn: arn,
                    tags: tags_from_map(tags),
                },
            )
            .await?;
        Ok(())
    }

    async fn delete_tags(&self, arn: &str, keys: &[String]) -> Result<(), ApiError> {
        let _: EmptyResponse = self
            .call(
                SERVICE,
                "DeleteTags",
                &DeleteTagsRequest {
                    resource_arn: arn,
                    tag_keys: keys,
                },
            )
            .await?;
        Ok(())
    }
}
