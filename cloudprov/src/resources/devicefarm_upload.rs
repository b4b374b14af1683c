//! Device farm upload resource
//!
//! Uploads live inside a project and are addressed by ARN. Only `name` and
//! `content_type` change in place; moving an upload to another project or
//! changing its type creates a new one.

use async_trait::async_trait;
use std::sync::Arc;
use tfrecon::validator::{ArnValidator, OneOfValidator, StringLengthValidator};
use tfrecon::{
    AttributeBuilder, AttributeType, Context, CreateRequest, CreateResponse, DeleteRequest,
    Dynamic, DynamicValue, ResourceDescriptor, ResourceOperations, Result, Schema,
    SchemaBuilder, State, TfreconError, UpdateRequest,
};

use super::{api_error, opt_string, string_field};
use crate::api::devicefarm::{CreateUploadRequest, UpdateUploadRequest, Upload, UPLOAD_TYPES};
use crate::api::DeviceFarmApi;

pub const TYPE_NAME: &str = "cloudprov_devicefarm_upload";

pub struct DeviceFarmUploadResource {
    api: Arc<dyn DeviceFarmApi>,
}

impl DeviceFarmUploadResource {
    pub fn new(api: Arc<dyn DeviceFarmApi>) -> Self {
        Self { api }
    }

    pub fn descriptor(api: Arc<dyn DeviceFarmApi>) -> ResourceDescriptor {
        ResourceDescriptor::new(TYPE_NAME, Self::schema(), "arn", Arc::new(Self::new(api)))
    }

    pub fn schema() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a device farm upload")
            .attribute(
                AttributeBuilder::new("arn", AttributeType::String)
                    .description("ARN of the upload")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("File name of the upload, including its extension")
                    .required()
                    .validator(StringLengthValidator::between(1, 256))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project_arn", AttributeType::String)
                    .description("ARN of the project the upload belongs to")
                    .required()
                    .requires_replace()
                    .validator(ArnValidator::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Upload type")
                    .required()
                    .requires_replace()
                    .validator(OneOfValidator::create(UPLOAD_TYPES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("content_type", AttributeType::String)
                    .description("MIME type of the uploaded content")
                    .optional()
                    .computed()
                    .validator(StringLengthValidator::at_most(64))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("category", AttributeType::String)
                    .description("PRIVATE for uploads owned by the account, CURATED otherwise")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .description("Pre-signed URL to upload the content to")
                    .computed()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("metadata", AttributeType::String)
                    .description("Metadata extracted from the upload once processed")
                    .computed()
                    .build(),
            )
            .build()
    }
}

/// Project ARN an upload ARN belongs to:
/// `arn:p:devicefarm:r:a:upload:PROJECT/UPLOAD` -> `arn:p:devicefarm:r:a:project:PROJECT`
pub fn project_arn_from_upload_arn(arn: &str) -> Option<String> {
    let (head, resource) = arn.rsplit_once(':')?;
    let head = head.strip_suffix(":upload")?;
    let (project_id, _) = resource.split_once('/')?;
    Some(format!("{}:project:{}", head, project_id))
}

fn upload_state(upload: &Upload) -> State {
    DynamicValue::new(Dynamic::object([
        ("arn", Dynamic::string(&upload.arn)),
        ("name", Dynamic::string(&upload.name)),
        (
            "project_arn",
            opt_string(project_arn_from_upload_arn(&upload.arn).as_deref()),
        ),
        ("type", Dynamic::string(&upload.upload_type)),
        ("content_type", opt_string(upload.content_type.as_deref())),
        ("category", opt_string(upload.category.as_deref())),
        ("url", opt_string(upload.url.as_deref())),
        ("metadata", opt_string(upload.metadata.as_deref())),
    ]))
}

#[async_trait]
impl ResourceOperations for DeviceFarmUploadResource {
    async fn create(&self, _ctx: Context, request: CreateRequest) -> Result<CreateResponse> {
        let config = &request.config.value;
        let input = CreateUploadRequest {
            project_arn: string_field(config, "project_arn").unwrap_or_default(),
            name: string_field(config, "name").unwrap_or_default(),
            upload_type: string_field(config, "type").unwrap_or_default(),
            content_type: string_field(config, "content_type"),
        };

        tracing::debug!("Creating device farm upload {:?}", input);
        let upload = self
            .api
            .create_upload(&input)
            .await
            .map_err(|e| api_error(TYPE_NAME, &input.name, e))?;

        tracing::info!("Created device farm upload {}", upload.arn);
        Ok(CreateResponse { id: upload.arn })
    }

    async fn find(&self, _ctx: Context, id: &str) -> Result<Option<State>> {
        match self.api.get_upload(id).await {
            Ok(upload) => Ok(Some(upload_state(&upload))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(api_error(TYPE_NAME, id, e)),
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateRequest) -> Result<()> {
        let mut input = UpdateUploadRequest {
            arn: request.id.clone(),
            ..Default::default()
        };
        for change in &request.changes {
            match change.attribute.as_str() {
                "name" => input.name = change.new.as_string().map(str::to_string),
                "content_type" => input.content_type = change.new.as_string().map(str::to_string),
                other => {
                    return Err(TfreconError::InvalidState(format!(
                        "{} {}: {} cannot be changed in place",
                        TYPE_NAME, request.id, other
                    )))
                }
            }
        }

        if input.name.is_none() && input.content_type.is_none() {
            return Ok(());
        }

        self.api
            .update_upload(&input)
            .await
            .map_err(|e| api_error(TYPE_NAME, &request.id, e))?;
        Ok(())
    }

    async fn delete(&self, _ctx: Context, request: DeleteRequest) -> Result<()> {
        self.api
            .delete_upload(&request.id)
            .await
            .map_err(|e| api_error(TYPE_NAME, &request.id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfrecon::{AttributePath, ViolationKind};

    #[test]
    fn project_arn_is_derived_from_upload_arn() {
        assert_eq!(
            project_arn_from_upload_arn(
                "arn:aws:devicefarm:us-west-2:123456789012:upload:abc-123/def-456"
            )
            .as_deref(),
            Some("arn:aws:devicefarm:us-west-2:123456789012:project:abc-123")
        );
        assert_eq!(project_arn_from_upload_arn("arn:aws:devicefarm:us-west-2:1:project:p"), None);
    }

    #[test]
    fn schema_validates_type_and_project_arn() {
        let schema = DeviceFarmUploadResource::schema();
        let config: DynamicValue = serde_json::from_str(
            r#"{"name": "x", "project_arn": "not-an-arn", "type": "NOT_A_TYPE"}"#,
        )
        .unwrap();

        let violations = schema.validate(&config);
        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .all(|v| v.kind == ViolationKind::InvalidValue));
        assert!(violations
            .iter()
            .any(|v| v.path == AttributePath::new("project_arn")));
    }

    #[test]
    fn only_name_and_content_type_update_in_place() {
        let schema = DeviceFarmUploadResource::schema();
        let replaced: Vec<&str> = schema
            .block
            .attributes
            .iter()
            .filter(|a| a.requires_replace())
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(replaced, vec!["project_arn", "type"]);
    }

    #[test]
    fn presigned_url_is_redacted() {
        let state: State = serde_json::from_str(
            r#"{"arn": "arn:aws:devicefarm:us-west-2:1:upload:p/u", "name": "x",
                "url": "https://uploads.example.com/u?signature=abc"}"#,
        )
        .unwrap();

        let flat = DeviceFarmUploadResource::schema().redact(&state).flatten();
        assert_eq!(flat["url"], tfrecon::schema::REDACTED);
        assert_eq!(flat["name"], "x");
    }
}
