//! Device farm projects and uploads

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::Client;
use super::error::ApiError;

pub const SERVICE: &str = "DeviceFarm_20150623";

/// Upload types accepted by CreateUpload
pub const UPLOAD_TYPES: &[&str] = &[
    "ANDROID_APP",
    "IOS_APP",
    "WEB_APP",
    "EXTERNAL_DATA",
    "APPIUM_JAVA_JUNIT_TEST_PACKAGE",
    "APPIUM_JAVA_TESTNG_TEST_PACKAGE",
    "APPIUM_PYTHON_TEST_PACKAGE",
    "APPIUM_NODE_TEST_PACKAGE",
    "APPIUM_RUBY_TEST_PACKAGE",
    "APPIUM_WEB_JAVA_JUNIT_TEST_PACKAGE",
    "APPIUM_WEB_JAVA_TESTNG_TEST_PACKAGE",
    "APPIUM_WEB_PYTHON_TEST_PACKAGE",
    "APPIUM_WEB_NODE_TEST_PACKAGE",
    "APPIUM_WEB_RUBY_TEST_PACKAGE",
    "INSTRUMENTATION_TEST_PACKAGE",
    "XCTEST_TEST_PACKAGE",
    "XCTEST_UI_TEST_PACKAGE",
    "APPIUM_JAVA_JUNIT_TEST_SPEC",
    "APPIUM_JAVA_TESTNG_TEST_SPEC",
    "APPIUM_PYTHON_TEST_SPEC",
    "APPIUM_NODE_TEST_SPEC",
    "APPIUM_RUBY_TEST_SPEC",
    "APPIUM_WEB_JAVA_JUNIT_TEST_SPEC",
    "APPIUM_WEB_JAVA_TESTNG_TEST_SPEC",
    "APPIUM_WEB_PYTHON_TEST_SPEC",
    "APPIUM_WEB_NODE_TEST_SPEC",
    "APPIUM_WEB_RUBY_TEST_SPEC",
    "INSTRUMENTATION_TEST_SPEC",
    "XCTEST_UI_TEST_SPEC",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub arn: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub upload_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub arn: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_job_timeout_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadRequest {
    pub project_arn: String,
    pub name: String,
    #[serde(rename = "type")]
    pub upload_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUploadRequest {
    pub arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_content: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_job_timeout_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ArnRequest<'a> {
    arn: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload: Upload,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    project: Project,
}

#[derive(Debug, Deserialize)]
struct EmptyResponse {}

/// Device farm operations used by the provider
#[async_trait]
pub trait DeviceFarmApi: Send + Sync {
    async fn create_upload(&self, request: &CreateUploadRequest) -> Result<Upload, ApiError>;
    async fn get_upload(&self, arn: &str) -> Result<Upload, ApiError>;
    async fn update_upload(&self, request: &UpdateUploadRequest) -> Result<Upload, ApiError>;
    async fn delete_upload(&self, arn: &str) -> Result<(), ApiError>;

    async fn create_project(&self, request: &CreateProjectRequest) -> Result<Project, ApiError>;
    async fn get_project(&self, arn: &str) -> Result<Project, ApiError>;
    /// Removes the project together with its uploads
    async fn delete_project(&self, arn: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl DeviceFarmApi for Client {
    async fn create_upload(&self, request: &CreateUploadRequest) -> Result<Upload, ApiError> {
        let response: UploadResponse = self.call(SERVICE, "CreateUpload", request).await?;
        Ok(response.upload)
    }

    async fn get_upload(&self, arn: &str) -> Result<Upload, ApiError> {
        let response: UploadResponse = self.call(SERVICE, "GetUpload", &ArnRequest { arn }).await?;
        Ok(response.upload)
    }

    async fn update_upload(&self, request: &UpdateUploadRequest) -> Result<Upload, ApiError> {
        let response: UploadResponse = self.call(SERVICE, "UpdateUpload", request).await?;
        Ok(response.upload)
    }

    async fn delete_upload(&self, arn: &str) -> Result<(), ApiError> {
        let _: EmptyResponse = self
            .call(SERVICE, "DeleteUpload", &ArnRequest { arn })
            .await?;
        Ok(())
    }

    async fn create_project(&self, request: &CreateProjectRequest) -> Result<Project, ApiError> {
        let response: ProjectResponse = self.call(SERVICE, "CreateProject", request).await?;
        Ok(response.project)
    }

    async fn get_project(&self, arn: &str) -> Result<Project, ApiError> {
        let response: ProjectResponse =
            self.call(SERVICE, "GetProject", &ArnRequest { arn }).await?;
        Ok(response.project)
    }

    async fn delete_project(&self, arn: &str) -> Result<(), ApiError> {
        let _: EmptyResponse = self
            .call(SERVICE, "DeleteProject", &ArnRequest { arn })
            .await?;
        Ok(())
    }
}
