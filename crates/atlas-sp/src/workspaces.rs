//! Stream Processing workspaces (formerly "instances") of a project.

use crate::client::AtlasClient;
use crate::error::ApiResult;
use crate::report::{Operation, OperationResult, OperationStatus};
use serde_json::{json, Value};

pub const DEFAULT_CLOUD_PROVIDER: &str = "AWS";
pub const DEFAULT_REGION: &str = "US_EAST_1";

impl AtlasClient {
    /// Raw list document of the project's workspaces.
    pub async fn list_workspaces(&self) -> ApiResult<Value> {
        let url = format!("{}/streams", self.project_url());
        self.get_json(&url, &[]).await
    }

    pub async fn workspace_details(&self, name: &str) -> ApiResult<Value> {
        let url = format!("{}/streams/{}", self.project_url(), name);
        self.get_json(&url, &[]).await
    }

    pub async fn create_workspace(
        &self,
        name: &str,
        cloud_provider: &str,
        region: &str,
    ) -> OperationResult {
        let url = format!("{}/streams", self.project_url());
        let payload = json!({
            "name": name,
            "dataProcessRegion": {
                "cloudProvider": cloud_provider,
                "region": region,
            },
        });

        match self.post_json(&url, &payload).await {
            Ok(()) => {
                tracing::info!(workspace = name, cloud_provider, region, "Created workspace");
                OperationResult::new(
                    name,
                    Operation::CreateWorkspace,
                    OperationStatus::Created,
                    "Stream Processing workspace created successfully",
                )
                .with_detail("cloud_provider", cloud_provider)
                .with_detail("region", region)
            }
            Err(e) if e.http_code() == Some(409) => OperationResult::new(
                name,
                Operation::CreateWorkspace,
                OperationStatus::AlreadyExists,
                "Stream Processing workspace already exists",
            ),
            Err(e) => OperationResult::failed(name, Operation::CreateWorkspace, &e),
        }
    }

    pub async fn delete_workspace(&self, name: &str) -> OperationResult {
        let url = format!("{}/streams/{}", self.project_url(), name);
        match self.delete(&url).await {
            Ok(()) => {
                tracing::info!(workspace = name, "Deleted workspace");
                OperationResult::new(
                    name,
                    Operation::DeleteWorkspace,
                    OperationStatus::Deleted,
                    "Stream Processing workspace deleted successfully",
                )
            }
            Err(e) => OperationResult::failed(name, Operation::DeleteWorkspace, &e),
        }
    }
}
