//! Connection registry of the configured workspace.

use crate::client::AtlasClient;
use crate::error::ApiResult;
use crate::report::{Operation, OperationResult, OperationStatus};
use serde_json::{json, Value};

pub const DEFAULT_DB_ROLE: &str = "atlasAdmin";
pub const DEFAULT_DB_ROLE_TYPE: &str = "BUILT_IN";

/// Database role a cluster connection executes as.
pub fn db_role(role: Option<&str>, role_type: Option<&str>) -> Value {
    json!({
        "role": role.unwrap_or(DEFAULT_DB_ROLE),
        "type": role_type.unwrap_or(DEFAULT_DB_ROLE_TYPE),
    })
}

impl AtlasClient {
    pub async fn list_connections(&self) -> ApiResult<Vec<Value>> {
        let url = format!("{}/connections", self.workspace_url()?);
        self.get_results(&url).await
    }

    pub async fn create_http_connection(&self, name: &str, endpoint: &str) -> OperationResult {
        let payload = json!({ "name": name, "type": "Https", "url": endpoint });
        let result = self
            .create_connection(name, &payload, "HTTP connection")
            .await;
        result
            .with_detail("type", "Https")
            .with_detail("url", endpoint)
    }

    pub async fn create_cluster_connection(
        &self,
        name: &str,
        cluster_name: &str,
        role: Value,
    ) -> OperationResult {
        let payload = json!({
            "name": name,
            "type": "Cluster",
            "clusterName": cluster_name,
            "dbRoleToExecute": role,
        });
        let result = self
            .create_connection(name, &payload, "Cluster connection")
            .await;
        result
            .with_detail("type", "Cluster")
            .with_detail("clusterName", cluster_name)
    }

    async fn create_connection(&self, name: &str, payload: &Value, kind: &str) -> OperationResult {
        let url = match self.workspace_url() {
            Ok(base) => format!("{base}/connections"),
            Err(e) => return OperationResult::failed(name, Operation::CreateConnection, &e),
        };

        match self.post_json(&url, payload).await {
            Ok(()) => {
                tracing::info!(connection = name, kind, "Created connection");
                OperationResult::new(
                    name,
                    Operation::CreateConnection,
                    OperationStatus::Created,
                    format!("{kind} created successfully"),
                )
            }
            Err(e) if e.http_code() == Some(409) => OperationResult::new(
                name,
                Operation::CreateConnection,
                OperationStatus::AlreadyExists,
                format!("{kind} already exists"),
            ),
            Err(e) => OperationResult::failed(name, Operation::CreateConnection, &e),
        }
    }

    pub async fn delete_connection(&self, name: &str) -> OperationResult {
        let url = match self.workspace_url() {
            Ok(base) => format!("{base}/connections/{name}"),
            Err(e) => return OperationResult::failed(name, Operation::DeleteConnection, &e),
        };

        match self.delete(&url).await {
            Ok(()) => {
                tracing::info!(connection = name, "Deleted connection");
                OperationResult::new(
                    name,
                    Operation::DeleteConnection,
                    OperationStatus::Deleted,
                    "Connection deleted successfully",
                )
            }
            Err(e) if e.http_code() == Some(404) => OperationResult::new(
                name,
                Operation::DeleteConnection,
                OperationStatus::NotFound,
                "Connection not found",
            ),
            Err(e) => OperationResult::failed(name, Operation::DeleteConnection, &e),
        }
    }
}
