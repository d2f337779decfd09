// File: ./src/client/mod.rs
//! Remote task service contracts and the Notion binding.
pub mod core;
pub mod middleware;
pub mod notion;

use crate::error::ServiceError;
use crate::model::{RemoteTask, TaskDatabase};
use std::future::Future;

pub use crate::client::notion::NotionClient;

/// What a sync pass needs from the remote side.
pub trait TaskService: Send + Sync {
    fn fetch_task(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<RemoteTask, ServiceError>> + Send;

    fn update_task_status(
        &self,
        id: &str,
        status: &str,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}

/// Listing operations used when picking a task to link.
pub trait TaskQuery: Send + Sync {
    /// Tasks of `database_id` whose status is not `exclude_status`.
    fn query_open_tasks(
        &self,
        database_id: &str,
        exclude_status: &str,
    ) -> impl Future<Output = Result<Vec<RemoteTask>, ServiceError>> + Send;

    /// Display name of a project page.
    fn project_name(
        &self,
        project_id: &str,
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;

    fn search_databases(
        &self,
    ) -> impl Future<Output = Result<Vec<TaskDatabase>, ServiceError>> + Send;
}
