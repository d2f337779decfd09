// File: ./src/client/notion.rs
//! Notion REST binding for `TaskService` and `TaskQuery`.
use crate::client::core::JsonClient;
use crate::client::middleware::DefaultHeadersLayer;
use crate::client::{TaskQuery, TaskService};
use crate::config::{Credentials, PropertyNames};
use crate::error::ServiceError;
use crate::model::{RemoteTask, TaskDatabase};
use chrono::{DateTime, Utc};
use http::{HeaderName, Method};
use serde_json::{Map, Value, json};
use std::time::Duration;

pub const NOTION_VERSION: &str = "2022-06-28";

/// Upper bound on result pages followed for one listing.
const MAX_PAGES: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotionOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub properties: PropertyNames,
    pub user_agent: String,
}

#[derive(Clone, Debug)]
pub struct NotionClient {
    http: JsonClient,
    properties: PropertyNames,
}

impl NotionClient {
    pub fn new(credentials: &Credentials, options: NotionOptions) -> Result<Self, String> {
        let headers = DefaultHeadersLayer::new([
            (http::header::USER_AGENT, options.user_agent.as_str()),
            (HeaderName::from_static("notion-version"), NOTION_VERSION),
        ])?;
        let http = JsonClient::new(
            &options.base_url,
            &credentials.api_token,
            headers,
            options.timeout,
        )?;
        Ok(Self {
            http,
            properties: options.properties,
        })
    }

    /// Follows `next_cursor` until the listing is exhausted.
    async fn collect_results(
        &self,
        path: &str,
        mut body: Map<String, Value>,
    ) -> Result<Vec<Value>, ServiceError> {
        let mut results = Vec::new();
        for _ in 0..MAX_PAGES {
            let page = self
                .http
                .send_json(Method::POST, path, Some(&Value::Object(body.clone())), path)
                .await?;
            if let Some(items) = page.get("results").and_then(Value::as_array) {
                results.extend(items.iter().cloned());
            }
            let more = page.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            match page.get("next_cursor").and_then(Value::as_str) {
                Some(cursor) if more => {
                    body.insert("start_cursor".to_string(), Value::String(cursor.to_string()));
                }
                _ => return Ok(results),
            }
        }
        log::warn!("Stopped following {} after {} result pages", path, MAX_PAGES);
        Ok(results)
    }
}

impl TaskService for NotionClient {
    async fn fetch_task(&self, id: &str) -> Result<RemoteTask, ServiceError> {
        let page = self
            .http
            .send_json(Method::GET, &format!("pages/{}", id), None, id)
            .await?;
        decode_page(&page, &self.properties)
    }

    async fn update_task_status(&self, id: &str, status: &str) -> Result<(), ServiceError> {
        let mut properties = Map::new();
        properties.insert(
            self.properties.status.clone(),
            json!({ "status": { "name": status } }),
        );
        let body = json!({ "properties": properties });
        self.http
            .send_json(Method::PATCH, &format!("pages/{}", id), Some(&body), id)
            .await?;
        Ok(())
    }
}

impl TaskQuery for NotionClient {
    async fn query_open_tasks(
        &self,
        database_id: &str,
        exclude_status: &str,
    ) -> Result<Vec<RemoteTask>, ServiceError> {
        let mut body = Map::new();
        body.insert(
            "filter".to_string(),
            json!({
                "property": self.properties.status,
                "status": { "does_not_equal": exclude_status }
            }),
        );
        let pages = self
            .collect_results(&format!("databases/{}/query", database_id), body)
            .await?;

        let mut tasks = Vec::with_capacity(pages.len());
        for page in &pages {
            match decode_page(page, &self.properties) {
                Ok(task) => tasks.push(task),
                Err(e) => log::warn!("Skipping undecodable page in {}: {}", database_id, e),
            }
        }
        Ok(tasks)
    }

    async fn project_name(&self, project_id: &str) -> Result<String, ServiceError> {
        let page = self
            .http
            .send_json(Method::GET, &format!("pages/{}", project_id), None, project_id)
            .await?;
        let title = page
            .get("properties")
            .and_then(|p| p.get(&self.properties.project_title))
            .and_then(|p| p.get("title"))
            .map(plain_text)
            .unwrap_or_default();
        Ok(title)
    }

    async fn search_databases(&self) -> Result<Vec<TaskDatabase>, ServiceError> {
        let mut body = Map::new();
        body.insert(
            "filter".to_string(),
            json!({ "value": "database", "property": "object" }),
        );
        body.insert(
            "sort".to_string(),
            json!({ "direction": "ascending", "timestamp": "last_edited_time" }),
        );
        let results = self.collect_results("search", body).await?;
        Ok(results.iter().filter_map(parse_database).collect())
    }
}

/// Concatenated `plain_text` of a rich-text array.
fn plain_text(rich: &Value) -> String {
    rich.as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn invalid(page_id: &str, what: &str) -> ServiceError {
    ServiceError::Network(format!("page {}: {}", page_id, what))
}

pub(crate) fn decode_page(page: &Value, names: &PropertyNames) -> Result<RemoteTask, ServiceError> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("?", "missing id"))?
        .to_string();
    let props = page
        .get("properties")
        .ok_or_else(|| invalid(&id, "missing properties"))?;

    let last_edited = page
        .get("last_edited_time")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| invalid(&id, "missing or malformed last_edited_time"))?;

    let status = props
        .get(&names.status)
        .and_then(|p| p.get("status"))
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(&id, &format!("no value for status property '{}'", names.status)))?
        .to_string();

    let label = props
        .get(&names.id)
        .and_then(|p| p.get("unique_id"))
        .and_then(|u| {
            let number = u.get("number")?.as_i64()?;
            Some(match u.get("prefix").and_then(Value::as_str) {
                Some(prefix) => format!("{}-{}", prefix, number),
                None => number.to_string(),
            })
        });

    let title = props
        .get(&names.title)
        .and_then(|p| p.get("title"))
        .map(plain_text)
        .unwrap_or_default();

    let project = props
        .get(&names.project)
        .and_then(|p| p.get("relation"))
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .and_then(|r| r.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let url = page
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(RemoteTask {
        id,
        label,
        title,
        status,
        last_edited,
        url,
        project,
    })
}

fn parse_database(value: &Value) -> Option<TaskDatabase> {
    let id = value.get("id")?.as_str()?.to_string();
    let title = value.get("title").map(plain_text).unwrap_or_default();
    Some(TaskDatabase { id, title })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn page() -> Value {
        json!({
            "object": "page",
            "id": "59833787-2cf9-4fdf-8782-e53db20768a5",
            "last_edited_time": "2024-03-01T10:15:00.000Z",
            "url": "https://www.notion.so/Write-docs-598337872cf94fdf8782e53db20768a5",
            "properties": {
                "ID": { "type": "unique_id", "unique_id": { "prefix": "TASK", "number": 12 } },
                "Task name": { "type": "title", "title": [
                    { "plain_text": "Write " }, { "plain_text": "docs" }
                ] },
                "Status": { "type": "status", "status": { "name": "In progress" } },
                "Project": { "type": "relation", "relation": [ { "id": "proj-1" } ] }
            }
        })
    }

    #[test]
    fn test_decode_page() {
        let task = decode_page(&page(), &PropertyNames::default()).unwrap();
        assert_eq!(task.id, "59833787-2cf9-4fdf-8782-e53db20768a5");
        assert_eq!(task.label.as_deref(), Some("TASK-12"));
        assert_eq!(task.title, "Write docs");
        assert_eq!(task.status, "In progress");
        assert_eq!(task.project.as_deref(), Some("proj-1"));
        assert_eq!(
            task.last_edited,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_decode_page_optional_fields() {
        let mut value = page();
        value["properties"]["ID"]["unique_id"]["prefix"] = Value::Null;
        value["properties"]["Project"]["relation"] = json!([]);
        let task = decode_page(&value, &PropertyNames::default()).unwrap();
        assert_eq!(task.label.as_deref(), Some("12"));
        assert_eq!(task.project, None);
    }

    #[test]
    fn test_decode_page_requires_status() {
        let mut value = page();
        value["properties"]["Status"]["status"] = Value::Null;
        let err = decode_page(&value, &PropertyNames::default()).unwrap_err();
        assert!(matches!(err, ServiceError::Network(msg) if msg.contains("Status")));
    }

    #[test]
    fn test_decode_page_custom_property_names() {
        let names = PropertyNames {
            status: "State".to_string(),
            ..PropertyNames::default()
        };
        let mut value = page();
        value["properties"]["State"] = json!({ "status": { "name": "Done" } });
        assert_eq!(decode_page(&value, &names).unwrap().status, "Done");
    }

    #[test]
    fn test_parse_database() {
        let db = json!({ "object": "database", "id": "db-1", "title": [ { "plain_text": "To-Do" } ] });
        assert_eq!(
            parse_database(&db),
            Some(TaskDatabase { id: "db-1".to_string(), title: "To-Do".to_string() })
        );
        assert_eq!(parse_database(&json!({ "title": [] })), None);
    }
}
