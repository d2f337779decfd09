// File: tests/notion_client.rs
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;
use tasklink::ServiceError;
use tasklink::client::{NotionClient, TaskQuery, TaskService};
use tasklink::config::{Config, Credentials, PropertyNames};
use tasklink::model::StatusTable;
use tasklink::picker;

const TOKEN: &str = "secret_test";

fn client(url: &str) -> NotionClient {
    let config = Config {
        api_token: TOKEN.to_string(),
        api_base_url: url.to_string(),
        request_timeout_secs: 5,
        ..Config::default()
    };
    NotionClient::new(&config.credentials().unwrap(), config.notion_options())
        .expect("Client creation failed")
}

fn page(id: &str, status: &str, title: &str, project: Option<&str>) -> serde_json::Value {
    let relation: Vec<_> = project.map(|p| json!({ "id": p })).into_iter().collect();
    json!({
        "object": "page",
        "id": id,
        "last_edited_time": "2024-05-01T12:00:00.000Z",
        "url": format!("https://www.notion.so/{}", id),
        "properties": {
            "ID": { "unique_id": { "prefix": "TASK", "number": 7 } },
            "Task name": { "title": [ { "plain_text": title } ] },
            "Status": { "status": { "name": status } },
            "Project": { "relation": relation },
            "Project name": { "title": [ { "plain_text": format!("Project {}", id) } ] }
        }
    })
}

#[tokio::test]
async fn test_fetch_task_sends_auth_and_version() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/pages/abc123")
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .match_header("notion-version", "2022-06-28")
        .match_header("user-agent", Matcher::Regex("^tasklink/".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page("abc123", "Done", "Write docs", None).to_string())
        .create_async()
        .await;

    let task = client(&server.url()).fetch_task("abc123").await.unwrap();

    assert_eq!(task.id, "abc123");
    assert_eq!(task.status, "Done");
    assert_eq!(task.title, "Write docs");
    assert_eq!(task.display_label(), "TASK-7");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_update_task_status_patches_status_property() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PATCH", "/pages/abc123")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "properties": { "Status": { "status": { "name": "In Progress" } } }
        })))
        .with_status(200)
        .with_body(page("abc123", "In Progress", "Write docs", None).to_string())
        .create_async()
        .await;

    client(&server.url())
        .update_task_status("abc123", "In Progress")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_statuses_map_onto_service_errors() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/pages/denied")
        .with_status(401)
        .with_body(r#"{"object":"error","status":401,"code":"unauthorized","message":"API token is invalid."}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/pages/gone")
        .with_status(404)
        .with_body(r#"{"object":"error","status":404,"code":"object_not_found","message":"Could not find page"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/pages/busy")
        .with_status(503)
        .with_body("")
        .create_async()
        .await;

    let client = client(&server.url());
    assert_eq!(
        client.fetch_task("denied").await,
        Err(ServiceError::Auth("API token is invalid.".to_string()))
    );
    assert_eq!(
        client.fetch_task("gone").await,
        Err(ServiceError::NotFound("gone".to_string()))
    );
    assert!(matches!(
        client.fetch_task("busy").await,
        Err(ServiceError::Network(msg)) if msg.contains("503")
    ));
}

#[tokio::test]
async fn test_malformed_page_is_a_network_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/pages/odd")
        .with_status(200)
        .with_body(r#"{"object":"page","id":"odd"}"#)
        .create_async()
        .await;

    let err = client(&server.url()).fetch_task("odd").await.unwrap_err();
    assert!(matches!(err, ServiceError::Network(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    let config = Config {
        api_token: TOKEN.to_string(),
        api_base_url: "http://127.0.0.1:9".to_string(),
        ..Config::default()
    };
    let mut options = config.notion_options();
    options.timeout = Duration::from_secs(2);
    let client = NotionClient::new(&config.credentials().unwrap(), options).unwrap();

    assert!(matches!(
        client.fetch_task("abc").await,
        Err(ServiceError::Network(_))
    ));
}

#[tokio::test]
async fn test_query_open_tasks_follows_cursor_and_filters_done() {
    let mut server = Server::new_async().await;
    let filter = json!({
        "property": "Status",
        "status": { "does_not_equal": "Done" }
    });
    let first = server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(json!({ "filter": filter })))
        .with_status(200)
        .with_body(
            json!({
                "results": [ page("t1", "Todo", "Zebra", Some("p1")) ],
                "has_more": true,
                "next_cursor": "cur-2"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let second = server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(json!({ "filter": filter, "start_cursor": "cur-2" })))
        .with_status(200)
        .with_body(
            json!({
                "results": [ page("t2", "In Progress", "Apple", Some("p1")) ],
                "has_more": false,
                "next_cursor": null
            })
            .to_string(),
        )
        .create_async()
        .await;
    let project = server
        .mock("GET", "/pages/p1")
        .with_status(200)
        .with_body(page("p1", "Todo", "Website", None).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client(&server.url());
    let todos = picker::load_open_todos(&client, "db1", &StatusTable::default())
        .await
        .unwrap();

    let titles: Vec<&str> = todos.iter().map(|t| t.task.title.as_str()).collect();
    assert_eq!(titles, vec!["Apple", "Zebra"]);
    assert_eq!(todos[0].project_name, "Project p1");
    assert_eq!(
        picker::link_line(&todos[0], &StatusTable::default()),
        "- [/] [Apple (*TASK-7*)](https://www.notion.so/t2) "
    );
    first.assert_async().await;
    second.assert_async().await;
    project.assert_async().await;
}

#[tokio::test]
async fn test_search_databases() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/search")
        .match_body(Matcher::PartialJson(json!({
            "filter": { "value": "database", "property": "object" }
        })))
        .with_status(200)
        .with_body(
            json!({
                "results": [
                    { "object": "database", "id": "db1", "title": [ { "plain_text": "To-Do" } ] },
                    { "object": "database", "id": "db2", "title": [] }
                ],
                "has_more": false
            })
            .to_string(),
        )
        .create_async()
        .await;

    let dbs = client(&server.url()).search_databases().await.unwrap();
    assert_eq!(dbs.len(), 2);
    assert_eq!(dbs[0].title, "To-Do");
    assert_eq!(dbs[1].title, "");
    mock.assert_async().await;
}

#[test]
fn test_token_with_newline_is_rejected() {
    let options = Config::default().notion_options();
    let credentials = Credentials {
        api_token: "bad\ntoken".to_string(),
    };
    assert!(NotionClient::new(&credentials, options).is_err());
}

#[test]
fn test_custom_property_names_reach_the_client() {
    let config = Config {
        properties: PropertyNames {
            status: "State".to_string(),
            ..PropertyNames::default()
        },
        ..Config::default()
    };
    assert_eq!(config.notion_options().properties.status, "State");
}
