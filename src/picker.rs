// File: ./src/picker.rs
//! Listing of open tasks, formatted for pasting into a note.
use crate::client::TaskQuery;
use crate::error::ServiceError;
use crate::model::{CheckboxState, OpenTodo, StatusTable, TaskDatabase};
use std::collections::HashMap;

/// Tasks of `database_id` not in the Done bucket's canonical status,
/// sorted by title, each with its project name resolved.
///
/// Project pages are fetched once per call; a project that cannot be read
/// leaves the name empty.
pub async fn load_open_todos<Q: TaskQuery>(
    query: &Q,
    database_id: &str,
    table: &StatusTable,
) -> Result<Vec<OpenTodo>, ServiceError> {
    let done = table.canonical(CheckboxState::Checked).unwrap_or("Done");
    let tasks = query.query_open_tasks(database_id, done).await?;
    log::info!("Loaded {} open tasks from {}", tasks.len(), database_id);

    let mut projects: HashMap<String, String> = HashMap::new();
    let mut todos = Vec::with_capacity(tasks.len());
    for task in tasks {
        let project_name = match &task.project {
            None => String::new(),
            Some(id) => {
                if let Some(name) = projects.get(id) {
                    name.clone()
                } else {
                    let name = match query.project_name(id).await {
                        Ok(name) => name,
                        Err(e) => {
                            log::warn!("Could not load project {}: {}", id, e);
                            String::new()
                        }
                    };
                    projects.insert(id.clone(), name.clone());
                    name
                }
            }
        };
        todos.push(OpenTodo { task, project_name });
    }

    todos.sort_by(|a, b| a.task.title.cmp(&b.task.title));
    Ok(todos)
}

/// Markdown checkbox line linking the task, e.g.
/// `- [/] [Write docs (*TASK-12*)](https://...) `.
pub fn link_line(todo: &OpenTodo, table: &StatusTable) -> String {
    let state = table
        .to_glyph(&todo.task.status)
        .unwrap_or(CheckboxState::Unchecked);
    format!(
        "- [{}] [{} (*{}*)]({}) ",
        state.glyph(),
        todo.task.title,
        todo.task.display_label(),
        todo.task.url
    )
}

/// `<project> | <status>`, shown next to each candidate.
pub fn summary(todo: &OpenTodo) -> String {
    format!("{} | {}", todo.project_name, todo.task.status)
}

pub async fn list_databases<Q: TaskQuery>(query: &Q) -> Result<Vec<TaskDatabase>, ServiceError> {
    let databases = query.search_databases().await?;
    log::debug!("Token can see {} databases", databases.len());
    Ok(databases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RemoteTask;
    use chrono::Utc;
    use std::sync::Mutex;

    struct FakeQuery {
        tasks: Vec<RemoteTask>,
        project_calls: Mutex<Vec<String>>,
        excluded: Mutex<Option<String>>,
    }

    impl TaskQuery for FakeQuery {
        async fn query_open_tasks(
            &self,
            _database_id: &str,
            exclude_status: &str,
        ) -> Result<Vec<RemoteTask>, ServiceError> {
            *self.excluded.lock().unwrap() = Some(exclude_status.to_string());
            Ok(self.tasks.clone())
        }

        async fn project_name(&self, project_id: &str) -> Result<String, ServiceError> {
            self.project_calls.lock().unwrap().push(project_id.to_string());
            match project_id {
                "p1" => Ok("Website".to_string()),
                _ => Err(ServiceError::NotFound(project_id.to_string())),
            }
        }

        async fn search_databases(&self) -> Result<Vec<TaskDatabase>, ServiceError> {
            Ok(vec![])
        }
    }

    fn task(title: &str, status: &str, project: Option<&str>) -> RemoteTask {
        RemoteTask {
            id: format!("id-{}", title),
            label: Some(format!("TASK-{}", title.len())),
            title: title.to_string(),
            status: status.to_string(),
            last_edited: Utc::now(),
            url: format!("https://www.notion.so/{}", title),
            project: project.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_open_todos_sorted_with_cached_projects() {
        let query = FakeQuery {
            tasks: vec![
                task("Write", "In Progress", Some("p1")),
                task("Deploy", "Todo", Some("p1")),
                task("Archive", "Todo", Some("gone")),
                task("Call", "Todo", None),
            ],
            project_calls: Mutex::new(vec![]),
            excluded: Mutex::new(None),
        };

        let todos = load_open_todos(&query, "db", &StatusTable::default())
            .await
            .unwrap();

        let titles: Vec<&str> = todos.iter().map(|t| t.task.title.as_str()).collect();
        assert_eq!(titles, vec!["Archive", "Call", "Deploy", "Write"]);
        assert_eq!(todos[2].project_name, "Website");
        assert_eq!(todos[0].project_name, "");
        assert_eq!(*query.project_calls.lock().unwrap(), vec!["p1", "gone"]);
        assert_eq!(query.excluded.lock().unwrap().as_deref(), Some("Done"));
    }

    #[test]
    fn test_link_line() {
        let table = StatusTable::default();
        let todo = OpenTodo {
            task: task("Write", "In Progress", Some("p1")),
            project_name: "Website".to_string(),
        };
        assert_eq!(
            link_line(&todo, &table),
            "- [/] [Write (*TASK-5*)](https://www.notion.so/Write) "
        );
        assert_eq!(summary(&todo), "Website | In Progress");

        let odd = OpenTodo {
            task: task("Odd", "Blocked", None),
            project_name: String::new(),
        };
        assert!(link_line(&odd, &table).starts_with("- [ ] "));
    }
}
