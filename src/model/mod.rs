// File: ./src/model/mod.rs
pub mod scanner;
pub mod status;
pub mod task;

pub use scanner::{DEFAULT_LINK_PATTERN, LocalReference, Scanner};
pub use status::{Bucket, CheckboxState, StatusTable};
pub use task::{OpenTodo, RemoteTask, TaskDatabase};
