// handlers/protected/tasks/mod.rs - Task tracking endpoints
//
// Visibility and edit rights are decided per task by AuthorizationPolicy:
// admins see everything, other callers only what is assigned to them.

pub mod collection;
pub mod item;

pub use collection::{create_post, dashboard_get, list_get};
pub use item::{comment_post, task_delete, task_get, task_patch};
