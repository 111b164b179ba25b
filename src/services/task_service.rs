use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::task::{TaskCategory, TaskComment, TaskPriority};
use crate::database::models::{
    clean_optional, nullable, Page, Paginated, Task, TaskQuery, TaskStatus, TaskView,
};
use crate::database::Stores;
use crate::middleware::AuthUser;
use crate::policy::{authorize, Action, Target};

const LIST_UPCOMING_DAYS: i64 = 7;
const DASHBOARD_UPCOMING_DAYS: i64 = 3;
const DASHBOARD_NEXT_TASKS: u32 = 5;
const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub due_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub assigned_to: Uuid,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub radicado: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub estimated_hours: Option<f64>,
}

/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub due_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable")]
    pub client_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub radicado: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub estimated_hours: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub actual_hours: Option<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListParams {
    /// Comma-separated wire values.
    pub status: Option<String>,
    pub priority: Option<TaskPriority>,
    pub client_id: Option<Uuid>,
    pub search: Option<String>,
    /// `mine` or an identity id. Admins only.
    pub assigned_to: Option<String>,
    pub overdue: Option<bool>,
    pub upcoming: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCounters {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub overdue: u64,
    pub upcoming: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskList {
    #[serde(flatten)]
    pub page: Paginated<TaskView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TaskCounters>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub counters: TaskCounters,
    pub next_tasks: Vec<TaskView>,
}

pub struct TaskService {
    stores: Stores,
}

impl TaskService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn create(&self, caller: &AuthUser, req: CreateTaskRequest) -> ServiceResult<TaskView> {
        authorize(Some(caller), Action::CreateTask, Target::None)?;

        let title = req.title.trim();
        if title.is_empty() {
            return Err(ServiceError::invalid("Title is required"));
        }
        self.ensure_assignee(req.assigned_to).await?;
        let client_name = match req.client_id {
            Some(client_id) => {
                let client = self
                    .stores
                    .clients
                    .find_by_id(client_id)
                    .await?
                    .ok_or_else(|| ServiceError::invalid("Client not found"))?;
                clean_optional(req.client_name).or(Some(client.full_name))
            }
            None => clean_optional(req.client_name),
        };

        let now = Utc::now();
        let mut task = Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: clean_optional(req.description),
            status: TaskStatus::Pending,
            priority: req.priority.unwrap_or_default(),
            category: req.category.unwrap_or_default(),
            due_date: req.due_date,
            start_date: req.start_date.unwrap_or(now),
            completed_date: None,
            assigned_to: req.assigned_to,
            created_by: caller.id,
            client_id: req.client_id,
            client_name,
            radicado: clean_optional(req.radicado),
            tags: clean_tags(req.tags),
            alerts: Task::reminder_alert(req.due_date, now).into_iter().collect(),
            comments: Vec::new(),
            estimated_hours: req.estimated_hours,
            actual_hours: None,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        task.transition(req.status.unwrap_or_default(), now);

        let task = self.stores.tasks.create(task).await?;
        info!("Task {} created by {} for {}", task.id, caller.id, task.assigned_to);
        Ok(task.view(now))
    }

    /// Non-admins only ever see their own assignments.
    pub async fn list(&self, caller: &AuthUser, params: TaskListParams) -> ServiceResult<TaskList> {
        let now = Utc::now();
        let is_admin = caller.roles.is_admin();

        let mut query = TaskQuery {
            priority: params.priority,
            client_id: params.client_id,
            search: clean_optional(params.search),
            statuses: parse_statuses(params.status.as_deref())?,
            ..Default::default()
        };

        query.assigned_to = if is_admin {
            match params.assigned_to.as_deref().map(str::trim) {
                None | Some("") => None,
                Some("mine") => Some(caller.id),
                Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| ServiceError::invalid("Invalid assignee id"))?),
            }
        } else {
            Some(caller.id)
        };

        if params.overdue.unwrap_or(false) {
            query.statuses = open_only(query.statuses);
            query.due_before = Some(now);
        }
        if params.upcoming.unwrap_or(false) {
            query.statuses = open_only(query.statuses);
            query.due_from = Some(now);
            query.due_until = Some(now + Duration::days(LIST_UPCOMING_DAYS));
        }

        let page = Page::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
        let (tasks, total) = self.stores.tasks.list(&query, page).await?;
        let views = tasks.iter().map(|t| t.view(now)).collect();

        let stats = if is_admin {
            Some(self.counters(TaskQuery::default(), now, LIST_UPCOMING_DAYS).await?)
        } else {
            None
        };

        Ok(TaskList {
            page: Paginated::new(views, total, page),
            stats,
        })
    }

    pub async fn get(&self, caller: &AuthUser, id: Uuid) -> ServiceResult<TaskView> {
        let task = self.find(id).await?;
        authorize(Some(caller), Action::ReadTask, Target::Task(&task))?;
        Ok(task.view(Utc::now()))
    }

    pub async fn update(&self, caller: &AuthUser, id: Uuid, req: UpdateTaskRequest) -> ServiceResult<TaskView> {
        let mut task = self.find(id).await?;
        authorize(Some(caller), Action::EditTask, Target::Task(&task))?;
        if req.assigned_to.is_some() || req.client_id.is_some() {
            authorize(Some(caller), Action::ReassignTask, Target::Task(&task))?;
        }

        let now = Utc::now();
        if let Some(title) = req.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ServiceError::invalid("Title cannot be empty"));
            }
            task.title = title.to_string();
        }
        if let Some(description) = req.description {
            task.description = clean_optional(description);
        }
        if let Some(priority) = req.priority {
            task.priority = priority;
        }
        if let Some(category) = req.category {
            task.category = category;
        }
        if let Some(due_date) = req.due_date {
            task.due_date = due_date;
        }
        if let Some(start_date) = req.start_date {
            task.start_date = start_date;
        }
        if let Some(assignee) = req.assigned_to {
            self.ensure_assignee(assignee).await?;
            task.assigned_to = assignee;
        }
        if let Some(client_id) = req.client_id {
            task.client_name = match client_id {
                Some(id) => Some(
                    self.stores
                        .clients
                        .find_by_id(id)
                        .await?
                        .ok_or_else(|| ServiceError::invalid("Client not found"))?
                        .full_name,
                ),
                None => None,
            };
            task.client_id = client_id;
        }
        if let Some(radicado) = req.radicado {
            task.radicado = clean_optional(radicado);
        }
        if let Some(tags) = req.tags {
            task.tags = clean_tags(tags);
        }
        if let Some(hours) = req.estimated_hours {
            task.estimated_hours = hours;
        }
        if let Some(hours) = req.actual_hours {
            task.actual_hours = hours;
        }
        if let Some(status) = req.status {
            task.transition(status, now);
        }

        bump(&mut task, now);
        let task = self.stores.tasks.save(&task).await?;
        Ok(task.view(now))
    }

    /// Soft delete.
    pub async fn delete(&self, caller: &AuthUser, id: Uuid) -> ServiceResult<()> {
        authorize(Some(caller), Action::DeleteTask, Target::None)?;
        let mut task = self.find(id).await?;
        task.is_active = false;
        bump(&mut task, Utc::now());
        self.stores.tasks.save(&task).await?;
        info!("Task {} deleted by {}", id, caller.id);
        Ok(())
    }

    pub async fn comment(&self, caller: &AuthUser, id: Uuid, text: &str) -> ServiceResult<TaskView> {
        let mut task = self.find(id).await?;
        authorize(Some(caller), Action::EditTask, Target::Task(&task))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::invalid("Comment text is required"));
        }

        let now = Utc::now();
        task.comments.push(TaskComment {
            user: caller.id,
            text: text.to_string(),
            date: now,
        });
        bump(&mut task, now);
        let task = self.stores.tasks.save(&task).await?;
        Ok(task.view(now))
    }

    /// Counters over the caller's visible tasks, plus the nearest open ones
    /// assigned to them.
    pub async fn dashboard(&self, caller: &AuthUser) -> ServiceResult<Dashboard> {
        let now = Utc::now();
        let scope = TaskQuery {
            assigned_to: (!caller.roles.is_admin()).then_some(caller.id),
            ..Default::default()
        };
        let counters = self.counters(scope, now, DASHBOARD_UPCOMING_DAYS).await?;

        let next = TaskQuery {
            assigned_to: Some(caller.id),
            statuses: TaskStatus::OPEN.to_vec(),
            due_from: Some(now),
            ..Default::default()
        };
        let next_tasks = self
            .stores
            .tasks
            .list_by_due(&next, DASHBOARD_NEXT_TASKS)
            .await?
            .iter()
            .map(|t| t.view(now))
            .collect();

        Ok(Dashboard { counters, next_tasks })
    }

    async fn counters(&self, scope: TaskQuery, now: DateTime<Utc>, upcoming_days: i64) -> ServiceResult<TaskCounters> {
        let with = |statuses: Vec<TaskStatus>| TaskQuery {
            statuses,
            ..scope.clone()
        };
        let tasks = &self.stores.tasks;

        Ok(TaskCounters {
            total: tasks.count(&scope).await?,
            pending: tasks.count(&with(vec![TaskStatus::Pending])).await?,
            in_progress: tasks.count(&with(vec![TaskStatus::InProgress])).await?,
            completed: tasks.count(&with(vec![TaskStatus::Completed])).await?,
            overdue: tasks
                .count(&TaskQuery {
                    due_before: Some(now),
                    ..with(TaskStatus::OPEN.to_vec())
                })
                .await?,
            upcoming: tasks
                .count(&TaskQuery {
                    due_from: Some(now),
                    due_until: Some(now + Duration::days(upcoming_days)),
                    ..with(TaskStatus::OPEN.to_vec())
                })
                .await?,
        })
    }

    /// Active tasks only.
    async fn find(&self, id: Uuid) -> ServiceResult<Task> {
        self.stores
            .tasks
            .find(id)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| ServiceError::not_found("Task not found"))
    }

    async fn ensure_assignee(&self, id: Uuid) -> ServiceResult<()> {
        match self.stores.identities.find_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::invalid("Assigned user not found")),
        }
    }
}

fn bump(task: &mut Task, now: DateTime<Utc>) {
    task.version += 1;
    task.updated_at = now;
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn parse_statuses(raw: Option<&str>) -> ServiceResult<Vec<TaskStatus>> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| TaskStatus::parse(s).ok_or_else(|| ServiceError::invalid(format!("Unknown status: {}", s))))
        .collect()
}

/// Narrows a status filter to open statuses; empty means all open ones.
fn open_only(statuses: Vec<TaskStatus>) -> Vec<TaskStatus> {
    if statuses.is_empty() {
        TaskStatus::OPEN.to_vec()
    } else {
        statuses.into_iter().filter(TaskStatus::is_open).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Identity;
    use crate::database::MemoryStore;
    use crate::roles::Roles;
    use std::sync::Arc;

    struct Fixture {
        svc: TaskService,
        admin: AuthUser,
        user: AuthUser,
        other: AuthUser,
    }

    async fn identity(stores: &Stores, email: &str, roles: Roles) -> AuthUser {
        let identity = stores
            .identities
            .create(Identity::new(email, "Nombre", "h".into(), roles))
            .await
            .unwrap();
        AuthUser {
            id: identity.id,
            email: identity.email,
            name: identity.name,
            roles,
            active: true,
        }
    }

    async fn fixture() -> Fixture {
        let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
        Fixture {
            admin: identity(&stores, "admin@koop.co", Roles::ADMIN).await,
            user: identity(&stores, "user@koop.co", Roles::USER).await,
            other: identity(&stores, "other@koop.co", Roles::USER).await,
            svc: TaskService::new(stores),
        }
    }

    fn create_req(assigned_to: Uuid, due_in_days: i64, priority: TaskPriority) -> CreateTaskRequest {
        CreateTaskRequest {
            title: "Contestar demanda".into(),
            description: None,
            status: None,
            priority: Some(priority),
            category: None,
            due_date: Utc::now() + Duration::days(due_in_days),
            start_date: None,
            assigned_to,
            client_id: None,
            client_name: None,
            radicado: Some("11001-31-05".into()),
            tags: vec!["laboral".into(), " laboral ".into()],
            estimated_hours: None,
        }
    }

    #[tokio::test]
    async fn create_adds_reminder_and_requires_admin() {
        let f = fixture().await;
        let view = f.svc.create(&f.admin, create_req(f.user.id, 5, TaskPriority::High)).await.unwrap();
        assert_eq!(view.task.alerts.len(), 1);
        assert_eq!(view.task.tags, vec!["laboral"]);
        assert!(!view.is_overdue);
        assert_eq!(view.days_remaining, 5);

        let near = f.svc.create(&f.admin, create_req(f.user.id, 0, TaskPriority::Low)).await.unwrap();
        assert!(near.task.alerts.is_empty());

        assert!(matches!(
            f.svc.create(&f.user, create_req(f.user.id, 5, TaskPriority::Low)).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            f.svc.create(&f.admin, create_req(Uuid::new_v4(), 5, TaskPriority::Low)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn non_admin_sees_only_assigned_tasks_sorted() {
        let f = fixture().await;
        f.svc.create(&f.admin, create_req(f.user.id, 9, TaskPriority::Low)).await.unwrap();
        f.svc.create(&f.admin, create_req(f.user.id, 3, TaskPriority::Urgent)).await.unwrap();
        f.svc.create(&f.admin, create_req(f.other.id, 1, TaskPriority::Urgent)).await.unwrap();

        let mut params = TaskListParams::default();
        // Ignored for non-admins.
        params.assigned_to = Some(f.other.id.to_string());
        let list = f.svc.list(&f.user, params).await.unwrap();
        assert_eq!(list.page.pagination.total, 2);
        assert!(list.stats.is_none());
        assert_eq!(list.page.items[0].task.priority, TaskPriority::Urgent);
        assert!(list.page.items.iter().all(|v| v.task.assigned_to == f.user.id));

        let all = f.svc.list(&f.admin, TaskListParams::default()).await.unwrap();
        assert_eq!(all.page.pagination.total, 3);
        assert_eq!(all.stats.unwrap().total, 3);
    }

    #[tokio::test]
    async fn read_and_edit_rules() {
        let f = fixture().await;
        let view = f.svc.create(&f.admin, create_req(f.user.id, 2, TaskPriority::Medium)).await.unwrap();
        let id = view.task.id;

        assert!(f.svc.get(&f.user, id).await.is_ok());
        assert!(matches!(f.svc.get(&f.other, id).await, Err(ServiceError::Forbidden(_))));

        let done = f
            .svc
            .update(
                &f.user,
                id,
                UpdateTaskRequest {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(done.task.completed_date.is_some());
        assert_eq!(done.days_remaining, 0);
        assert_eq!(done.task.version, 1);

        let reopened = f
            .svc
            .update(
                &f.user,
                id,
                UpdateTaskRequest {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(reopened.task.completed_date.is_none());

        assert!(matches!(
            f.svc
                .update(
                    &f.user,
                    id,
                    UpdateTaskRequest {
                        assigned_to: Some(f.other.id),
                        ..Default::default()
                    }
                )
                .await,
            Err(ServiceError::Forbidden(_))
        ));

        let commented = f.svc.comment(&f.user, id, "Radicado en juzgado").await.unwrap();
        assert_eq!(commented.task.comments.len(), 1);
    }

    #[tokio::test]
    async fn soft_delete_hides_task() {
        let f = fixture().await;
        let view = f.svc.create(&f.admin, create_req(f.user.id, 2, TaskPriority::Medium)).await.unwrap();
        assert!(matches!(f.svc.delete(&f.user, view.task.id).await, Err(ServiceError::Forbidden(_))));
        f.svc.delete(&f.admin, view.task.id).await.unwrap();
        assert!(matches!(f.svc.get(&f.admin, view.task.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn dashboard_counts_visible_scope() {
        let f = fixture().await;
        f.svc.create(&f.admin, create_req(f.user.id, 1, TaskPriority::Medium)).await.unwrap();
        f.svc.create(&f.admin, create_req(f.user.id, -2, TaskPriority::Medium)).await.unwrap();
        f.svc.create(&f.admin, create_req(f.other.id, 1, TaskPriority::Medium)).await.unwrap();

        let dash = f.svc.dashboard(&f.user).await.unwrap();
        assert_eq!(dash.counters.total, 2);
        assert_eq!(dash.counters.overdue, 1);
        assert_eq!(dash.counters.upcoming, 1);
        assert_eq!(dash.next_tasks.len(), 1);

        assert_eq!(f.svc.dashboard(&f.admin).await.unwrap().counters.total, 3);
    }

    #[test]
    fn status_filters() {
        assert_eq!(
            parse_statuses(Some("pendiente, completada")).unwrap(),
            vec![TaskStatus::Pending, TaskStatus::Completed]
        );
        assert!(parse_statuses(Some("bogus")).is_err());
        assert_eq!(open_only(vec![TaskStatus::Completed, TaskStatus::Pending]), vec![TaskStatus::Pending]);
        assert_eq!(open_only(vec![]), TaskStatus::OPEN.to_vec());
    }

    #[test]
    fn update_request_keeps_null_apart_from_missing() {
        let req: UpdateTaskRequest =
            serde_json::from_value(serde_json::json!({ "radicado": null, "status": "en-curso" })).unwrap();
        assert_eq!(req.radicado, Some(None));
        assert_eq!(req.description, None);
        assert_eq!(req.status, Some(TaskStatus::InProgress));
    }
}
