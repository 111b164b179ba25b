use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::task::{TaskAlert, TaskCategory, TaskComment, TaskPriority};
use crate::database::models::{Page, Task, TaskQuery, TaskStatus};
use crate::database::stores::{StoreResult, TaskStore};

const COLUMNS: &str = "id, title, description, status, priority, category, due_date, start_date, completed_date, \
                       assigned_to, created_by, client_id, client_name, radicado, tags, alerts, comments, \
                       estimated_hours, actual_hours, is_active, version, created_at, updated_at";

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    category: String,
    due_date: DateTime<Utc>,
    start_date: DateTime<Utc>,
    completed_date: Option<DateTime<Utc>>,
    assigned_to: Uuid,
    created_by: Uuid,
    client_id: Option<Uuid>,
    client_name: Option<String>,
    radicado: Option<String>,
    tags: Vec<String>,
    alerts: Json<Vec<TaskAlert>>,
    comments: Json<Vec<TaskComment>>,
    estimated_hours: Option<f64>,
    actual_hours: Option<f64>,
    is_active: bool,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            title: row.title,
            description: row.description,
            status: TaskStatus::parse(&row.status).unwrap_or_default(),
            priority: TaskPriority::parse(&row.priority).unwrap_or_default(),
            category: TaskCategory::parse(&row.category).unwrap_or_default(),
            due_date: row.due_date,
            start_date: row.start_date,
            completed_date: row.completed_date,
            assigned_to: row.assigned_to,
            created_by: row.created_by,
            client_id: row.client_id,
            client_name: row.client_name,
            radicado: row.radicado,
            tags: row.tags,
            alerts: row.alerts.0,
            comments: row.comments.0,
            estimated_hours: row.estimated_hours,
            actual_hours: row.actual_hours,
            is_active: row.is_active,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Appends the WHERE clause for `query`. Soft-deleted rows never match.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &TaskQuery) {
    builder.push(" WHERE is_active");
    if let Some(assignee) = query.assigned_to {
        builder.push(" AND assigned_to = ").push_bind(assignee);
    }
    if !query.statuses.is_empty() {
        let statuses: Vec<String> = query.statuses.iter().map(|s| s.as_str().to_string()).collect();
        builder.push(" AND status = ANY(").push_bind(statuses).push(")");
    }
    if let Some(priority) = query.priority {
        builder.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(client_id) = query.client_id {
        builder.push(" AND client_id = ").push_bind(client_id);
    }
    if let Some(before) = query.due_before {
        builder.push(" AND due_date < ").push_bind(before);
    }
    if let Some(from) = query.due_from {
        builder.push(" AND due_date >= ").push_bind(from);
    }
    if let Some(until) = query.due_until {
        builder.push(" AND due_date <= ").push_bind(until);
    }
    if let Some(since) = query.completed_since {
        builder.push(" AND completed_date >= ").push_bind(since);
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR client_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR radicado ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE ")
            .push_bind(pattern)
            .push("))");
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

impl PgStore {
    async fn write_task(&self, task: &Task, insert: bool) -> StoreResult<Option<Task>> {
        let sql = if insert {
            format!(
                "INSERT INTO tasks ({}, priority_rank) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
                 $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24) RETURNING {}",
                COLUMNS, COLUMNS
            )
        } else {
            format!(
                "UPDATE tasks SET title = $2, description = $3, status = $4, priority = $5, category = $6, \
                 due_date = $7, start_date = $8, completed_date = $9, assigned_to = $10, created_by = $11, \
                 client_id = $12, client_name = $13, radicado = $14, tags = $15, alerts = $16, comments = $17, \
                 estimated_hours = $18, actual_hours = $19, is_active = $20, version = $21, created_at = $22, \
                 updated_at = $23, priority_rank = $24 WHERE id = $1 RETURNING {}",
                COLUMNS
            )
        };
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status.as_str())
            .bind(task.priority.as_str())
            .bind(task.category.as_str())
            .bind(task.due_date)
            .bind(task.start_date)
            .bind(task.completed_date)
            .bind(task.assigned_to)
            .bind(task.created_by)
            .bind(task.client_id)
            .bind(&task.client_name)
            .bind(&task.radicado)
            .bind(&task.tags)
            .bind(Json(&task.alerts))
            .bind(Json(&task.comments))
            .bind(task.estimated_hours)
            .bind(task.actual_hours)
            .bind(task.is_active)
            .bind(task.version)
            .bind(task.created_at)
            .bind(task.updated_at)
            .bind(task.priority.rank())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Task::from))
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create(&self, task: Task) -> StoreResult<Task> {
        self.write_task(&task, true)
            .await?
            .ok_or_else(|| DatabaseError::QueryError("insert returned no row".into()))
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", COLUMNS);
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Task::from))
    }

    async fn save(&self, task: &Task) -> StoreResult<Task> {
        self.write_task(task, false)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("task {}", task.id)))
    }

    async fn list(&self, query: &TaskQuery, page: Page) -> StoreResult<(Vec<Task>, u64)> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM tasks", COLUMNS));
        push_filters(&mut builder, query);
        builder
            .push(" ORDER BY priority_rank DESC, due_date ASC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows = builder.build_query_as::<TaskRow>().fetch_all(&self.pool).await?;

        let total = self.count(query).await?;
        Ok((rows.into_iter().map(Task::from).collect(), total))
    }

    async fn list_by_due(&self, query: &TaskQuery, limit: u32) -> StoreResult<Vec<Task>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM tasks", COLUMNS));
        push_filters(&mut builder, query);
        builder.push(" ORDER BY due_date ASC LIMIT ").push_bind(limit as i64);
        let rows = builder.build_query_as::<TaskRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn count(&self, query: &TaskQuery) -> StoreResult<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_filters(&mut builder, query);
        let total: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_filtered_where_clause() {
        let query = TaskQuery {
            assigned_to: Some(Uuid::nil()),
            statuses: TaskStatus::OPEN.to_vec(),
            search: Some("50%_off".into()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_filters(&mut builder, &query);
        let sql = builder.sql();
        assert!(sql.contains("WHERE is_active AND assigned_to = $1"));
        assert!(sql.contains("status = ANY($2)"));
        assert!(sql.contains("title ILIKE $3"));
        assert!(sql.contains("unnest(tags)"));
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
