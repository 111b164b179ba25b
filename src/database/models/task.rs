use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DAY_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "en-curso")]
    InProgress,
    #[serde(rename = "completada")]
    Completed,
    #[serde(rename = "cancelada")]
    Cancelled,
}

impl TaskStatus {
    pub const OPEN: [TaskStatus; 2] = [TaskStatus::Pending, TaskStatus::InProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pendiente",
            TaskStatus::InProgress => "en-curso",
            TaskStatus::Completed => "completada",
            TaskStatus::Cancelled => "cancelada",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pendiente" => Some(TaskStatus::Pending),
            "en-curso" => Some(TaskStatus::InProgress),
            "completada" => Some(TaskStatus::Completed),
            "cancelada" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskPriority {
    #[serde(rename = "baja")]
    Low,
    #[default]
    #[serde(rename = "media")]
    Medium,
    #[serde(rename = "alta")]
    High,
    #[serde(rename = "urgente")]
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "baja",
            TaskPriority::Medium => "media",
            TaskPriority::High => "alta",
            TaskPriority::Urgent => "urgente",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "baja" => Some(TaskPriority::Low),
            "media" => Some(TaskPriority::Medium),
            "alta" => Some(TaskPriority::High),
            "urgente" => Some(TaskPriority::Urgent),
            _ => None,
        }
    }

    /// Higher is more urgent.
    pub fn rank(&self) -> i16 {
        match self {
            TaskPriority::Low => 1,
            TaskPriority::Medium => 2,
            TaskPriority::High => 3,
            TaskPriority::Urgent => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Laboral,
    Civil,
    Penal,
    Administrativo,
    Tributario,
    Comercial,
    Familia,
    #[default]
    Otro,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Laboral => "laboral",
            TaskCategory::Civil => "civil",
            TaskCategory::Penal => "penal",
            TaskCategory::Administrativo => "administrativo",
            TaskCategory::Tributario => "tributario",
            TaskCategory::Comercial => "comercial",
            TaskCategory::Familia => "familia",
            TaskCategory::Otro => "otro",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Vencimiento,
    Recordatorio,
    Urgente,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub date: DateTime<Utc>,
    pub sent: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskComment {
    pub user: Uuid,
    pub text: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub category: TaskCategory,
    pub due_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub radicado: Option<String>,
    pub tags: Vec<String>,
    pub alerts: Vec<TaskAlert>,
    pub comments: Vec<TaskComment>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub is_active: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed && self.due_date < now
    }

    /// Whole days until due, rounded up. Zero once completed.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        if self.status == TaskStatus::Completed {
            return 0;
        }
        let diff_ms = (self.due_date - now).num_milliseconds() as f64;
        (diff_ms / DAY_MS).ceil() as i64
    }

    /// Moves to `status`, stamping or clearing the completion date.
    pub fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.completed_date = completed_date_for(self.completed_date, status, now);
        self.status = status;
    }

    /// The "due tomorrow" reminder, when that moment is still ahead.
    pub fn reminder_alert(due_date: DateTime<Utc>, now: DateTime<Utc>) -> Option<TaskAlert> {
        let date = due_date - Duration::days(1);
        (date > now).then(|| TaskAlert {
            kind: AlertKind::Recordatorio,
            date,
            sent: false,
            message: "Recordatorio: tarea vence mañana".to_string(),
        })
    }

    pub fn view(&self, now: DateTime<Utc>) -> TaskView {
        TaskView {
            is_overdue: self.is_overdue(now),
            days_remaining: self.days_remaining(now),
            task: self.clone(),
        }
    }
}

/// Completion date after a status change.
pub fn completed_date_for(
    completed_date: Option<DateTime<Utc>>,
    next: TaskStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match next {
        TaskStatus::Completed => completed_date.or(Some(now)),
        _ => None,
    }
}

/// A task with its derived read-time fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub is_overdue: bool,
    pub days_remaining: i64,
}

/// Store-level query. Every populated field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub assigned_to: Option<Uuid>,
    /// Empty means any status.
    pub statuses: Vec<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub client_id: Option<Uuid>,
    pub search: Option<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_until: Option<DateTime<Utc>>,
    pub completed_since: Option<DateTime<Utc>>,
}

impl TaskQuery {
    /// Only active tasks ever match.
    pub fn matches(&self, task: &Task) -> bool {
        if !task.is_active {
            return false;
        }
        if let Some(assignee) = self.assigned_to {
            if task.assigned_to != assignee {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(client_id) = self.client_id {
            if task.client_id != Some(client_id) {
                return false;
            }
        }
        if let Some(before) = self.due_before {
            if task.due_date >= before {
                return false;
            }
        }
        if let Some(from) = self.due_from {
            if task.due_date < from {
                return false;
            }
        }
        if let Some(until) = self.due_until {
            if task.due_date > until {
                return false;
            }
        }
        if let Some(since) = self.completed_since {
            match task.completed_date {
                Some(done) if done >= since => {}
                _ => return false,
            }
        }
        if let Some(needle) = self.search.as_deref().map(str::to_lowercase) {
            let hit = |field: Option<&str>| field.is_some_and(|v| v.to_lowercase().contains(&needle));
            let found = hit(Some(&task.title))
                || hit(task.description.as_deref())
                || hit(task.client_name.as_deref())
                || hit(task.radicado.as_deref())
                || task.tags.iter().any(|t| hit(Some(t)));
            if !found {
                return false;
            }
        }
        true
    }
}

/// Priority rank descending, then nearest due date.
pub fn list_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then_with(|| a.due_date.cmp(&b.due_date))
}
