use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Task completion status, stored kebab-case in the remote table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
        }
    }
}

// Display preference, captured onto tasks at creation time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

// Task struct, mirrors one row of the remote tasks table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub due_date: NaiveDate,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub order: i64,
    pub priority: u8,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub theme: Theme,
}

impl Task {
    // Overdue means strictly past the due date and not yet completed
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today && self.status != Status::Completed
    }
}

// Attachment metadata embedded in a task. Each attachment gets a stable id
// at capture time so deletion never has to address by array position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

// Comment embedded in a task; append-only upstream, display-only here
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// Authenticated identity supplied by the session provider
#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

// The partial task a form submit carries: everything the user edits,
// nothing the store or controller stamps on (id, owner, order, timestamps)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    pub description: String,
    pub status: Status,
    pub due_date: NaiveDate,
    pub priority: u8,
    pub project: String,
    pub labels: Vec<String>,
    pub assigned_to: Vec<String>,
    pub attachments: Vec<Attachment>,
}

// A payload stamped for insertion: owner, display rank, and the theme
// that was active when the task was created
#[derive(Clone, Debug, Serialize)]
pub struct NewTask {
    #[serde(flatten)]
    pub payload: TaskPayload,
    pub user_id: String,
    pub order: i64,
    pub theme: Theme,
}

pub fn priority_label(priority: u8) -> &'static str {
    match priority {
        1 => "Low",
        2 => "Medium-Low",
        3 => "Medium",
        4 => "Medium-High",
        5 => "High",
        _ => "Medium",
    }
}
