use crate::models::{Attachment, Status, Task, TaskPayload};
use crate::parser::parse_title_input;
use chrono::{NaiveDate, Utc};
use std::fs;
use std::path::Path;
use uuid::Uuid;

// Which form field currently receives keystrokes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Project,
    DueDate,
    Status,
    Priority,
    NewLabel,
    AttachmentPath,
}

impl FormField {
    pub fn next(self) -> FormField {
        match self {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Project,
            FormField::Project => FormField::DueDate,
            FormField::DueDate => FormField::Status,
            FormField::Status => FormField::Priority,
            FormField::Priority => FormField::NewLabel,
            FormField::NewLabel => FormField::AttachmentPath,
            FormField::AttachmentPath => FormField::Title,
        }
    }

    pub fn previous(self) -> FormField {
        match self {
            FormField::Title => FormField::AttachmentPath,
            FormField::Description => FormField::Title,
            FormField::Project => FormField::Description,
            FormField::DueDate => FormField::Project,
            FormField::Status => FormField::DueDate,
            FormField::Priority => FormField::Status,
            FormField::NewLabel => FormField::Priority,
            FormField::AttachmentPath => FormField::NewLabel,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::Project => "Project",
            FormField::DueDate => "Due Date",
            FormField::Status => "Status",
            FormField::Priority => "Priority",
            FormField::NewLabel => "Add Label",
            FormField::AttachmentPath => "Attach File",
        }
    }
}

// In-memory edit state for creating or updating one task. Nothing here
// touches the store; submit hands a payload up and cancel throws it all away.
pub struct TaskForm {
    // None when creating, Some(id) when editing an existing task
    pub editing_id: Option<String>,
    pub title: String,
    pub description: String,
    pub project: String,
    pub due_date: String,
    pub status: Status,
    pub priority: u8,
    pub labels: Vec<String>,
    pub assigned_to: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub new_label: String,
    pub attachment_path: String,
    pub field: FormField,
    // selection cursors for removing labels / attachments from the form
    pub label_cursor: usize,
    pub attachment_cursor: usize,
}

impl TaskForm {
    // Blank form for a new task: due today, medium priority, pending
    pub fn new(today: NaiveDate) -> TaskForm {
        TaskForm {
            editing_id: None,
            title: String::new(),
            description: String::new(),
            project: String::new(),
            due_date: today.format("%Y-%m-%d").to_string(),
            status: Status::Pending,
            priority: 3,
            labels: Vec::new(),
            assigned_to: Vec::new(),
            attachments: Vec::new(),
            new_label: String::new(),
            attachment_path: String::new(),
            field: FormField::Title,
            label_cursor: 0,
            attachment_cursor: 0,
        }
    }

    // Form pre-populated from an existing task
    pub fn for_task(task: &Task) -> TaskForm {
        TaskForm {
            editing_id: Some(task.id.clone()),
            title: task.title.clone(),
            description: task.description.clone(),
            project: task.project.clone(),
            due_date: task.due_date.format("%Y-%m-%d").to_string(),
            status: task.status,
            priority: task.priority,
            labels: task.labels.clone(),
            assigned_to: task.assigned_to.clone(),
            attachments: task.attachments.clone(),
            new_label: String::new(),
            attachment_path: String::new(),
            field: FormField::Title,
            label_cursor: 0,
            attachment_cursor: 0,
        }
    }

    pub fn push_char(&mut self, c: char) {
        match self.field {
            FormField::Title => self.title.push(c),
            FormField::Description => self.description.push(c),
            FormField::Project => self.project.push(c),
            FormField::DueDate => self.due_date.push(c),
            FormField::NewLabel => self.new_label.push(c),
            FormField::AttachmentPath => self.attachment_path.push(c),
            FormField::Status | FormField::Priority => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.field {
            FormField::Title => {
                self.title.pop();
            }
            FormField::Description => {
                self.description.pop();
            }
            FormField::Project => {
                self.project.pop();
            }
            FormField::DueDate => {
                self.due_date.pop();
            }
            FormField::NewLabel => {
                self.new_label.pop();
            }
            FormField::AttachmentPath => {
                self.attachment_path.pop();
            }
            FormField::Status | FormField::Priority => {}
        }
    }

    pub fn cycle_status(&mut self) {
        self.status = match self.status {
            Status::Pending => Status::InProgress,
            Status::InProgress => Status::Completed,
            Status::Completed => Status::Pending,
        };
    }

    pub fn cycle_priority(&mut self) {
        self.priority = if self.priority >= 5 { 1 } else { self.priority + 1 };
    }

    // Duplicate or blank labels are a silent no-op
    pub fn add_label(&mut self) {
        let label = self.new_label.trim().to_string();
        if !label.is_empty() && !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self.new_label.clear();
    }

    pub fn remove_label(&mut self, label: &str) {
        self.labels.retain(|l| l != label);
    }

    pub fn cycle_label_cursor(&mut self, down: bool) {
        let len = self.labels.len();
        if len == 0 {
            return;
        }
        self.label_cursor = if down {
            (self.label_cursor + 1) % len
        } else {
            (self.label_cursor + len - 1) % len
        };
    }

    pub fn remove_selected_label(&mut self) {
        let label = match self.labels.get(self.label_cursor) {
            Some(label) => label.clone(),
            None => return,
        };
        self.remove_label(&label);
        if self.label_cursor >= self.labels.len() && self.label_cursor > 0 {
            self.label_cursor -= 1;
        }
    }

    pub fn cycle_attachment_cursor(&mut self, down: bool) {
        let len = self.attachments.len();
        if len == 0 {
            return;
        }
        self.attachment_cursor = if down {
            (self.attachment_cursor + 1) % len
        } else {
            (self.attachment_cursor + len - 1) % len
        };
    }

    pub fn remove_selected_attachment(&mut self) {
        let id = match self.attachments.get(self.attachment_cursor) {
            Some(attachment) => attachment.id,
            None => return,
        };
        self.remove_attachment(id);
        if self.attachment_cursor >= self.attachments.len() && self.attachment_cursor > 0 {
            self.attachment_cursor -= 1;
        }
    }

    // Capture the file at `attachment_path` as an attachment record. The
    // reference is a local file URL; durable storage is someone else's job.
    pub fn attach_file(&mut self) -> Result<(), String> {
        let path_text = self.attachment_path.trim().to_string();
        if path_text.is_empty() {
            return Ok(());
        }
        let path = Path::new(&path_text);
        let meta = fs::metadata(path)
            .map_err(|e| format!("cannot read {}: {}", path_text, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_text.clone());

        self.attachments.push(Attachment {
            id: Uuid::new_v4(),
            url: format!("file://{}", path_text),
            name,
            content_type: content_type_for(path).to_string(),
            size: meta.len(),
            uploaded_at: Utc::now(),
        });
        self.attachment_path.clear();
        Ok(())
    }

    // Unknown ids are ignored; relative order of the rest is preserved
    pub fn remove_attachment(&mut self, id: Uuid) {
        self.attachments.retain(|a| a.id != id);
    }

    // Validate and emit the payload. Quick-add tokens in the title (priority,
    // labels, project) are folded in here.
    pub fn submit(&self) -> Result<TaskPayload, String> {
        let parsed = parse_title_input(&self.title);
        if parsed.title.is_empty() {
            return Err("title is required".to_string());
        }
        let due_date: NaiveDate = self
            .due_date
            .trim()
            .parse()
            .map_err(|_| "due date must be YYYY-MM-DD".to_string())?;

        let mut labels = self.labels.clone();
        for label in parsed.labels {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }

        Ok(TaskPayload {
            title: parsed.title,
            description: self.description.clone(),
            status: self.status,
            due_date,
            priority: parsed.priority.unwrap_or(self.priority),
            project: parsed.project.unwrap_or_else(|| self.project.clone()),
            labels,
            assigned_to: self.assigned_to.clone(),
            attachments: self.attachments.clone(),
        })
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Theme;

    fn today() -> NaiveDate {
        "2024-06-01".parse().unwrap()
    }

    fn attachment(name: &str) -> Attachment {
        Attachment {
            id: Uuid::new_v4(),
            url: format!("file:///tmp/{}", name),
            name: name.to_string(),
            content_type: "text/plain".to_string(),
            size: 1,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_form_defaults() {
        let form = TaskForm::new(today());
        assert_eq!(form.due_date, "2024-06-01");
        assert_eq!(form.priority, 3);
        assert_eq!(form.status, Status::Pending);
        assert!(form.labels.is_empty());
        assert!(form.attachments.is_empty());
        assert!(form.editing_id.is_none());
    }

    #[test]
    fn test_form_prefilled_from_task() {
        let task = Task {
            id: "t9".to_string(),
            title: "Write report".to_string(),
            description: "quarterly".to_string(),
            status: Status::InProgress,
            due_date: "2024-07-15".parse().unwrap(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            order: 4,
            priority: 5,
            project: "finance".to_string(),
            labels: vec!["reports".to_string()],
            attachments: vec![attachment("draft.md")],
            assigned_to: Vec::new(),
            comments: Vec::new(),
            theme: Theme::Dark,
        };
        let form = TaskForm::for_task(&task);
        assert_eq!(form.editing_id.as_deref(), Some("t9"));
        assert_eq!(form.due_date, "2024-07-15");
        assert_eq!(form.priority, 5);
        assert_eq!(form.attachments.len(), 1);
    }

    #[test]
    fn test_add_label_ignores_duplicates_and_blanks() {
        let mut form = TaskForm::new(today());
        form.new_label = "home".to_string();
        form.add_label();
        form.new_label = "home".to_string();
        form.add_label();
        form.new_label = "   ".to_string();
        form.add_label();
        assert_eq!(form.labels, vec!["home".to_string()]);
        assert!(form.new_label.is_empty());
    }

    #[test]
    fn test_remove_attachment_by_id_preserves_order() {
        let mut form = TaskForm::new(today());
        form.attachments = vec![attachment("a"), attachment("b"), attachment("c")];
        let middle = form.attachments[1].id;
        form.remove_attachment(middle);

        let names: Vec<&str> = form.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);

        // unknown id is a no-op
        form.remove_attachment(Uuid::new_v4());
        assert_eq!(form.attachments.len(), 2);
    }

    #[test]
    fn test_remove_selected_label_removes_by_value_not_last() {
        let mut form = TaskForm::new(today());
        form.labels = vec![
            "home".to_string(),
            "work".to_string(),
            "errands".to_string(),
        ];

        form.cycle_label_cursor(true);
        form.remove_selected_label();
        assert_eq!(
            form.labels,
            vec!["home".to_string(), "errands".to_string()]
        );

        // cursor clamps when the tail entry goes away
        form.remove_selected_label();
        assert_eq!(form.labels, vec!["home".to_string()]);
        assert_eq!(form.label_cursor, 0);

        // removing from an empty list is a no-op
        form.remove_selected_label();
        form.remove_selected_label();
        assert!(form.labels.is_empty());
    }

    #[test]
    fn test_remove_selected_attachment_addresses_stable_id() {
        let mut form = TaskForm::new(today());
        form.attachments = vec![attachment("a"), attachment("b"), attachment("c")];

        form.cycle_attachment_cursor(true);
        form.remove_selected_attachment();

        let names: Vec<&str> = form.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(form.attachment_cursor, 1);
    }

    #[test]
    fn test_submit_requires_title_and_valid_due_date() {
        let mut form = TaskForm::new(today());
        assert!(form.submit().is_err());

        form.title = "Buy milk".to_string();
        form.due_date = "tomorrow".to_string();
        assert!(form.submit().is_err());

        form.due_date = "2024-06-02".to_string();
        let payload = form.submit().unwrap();
        assert_eq!(payload.title, "Buy milk");
        assert_eq!(payload.due_date, "2024-06-02".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn test_submit_folds_in_quick_add_tokens() {
        let mut form = TaskForm::new(today());
        form.title = "Fix login !5 #backend @webapp".to_string();
        form.labels = vec!["backend".to_string(), "bugs".to_string()];

        let payload = form.submit().unwrap();
        assert_eq!(payload.title, "Fix login");
        assert_eq!(payload.priority, 5);
        assert_eq!(payload.project, "webapp");
        assert_eq!(
            payload.labels,
            vec!["backend".to_string(), "bugs".to_string()]
        );
    }

    #[test]
    fn test_field_cycle_wraps_both_ways() {
        let mut field = FormField::Title;
        for _ in 0..8 {
            field = field.next();
        }
        assert_eq!(field, FormField::Title);
        assert_eq!(FormField::Title.previous(), FormField::AttachmentPath);
    }
}
