use crate::api::{Auth, RemoteStore, Session, TaskStore};
use crate::config::Config;
use crate::form::{FormField, TaskForm};
use crate::list::{self, StatusFilter};
use crate::models::{NewTask, Task, TaskPayload};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

const NOTICE_TTL: Duration = Duration::from_secs(4);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

// One transient toast tied to one operation outcome
#[derive(Debug)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    posted: Instant,
}

impl Notice {
    fn success(text: impl Into<String>) -> Notice {
        Notice {
            kind: NoticeKind::Success,
            text: text.into(),
            posted: Instant::now(),
        }
    }

    fn error(text: impl Into<String>) -> Notice {
        Notice {
            kind: NoticeKind::Error,
            text: text.into(),
            posted: Instant::now(),
        }
    }
}

// Which screen is visible; a pure function of whether a session exists
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Auth,
    Tasks,
}

pub enum InputMode {
    Normal,
    Search,
    Editing,
    Insert,
    Confirm,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Email,
    Password,
}

// Credential capture for the sign-in screen
pub struct AuthInput {
    pub email: String,
    pub password: String,
    pub field: AuthField,
}

pub struct App {
    pub config: Config,
    pub auth: Auth,
    pub store: Option<Arc<dyn TaskStore>>,
    pub session: Option<Session>,
    pub tasks: Vec<Task>,
    pub state: ListState,
    pub input_mode: InputMode,
    pub search_query: String,
    pub status_filter: StatusFilter,
    pub form: Option<TaskForm>,
    // task id awaiting the modal delete confirmation
    pub confirm_delete: Option<String>,
    // task id currently picked up for reordering
    pub grabbed: Option<String>,
    grab_snapshot: Vec<(String, i64)>,
    pub show_attachments: bool,
    pub show_comments: bool,
    pub attachment_cursor: usize,
    pub auth_input: AuthInput,
    pub notices: Vec<Notice>,
    notice_tx: UnboundedSender<Notice>,
    notice_rx: UnboundedReceiver<Notice>,
}

impl App {
    pub fn new(config: Config) -> App {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let auth = Auth::new(&config.instance_url, &config.anon_key);
        let email = config.email.clone().unwrap_or_default();
        App {
            config,
            auth,
            store: None,
            session: None,
            tasks: Vec::new(),
            state: ListState::default(),
            input_mode: InputMode::Normal,
            search_query: String::new(),
            status_filter: StatusFilter::All,
            form: None,
            confirm_delete: None,
            grabbed: None,
            grab_snapshot: Vec::new(),
            show_attachments: false,
            show_comments: false,
            attachment_cursor: 0,
            auth_input: AuthInput {
                email,
                password: String::new(),
                field: AuthField::Email,
            },
            notices: Vec::new(),
            notice_tx,
            notice_rx,
        }
    }

    pub fn route(&self) -> Route {
        if self.session.is_some() {
            Route::Tasks
        } else {
            Route::Auth
        }
    }

    // ---- notices ----------------------------------------------------------

    fn push_success(&mut self, text: impl Into<String>) {
        self.notices.push(Notice::success(text));
    }

    fn push_error(&mut self, text: impl Into<String>) {
        self.notices.push(Notice::error(text));
    }

    // Called once per event-loop tick: pick up outcomes from spawned
    // persistence calls and drop notices past their display window
    pub fn tick(&mut self) {
        while let Ok(notice) = self.notice_rx.try_recv() {
            self.notices.push(notice);
        }
        self.notices
            .retain(|n| n.posted.elapsed() < NOTICE_TTL);
    }

    // ---- filtered view & selection ----------------------------------------

    pub fn visible_tasks(&self) -> Vec<&Task> {
        list::filter_tasks(&self.tasks, &self.search_query, self.status_filter)
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let visible = self.visible_tasks();
        self.state.selected().and_then(|i| visible.get(i).copied())
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            self.state.select(None);
        } else {
            let i = self.state.selected().unwrap_or(0).min(len - 1);
            self.state.select(Some(i));
        }
    }

    pub fn next(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
        self.attachment_cursor = 0;
    }

    pub fn previous(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
        self.attachment_cursor = 0;
    }

    // ---- controller operations --------------------------------------------

    // Replace the local list wholesale from the store. On failure the list
    // stays whatever it was; the store remains the source of truth and the
    // next successful load reconciles any drift.
    pub async fn load(&mut self) {
        let (store, session) = match (&self.store, &self.session) {
            (Some(store), Some(session)) => (store.clone(), session.clone()),
            _ => return,
        };
        match store.list_tasks(&session.user.id).await {
            Ok(tasks) => {
                self.tasks = tasks;
                self.clamp_selection();
            }
            Err(err) => {
                self.push_error(format!("Failed to fetch tasks: {}", err));
            }
        }
    }

    // Creation is never optimistic: the task only appears after a reload
    pub async fn create(&mut self, payload: TaskPayload) {
        let (store, session) = match (&self.store, &self.session) {
            (Some(store), Some(session)) => (store.clone(), session.clone()),
            _ => return,
        };
        let new_task = NewTask {
            payload,
            user_id: session.user.id.clone(),
            order: self.tasks.len() as i64,
            theme: self.config.theme,
        };
        match store.insert_task(&new_task).await {
            Ok(()) => {
                self.push_success("Task created");
                self.load().await;
            }
            Err(err) => {
                self.push_error(format!("Failed to create task: {}", err));
            }
        }
    }

    pub async fn update(&mut self, id: String, payload: TaskPayload) {
        let store = match &self.store {
            Some(store) => store.clone(),
            None => return,
        };
        match store.update_task(&id, &payload).await {
            Ok(()) => {
                self.push_success("Task updated");
                self.load().await;
            }
            Err(err) => {
                self.push_error(format!("Failed to update task: {}", err));
            }
        }
    }

    // Runs only after the confirmation prompt was answered with yes
    pub async fn delete_confirmed(&mut self, id: String) {
        let store = match &self.store {
            Some(store) => store.clone(),
            None => return,
        };
        match store.delete_task(&id).await {
            Ok(()) => {
                self.push_success("Task deleted");
                self.load().await;
            }
            Err(err) => {
                self.push_error(format!("Failed to delete task: {}", err));
            }
        }
    }

    // Read-modify-write of the whole attachments array, keyed by the
    // attachment's stable id. An id that is no longer present is a no-op.
    pub async fn delete_attachment(&mut self, task_id: String, attachment_id: uuid::Uuid) {
        let store = match &self.store {
            Some(store) => store.clone(),
            None => return,
        };
        let mut attachments = match store.get_attachments(&task_id).await {
            Ok(attachments) => attachments,
            Err(err) => {
                self.push_error(format!("Failed to delete attachment: {}", err));
                return;
            }
        };
        attachments.retain(|a| a.id != attachment_id);
        match store.set_attachments(&task_id, &attachments).await {
            Ok(()) => {
                self.push_success("Attachment deleted");
                self.load().await;
            }
            Err(err) => {
                self.push_error(format!("Failed to delete attachment: {}", err));
            }
        }
    }

    // ---- reorder ----------------------------------------------------------

    // Pick up the selected task, or drop the one being carried. Dropping
    // kicks off persistence of everything that moved.
    pub fn toggle_grab(&mut self) -> Option<JoinHandle<()>> {
        match self.grabbed.take() {
            Some(_) => self.persist_order(),
            None => {
                let selected = self.selected_task().map(|t| t.id.clone());
                if let Some(id) = selected {
                    self.grabbed = Some(id);
                    self.grab_snapshot = self
                        .tasks
                        .iter()
                        .map(|t| (t.id.clone(), t.order))
                        .collect();
                }
                None
            }
        }
    }

    // Move the carried task over its neighbour in the visible list. Applied
    // to local state immediately; the UI never reverts mid-gesture.
    pub fn move_grabbed(&mut self, down: bool) {
        let grabbed = match &self.grabbed {
            Some(id) => id.clone(),
            None => return,
        };
        let visible: Vec<String> = self
            .visible_tasks()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        let pos = match visible.iter().position(|id| *id == grabbed) {
            Some(pos) => pos,
            None => return,
        };
        let target = if down {
            match visible.get(pos + 1) {
                Some(id) => id.clone(),
                None => return,
            }
        } else {
            if pos == 0 {
                return;
            }
            visible[pos - 1].clone()
        };
        list::move_task(&mut self.tasks, &grabbed, &target);

        // keep the selection on the carried task
        let new_pos = self.visible_tasks().iter().position(|t| t.id == grabbed);
        if let Some(new_pos) = new_pos {
            self.state.select(Some(new_pos));
        }
    }

    // One batched write for the whole gesture, fired off without blocking the
    // loop. The aggregate outcome comes back over the notice channel; a
    // failure never rolls back the optimistic local ordering.
    fn persist_order(&mut self) -> Option<JoinHandle<()>> {
        let store = self.store.clone()?;
        let changed: Vec<(String, i64)> = {
            let before = std::mem::take(&mut self.grab_snapshot);
            self.tasks
                .iter()
                .filter(|t| {
                    before
                        .iter()
                        .find(|(id, _)| *id == t.id)
                        .map(|(_, order)| *order != t.order)
                        .unwrap_or(true)
                })
                .map(|t| (t.id.clone(), t.order))
                .collect()
        };
        if changed.is_empty() {
            return None;
        }
        let tx = self.notice_tx.clone();
        Some(tokio::spawn(async move {
            let notice = match store.set_order(&changed).await {
                Ok(()) => Notice::success("Order saved"),
                Err(err) => Notice::error(format!("Failed to update task order: {}", err)),
            };
            // receiver only goes away when the app does
            let _ = tx.send(notice);
        }))
    }

    // ---- session ----------------------------------------------------------

    async fn sign_in(&mut self) {
        let email = self.auth_input.email.trim().to_string();
        let password = self.auth_input.password.clone();
        if email.is_empty() || password.is_empty() {
            self.push_error("Email and password are required");
            return;
        }
        match self.auth.sign_in(&email, &password).await {
            Ok(session) => {
                let store =
                    RemoteStore::new(&self.config.instance_url, &self.config.anon_key, &session);
                self.store = Some(Arc::new(store));
                self.session = Some(session);
                self.auth_input.password.clear();
                self.load().await;
            }
            Err(err) => {
                self.push_error(format!("Sign in failed: {}", err));
            }
        }
    }

    async fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(err) = self.auth.sign_out(&session).await {
                self.push_error(format!("Sign out failed: {}", err));
            }
        }
        self.store = None;
        self.tasks.clear();
        self.state.select(None);
        self.grabbed = None;
        self.form = None;
        self.input_mode = InputMode::Normal;
    }

    fn toggle_theme(&mut self) {
        self.config.theme = self.config.theme.toggled();
        if let Err(err) = self.config.save_theme() {
            self.push_error(format!("Failed to save theme: {}", err));
        }
    }

    // ---- input ------------------------------------------------------------

    pub async fn handle_input(&mut self, key: KeyEvent) -> bool {
        if self.route() == Route::Auth {
            return self.handle_auth_input(key).await;
        }
        match self.input_mode {
            InputMode::Normal => return self.handle_normal_input(key).await,
            InputMode::Search => match key.code {
                KeyCode::Char(c) => {
                    self.search_query.push(c);
                    self.clamp_selection();
                }
                KeyCode::Backspace => {
                    self.search_query.pop();
                    self.clamp_selection();
                }
                KeyCode::Esc => {
                    self.search_query.clear();
                    self.clamp_selection();
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Enter => {
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
            InputMode::Editing => self.handle_form_input(key).await,
            InputMode::Insert => self.handle_insert_input(key),
            InputMode::Confirm => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    if let Some(id) = self.confirm_delete.take() {
                        self.delete_confirmed(id).await;
                    }
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    // declining leaves everything untouched
                    self.confirm_delete = None;
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
        }
        false
    }

    async fn handle_auth_input(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Tab => {
                self.auth_input.field = match self.auth_input.field {
                    AuthField::Email => AuthField::Password,
                    AuthField::Password => AuthField::Email,
                };
            }
            KeyCode::Enter => self.sign_in().await,
            KeyCode::Char(c) => match self.auth_input.field {
                AuthField::Email => self.auth_input.email.push(c),
                AuthField::Password => self.auth_input.password.push(c),
            },
            KeyCode::Backspace => {
                match self.auth_input.field {
                    AuthField::Email => self.auth_input.email.pop(),
                    AuthField::Password => self.auth_input.password.pop(),
                };
            }
            _ => {}
        }
        false
    }

    async fn handle_normal_input(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.grabbed.is_some() {
                    self.move_grabbed(true);
                } else {
                    self.next();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.grabbed.is_some() {
                    self.move_grabbed(false);
                } else {
                    self.previous();
                }
            }
            KeyCode::Char('g') | KeyCode::Char(' ') => {
                self.toggle_grab();
            }
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Search;
            }
            KeyCode::Char('f') => {
                self.status_filter = self.status_filter.cycle();
                self.clamp_selection();
            }
            KeyCode::Char('T') => self.toggle_theme(),
            KeyCode::Char('a') => {
                self.form = Some(TaskForm::new(Local::now().date_naive()));
                self.input_mode = InputMode::Editing;
            }
            KeyCode::Char('e') => {
                let form = self.selected_task().map(TaskForm::for_task);
                if let Some(form) = form {
                    self.form = Some(form);
                    self.input_mode = InputMode::Editing;
                }
            }
            KeyCode::Char('d') => {
                let selected = self.selected_task().map(|t| t.id.clone());
                if let Some(id) = selected {
                    self.confirm_delete = Some(id);
                    self.input_mode = InputMode::Confirm;
                }
            }
            KeyCode::Char('o') => {
                self.show_attachments = !self.show_attachments;
                self.attachment_cursor = 0;
            }
            KeyCode::Char('c') => {
                self.show_comments = !self.show_comments;
            }
            KeyCode::Char('J') => {
                if self.show_attachments {
                    let len = self
                        .selected_task()
                        .map(|t| t.attachments.len())
                        .unwrap_or(0);
                    if len > 0 {
                        self.attachment_cursor = (self.attachment_cursor + 1) % len;
                    }
                }
            }
            KeyCode::Char('K') => {
                if self.show_attachments {
                    let len = self
                        .selected_task()
                        .map(|t| t.attachments.len())
                        .unwrap_or(0);
                    if len > 0 {
                        self.attachment_cursor = (self.attachment_cursor + len - 1) % len;
                    }
                }
            }
            KeyCode::Char('x') => {
                if self.show_attachments {
                    let target = self.selected_task().and_then(|task| {
                        task.attachments
                            .get(self.attachment_cursor)
                            .map(|a| (task.id.clone(), a.id))
                    });
                    if let Some((task_id, attachment_id)) = target {
                        self.delete_attachment(task_id, attachment_id).await;
                        self.attachment_cursor = 0;
                    }
                }
            }
            KeyCode::Char('r') => self.load().await,
            KeyCode::Char('L') => self.sign_out().await,
            _ => {}
        }
        false
    }

    async fn handle_form_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('i') => {
                self.input_mode = InputMode::Insert;
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => {
                if let Some(form) = &mut self.form {
                    form.field = form.field.next();
                }
            }
            KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => {
                if let Some(form) = &mut self.form {
                    form.field = form.field.previous();
                }
            }
            KeyCode::Char(' ') => {
                if let Some(form) = &mut self.form {
                    match form.field {
                        FormField::Status => form.cycle_status(),
                        FormField::Priority => form.cycle_priority(),
                        _ => {}
                    }
                }
            }
            KeyCode::Char('J') => {
                if let Some(form) = &mut self.form {
                    match form.field {
                        FormField::NewLabel => form.cycle_label_cursor(true),
                        FormField::AttachmentPath => form.cycle_attachment_cursor(true),
                        _ => {}
                    }
                }
            }
            KeyCode::Char('K') => {
                if let Some(form) = &mut self.form {
                    match form.field {
                        FormField::NewLabel => form.cycle_label_cursor(false),
                        FormField::AttachmentPath => form.cycle_attachment_cursor(false),
                        _ => {}
                    }
                }
            }
            KeyCode::Char('x') => {
                if let Some(form) = &mut self.form {
                    match form.field {
                        FormField::NewLabel => form.remove_selected_label(),
                        FormField::AttachmentPath => form.remove_selected_attachment(),
                        _ => {}
                    }
                }
            }
            KeyCode::Enter => {
                let submitted = match &self.form {
                    Some(form) => form.submit().map(|p| (form.editing_id.clone(), p)),
                    None => return,
                };
                match submitted {
                    Ok((Some(id), payload)) => {
                        self.update(id, payload).await;
                        self.form = None;
                        self.input_mode = InputMode::Normal;
                    }
                    Ok((None, payload)) => {
                        self.create(payload).await;
                        self.form = None;
                        self.input_mode = InputMode::Normal;
                    }
                    Err(msg) => {
                        // form stays open so the user can fix it
                        self.push_error(msg);
                    }
                }
            }
            KeyCode::Esc => {
                // cancel discards every in-memory edit
                self.form = None;
                self.input_mode = InputMode::Normal;
            }
            _ => {}
        }
    }

    fn handle_insert_input(&mut self, key: KeyEvent) {
        let form = match &mut self.form {
            Some(form) => form,
            None => {
                self.input_mode = InputMode::Normal;
                return;
            }
        };
        match key.code {
            KeyCode::Char(c) => form.push_char(c),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match form.field {
                FormField::NewLabel => form.add_label(),
                FormField::AttachmentPath => {
                    if let Err(msg) = form.attach_file() {
                        self.push_error(msg);
                    }
                }
                _ => {
                    self.input_mode = InputMode::Editing;
                }
            },
            KeyCode::Esc => {
                self.input_mode = InputMode::Editing;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{Attachment, Status, Theme, User};
    use async_trait::async_trait;
    use chrono::Utc;
    use crossterm::event::KeyModifiers;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn task(id: &str, title: &str, order: i64) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            status: Status::Pending,
            due_date: "2030-01-01".parse().unwrap(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            order,
            priority: 3,
            project: String::new(),
            labels: Vec::new(),
            attachments: Vec::new(),
            assigned_to: Vec::new(),
            comments: Vec::new(),
            theme: Theme::Light,
        }
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

    fn payload(title: &str) -> TaskPayload {
        TaskPayload {
            title: title.to_string(),
            description: String::new(),
            status: Status::Pending,
            due_date: "2030-01-01".parse().unwrap(),
            priority: 3,
            project: String::new(),
            labels: Vec::new(),
            assigned_to: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[derive(Default)]
    struct FakeStore {
        tasks: Mutex<Vec<Task>>,
        fail_list: bool,
        fail_insert: bool,
        fail_update: bool,
        fail_delete: bool,
        fail_attachments: bool,
        fail_order: bool,
        order_calls: AtomicUsize,
        last_order: Mutex<Vec<(String, i64)>>,
    }

    fn api_err() -> StoreError {
        StoreError::Api {
            status: 500,
            message: "boom".to_string(),
        }
    }

    #[async_trait]
    impl TaskStore for FakeStore {
        async fn list_tasks(&self, _user_id: &str) -> Result<Vec<Task>, StoreError> {
            if self.fail_list {
                return Err(api_err());
            }
            let mut tasks = self.tasks.lock().unwrap().clone();
            tasks.sort_by_key(|t| t.order);
            Ok(tasks)
        }

        async fn insert_task(&self, new: &NewTask) -> Result<(), StoreError> {
            if self.fail_insert {
                return Err(api_err());
            }
            let mut tasks = self.tasks.lock().unwrap();
            let mut task = task("generated", &new.payload.title, new.order);
            task.id = format!("gen-{}", tasks.len());
            tasks.push(task);
            Ok(())
        }

        async fn update_task(&self, id: &str, p: &TaskPayload) -> Result<(), StoreError> {
            if self.fail_update {
                return Err(api_err());
            }
            let mut tasks = self.tasks.lock().unwrap();
            if let Some(t) = tasks.iter_mut().find(|t| t.id == id) {
                t.title = p.title.clone();
                t.status = p.status;
                t.priority = p.priority;
            }
            Ok(())
        }

        async fn delete_task(&self, id: &str) -> Result<(), StoreError> {
            if self.fail_delete {
                return Err(api_err());
            }
            self.tasks.lock().unwrap().retain(|t| t.id != id);
            Ok(())
        }

        async fn get_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, StoreError> {
            let tasks = self.tasks.lock().unwrap();
            Ok(tasks
                .iter()
                .find(|t| t.id == task_id)
                .map(|t| t.attachments.clone())
                .unwrap_or_default())
        }

        async fn set_attachments(
            &self,
            task_id: &str,
            attachments: &[Attachment],
        ) -> Result<(), StoreError> {
            if self.fail_attachments {
                return Err(api_err());
            }
            let mut tasks = self.tasks.lock().unwrap();
            if let Some(t) = tasks.iter_mut().find(|t| t.id == task_id) {
                t.attachments = attachments.to_vec();
            }
            Ok(())
        }

        async fn set_order(&self, items: &[(String, i64)]) -> Result<(), StoreError> {
            self.order_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_order.lock().unwrap() = items.to_vec();
            if self.fail_order {
                return Err(api_err());
            }
            let mut tasks = self.tasks.lock().unwrap();
            for (id, order) in items {
                if let Some(t) = tasks.iter_mut().find(|t| t.id == *id) {
                    t.order = *order;
                }
            }
            Ok(())
        }
    }

    fn test_app(store: FakeStore) -> (App, Arc<FakeStore>) {
        let config = Config {
            instance_url: "http://localhost".to_string(),
            anon_key: "anon".to_string(),
            email: None,
            theme: Theme::Light,
        };
        let store = Arc::new(store);
        let mut app = App::new(config);
        app.session = Some(Session {
            user: User {
                id: "u1".to_string(),
                email: "u1@example.com".to_string(),
            },
            access_token: "token".to_string(),
        });
        app.store = Some(store.clone() as Arc<dyn TaskStore>);
        (app, store)
    }

    fn seeded_store() -> FakeStore {
        let store = FakeStore::default();
        *store.tasks.lock().unwrap() = vec![
            task("a", "Task A", 0),
            task("b", "Task B", 1),
            task("c", "Task C", 2),
        ];
        store
    }

    fn error_notices(app: &App) -> usize {
        app.notices
            .iter()
            .filter(|n| n.kind == NoticeKind::Error)
            .count()
    }

    #[tokio::test]
    async fn test_load_replaces_local_state_in_order() {
        let (mut app, _) = test_app(seeded_store());
        app.load().await;
        let ids: Vec<&str> = app.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(app.state.selected(), Some(0));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_local_state_untouched() {
        let store = FakeStore {
            fail_insert: true,
            ..seeded_store()
        };
        let (mut app, _) = test_app(store);
        app.load().await;
        app.notices.clear();

        app.create(payload("Doomed")).await;

        assert_eq!(app.tasks.len(), 3);
        assert!(app.tasks.iter().all(|t| t.title != "Doomed"));
        // exactly one failure notice for the attempt
        assert_eq!(app.notices.len(), 1);
        assert_eq!(error_notices(&app), 1);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_tasks() {
        let store = FakeStore {
            fail_list: true,
            ..seeded_store()
        };
        let (mut app, _) = test_app(store);
        app.tasks = vec![task("stale", "Old copy", 0)];

        app.load().await;

        assert_eq!(app.tasks.len(), 1);
        assert_eq!(app.tasks[0].id, "stale");
        assert_eq!(app.notices.len(), 1);
        assert_eq!(error_notices(&app), 1);
    }

    #[tokio::test]
    async fn test_update_edits_remote_and_reloads() {
        let (mut app, store) = test_app(seeded_store());
        app.load().await;

        let mut renamed = payload("Task B renamed");
        renamed.priority = 5;
        app.update("b".to_string(), renamed).await;

        assert_eq!(store.tasks.lock().unwrap()[1].title, "Task B renamed");
        assert!(app
            .tasks
            .iter()
            .any(|t| t.title == "Task B renamed" && t.priority == 5));
        assert!(app
            .notices
            .iter()
            .any(|n| n.kind == NoticeKind::Success));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_task_untouched() {
        let store = FakeStore {
            fail_update: true,
            ..seeded_store()
        };
        let (mut app, store) = test_app(store);
        app.load().await;
        app.notices.clear();

        app.update("b".to_string(), payload("Renamed")).await;

        assert_eq!(store.tasks.lock().unwrap()[1].title, "Task B");
        assert_eq!(app.tasks[1].title, "Task B");
        assert_eq!(app.notices.len(), 1);
        assert_eq!(error_notices(&app), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_task() {
        let store = FakeStore {
            fail_delete: true,
            ..seeded_store()
        };
        let (mut app, store) = test_app(store);
        app.load().await;
        app.notices.clear();

        app.delete_confirmed("a".to_string()).await;

        assert_eq!(store.tasks.lock().unwrap().len(), 3);
        assert_eq!(app.tasks.len(), 3);
        assert_eq!(app.notices.len(), 1);
        assert_eq!(error_notices(&app), 1);
    }

    #[tokio::test]
    async fn test_failed_attachment_write_keeps_remote_state() {
        let store = seeded_store();
        let doomed = attachment("one.txt");
        let doomed_id = doomed.id;
        store.tasks.lock().unwrap()[0].attachments = vec![doomed, attachment("two.txt")];
        let store = FakeStore {
            fail_attachments: true,
            ..store
        };

        let (mut app, store) = test_app(store);
        app.load().await;
        app.notices.clear();

        app.delete_attachment("a".to_string(), doomed_id).await;

        assert_eq!(store.tasks.lock().unwrap()[0].attachments.len(), 2);
        assert_eq!(app.notices.len(), 1);
        assert_eq!(error_notices(&app), 1);
    }

    #[tokio::test]
    async fn test_create_stamps_order_and_reloads() {
        let (mut app, store) = test_app(seeded_store());
        app.load().await;
        app.create(payload("New task")).await;

        assert_eq!(app.tasks.len(), 4);
        let created = store
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.title == "New task")
            .cloned()
            .unwrap();
        assert_eq!(created.order, 3);
        assert!(app
            .notices
            .iter()
            .any(|n| n.kind == NoticeKind::Success));
    }

    #[tokio::test]
    async fn test_reorder_persists_one_batched_call() {
        let (mut app, store) = test_app(seeded_store());
        app.load().await;

        // grab C, carry it to the top, drop it
        app.state.select(Some(2));
        app.toggle_grab();
        assert_eq!(app.grabbed.as_deref(), Some("c"));
        app.move_grabbed(false);
        app.move_grabbed(false);

        // optimistic state is already visible before persistence
        let ids: Vec<&str> = app.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        let orders: Vec<i64> = app.tasks.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        let handle = app.toggle_grab().expect("persistence spawned");
        handle.await.unwrap();
        app.tick();

        assert_eq!(store.order_calls.load(Ordering::SeqCst), 1);
        let sent = store.last_order.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                ("c".to_string(), 0),
                ("a".to_string(), 1),
                ("b".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn test_reorder_failure_keeps_optimistic_state() {
        let store = FakeStore {
            fail_order: true,
            ..seeded_store()
        };
        let (mut app, _) = test_app(store);
        app.load().await;
        app.notices.clear();

        app.state.select(Some(2));
        app.toggle_grab();
        app.move_grabbed(false);
        app.move_grabbed(false);
        let handle = app.toggle_grab().expect("persistence spawned");
        handle.await.unwrap();
        app.tick();

        // no rollback, one aggregate failure notice
        let ids: Vec<&str> = app.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(error_notices(&app), 1);
    }

    #[tokio::test]
    async fn test_grab_without_movement_persists_nothing() {
        let (mut app, store) = test_app(seeded_store());
        app.load().await;
        app.state.select(Some(1));
        app.toggle_grab();
        assert!(app.toggle_grab().is_none());
        assert_eq!(store.order_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let (mut app, store) = test_app(seeded_store());
        app.load().await;
        app.state.select(Some(0));

        let key = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);

        // decline: nothing happens
        app.handle_input(key('d')).await;
        assert!(app.confirm_delete.is_some());
        app.handle_input(key('n')).await;
        assert_eq!(store.tasks.lock().unwrap().len(), 3);
        assert!(app.confirm_delete.is_none());

        // accept: the task goes away and the list reloads
        app.handle_input(key('d')).await;
        app.handle_input(key('y')).await;
        assert_eq!(store.tasks.lock().unwrap().len(), 2);
        assert_eq!(app.tasks.len(), 2);
        assert!(app.tasks.iter().all(|t| t.id != "a"));
    }

    #[tokio::test]
    async fn test_delete_attachment_by_stable_id() {
        let store = seeded_store();
        let (first, second) = (attachment("one.txt"), attachment("two.txt"));
        let doomed = second.id;
        store.tasks.lock().unwrap()[0].attachments = vec![first, second.clone()];

        let (mut app, store) = test_app(store);
        app.load().await;
        app.delete_attachment("a".to_string(), doomed).await;

        let remaining = store.tasks.lock().unwrap()[0].attachments.clone();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "one.txt");
        // local copy refreshed too
        assert_eq!(app.tasks[0].attachments.len(), 1);

        // deleting an id that is already gone is a quiet success
        app.notices.clear();
        app.delete_attachment("a".to_string(), doomed).await;
        assert_eq!(error_notices(&app), 0);
        assert_eq!(store.tasks.lock().unwrap()[0].attachments.len(), 1);
    }

    #[tokio::test]
    async fn test_form_keys_remove_label_and_attachment() {
        let store = seeded_store();
        {
            let mut tasks = store.tasks.lock().unwrap();
            tasks[0].labels = vec!["home".to_string(), "work".to_string()];
            tasks[0].attachments = vec![attachment("one.txt"), attachment("two.txt")];
        }
        let (mut app, _) = test_app(store);
        app.load().await;
        app.state.select(Some(0));

        let key = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);

        // open the edit form, pick the second label, remove it by value
        app.handle_input(key('e')).await;
        app.form.as_mut().unwrap().field = FormField::NewLabel;
        app.handle_input(key('J')).await;
        app.handle_input(key('x')).await;
        assert_eq!(
            app.form.as_ref().unwrap().labels,
            vec!["home".to_string()]
        );

        // same gesture on the attachment rows, addressed by stable id
        app.form.as_mut().unwrap().field = FormField::AttachmentPath;
        app.handle_input(key('x')).await;
        let form = app.form.as_ref().unwrap();
        assert_eq!(form.attachments.len(), 1);
        assert_eq!(form.attachments[0].name, "two.txt");
    }

    #[tokio::test]
    async fn test_search_and_filter_narrow_the_visible_list() {
        let store = seeded_store();
        store.tasks.lock().unwrap()[1].status = Status::Completed;
        let (mut app, _) = test_app(store);
        app.load().await;

        app.search_query = "task b".to_string();
        let visible = app.visible_tasks();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "b");

        app.search_query.clear();
        app.status_filter = StatusFilter::Only(Status::Completed);
        let visible = app.visible_tasks();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "b");
    }

    #[tokio::test]
    async fn test_route_follows_session() {
        let (mut app, _) = test_app(FakeStore::default());
        assert_eq!(app.route(), Route::Tasks);
        app.session = None;
        assert_eq!(app.route(), Route::Auth);
    }
}
