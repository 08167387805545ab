use crate::error::StoreError;
use crate::models::{Attachment, NewTask, Task, TaskPayload, User};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

// An authenticated session handed out by the hosted auth endpoint
#[derive(Clone, Debug)]
pub struct Session {
    pub user: User,
    pub access_token: String,
}

// The remote table of task records. The app talks to it only through this
// trait so tests can swap in an in-memory double.
#[async_trait]
pub trait TaskStore: Send + Sync {
    // All tasks owned by `user_id`, ascending by display order
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, StoreError>;
    async fn insert_task(&self, task: &NewTask) -> Result<(), StoreError>;
    async fn update_task(&self, id: &str, payload: &TaskPayload) -> Result<(), StoreError>;
    async fn delete_task(&self, id: &str) -> Result<(), StoreError>;
    async fn get_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, StoreError>;
    async fn set_attachments(
        &self,
        task_id: &str,
        attachments: &[Attachment],
    ) -> Result<(), StoreError>;
    // One batched write for a reorder: every changed (id, order) pair lands
    // in a single upsert so the gesture has one aggregate outcome
    async fn set_order(&self, items: &[(String, i64)]) -> Result<(), StoreError>;
}

// Session provider backed by the hosted auth endpoint
pub struct Auth {
    http: Client,
    instance_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: User,
}

impl Auth {
    pub fn new(instance_url: &str, anon_key: &str) -> Auth {
        Auth {
            http: Client::new(),
            instance_url: instance_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.instance_url);
        let res = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if res.status().is_success() {
            let token = res.json::<TokenResponse>().await?;
            Ok(Session {
                user: token.user,
                access_token: token.access_token,
            })
        } else {
            let error_text = res.text().await?;
            Err(StoreError::Auth(error_text))
        }
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), StoreError> {
        let url = format!("{}/auth/v1/logout", self.instance_url);
        let res = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }
}

// reqwest-backed store over the hosted REST surface
pub struct RemoteStore {
    http: Client,
    instance_url: String,
    anon_key: String,
    access_token: String,
}

impl RemoteStore {
    pub fn new(instance_url: &str, anon_key: &str, session: &Session) -> RemoteStore {
        RemoteStore {
            http: Client::new(),
            instance_url: instance_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: session.access_token.clone(),
        }
    }

    fn tasks_url(&self, query: &str) -> String {
        format!("{}/rest/v1/tasks{}", self.instance_url, query)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.access_token))
    }
}

// Map a non-success response to an error carrying the store's message
async fn check(res: Response) -> Result<Response, StoreError> {
    let status = res.status();
    if status.is_success() {
        Ok(res)
    } else {
        let message = res.text().await?;
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TaskStore for RemoteStore {
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let url = self.tasks_url(&format!(
            "?select=*&user_id=eq.{}&order=order.asc",
            user_id
        ));
        let res = self.authed(self.http.get(&url)).send().await?;
        let tasks = check(res).await?.json::<Vec<Task>>().await?;
        Ok(tasks)
    }

    async fn insert_task(&self, task: &NewTask) -> Result<(), StoreError> {
        let url = self.tasks_url("");
        let res = self
            .authed(self.http.post(&url))
            .json(&[task])
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn update_task(&self, id: &str, payload: &TaskPayload) -> Result<(), StoreError> {
        let url = self.tasks_url(&format!("?id=eq.{}", id));
        let res = self
            .authed(self.http.patch(&url))
            .json(payload)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), StoreError> {
        let url = self.tasks_url(&format!("?id=eq.{}", id));
        let res = self.authed(self.http.delete(&url)).send().await?;
        check(res).await?;
        Ok(())
    }

    async fn get_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, StoreError> {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default)]
            attachments: Vec<Attachment>,
        }

        let url = self.tasks_url(&format!("?select=attachments&id=eq.{}", task_id));
        let res = self.authed(self.http.get(&url)).send().await?;
        let mut rows = check(res).await?.json::<Vec<Row>>().await?;
        Ok(rows.pop().map(|row| row.attachments).unwrap_or_default())
    }

    async fn set_attachments(
        &self,
        task_id: &str,
        attachments: &[Attachment],
    ) -> Result<(), StoreError> {
        let url = self.tasks_url(&format!("?id=eq.{}", task_id));
        let res = self
            .authed(self.http.patch(&url))
            .json(&json!({ "attachments": attachments }))
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn set_order(&self, items: &[(String, i64)]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        let rows: Vec<serde_json::Value> = items
            .iter()
            .map(|(id, order)| json!({ "id": id, "order": order }))
            .collect();
        // Partial upsert keyed on id: only the order column is touched
        let url = self.tasks_url("?on_conflict=id&columns=id,order");
        let res = self
            .authed(self.http.post(&url))
            .header("Prefer", "resolution=merge-duplicates")
            .json(&rows)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }
}
