use hostctl_types::{SchedulePatch, TaskSpecs};
use reqwest::{header::AUTHORIZATION, Method, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// The operations on the schedule resource that tasks are built on.
#[allow(async_fn_in_trait)]
pub trait ScheduleApi {
    async fn list(&self) -> anyhow::Result<Vec<TaskSpecs>>;
    async fn create(&self, payload: &SchedulePatch) -> anyhow::Result<TaskSpecs>;
    async fn get_specs(&self, task_id: u64) -> anyhow::Result<TaskSpecs>;
    async fn update(&self, task_id: u64, payload: &SchedulePatch) -> anyhow::Result<TaskSpecs>;
    async fn delete(&self, task_id: u64) -> anyhow::Result<bool>;
}

/// The control plane answered with a status other than the one expected.
#[derive(Debug, Error)]
#[error("{action} via API failed, got {status}: {body}")]
pub struct ApiError {
    pub action: &'static str,
    pub status: StatusCode,
    pub body: String,
}

pub struct HostClient {
    api_url: Url,
    user: String,
    token: String,
    http_client: reqwest::Client,
}

impl HostClient {
    pub fn new(
        api_url: Url,
        user: String,
        token: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api_url,
            user,
            token,
            http_client: reqwest::Client::builder()
                .connect_timeout(timeout)
                .timeout(timeout)
                .build()?,
        })
    }

    pub fn schedule_url(&self, task_id: Option<u64>) -> Url {
        let mut url = self.api_url.clone();
        match task_id {
            None => url.set_path(&format!("/api/v0/user/{}/schedule/", self.user)),
            Some(id) => url.set_path(&format!("/api/v0/user/{}/schedule/{id}/", self.user)),
        }
        url
    }

    fn request(&self, method: Method, task_id: Option<u64>) -> RequestBuilder {
        self.http_client
            .request(method, self.schedule_url(task_id))
            .header(AUTHORIZATION, format!("Token {}", self.token))
    }

    async fn execute(
        &self,
        action: &'static str,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> anyhow::Result<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status != expected {
            return Err(ApiError {
                action,
                status,
                body: response.text().await?,
            }
            .into());
        }

        Ok(response)
    }
}

impl ScheduleApi for HostClient {
    #[tracing::instrument(skip(self), err(Debug))]
    async fn list(&self) -> anyhow::Result<Vec<TaskSpecs>> {
        let response = self
            .execute(
                "GET to list tasks",
                self.request(Method::GET, None),
                StatusCode::OK,
            )
            .await?;

        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self), err(Debug))]
    async fn create(&self, payload: &SchedulePatch) -> anyhow::Result<TaskSpecs> {
        let response = self
            .execute(
                "POST to set new task",
                self.request(Method::POST, None).json(payload),
                StatusCode::CREATED,
            )
            .await?;

        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self), err(Debug))]
    async fn get_specs(&self, task_id: u64) -> anyhow::Result<TaskSpecs> {
        let response = self
            .execute(
                "GET to fetch task",
                self.request(Method::GET, Some(task_id)),
                StatusCode::OK,
            )
            .await?;

        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self), err(Debug))]
    async fn update(&self, task_id: u64, payload: &SchedulePatch) -> anyhow::Result<TaskSpecs> {
        let response = self
            .execute(
                "PATCH to update task",
                self.request(Method::PATCH, Some(task_id)).json(payload),
                StatusCode::OK,
            )
            .await?;

        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self), err(Debug))]
    async fn delete(&self, task_id: u64) -> anyhow::Result<bool> {
        self.execute(
            "DELETE on task",
            self.request(Method::DELETE, Some(task_id)),
            StatusCode::NO_CONTENT,
        )
        .await?;

        Ok(true)
    }
}
