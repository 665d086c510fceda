use crate::{
    client::ScheduleApi,
    outcome::{TaskCreated, UpdateOutcome},
};
use anyhow::bail;
use hostctl_types::{
    compute_update_payload, diff_schedule, InvalidSchedule, SchedulePatch, TaskDetails,
    TaskSchedule, TaskSpecs,
};
use std::{collections::BTreeMap, fmt::Debug};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Built locally, not known to the server yet.
    Pending,
    Known(u64),
    Deleted(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("task has not been created yet")]
    NotCreated,
    #[error("task {0} already exists")]
    AlreadyCreated(u64),
    #[error("task {0} has been deleted")]
    Deleted(u64),
}

pub struct Task<'a, C> {
    api: &'a C,
    state: TaskState,
    schedule: TaskSchedule,
    details: TaskDetails,
    extra: BTreeMap<String, serde_json::Value>,
}

impl<C> Debug for Task<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state)
            .field("schedule", &self.schedule)
            .field("details", &self.details)
            .finish()
    }
}

impl<'a, C: ScheduleApi> Task<'a, C> {
    /// Validates the input locally; nothing is sent until
    /// [`Task::create_schedule`].
    pub fn create_pending(
        api: &'a C,
        command: impl Into<String>,
        minute: u8,
        hour: Option<u8>,
        disabled: bool,
    ) -> Result<Self, InvalidSchedule> {
        Ok(Self {
            api,
            state: TaskState::Pending,
            schedule: TaskSchedule::new(command, minute, hour, disabled)?,
            details: TaskDetails::default(),
            extra: BTreeMap::new(),
        })
    }

    pub async fn fetch(api: &'a C, task_id: u64) -> anyhow::Result<Self> {
        Ok(Self::from_specs(api, api.get_specs(task_id).await?))
    }

    pub fn from_specs(api: &'a C, specs: TaskSpecs) -> Self {
        let mut task = Self {
            api,
            state: TaskState::Pending,
            schedule: specs.schedule.clone(),
            details: TaskDetails::default(),
            extra: BTreeMap::new(),
        };
        task.merge(specs);
        task
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn task_id(&self) -> Option<u64> {
        match self.state {
            TaskState::Pending => None,
            TaskState::Known(id) | TaskState::Deleted(id) => Some(id),
        }
    }

    pub fn schedule(&self) -> &TaskSchedule {
        &self.schedule
    }

    pub fn details(&self) -> &TaskDetails {
        &self.details
    }

    /// The full server-side view of the task, once it has one.
    pub fn specs(&self) -> Option<TaskSpecs> {
        self.task_id().map(|task_id| TaskSpecs {
            task_id,
            schedule: self.schedule.clone(),
            details: self.details.clone(),
            extra: self.extra.clone(),
        })
    }

    fn known_id(&self) -> Result<u64, LifecycleError> {
        match self.state {
            TaskState::Known(id) => Ok(id),
            TaskState::Pending => Err(LifecycleError::NotCreated),
            TaskState::Deleted(id) => Err(LifecycleError::Deleted(id)),
        }
    }

    fn merge(&mut self, specs: TaskSpecs) {
        if !specs.extra.is_empty() {
            tracing::warn!(
                task_id = specs.task_id,
                keys = ?specs.unknown_keys().collect::<Vec<_>>(),
                "Server sent unknown task fields"
            );
        }

        self.state = TaskState::Known(specs.task_id);
        self.schedule = specs.schedule;
        self.details = specs.details;
        self.extra = specs.extra;
    }

    pub async fn create_schedule(&mut self) -> anyhow::Result<TaskCreated> {
        match self.state {
            TaskState::Pending => {}
            TaskState::Known(id) => bail!(LifecycleError::AlreadyCreated(id)),
            TaskState::Deleted(id) => bail!(LifecycleError::Deleted(id)),
        }

        let specs = self.api.create(&self.schedule.payload()).await?;
        self.merge(specs);

        Ok(TaskCreated {
            task_id: self.known_id()?,
            schedule: self.schedule.clone(),
            printable_time: self.details.printable_time.clone(),
        })
    }

    pub async fn update_schedule(
        &mut self,
        changes: &SchedulePatch,
    ) -> anyhow::Result<UpdateOutcome> {
        let task_id = self.known_id()?;
        let payload = compute_update_payload(&self.schedule, changes);

        let specs = self.api.update(task_id, &payload).await?;
        let changes = diff_schedule(&payload, &self.schedule, &specs.schedule);

        if changes.is_empty() {
            tracing::debug!(task_id, "Update changed nothing, keeping local state");
            return Ok(UpdateOutcome::NothingToUpdate);
        }

        self.merge(specs);
        Ok(UpdateOutcome::Updated { task_id, changes })
    }

    pub async fn delete_schedule(&mut self) -> anyhow::Result<()> {
        let task_id = self.known_id()?;

        if !self.api.delete(task_id).await? {
            bail!("Server refused to delete task {task_id}");
        }

        self.state = TaskState::Deleted(task_id);
        Ok(())
    }
}

/// Every task of the authenticated user, in server order.
pub struct TaskList<'a, C> {
    tasks: Vec<Task<'a, C>>,
}

impl<C> Debug for TaskList<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.tasks).finish()
    }
}

impl<'a, C: ScheduleApi> TaskList<'a, C> {
    pub async fn fetch(api: &'a C) -> anyhow::Result<Self> {
        let tasks = api
            .list()
            .await?
            .into_iter()
            .map(|specs| Task::from_specs(api, specs))
            .collect();

        Ok(Self { tasks })
    }
}

impl<'a, C> TaskList<'a, C> {
    pub fn tasks(&self) -> &[Task<'a, C>] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<'a, C> IntoIterator for TaskList<'a, C> {
    type Item = Task<'a, C>;
    type IntoIter = std::vec::IntoIter<Task<'a, C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use anyhow::anyhow;
    use hostctl_types::TaskInterval;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        List,
        Create(Value),
        Get(u64),
        Update(u64, Value),
        Delete(u64),
    }

    #[derive(Default)]
    struct FakeApi {
        calls: RefCell<Vec<Call>>,
        reply: Option<TaskSpecs>,
        listing: Vec<TaskSpecs>,
        failure: Option<StatusCode>,
    }

    impl FakeApi {
        fn replying(reply: TaskSpecs) -> Self {
            Self {
                reply: Some(reply),
                ..Default::default()
            }
        }

        fn failing(status: StatusCode) -> Self {
            Self {
                failure: Some(status),
                ..Default::default()
            }
        }

        fn record(&self, call: Call) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(call);
            match self.failure {
                Some(status) => Err(ApiError {
                    action: "test request",
                    status,
                    body: "server says no".into(),
                }
                .into()),
                None => Ok(()),
            }
        }

        fn reply(&self) -> anyhow::Result<TaskSpecs> {
            self.reply.clone().ok_or_else(|| anyhow!("no reply configured"))
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl ScheduleApi for FakeApi {
        async fn list(&self) -> anyhow::Result<Vec<TaskSpecs>> {
            self.record(Call::List)?;
            Ok(self.listing.clone())
        }

        async fn create(&self, payload: &SchedulePatch) -> anyhow::Result<TaskSpecs> {
            self.record(Call::Create(serde_json::to_value(payload)?))?;
            self.reply()
        }

        async fn get_specs(&self, task_id: u64) -> anyhow::Result<TaskSpecs> {
            self.record(Call::Get(task_id))?;
            self.reply()
        }

        async fn update(&self, task_id: u64, payload: &SchedulePatch) -> anyhow::Result<TaskSpecs> {
            self.record(Call::Update(task_id, serde_json::to_value(payload)?))?;
            self.reply()
        }

        async fn delete(&self, task_id: u64) -> anyhow::Result<bool> {
            self.record(Call::Delete(task_id))?;
            Ok(true)
        }
    }

    fn specs(value: Value) -> TaskSpecs {
        serde_json::from_value(value).unwrap()
    }

    fn daily_specs() -> Value {
        json!({
            "id": 42,
            "command": "echo foo",
            "enabled": true,
            "interval": "daily",
            "hour": 16,
            "minute": 0,
            "can_enable": false,
            "expiry": "2025-01-31",
            "extend_url": "/user/alice/schedule/task/42/extend",
            "logfile": "/user/alice/files/var/log/tasklog-42.log",
            "printable_time": "16:00",
            "url": "/api/v0/user/alice/schedule/42",
            "user": "alice",
        })
    }

    fn hourly_specs() -> Value {
        json!({
            "id": 43,
            "command": "echo bar",
            "enabled": true,
            "interval": "hourly",
            "hour": null,
            "minute": 30,
            "can_enable": false,
            "expiry": null,
            "extend_url": "/user/alice/schedule/task/43/extend",
            "logfile": "/user/alice/files/var/log/tasklog-43.log",
            "printable_time": "30 minutes past",
            "url": "/api/v0/user/alice/schedule/43",
            "user": "alice",
        })
    }

    fn with(mut value: Value, key: &str, new: Value) -> Value {
        value[key] = new;
        value
    }

    #[test]
    fn invalid_input_never_reaches_the_api() {
        let api = FakeApi::default();

        let error = Task::create_pending(&api, "echo foo", 0, Some(24), false).unwrap_err();
        assert_eq!(error, InvalidSchedule::HourOutOfRange(24));

        let error = Task::create_pending(&api, "echo foo", 60, None, false).unwrap_err();
        assert_eq!(error, InvalidSchedule::MinuteOutOfRange(60));

        let error = Task::create_pending(&api, "echo foo", 60, Some(3), false).unwrap_err();
        assert_eq!(error, InvalidSchedule::MinuteOutOfRange(60));

        assert!(api.calls().is_empty());
    }

    #[test]
    fn pending_task_has_no_id() {
        let api = FakeApi::default();
        let task = Task::create_pending(&api, "echo foo", 5, Some(3), true).unwrap();

        assert_eq!(task.state(), TaskState::Pending);
        assert_eq!(task.task_id(), None);
        assert_eq!(task.specs(), None);
        assert_eq!(task.schedule().interval, TaskInterval::Daily);
        assert!(!task.schedule().enabled);
    }

    #[tokio::test]
    async fn create_hourly_omits_hour() {
        let api = FakeApi::replying(specs(hourly_specs()));
        let mut task = Task::create_pending(&api, "echo bar", 30, None, false).unwrap();

        let created = task.create_schedule().await.unwrap();

        assert_eq!(
            api.calls(),
            [Call::Create(json!({
                "command": "echo bar",
                "enabled": true,
                "interval": "hourly",
                "minute": 30,
            }))]
        );
        assert_eq!(created.task_id, 43);
        assert_eq!(task.state(), TaskState::Known(43));
        assert_eq!(
            task.details().logfile.as_deref(),
            Some("/user/alice/files/var/log/tasklog-43.log")
        );
    }

    #[tokio::test]
    async fn create_daily_sends_hour() {
        let api = FakeApi::replying(specs(daily_specs()));
        let mut task = Task::create_pending(&api, "echo foo", 0, Some(16), false).unwrap();

        task.create_schedule().await.unwrap();

        let calls = api.calls();
        let [Call::Create(payload)] = calls.as_slice() else {
            panic!("expected a single create call, got {:?}", calls);
        };
        assert_eq!(payload["hour"], json!(16));
        assert_eq!(task.specs(), Some(specs(daily_specs())));
    }

    #[tokio::test]
    async fn failed_create_leaves_task_pending() {
        let api = FakeApi::failing(StatusCode::FORBIDDEN);
        let mut task = Task::create_pending(&api, "echo foo", 0, Some(16), false).unwrap();
        let before = task.schedule().clone();

        let error = task.create_schedule().await.unwrap_err();

        assert_eq!(
            error.downcast_ref::<ApiError>().map(|e| e.status),
            Some(StatusCode::FORBIDDEN)
        );
        assert_eq!(task.state(), TaskState::Pending);
        assert_eq!(task.schedule(), &before);
    }

    #[tokio::test]
    async fn create_twice_is_refused_locally() {
        let api = FakeApi::replying(specs(daily_specs()));
        let mut task = Task::from_specs(&api, specs(daily_specs()));

        let error = task.create_schedule().await.unwrap_err();

        assert_eq!(
            error.downcast_ref::<LifecycleError>(),
            Some(&LifecycleError::AlreadyCreated(42))
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn fetch_by_id() {
        let api = FakeApi::replying(specs(daily_specs()));

        let task = Task::fetch(&api, 42).await.unwrap();

        assert_eq!(api.calls(), [Call::Get(42)]);
        assert_eq!(task.task_id(), Some(42));
        assert_eq!(task.schedule().hour, Some(16));
    }

    #[tokio::test]
    async fn fetch_propagates_not_found() {
        let api = FakeApi::failing(StatusCode::NOT_FOUND);

        let error = Task::fetch(&api, 42).await.unwrap_err();

        assert_eq!(
            error.downcast_ref::<ApiError>().map(|e| e.status),
            Some(StatusCode::NOT_FOUND)
        );
    }

    #[test]
    fn specs_read_back_unchanged() {
        let api = FakeApi::default();
        let raw = with(daily_specs(), "timeout", json!(3600));

        let task = Task::from_specs(&api, specs(raw.clone()));

        assert_eq!(serde_json::to_value(task.specs().unwrap()).unwrap(), raw);
    }

    #[tokio::test]
    async fn update_reports_changed_fields_and_merges() {
        let reply = with(daily_specs(), "enabled", json!(false));
        let api = FakeApi::replying(specs(reply.clone()));
        let mut task = Task::from_specs(&api, specs(daily_specs()));

        let outcome = task
            .update_schedule(&SchedulePatch {
                enabled: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            api.calls(),
            [Call::Update(
                42,
                json!({
                    "command": "echo foo",
                    "enabled": false,
                    "interval": "daily",
                    "hour": 16,
                    "minute": 0,
                })
            )]
        );
        assert_eq!(
            outcome.summary(false),
            "Task 42 updated: <enabled> from 'true' to 'false'"
        );
        assert_eq!(task.specs(), Some(specs(reply)));
    }

    #[tokio::test]
    async fn switching_to_daily_sends_no_hour() {
        let api = FakeApi::replying(specs(hourly_specs()));
        let mut task = Task::from_specs(&api, specs(hourly_specs()));

        task.update_schedule(&SchedulePatch {
            interval: Some(TaskInterval::Daily),
            ..Default::default()
        })
        .await
        .unwrap();

        let calls = api.calls();
        let [Call::Update(43, payload)] = calls.as_slice() else {
            panic!("expected a single update call, got {:?}", calls);
        };
        assert_eq!(payload["interval"], json!("daily"));
        assert!(payload.get("hour").is_none());
    }

    #[tokio::test]
    async fn same_hour_is_nothing_to_update() {
        let reply = with(daily_specs(), "printable_time", json!("later"));
        let api = FakeApi::replying(specs(reply));
        let mut task = Task::from_specs(&api, specs(daily_specs()));

        let outcome = task
            .update_schedule(&SchedulePatch {
                hour: Some(16),
                ..Default::default()
            })
            .await
            .unwrap();

        let calls = api.calls();
        let [Call::Update(42, payload)] = calls.as_slice() else {
            panic!("expected a single update call, got {:?}", calls);
        };
        assert!(payload.get("hour").is_none());
        assert_eq!(outcome, UpdateOutcome::NothingToUpdate);
        // The reply is not merged when nothing changed.
        assert_eq!(task.specs(), Some(specs(daily_specs())));
    }

    #[tokio::test]
    async fn same_minute_is_nothing_to_update() {
        let api = FakeApi::replying(specs(daily_specs()));
        let mut task = Task::from_specs(&api, specs(daily_specs()));

        let outcome = task
            .update_schedule(&SchedulePatch {
                minute: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();

        let calls = api.calls();
        let [Call::Update(42, payload)] = calls.as_slice() else {
            panic!("expected a single update call, got {:?}", calls);
        };
        assert!(payload.get("minute").is_none());
        assert_eq!(outcome, UpdateOutcome::NothingToUpdate);
    }

    #[tokio::test]
    async fn failed_update_propagates() {
        let api = FakeApi::failing(StatusCode::BAD_REQUEST);
        let mut task = Task::from_specs(&api, specs(daily_specs()));

        let error = task
            .update_schedule(&SchedulePatch {
                interval: Some(TaskInterval::Hourly),
                ..Default::default()
            })
            .await
            .unwrap_err();

        let error = error.downcast_ref::<ApiError>().unwrap();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.body, "server says no");
        assert_eq!(task.specs(), Some(specs(daily_specs())));
    }

    #[tokio::test]
    async fn pending_task_cannot_be_updated() {
        let api = FakeApi::default();
        let mut task = Task::create_pending(&api, "echo foo", 0, None, false).unwrap();

        let error = task
            .update_schedule(&SchedulePatch::default())
            .await
            .unwrap_err();

        assert_eq!(
            error.downcast_ref::<LifecycleError>(),
            Some(&LifecycleError::NotCreated)
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_marks_task_stale() {
        let api = FakeApi::default();
        let mut task = Task::from_specs(&api, specs(daily_specs()));

        task.delete_schedule().await.unwrap();
        assert_eq!(task.state(), TaskState::Deleted(42));

        let error = task.delete_schedule().await.unwrap_err();
        assert_eq!(
            error.downcast_ref::<LifecycleError>(),
            Some(&LifecycleError::Deleted(42))
        );

        let error = task
            .update_schedule(&SchedulePatch::default())
            .await
            .unwrap_err();
        assert_eq!(
            error.downcast_ref::<LifecycleError>(),
            Some(&LifecycleError::Deleted(42))
        );

        assert_eq!(api.calls(), [Call::Delete(42)]);
    }

    #[tokio::test]
    async fn failed_delete_propagates_unwrapped() {
        let api = FakeApi::failing(StatusCode::INTERNAL_SERVER_ERROR);
        let mut task = Task::from_specs(&api, specs(daily_specs()));

        let error = task.delete_schedule().await.unwrap_err();

        assert_eq!(
            error.to_string(),
            "test request via API failed, got 500 Internal Server Error: server says no"
        );
        assert!(error.downcast_ref::<ApiError>().is_some());
        assert_eq!(task.state(), TaskState::Known(42));
    }

    #[tokio::test]
    async fn list_keeps_server_order() {
        let api = FakeApi {
            listing: vec![specs(hourly_specs()), specs(daily_specs())],
            ..Default::default()
        };

        let tasks = TaskList::fetch(&api).await.unwrap();

        assert_eq!(api.calls(), [Call::List]);
        assert_eq!(tasks.len(), 2);
        assert!(format!("{tasks:?}").starts_with("[Task { state: Known(43)"));
        let seen = tasks
            .into_iter()
            .map(|task| serde_json::to_value(task.specs().unwrap()).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(seen, [hourly_specs(), daily_specs()]);
    }

    #[tokio::test]
    async fn list_failure_propagates() {
        let api = FakeApi::failing(StatusCode::UNAUTHORIZED);

        let error = TaskList::fetch(&api).await.unwrap_err();

        assert_eq!(
            error.downcast_ref::<ApiError>().map(|e| e.status),
            Some(StatusCode::UNAUTHORIZED)
        );
    }
}
