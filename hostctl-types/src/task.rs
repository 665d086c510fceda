use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::SchedulePatch;

pub const MAX_HOUR: u8 = 23;
pub const MAX_MINUTE: u8 = 59;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSchedule {
    #[error("hour must be between 0 and 23, got {0}")]
    HourOutOfRange(u8),
    #[error("minute must be between 0 and 59, got {0}")]
    MinuteOutOfRange(u8),
    #[error("command is empty")]
    EmptyCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskInterval {
    Daily,
    Hourly,
}

impl TaskInterval {
    /// Daily tasks are the ones that carry an hour.
    pub fn for_hour(hour: Option<u8>) -> Self {
        match hour {
            Some(_) => Self::Daily,
            None => Self::Hourly,
        }
    }
}

/// The part of a scheduled task the owner is allowed to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSchedule {
    pub command: String,
    pub enabled: bool,
    pub interval: TaskInterval,
    pub hour: Option<u8>,
    pub minute: u8,
}

impl TaskSchedule {
    /// Validates user input for a task that does not exist yet.
    ///
    /// The interval follows from whether an hour was given.
    pub fn new(
        command: impl Into<String>,
        minute: u8,
        hour: Option<u8>,
        disabled: bool,
    ) -> Result<Self, InvalidSchedule> {
        let command = command.into();

        if command.trim().is_empty() {
            return Err(InvalidSchedule::EmptyCommand);
        }

        if let Some(hour) = hour {
            if hour > MAX_HOUR {
                return Err(InvalidSchedule::HourOutOfRange(hour));
            }
        }

        if minute > MAX_MINUTE {
            return Err(InvalidSchedule::MinuteOutOfRange(minute));
        }

        Ok(Self {
            command,
            enabled: !disabled,
            interval: TaskInterval::for_hour(hour),
            hour,
            minute,
        })
    }

    /// Body of a creation request. `hour` is left out entirely for hourly
    /// tasks, the server rejects it even when null.
    pub fn payload(&self) -> SchedulePatch {
        SchedulePatch {
            command: Some(self.command.clone()),
            enabled: Some(self.enabled),
            interval: Some(self.interval),
            hour: self.hour,
            minute: Some(self.minute),
        }
    }
}

/// Read-only fields assigned by the server.
///
/// Every key is part of the schedule resource, so a missing one is read as
/// its empty value and written back explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetails {
    #[serde(default)]
    pub can_enable: bool,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
    #[serde(default)]
    pub extend_url: Option<String>,
    #[serde(default)]
    pub logfile: Option<String>,
    #[serde(default)]
    pub printable_time: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

/// A task as the control plane describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpecs {
    #[serde(rename = "id")]
    pub task_id: u64,
    #[serde(flatten)]
    pub schedule: TaskSchedule,
    #[serde(flatten)]
    pub details: TaskDetails,
    /// Keys this client does not know about.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TaskSpecs {
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(String::as_str)
    }
}
