use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{TaskInterval, TaskSchedule};

/// A sparse set of schedule fields. Absent fields are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<TaskInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<u8>,
}

impl SchedulePatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Builds the body of an update request from the current schedule and the
/// caller's requested changes.
///
/// Every field is sent with the current value unless changed, except that
/// `hour` is dropped when
/// - the resulting interval is not daily, or there is no hour to send,
/// - the interval is switched to daily and the task already has an hour,
/// - the caller asked for the hour it already has,
///
/// and `minute` is dropped when the caller asked for the minute it already has.
pub fn compute_update_payload(current: &TaskSchedule, changes: &SchedulePatch) -> SchedulePatch {
    let interval = changes.interval.unwrap_or(current.interval);

    let mut payload = SchedulePatch {
        command: Some(
            changes
                .command
                .clone()
                .unwrap_or_else(|| current.command.clone()),
        ),
        enabled: Some(changes.enabled.unwrap_or(current.enabled)),
        interval: Some(interval),
        hour: changes.hour.or(current.hour),
        minute: Some(changes.minute.unwrap_or(current.minute)),
    };

    let switching_to_daily =
        changes.interval == Some(TaskInterval::Daily) && current.hour.is_some();
    let same_hour = changes.hour.is_some() && changes.hour == current.hour;

    if interval != TaskInterval::Daily || switching_to_daily || same_hour {
        payload.hour = None;
    }

    if changes.minute == Some(current.minute) {
        payload.minute = None;
    }

    payload
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

impl FieldChange {
    fn compare<T: PartialEq>(
        field: &'static str,
        old: T,
        new: T,
        render: impl Fn(T) -> String,
    ) -> Option<Self> {
        (old != new).then(|| Self {
            field,
            old: render(old),
            new: render(new),
        })
    }
}

impl Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}> from '{}' to '{}'", self.field, self.old, self.new)
    }
}

fn render_hour(hour: Option<u8>) -> String {
    hour.map_or_else(|| "none".into(), |hour| hour.to_string())
}

/// Fields present in `sent` whose value differs between `old` and `new`,
/// in wire order.
pub fn diff_schedule(
    sent: &SchedulePatch,
    old: &TaskSchedule,
    new: &TaskSchedule,
) -> Vec<FieldChange> {
    let candidates = [
        sent.command.as_ref().and_then(|_| {
            FieldChange::compare("command", &old.command, &new.command, String::clone)
        }),
        sent.enabled.and_then(|_| {
            FieldChange::compare("enabled", old.enabled, new.enabled, |v| v.to_string())
        }),
        sent.interval.and_then(|_| {
            FieldChange::compare("interval", old.interval, new.interval, |v| v.to_string())
        }),
        sent.hour
            .and_then(|_| FieldChange::compare("hour", old.hour, new.hour, render_hour)),
        sent.minute.and_then(|_| {
            FieldChange::compare("minute", old.minute, new.minute, |v| v.to_string())
        }),
    ];

    candidates.into_iter().flatten().collect()
}
