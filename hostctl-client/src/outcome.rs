use hostctl_types::{FieldChange, TaskInterval, TaskSchedule};
use std::fmt::Display;

pub const NOTHING_TO_UPDATE: &str = "Nothing to update!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCreated {
    pub task_id: u64,
    pub schedule: TaskSchedule,
    pub printable_time: Option<String>,
}

impl TaskCreated {
    fn time(&self) -> String {
        if let Some(time) = &self.printable_time {
            return time.clone();
        }

        match (self.schedule.interval, self.schedule.hour) {
            (TaskInterval::Daily, Some(hour)) => format!("{hour:02}:{:02}", self.schedule.minute),
            _ => format!("{} minutes past the hour", self.schedule.minute),
        }
    }
}

impl Display for TaskCreated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Task {} successfully created with {} schedule at {} ({})",
            self.task_id,
            self.schedule.interval,
            self.time(),
            if self.schedule.enabled {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated {
        task_id: u64,
        changes: Vec<FieldChange>,
    },
    NothingToUpdate,
}

impl UpdateOutcome {
    /// Porcelain output puts every change on its own line.
    pub fn summary(&self, porcelain: bool) -> String {
        match self {
            Self::NothingToUpdate => NOTHING_TO_UPDATE.into(),
            Self::Updated { task_id, changes } => {
                let (fill, separator) = if porcelain { ("\n", "\n") } else { (" ", ", ") };
                let changes = changes
                    .iter()
                    .map(FieldChange::to_string)
                    .collect::<Vec<_>>()
                    .join(separator);
                format!("Task {task_id} updated:{fill}{changes}")
            }
        }
    }
}
