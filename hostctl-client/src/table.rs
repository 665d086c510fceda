use hostctl_client::{client::ScheduleApi, task::Task};
use hostctl_types::TaskDetails;
use tabled::{
    builder::Builder,
    settings::{
        object::{Columns, Rows},
        Color, Style,
    },
};

fn or_none(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "none".into(), |value| value.to_string())
}

fn status(enabled: bool, details: &TaskDetails) -> String {
    match (enabled, details.can_enable) {
        (true, _) => "enabled".into(),
        (false, true) => "disabled".into(),
        (false, false) => "disabled (cannot enable)".into(),
    }
}

pub fn print_tasks<C: ScheduleApi>(tasks: &[Task<'_, C>]) {
    let mut builder = Builder::new();
    builder.push_record(["ID", "Interval", "At", "Status", "Expiry", "Command"]);

    for task in tasks {
        let schedule = task.schedule();
        let details = task.details();
        builder.push_record([
            or_none(task.task_id()),
            schedule.interval.to_string(),
            or_none(details.printable_time.as_ref()),
            status(schedule.enabled, details),
            or_none(details.expiry),
            schedule.command.clone(),
        ]);
    }

    let mut table = builder.build();
    table
        .with(Style::modern_rounded())
        .modify(Rows::first(), Color::FG_WHITE | Color::BOLD);
    println!("{table}");
}

pub fn print_task<C: ScheduleApi>(task: &Task<'_, C>) {
    let schedule = task.schedule();
    let details = task.details();

    let mut builder = Builder::new();
    for (key, value) in [
        ("id", or_none(task.task_id())),
        ("command", schedule.command.clone()),
        ("enabled", schedule.enabled.to_string()),
        ("interval", schedule.interval.to_string()),
        ("hour", or_none(schedule.hour)),
        ("minute", schedule.minute.to_string()),
        ("printable time", or_none(details.printable_time.as_ref())),
        ("can enable", details.can_enable.to_string()),
        ("expiry", or_none(details.expiry)),
        ("logfile", or_none(details.logfile.as_ref())),
        ("user", or_none(details.user.as_ref())),
    ] {
        builder.push_record([key.to_string(), value]);
    }

    let mut table = builder.build();
    table
        .with(Style::modern_rounded())
        .modify(Columns::first(), Color::BOLD);
    println!("{table}");
}
