use crate::table::{print_task, print_tasks};
use anyhow::bail;
use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;
use hostctl_client::{
    client::ScheduleApi,
    outcome::UpdateOutcome,
    task::{Task, TaskList},
};
use hostctl_types::{SchedulePatch, TaskInterval};

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// Create a new scheduled task
    Set(SetArgs),
    /// Show a scheduled task
    Get(GetArgs),
    /// List all scheduled tasks
    List,
    /// Change a scheduled task
    Update(UpdateArgs),
    /// Delete scheduled tasks
    Delete(DeleteArgs),
}

pub async fn schedule_command<C: ScheduleApi>(
    command: ScheduleCommand,
    client: &C,
) -> anyhow::Result<()> {
    match command {
        ScheduleCommand::Set(args) => set_command(args, client).await,
        ScheduleCommand::Get(args) => get_command(args, client).await,
        ScheduleCommand::List => list_command(client).await,
        ScheduleCommand::Update(args) => update_command(args, client).await,
        ScheduleCommand::Delete(args) => delete_command(args, client).await,
    }
}

#[derive(Debug, Args)]
pub struct SetArgs {
    #[clap(long, required = true, help = "Command to run")]
    command: String,

    #[clap(long, help = "Hour to run at, leave out for an hourly task")]
    hour: Option<u8>,

    #[clap(long, required = true, help = "Minute to run at")]
    minute: u8,

    #[clap(long, default_value_t = false, help = "Create the task disabled")]
    disabled: bool,
}

async fn set_command<C: ScheduleApi>(args: SetArgs, client: &C) -> anyhow::Result<()> {
    let mut task =
        Task::create_pending(client, args.command, args.minute, args.hour, args.disabled)?;
    let created = task.create_schedule().await?;

    println!("{} {}", "✓".green().bold(), created);
    Ok(())
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TaskField {
    Command,
    Enabled,
    Interval,
    Hour,
    Minute,
    PrintableTime,
    CanEnable,
    Expiry,
    Logfile,
    Url,
    User,
}

impl TaskField {
    fn value<C: ScheduleApi>(self, task: &Task<'_, C>) -> String {
        let schedule = task.schedule();
        let details = task.details();
        let optional = |value: Option<String>| value.unwrap_or_else(|| "none".into());

        match self {
            Self::Command => schedule.command.clone(),
            Self::Enabled => schedule.enabled.to_string(),
            Self::Interval => schedule.interval.to_string(),
            Self::Hour => optional(schedule.hour.map(|hour| hour.to_string())),
            Self::Minute => schedule.minute.to_string(),
            Self::PrintableTime => optional(details.printable_time.clone()),
            Self::CanEnable => details.can_enable.to_string(),
            Self::Expiry => optional(details.expiry.map(|expiry| expiry.to_string())),
            Self::Logfile => optional(details.logfile.clone()),
            Self::Url => optional(details.url.clone()),
            Self::User => optional(details.user.clone()),
        }
    }
}

#[derive(Debug, Args)]
pub struct GetArgs {
    #[clap(required = true, help = "Task to show")]
    id: u64,

    #[clap(long, value_enum, help = "Print only this field")]
    field: Option<TaskField>,
}

async fn get_command<C: ScheduleApi>(args: GetArgs, client: &C) -> anyhow::Result<()> {
    let task = Task::fetch(client, args.id).await?;

    match args.field {
        Some(field) => println!("{}", field.value(&task)),
        None => print_task(&task),
    }

    Ok(())
}

async fn list_command<C: ScheduleApi>(client: &C) -> anyhow::Result<()> {
    let tasks = TaskList::fetch(client).await?;

    if tasks.is_empty() {
        println!(" {} No scheduled tasks", "⚠".yellow().bold());
        return Ok(());
    }

    print_tasks(tasks.tasks());
    Ok(())
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[clap(required = true, help = "Task to update")]
    id: u64,

    #[clap(long, help = "New command to run")]
    command: Option<String>,

    #[clap(
        long,
        conflicts_with = "hourly",
        value_parser = clap::value_parser!(u8).range(0..=23),
        help = "New hour to run at"
    )]
    hour: Option<u8>,

    #[clap(
        long,
        value_parser = clap::value_parser!(u8).range(0..=59),
        help = "New minute to run at"
    )]
    minute: Option<u8>,

    #[clap(long, conflicts_with = "hourly", help = "Run once a day")]
    daily: bool,

    #[clap(long, help = "Run every hour")]
    hourly: bool,

    #[clap(long, group = "enabling", help = "Enable the task")]
    enable: bool,

    #[clap(long, group = "enabling", help = "Disable the task")]
    disable: bool,

    #[clap(long, group = "enabling", help = "Flip between enabled and disabled")]
    toggle_enabled: bool,

    #[clap(long, default_value_t = false, help = "Machine readable output")]
    porcelain: bool,
}

impl UpdateArgs {
    fn patch(&self, currently_enabled: bool) -> SchedulePatch {
        let interval = match (self.daily, self.hourly) {
            (true, _) => Some(TaskInterval::Daily),
            (_, true) => Some(TaskInterval::Hourly),
            _ => None,
        };

        let enabled = match (self.enable, self.disable, self.toggle_enabled) {
            (true, _, _) => Some(true),
            (_, true, _) => Some(false),
            (_, _, true) => Some(!currently_enabled),
            _ => None,
        };

        SchedulePatch {
            command: self.command.clone(),
            enabled,
            interval,
            hour: self.hour,
            minute: self.minute,
        }
    }
}

async fn update_command<C: ScheduleApi>(args: UpdateArgs, client: &C) -> anyhow::Result<()> {
    let mut task = Task::fetch(client, args.id).await?;
    let patch = args.patch(task.schedule().enabled);
    let outcome = task.update_schedule(&patch).await?;

    match (&outcome, args.porcelain) {
        (_, true) => println!("{}", outcome.summary(true)),
        (UpdateOutcome::NothingToUpdate, false) => {
            println!(" {} {}", "⚠".yellow().bold(), outcome.summary(false))
        }
        (UpdateOutcome::Updated { .. }, false) => {
            println!("{} {}", "✓".green().bold(), outcome.summary(false))
        }
    }

    Ok(())
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[clap(
        required_unless_present = "all",
        conflicts_with = "all",
        help = "Tasks to delete"
    )]
    ids: Vec<u64>,

    #[clap(long, requires = "force", help = "Delete every scheduled task")]
    all: bool,

    #[clap(long, default_value_t = false, help = "Confirm deleting every task")]
    force: bool,
}

async fn delete_command<C: ScheduleApi>(args: DeleteArgs, client: &C) -> anyhow::Result<()> {
    let mut tasks = Vec::new();
    let mut failed = 0;

    if args.all {
        tasks.extend(TaskList::fetch(client).await?);
    } else {
        let mut ids = args.ids;
        ids.sort_unstable();
        ids.dedup();

        for id in ids {
            match Task::fetch(client, id).await {
                Ok(task) => tasks.push(task),
                Err(error) => {
                    failed += 1;
                    println!("{} {}", "✖".red().bold(), error);
                }
            }
        }
    }

    for mut task in tasks {
        let id = task.task_id().unwrap_or_default();
        match task.delete_schedule().await {
            Ok(()) => println!(
                "{} Deleted task {}",
                "✓".green().bold(),
                id.to_string().bright_black().italic()
            ),
            Err(error) => {
                failed += 1;
                println!("{} {}", "✖".red().bold(), error);
            }
        }
    }

    if failed > 0 {
        bail!("Failed to delete {failed} task(s)");
    }

    Ok(())
}
