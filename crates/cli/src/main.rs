//! Workforce CLI - skill-based subtask assignment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workforce_core::{
    EmployeeId, MilestoneId, MilestoneStatus, NewEmployee, ProjectId, SubtaskId, SubtaskStatus,
    TaskStatus,
};
use workforce_execution::{AssignmentService, DriverConfig, PeriodicDriver, WorkforceConfig};
use workforce_progress::SubtaskReconciliation;
use workforce_storage::JsonStorage;
use workforce_work::{AssignOutcome, OutlineFileGenerator};

#[derive(Parser)]
#[command(name = "workforce")]
#[command(about = "Skill-based subtask assignment", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory (overrides config)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage employees
    #[command(subcommand)]
    Employee(EmployeeCommand),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Trigger assignment
    #[command(subcommand)]
    Assign(AssignCommand),
    /// Mark a milestone completed
    Complete {
        /// Milestone ID
        milestone: MilestoneId,
    },
    /// Complete tasks whose subtasks are all done
    Reconcile,
    /// Run the periodic assignment loop (Ctrl-C stops it)
    Run {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<usize>,
        /// Seconds between ticks (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
enum EmployeeCommand {
    /// Onboard an employee
    Add {
        /// Display name
        name: String,
        /// Comma-separated skills
        #[arg(long, default_value = "")]
        skills: String,
    },
    /// List employees
    List,
    /// Append comma-separated skills
    Skills {
        /// Employee ID
        id: EmployeeId,
        /// Comma-separated skills
        skills: String,
    },
    /// Show tasks, subtasks and milestones an employee works on
    Work {
        /// Employee ID
        id: EmployeeId,
    },
    /// Show assignment log, newest first
    Logs {
        /// Employee ID
        id: EmployeeId,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Register a project
    Add {
        /// Project code, e.g. P006
        id: ProjectId,
        /// Project description
        description: String,
    },
    /// List projects
    List,
    /// Show breakdown and staffing
    Show {
        /// Project code
        id: ProjectId,
    },
    /// Import a breakdown outline file and assign
    Import {
        /// Project code
        id: ProjectId,
        /// Outline file
        outline: PathBuf,
    },
}

#[derive(Subcommand)]
enum AssignCommand {
    /// Assign all unassigned subtasks
    Bulk,
    /// Give an employee the first matching subtask
    Next {
        /// Employee ID
        employee: EmployeeId,
    },
    /// Give an employee the best scored subtask
    Best {
        /// Employee ID
        employee: EmployeeId,
    },
    /// Assign a subtask to an employee without matching
    Manual {
        /// Subtask ID
        subtask: SubtaskId,
        /// Employee ID
        employee: EmployeeId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = WorkforceConfig::load_or_default(cli.config.as_deref()).await?;
    if let Some(path) = cli.storage {
        config.storage_path = path;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let storage = JsonStorage::open(&config.storage_path).await?;
    let service = AssignmentService::new(storage, Arc::new(DefaultClock))?;

    match cli.command {
        Commands::Employee(command) => employee(&service, command).await?,
        Commands::Project(command) => project(&service, command).await?,
        Commands::Assign(command) => assign(&service, command).await?,
        Commands::Complete { milestone } => {
            let record = service.complete_milestone(milestone).await?;
            if record.milestone.restamped {
                println!("Milestone {} completed again at {}", milestone, record.milestone.completed_at);
            } else {
                println!("Milestone {} completed at {}", milestone, record.milestone.completed_at);
            }
            match record.subtask {
                SubtaskReconciliation::Pending { completed, total } => {
                    println!("  Subtask {}: {}/{} milestones done", record.milestone.subtask_id, completed, total);
                }
                SubtaskReconciliation::Completed { next, .. } => {
                    println!("  Subtask {} completed", record.milestone.subtask_id);
                    println!("  Next: {}", next.message());
                }
                SubtaskReconciliation::NoMilestones | SubtaskReconciliation::NotInProgress { .. } => {}
            }
        }
        Commands::Reconcile => {
            let report = service.reconcile_task_status().await?;
            println!("Checked {} open task(s), completed {}", report.checked, report.completed.len());
            for id in report.completed {
                println!("  task {}", id);
            }
        }
        Commands::Run { ticks, interval } => {
            let mut driver_config = DriverConfig::from(&config);
            driver_config.max_ticks = ticks;
            if let Some(secs) = interval {
                driver_config.interval = Duration::from_secs(secs.max(1));
            }

            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                let _ = stop_tx.send(true);
            });

            let mut driver = PeriodicDriver::new(service).with_config(driver_config);
            let ran = driver.run(stop_rx).await;
            info!("Completed {} ticks", ran);
        }
    }

    Ok(())
}

async fn employee(
    service: &AssignmentService<JsonStorage, DefaultClock>,
    command: EmployeeCommand,
) -> Result<()> {
    match command {
        EmployeeCommand::Add { name, skills } => {
            let employee = service.onboard_employee(NewEmployee::new(name, &skills)).await?;
            println!("Added employee: {} - {} [{}]", employee.id, employee.name, employee.skills_line());
        }
        EmployeeCommand::List => {
            let employees = service.employees().await?;
            println!("Employees ({})", employees.len());
            for e in employees {
                println!("  {} | {} | {}", e.id, e.name, e.skills_line());
            }
        }
        EmployeeCommand::Skills { id, skills } => {
            let (employee, added) = service.add_skills(id, &skills).await?;
            println!("Added {} skill(s): {}", added, employee.skills_line());
        }
        EmployeeCommand::Work { id } => {
            let workload = service.employee_workload(id).await?;
            println!("{} ({})", workload.employee.name, workload.employee.id);
            for project in &workload.projects {
                println!("  Project {}: {}", project.id, project.description);
            }
            for entry in &workload.tasks {
                println!("  Task {} | {}", entry.task.id, entry.task.name);
                for sub in &entry.subtasks {
                    println!(
                        "    Subtask {} | {} | {}",
                        sub.subtask.id,
                        format_subtask(sub.subtask.status()),
                        sub.subtask.name
                    );
                    for m in &sub.milestones {
                        println!("      {} | {} | {}", m.id, format_milestone(m.state.status()), m.name);
                    }
                }
            }
        }
        EmployeeCommand::Logs { id } => {
            for log in service.logs_for_employee(id).await? {
                println!("{} {}", log.timestamp.format("%Y-%m-%d %H:%M:%S"), log.message);
            }
        }
    }
    Ok(())
}

async fn project(
    service: &AssignmentService<JsonStorage, DefaultClock>,
    command: ProjectCommand,
) -> Result<()> {
    match command {
        ProjectCommand::Add { id, description } => {
            let project = service.register_project(id, &description).await?;
            println!("Added project: {} - {}", project.id, project.description);
        }
        ProjectCommand::List => {
            let projects = service.projects().await?;
            println!("Projects ({})", projects.len());
            for p in projects {
                println!("  {} | {}", p.id, p.description);
            }
        }
        ProjectCommand::Show { id } => {
            let overview = service.project_overview(&id).await?;
            println!("Project: {}", overview.project.id);
            println!("  Description: {}", overview.project.description);
            println!("  Created: {}", overview.project.created_at);
            println!("  Staff: {}", overview.employees.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", "));
            for task in &overview.tasks {
                println!("  Task {} | {} | {}", task.task.id, format_task(task.task.status), task.task.name);
                for sub in &task.subtasks {
                    let owner = sub.employee.as_ref().map_or("-", |e| e.name.as_str());
                    println!(
                        "    Subtask {} | {} | {:.0}% | {} | {}",
                        sub.subtask.id,
                        format_subtask(sub.subtask.status()),
                        sub.progress,
                        owner,
                        sub.subtask.name
                    );
                }
            }
        }
        ProjectCommand::Import { id, outline } => {
            let generator = OutlineFileGenerator::new(outline);
            let import = service.generate_breakdown(&id, &generator).await?;
            println!(
                "Imported {} task(s), {} subtask(s), {} milestone(s)",
                import.summary.tasks,
                import.summary.subtasks.len(),
                import.summary.milestones
            );
            for name in &import.summary.skipped {
                println!("  Skipped '{}': no milestones", name);
            }
            println!("{}", import.assignment.message());
        }
    }
    Ok(())
}

async fn assign(
    service: &AssignmentService<JsonStorage, DefaultClock>,
    command: AssignCommand,
) -> Result<()> {
    match command {
        AssignCommand::Bulk => {
            let report = service.trigger_bulk_assignment().await?;
            println!("{}", report.message());
            for r in &report.assigned {
                println!("  {}", r.message());
            }
        }
        AssignCommand::Next { employee } => {
            print_outcome(&service.trigger_assign_next(employee).await?);
        }
        AssignCommand::Best { employee } => {
            print_outcome(&service.assign_best_for_employee(employee).await?);
        }
        AssignCommand::Manual { subtask, employee } => {
            let report = service.assign_subtask(subtask, employee).await?;
            println!("{}", report.message());
        }
    }
    Ok(())
}

fn print_outcome(outcome: &AssignOutcome) {
    println!("{}", outcome.message());
    if let Some(score) = outcome.assigned().and_then(|r| r.score) {
        println!("  Score: {}", score);
    }
}

fn format_task(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NotStarted => "OPEN",
        TaskStatus::Completed => "DONE",
    }
}

fn format_subtask(status: SubtaskStatus) -> &'static str {
    match status {
        SubtaskStatus::Unassigned => "UNASSIGNED",
        SubtaskStatus::InProgress => "IN PROGRESS",
        SubtaskStatus::Completed => "DONE",
    }
}

fn format_milestone(status: MilestoneStatus) -> &'static str {
    match status {
        MilestoneStatus::NotStarted => "TODO",
        MilestoneStatus::Completed => "DONE",
    }
}
