//! The periodic assignment driver.

use std::time::Duration;
use mockable::Clock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use workforce_core::EmployeeId;
use workforce_progress::TaskReconciliation;
use workforce_storage::Storage;
use workforce_work::{AssignOutcome, BulkAssignReport};

use crate::config::WorkforceConfig;
use crate::service::{AssignmentService, Result};

/// Configuration for the periodic driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Ticks before stopping (None = until stopped)
    pub max_ticks: Option<usize>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_ticks: None,
        }
    }
}

impl From<&WorkforceConfig> for DriverConfig {
    fn from(config: &WorkforceConfig) -> Self {
        Self {
            interval: config.assignment_interval(),
            max_ticks: None,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The bulk assignment pass
    pub bulk: BulkAssignReport,
    /// The task status sweep
    pub tasks: TaskReconciliation,
    /// Follow-up offers to employees with finished work
    pub follow_ups: Vec<(EmployeeId, AssignOutcome)>,
}

impl TickReport {
    /// Number of subtasks assigned during the tick.
    pub fn assigned(&self) -> usize {
        self.bulk.assigned.len()
            + self
                .follow_ups
                .iter()
                .filter(|(_, outcome)| outcome.assigned().is_some())
                .count()
    }
}

/// Runs bulk assignment, task reconciliation and follow-up offers on a
/// fixed interval.
///
/// ```text
/// tick: bulk assign → reconcile tasks → assign next (finished employees)
/// ```
pub struct PeriodicDriver<S, C> {
    service: AssignmentService<S, C>,
    config: DriverConfig,
    ticks_run: usize,
}

impl<S: Storage, C: Clock + Send + Sync> PeriodicDriver<S, C> {
    /// Create a driver over a service.
    pub fn new(service: AssignmentService<S, C>) -> Self {
        Self {
            service,
            config: DriverConfig::default(),
            ticks_run: 0,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one tick. Each step takes the service lock on its own.
    pub async fn tick(&mut self) -> Result<TickReport> {
        self.ticks_run += 1;
        debug!("Starting assignment tick {}", self.ticks_run);

        let bulk = self.service.trigger_bulk_assignment().await?;
        let tasks = self.service.reconcile_task_status().await?;

        let mut follow_ups = Vec::new();
        for employee_id in self.service.employees_with_completed_work().await? {
            let outcome = self.service.trigger_assign_next(employee_id).await?;
            follow_ups.push((employee_id, outcome));
        }

        let report = TickReport {
            bulk,
            tasks,
            follow_ups,
        };
        info!(
            tick = self.ticks_run,
            assigned = report.assigned(),
            tasks_completed = report.tasks.completed.len(),
            "assignment tick finished"
        );
        Ok(report)
    }

    /// Tick on the configured interval until `stop` turns true, its sender
    /// goes away, or `max_ticks` is reached. The first tick runs
    /// immediately. A pending stop wins over a due tick. A failed tick is
    /// logged and the loop continues.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> usize {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let started = self.ticks_run;

        loop {
            if *stop.borrow() {
                info!("Stop requested");
                break;
            }
            if let Some(max) = self.config.max_ticks {
                if self.ticks_run - started >= max {
                    info!("Reached max ticks ({})", max);
                    break;
                }
            }

            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        info!("Stop signal dropped");
                        break;
                    }
                    continue;
                }
                _ = interval.tick() => {}
            }

            if let Err(e) = self.tick().await {
                error!("Assignment tick failed: {}", e);
            }
        }

        self.ticks_run - started
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> usize {
        self.ticks_run
    }

    /// The service the driver works through.
    pub fn service(&self) -> &AssignmentService<S, C> {
        &self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use mockable::DefaultClock;
    use workforce_core::{MilestoneFilter, NewEmployee, ProjectId};
    use workforce_storage::JsonStorage;

    const OUTLINE: &str = "**Data**\n\
- Write SQL migrations\n  - Draft schema\n\
- Tune SQL queries\n  - Profile\n";

    async fn seeded() -> (AssignmentService<JsonStorage, DefaultClock>, EmployeeId) {
        let service =
            AssignmentService::new(JsonStorage::in_memory(), Arc::new(DefaultClock)).unwrap();
        let project_id = ProjectId::new("P003");
        service.register_project(project_id.clone(), "Reporting").await.unwrap();
        // Import with nobody onboarded, so the driver does the assigning.
        service.import_outline(&project_id, OUTLINE).await.unwrap();
        let ada = service.onboard_employee(NewEmployee::new("Ada", "sql")).await.unwrap();
        (service, ada.id)
    }

    #[tokio::test]
    async fn test_tick_assigns_then_follows_up() {
        let (service, ada) = seeded().await;
        let mut driver = PeriodicDriver::new(service.clone());

        let first = driver.tick().await.unwrap();
        assert_eq!(first.bulk.assigned.len(), 1);
        assert_eq!(first.bulk.assigned[0].employee_id, ada);
        assert_eq!(first.bulk.unmatched.len(), 1);
        assert!(first.follow_ups.is_empty());

        // Finish the first subtask directly on the store, bypassing the
        // tracker's own follow-up.
        {
            let mut store = service_store(&service).await;
            let subtask_id = first.bulk.assigned[0].subtask_id;
            let ms = store.list_milestones(&MilestoneFilter::for_subtask(subtask_id)).await.unwrap();
            let tracker = workforce_progress::CompletionTracker::new(Arc::new(DefaultClock));
            for m in ms {
                tracker.complete_milestone(&mut *store, m.id).await.unwrap();
            }
            let mut subtask = store.load_subtask(subtask_id).await.unwrap().unwrap();
            subtask.state = workforce_core::SubtaskState::Completed { employee_id: ada };
            store.save_subtask(&subtask).await.unwrap();
            let mut records = store
                .list_assignments(&workforce_core::AssignmentFilter::active_for(ada))
                .await
                .unwrap();
            records[0].status = workforce_core::AssignmentStatus::Completed;
            store.save_assignment(&records[0]).await.unwrap();
            store.commit("test").await.unwrap();
        }

        let second = driver.tick().await.unwrap();
        // Bulk runs first and already hands Ada the remaining subtask.
        assert_eq!(second.bulk.assigned.len(), 1);
        assert_eq!(second.follow_ups.len(), 1);
        assert!(second.follow_ups[0].1.assigned().is_none());
        assert_eq!(driver.ticks(), 2);
    }

    async fn service_store(
        service: &AssignmentService<JsonStorage, DefaultClock>,
    ) -> tokio::sync::MutexGuard<'_, JsonStorage> {
        service.lock_store().await
    }

    #[tokio::test]
    async fn test_tick_completes_finished_tasks() {
        let service =
            AssignmentService::new(JsonStorage::in_memory(), Arc::new(DefaultClock)).unwrap();
        let project_id = ProjectId::new("P004");
        service.register_project(project_id.clone(), "Docs").await.unwrap();
        service.import_outline(&project_id, "**Empty task**\n").await.unwrap();

        let mut driver = PeriodicDriver::new(service);
        let report = driver.tick().await.unwrap();
        assert_eq!(report.tasks.completed.len(), 1);

        let again = driver.tick().await.unwrap();
        assert!(again.tasks.completed.is_empty());
        assert_eq!(again.assigned(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_after_max_ticks() {
        let (service, ada) = seeded().await;
        let mut driver = PeriodicDriver::new(service.clone()).with_config(DriverConfig {
            interval: Duration::from_secs(60),
            max_ticks: Some(3),
        });
        let (_tx, rx) = watch::channel(false);

        let start = tokio::time::Instant::now();
        let ran = driver.run(rx).await;

        assert_eq!(ran, 3);
        assert!(start.elapsed() >= Duration::from_secs(120));
        let workload = service.employee_workload(ada).await.unwrap();
        assert_eq!(workload.tasks.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_signal() {
        let (service, _) = seeded().await;
        let mut driver = PeriodicDriver::new(service).with_config(DriverConfig {
            interval: Duration::from_secs(60),
            max_ticks: None,
        });
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let ran = driver.run(rx).await;
            (ran, driver.ticks())
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        let (ran, ticks) = handle.await.unwrap();

        // Ticks at 0s, 60s and 120s.
        assert_eq!(ran, 3);
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_sender_dropped() {
        let (service, _) = seeded().await;
        let mut driver = PeriodicDriver::new(service.clone());
        let (tx, rx) = watch::channel(false);
        drop(tx);
        assert_eq!(driver.run(rx).await, 0);

        let mut driver = PeriodicDriver::new(service).with_config(DriverConfig {
            interval: Duration::from_secs(60),
            max_ticks: None,
        });
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { driver.run(rx).await });

        // Ticks at 0s and 60s, then the sender goes away.
        tokio::time::sleep(Duration::from_secs(90)).await;
        drop(tx);
        assert_eq!(handle.await.unwrap(), 2);
    }
}
