use crate::probe::ReadinessProbe;
use crate::process::SpawnRequest;
use crate::spawner::Spawner;
use chrono::Utc;
use kickoff_core::{
    LaunchPlan, LaunchRecord, LaunchReport, Readiness, ReadinessOutcome, SpawnStatus, Target,
};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Progress notifications emitted while a plan runs
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchEvent {
    Spawning {
        index: usize,
        total: usize,
        title: String,
        command: String,
    },
    Spawned {
        title: String,
        pid: Option<u32>,
    },
    Simulated {
        title: String,
    },
    SpawnFailed {
        title: String,
        error: String,
    },
    AwaitingReadiness {
        title: String,
        readiness: Readiness,
        timeout: Duration,
    },
    Ready {
        title: String,
        waited: Duration,
    },
    NotReady {
        title: String,
        waited: Duration,
    },
    Pausing {
        title: String,
        delay: Duration,
    },
}

type Observer = Box<dyn Fn(&LaunchEvent) + Send + Sync>;

/// Starts the targets of a plan one after another with stagger pauses.
///
/// Every spawn is fire-and-forget: a failure is recorded and logged and the
/// sequence moves on to the next target.
pub struct Launcher<S> {
    spawner: S,
    probe: ReadinessProbe,
    observer: Option<Observer>,
}

impl<S: Spawner> Launcher<S> {
    pub fn new(spawner: S) -> Self {
        Self {
            spawner,
            probe: ReadinessProbe::new(),
            observer: None,
        }
    }

    pub fn with_probe(mut self, probe: ReadinessProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&LaunchEvent) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Run the whole plan and return what happened
    pub async fn run(&self, plan: &LaunchPlan) -> LaunchReport {
        let launch_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            launch_id = %launch_id,
            plan_name = %plan.name,
            targets = plan.targets.len(),
            "Starting launch sequence"
        );

        let mut records = Vec::with_capacity(plan.targets.len());
        for (index, target) in plan.targets.iter().enumerate() {
            let record = self.launch_target(launch_id, index, target, plan).await;
            records.push(record);
        }

        let report = LaunchReport {
            id: launch_id,
            plan_name: plan.name.clone(),
            records,
            started_at,
            completed_at: Some(Utc::now()),
        };

        info!(
            launch_id = %launch_id,
            spawned = report.spawned(),
            failed = report.failed().count(),
            "Launch sequence completed"
        );

        report
    }

    async fn launch_target(
        &self,
        launch_id: Uuid,
        index: usize,
        target: &Target,
        plan: &LaunchPlan,
    ) -> LaunchRecord {
        let request = SpawnRequest::new(target, plan);

        self.emit(LaunchEvent::Spawning {
            index,
            total: plan.targets.len(),
            title: target.title.clone(),
            command: self.spawner.describe(&request),
        });

        let spawned_at = Utc::now();
        let (status, pid) = match self.spawner.spawn(&request) {
            Ok(pid) if self.spawner.simulated() => {
                self.emit(LaunchEvent::Simulated {
                    title: target.title.clone(),
                });
                (SpawnStatus::Simulated, pid)
            }
            Ok(pid) => {
                info!(
                    launch_id = %launch_id,
                    title = %target.title,
                    pid = ?pid,
                    "Target spawned"
                );
                self.emit(LaunchEvent::Spawned {
                    title: target.title.clone(),
                    pid,
                });
                (SpawnStatus::Spawned, pid)
            }
            Err(e) => {
                warn!(
                    launch_id = %launch_id,
                    title = %target.title,
                    error = %e,
                    "Spawn failed, continuing with next target"
                );
                self.emit(LaunchEvent::SpawnFailed {
                    title: target.title.clone(),
                    error: e.to_string(),
                });
                (
                    SpawnStatus::Failed {
                        reason: e.to_string(),
                    },
                    None,
                )
            }
        };

        let readiness = match (&target.readiness, &status) {
            (Some(readiness), SpawnStatus::Spawned) => {
                Some(self.await_readiness(launch_id, target, readiness).await)
            }
            _ => None,
        };

        if !target.delay.is_zero() {
            debug!(
                launch_id = %launch_id,
                title = %target.title,
                delay_ms = target.delay.as_millis() as u64,
                "Stagger pause"
            );
            self.emit(LaunchEvent::Pausing {
                title: target.title.clone(),
                delay: target.delay,
            });
            tokio::time::sleep(target.delay).await;
        }

        LaunchRecord {
            index,
            title: target.title.clone(),
            status,
            pid,
            readiness,
            spawned_at,
            delay_ms: target.delay.as_millis() as u64,
        }
    }

    async fn await_readiness(
        &self,
        launch_id: Uuid,
        target: &Target,
        readiness: &Readiness,
    ) -> ReadinessOutcome {
        self.emit(LaunchEvent::AwaitingReadiness {
            title: target.title.clone(),
            readiness: readiness.clone(),
            timeout: target.ready_timeout,
        });

        let outcome = self.probe.wait(readiness, target.ready_timeout).await;
        match outcome {
            ReadinessOutcome::Ready { waited_ms } => {
                info!(launch_id = %launch_id, title = %target.title, waited_ms, "Target ready");
                self.emit(LaunchEvent::Ready {
                    title: target.title.clone(),
                    waited: Duration::from_millis(waited_ms),
                });
            }
            ReadinessOutcome::TimedOut { waited_ms } => {
                warn!(
                    launch_id = %launch_id,
                    title = %target.title,
                    waited_ms,
                    "Target not ready before timeout, continuing"
                );
                self.emit(LaunchEvent::NotReady {
                    title: target.title.clone(),
                    waited: Duration::from_millis(waited_ms),
                });
            }
        }
        outcome
    }

    fn emit(&self, event: LaunchEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }
}
