use hashbrown::HashMap;

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use crate::config::RunContext;
use crate::core;
use crate::error::{StageError, StageFailure};
use crate::executor::runner::JobRunner;
use crate::graph::{InducedGraph, StageGraph, StageId};
use crate::store::{ArtifactStore, Artifacts};

type Completion = (StageId, Result<Artifacts, StageFailure>, Duration);

/// Per-stage wall-clock times of a successful run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub completed: Vec<(StageId, Duration)>,
}

impl RunReport {
    pub fn stages(&self) -> Vec<StageId> {
        self.completed.iter().map(|(stage, _)| *stage).collect()
    }

    pub fn log_summary(&self) {
        for (stage, elapsed) in &self.completed {
            log::info!("INFO [{}]: {:.3?}", stage, elapsed);
        }
    }
}

/// Runs an induced graph on a bounded worker pool.
///
/// A stage is spawned once every stage producing one of its inputs has
/// completed and its artifacts are registered. The first failure stops new
/// spawns; stages already running finish but their outputs are dropped.
pub struct Scheduler<'g> {
    graph: &'g StageGraph,
    runner: Arc<dyn JobRunner>,
    pool: rayon::ThreadPool,
}

impl<'g> Scheduler<'g> {
    pub fn new(
        graph: &'g StageGraph,
        runner: Arc<dyn JobRunner>,
        max_forks: usize,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_forks.max(1))
            .thread_name(|i| format!("stage-worker-{}", i))
            .build()?;

        Ok(Self {
            graph,
            runner,
            pool,
        })
    }

    pub fn execute(
        &self,
        induced: &InducedGraph,
        store: &ArtifactStore,
        ctx: &RunContext,
    ) -> Result<RunReport, StageError> {
        let mut remaining: HashMap<StageId, usize> = HashMap::new();
        let mut dependents: HashMap<StageId, Vec<StageId>> = HashMap::new();

        for &stage in &induced.order {
            let deps: Vec<StageId> = induced.dependencies_of(stage).collect();
            remaining.insert(stage, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(stage);
            }
        }

        let mut ready: VecDeque<StageId> = induced
            .order
            .iter()
            .copied()
            .filter(|stage| remaining[stage] == 0)
            .collect();

        let cancelled = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<Completion>();
        let runner: &dyn JobRunner = self.runner.as_ref();

        let mut running = 0usize;
        let mut failure: Option<StageError> = None;
        let mut report = RunReport::default();

        self.pool.in_place_scope(|scope| loop {
            if failure.is_none() {
                while let Some(stage) = ready.pop_front() {
                    let Some(definition) = self.graph.get_stage(stage) else {
                        failure = Some(StageError::new(
                            stage,
                            StageFailure::Panicked("stage missing from the graph".into()),
                        ));
                        cancelled.store(true, Ordering::SeqCst);
                        break;
                    };

                    let tx = tx.clone();
                    let cancelled = &cancelled;
                    running += 1;

                    scope.spawn(move |_| {
                        let start = Instant::now();
                        let result = if cancelled.load(Ordering::SeqCst) {
                            Err(StageFailure::Cancelled)
                        } else {
                            log::info!("INFO [{}]: starting...", stage);
                            catch_unwind(AssertUnwindSafe(|| {
                                core::run_stage(definition, ctx, store, runner)
                            }))
                            .unwrap_or_else(|panic| Err(StageFailure::Panicked(panic_message(&*panic))))
                        };

                        // receiver outlives every spawned stage
                        let _ = tx.send((stage, result, start.elapsed()));
                    });
                }
            }

            if running == 0 {
                break;
            }

            let Ok((stage, result, elapsed)) = rx.recv() else {
                break;
            };
            running -= 1;

            match result {
                Ok(artifacts) if failure.is_none() => {
                    let registered = artifacts
                        .into_values()
                        .try_for_each(|artifact| store.put(artifact));

                    if let Err(err) = registered {
                        log::error!("ERROR [{}]: {}", stage, err);
                        cancelled.store(true, Ordering::SeqCst);
                        failure = Some(StageError::new(stage, err));
                        continue;
                    }

                    log::info!("SUCCESS [{}]: completed in {:.3?}", stage, elapsed);
                    report.completed.push((stage, elapsed));

                    for next in dependents.get(&stage).into_iter().flatten() {
                        if let Some(count) = remaining.get_mut(next) {
                            *count -= 1;
                            if *count == 0 {
                                ready.push_back(*next);
                            }
                        }
                    }
                }
                Ok(_) => {
                    log::warn!(
                        "WARN [{}]: finished after an upstream failure, outputs not registered",
                        stage
                    );
                }
                Err(StageFailure::Cancelled) => {
                    log::info!("INFO [{}]: cancelled", stage);
                }
                Err(cause) => {
                    log::error!("ERROR [{}]: {}", stage, cause);
                    if failure.is_none() {
                        cancelled.store(true, Ordering::SeqCst);
                        failure = Some(StageError { stage, cause });
                    }
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
