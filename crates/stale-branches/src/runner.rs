//! Run orchestration.
//!
//! The runner pulls branches page by page and hands each one to a task that
//! plans and executes it. At most `concurrency` tasks are in flight. Every
//! mark/remove must reserve a slot in the run's operation budget before it
//! executes; once the budget is spent the runner stops pulling branches and
//! waits for the tasks already started.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, info_span, Instrument};

use crate::config::Params;
use crate::error::Result;
use crate::events::{EventSink, RunEvent, Stage, TracingEventSink};
use crate::executor::{process_branch, ExecutionContext};
use crate::filters::BranchFilters;
use crate::planner::plan_branch_action;
use crate::source::{BranchReader, BranchSource, DEFAULT_PAGE_SIZE};
use crate::store::CommentStore;
use crate::tagged::TaggedComments;
use crate::types::{Branch, RunSummary};

/// Branches evaluated at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Counters shared by the tasks of one run.
struct RunState {
    summary: Mutex<RunSummary>,
    operations: AtomicUsize,
    budget: usize,
}

impl RunState {
    fn new(budget: usize) -> Self {
        Self {
            summary: Mutex::new(RunSummary::default()),
            operations: AtomicUsize::new(0),
            budget,
        }
    }

    /// Claim one operation; fails once the budget is spent.
    fn try_reserve(&self) -> bool {
        self.operations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.budget).then_some(n + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        self.operations.fetch_sub(1, Ordering::SeqCst);
    }

    fn budget_spent(&self) -> bool {
        self.operations.load(Ordering::SeqCst) >= self.budget
    }
}

/// Everything a branch task needs, cheaply cloneable.
#[derive(Clone)]
struct BranchTask {
    params: Arc<Params>,
    filters: Arc<BranchFilters>,
    store: Arc<dyn CommentStore>,
    sink: Arc<dyn EventSink>,
    state: Arc<RunState>,
}

impl BranchTask {
    async fn run(self, branch: Branch) {
        let name = branch.branch_name.clone();

        let plan = match plan_branch_action(
            &branch,
            &self.filters,
            TaggedComments::new(self.store.as_ref()),
            &self.params,
            self.sink.as_ref(),
        )
        .await
        {
            Ok(plan) => plan,
            Err(e) => {
                self.fail(name, Stage::Planning, &e.to_string()).await;
                return;
            }
        };

        self.sink.emit(RunEvent::Planned {
            branch: name.clone(),
            plan: plan.clone(),
        });

        let reserved = plan.is_operation();
        if reserved && !self.state.try_reserve() {
            self.state.summary.lock().await.deferred += 1;
            self.sink.emit(RunEvent::BudgetExhausted {
                branch: name,
                kind: plan.kind(),
            });
            return;
        }

        let ctx = ExecutionContext {
            store: self.store.as_ref(),
            params: &self.params,
            sink: self.sink.as_ref(),
        };
        match process_branch(&plan, &branch, ctx).await {
            Ok(()) => self.state.summary.lock().await.record(plan.kind()),
            Err(e) => {
                if reserved {
                    self.state.release();
                }
                self.fail(name, Stage::Execution, &e.to_string()).await;
            }
        }
    }

    async fn fail(&self, branch: String, stage: Stage, error: &str) {
        self.state.summary.lock().await.errors += 1;
        self.sink.emit(RunEvent::BranchFailed {
            branch,
            stage,
            error: error.to_string(),
        });
    }
}

/// Scans a repository's branches and marks or removes the stale ones.
pub struct StaleBranchReaper {
    params: Arc<Params>,
    source: Arc<dyn BranchSource>,
    store: Arc<dyn CommentStore>,
    sink: Arc<dyn EventSink>,
    concurrency: usize,
    page_size: usize,
}

impl StaleBranchReaper {
    pub fn new(
        params: Params,
        source: Arc<dyn BranchSource>,
        store: Arc<dyn CommentStore>,
    ) -> Self {
        Self {
            params: Arc::new(params),
            source,
            store,
            sink: Arc::new(TracingEventSink),
            concurrency: DEFAULT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Run one sweep using `now` for every cutoff.
    ///
    /// # Errors
    ///
    /// Configuration errors are returned before any remote call. A failure
    /// while listing branches ends the run with that error once the branches
    /// already started have finished. Failures for a single branch are
    /// logged and counted in [`RunSummary::errors`].
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        self.params.validate()?;
        let filters = Arc::new(BranchFilters::new(&self.params, now)?);

        self.sink.emit(RunEvent::RunStarted {
            repository: self.params.repo.to_string(),
            dry_run: self.params.dry_run,
            operations_per_run: self.params.operations_per_run,
        });

        let state = Arc::new(RunState::new(self.params.operations_per_run));
        let task = BranchTask {
            params: Arc::clone(&self.params),
            filters,
            store: Arc::clone(&self.store),
            sink: Arc::clone(&self.sink),
            state: Arc::clone(&state),
        };
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut reader = BranchReader::new(
            Arc::clone(&self.source),
            self.params.repo.clone(),
            self.params.protected_organization_name.clone(),
        )
        .with_page_size(self.page_size);
        let mut listing_error = None;

        'pages: loop {
            let batch = match reader.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    self.sink.emit(RunEvent::ListingFailed {
                        error: e.to_string(),
                    });
                    listing_error = Some(e);
                    break;
                }
            };

            for branch in batch {
                state.summary.lock().await.scanned += 1;

                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break 'pages;
                };
                let span = info_span!("branch", branch = %branch.branch_name);
                let task = task.clone();
                tasks.spawn(
                    async move {
                        let _permit = permit;
                        task.run(branch).await;
                    }
                    .instrument(span),
                );

                while let Some(joined) = tasks.try_join_next() {
                    Self::reap(joined, &state).await;
                }

                if state.budget_spent() {
                    info!(
                        "Exiting after {} operations",
                        state.operations.load(Ordering::SeqCst)
                    );
                    break 'pages;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            Self::reap(joined, &state).await;
        }

        let summary = *state.summary.lock().await;
        self.sink.emit(RunEvent::RunFinished { summary });

        match listing_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    async fn reap(joined: std::result::Result<(), JoinError>, state: &RunState) {
        if let Err(e) = joined {
            error!(error = %e, "Branch task panicked");
            state.summary.lock().await.errors += 1;
        }
    }
}
