use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Scope, ScopedJoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::ProgressBar;
use tracing::{debug, error, info};

use crate::catalog::Catalog;
use crate::config::LineageConfig;
use crate::error::LineageError;
use crate::extractor::routine::{Extractor, RoutineSummary};
use crate::facts::{Fact, FactEmitter, FactKind};
use crate::parser::events::RoutineParser;
use crate::pipeline::feed::{RoutineFeed, RoutineTask};
use crate::pipeline::sinks::{
    drain, ErrorCountsReport, ErrorSink, PortfolioCodesReport, PortfolioSink, TablesUsedReport,
    TablesUsedSink,
};

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Routines taken off the queue, skipped ones included.
    pub routines_completed: usize,
    /// Routines with no source text.
    pub routines_skipped: usize,
    /// `TableUsed` facts published.
    pub tables: usize,
    /// `PortfolioReferenced` facts published.
    pub portfolio_codes: usize,
    /// `ParseError` facts published.
    pub parse_errors: usize,
}

impl RunStats {
    fn record(&mut self, summary: RoutineSummary) {
        self.tables += summary.tables;
        self.portfolio_codes += summary.portfolio_codes;
        self.parse_errors += summary.parse_errors;
    }

    fn merge(&mut self, other: RunStats) {
        self.routines_completed += other.routines_completed;
        self.routines_skipped += other.routines_skipped;
        self.tables += other.tables;
        self.portfolio_codes += other.portfolio_codes;
        self.parse_errors += other.parse_errors;
    }
}

/// The three finalized reports of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineageReports {
    /// (routine, table) rows.
    pub tables_used: TablesUsedReport,
    /// (routine, code) rows.
    pub portfolio_codes: PortfolioCodesReport,
    /// Routine to syntax error count.
    pub error_counts: ErrorCountsReport,
    /// Run counters.
    pub stats: RunStats,
}

/// Parse and extract a single routine, publishing facts into `emitter`.
///
/// Returns `None` when the routine has no source text; such routines produce
/// no facts at all.
pub fn extract_routine<P, E>(
    parser: &P,
    catalog: &Catalog,
    config: &LineageConfig,
    task: &RoutineTask,
    emitter: &mut E,
) -> Result<Option<RoutineSummary>, LineageError>
where
    P: RoutineParser + ?Sized,
    E: FactEmitter,
{
    if task.is_blank() {
        debug!(routine = %task.name, "no definition found, skipping");
        return Ok(None);
    }
    let mut extractor = Extractor::new(&task.name, catalog, config, emitter);
    parser.parse(&task.source_text, &mut extractor)?;
    if !extractor.is_finished() {
        return Err(LineageError::MissingEndOfInput {
            routine: task.name.clone(),
        });
    }
    Ok(Some(extractor.summary()))
}

/// Fixed-size worker pool that turns a routine feed into three reports.
///
/// Workers pull tasks from one bounded queue and publish facts onto one
/// bounded channel per sink, so a slow sink stalls the workers instead of
/// buffering without limit. Sinks finalize only after every worker has been
/// joined. A fatal error stops the feed and the workers, and the run returns
/// that error without any report.
pub struct Pipeline<'a, P: RoutineParser> {
    catalog: &'a Catalog,
    parser: &'a P,
    config: &'a LineageConfig,
    progress: ProgressBar,
}

impl<'a, P: RoutineParser> Pipeline<'a, P> {
    /// Create a pipeline; the catalog must be fully loaded.
    pub fn new(catalog: &'a Catalog, parser: &'a P, config: &'a LineageConfig) -> Self {
        Self {
            catalog,
            parser,
            config,
            progress: ProgressBar::hidden(),
        }
    }

    /// Advance `progress` once per completed routine.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Process every routine the feed yields.
    pub fn run<F: RoutineFeed>(&self, feed: &mut F) -> Result<LineageReports, LineageError> {
        let capacity = self.config.channel_capacity.max(1);
        let pool_size = self.config.pool_size.max(1);
        info!(pool_size, capacity, "starting parsing phase");

        let abort = AtomicBool::new(false);
        let (task_tx, task_rx) = bounded::<RoutineTask>(capacity);
        let (tables_tx, tables_rx) = bounded::<Fact>(capacity);
        let (portfolios_tx, portfolios_rx) = bounded::<Fact>(capacity);
        let (errors_tx, errors_rx) = bounded::<Fact>(capacity);
        let router = FactRouter {
            tables: tables_tx,
            portfolios: portfolios_tx,
            errors: errors_tx,
        };

        let worker = Worker {
            catalog: self.catalog,
            parser: self.parser,
            config: self.config,
            abort: &abort,
            progress: &self.progress,
        };

        thread::scope(|scope| -> Result<LineageReports, LineageError> {
            let tables_sink = spawn(scope, sink_thread_name(FactKind::TableUsed), move || {
                drain(TablesUsedSink::default(), tables_rx)
            })?;
            let portfolio_sink =
                spawn(scope, sink_thread_name(FactKind::PortfolioReferenced), move || {
                    drain(PortfolioSink::default(), portfolios_rx)
                })?;
            let error_sink = spawn(scope, sink_thread_name(FactKind::ParseError), move || {
                drain(ErrorSink::default(), errors_rx)
            })?;

            let mut workers = Vec::with_capacity(pool_size);
            for id in 0..pool_size {
                let tasks = task_rx.clone();
                let router = router.clone();
                let worker = &worker;
                workers.push(spawn(scope, format!("lineage-worker-{id}"), move || {
                    worker.run(tasks, router)
                })?);
            }
            // Workers hold the only receivers and fact senders from here on.
            drop(task_rx);
            drop(router);

            let fed = pump(feed, task_tx, worker.abort);

            let mut stats = RunStats::default();
            let mut failure = None;
            for handle in workers {
                match join(handle)? {
                    Ok(worker_stats) => stats.merge(worker_stats),
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }

            let tables_used = join(tables_sink)?;
            let portfolio_codes = join(portfolio_sink)?;
            let error_counts = join(error_sink)?;

            if let Some(err) = failure {
                return Err(err);
            }
            let fed = fed?;
            info!(
                fed,
                completed = stats.routines_completed,
                skipped = stats.routines_skipped,
                tables = stats.tables,
                portfolio_codes = stats.portfolio_codes,
                parse_errors = stats.parse_errors,
                "all routines parsed"
            );
            Ok(LineageReports {
                tables_used,
                portfolio_codes,
                error_counts,
                stats,
            })
        })
    }
}

/// Everything a worker thread borrows from the run.
struct Worker<'a, P: RoutineParser> {
    catalog: &'a Catalog,
    parser: &'a P,
    config: &'a LineageConfig,
    abort: &'a AtomicBool,
    progress: &'a ProgressBar,
}

impl<P: RoutineParser> Worker<'_, P> {
    fn run(&self, tasks: Receiver<RoutineTask>, mut router: FactRouter) -> Result<RunStats, LineageError> {
        let mut stats = RunStats::default();
        while !self.aborted() {
            let Ok(task) = tasks.recv() else {
                break;
            };
            if self.aborted() {
                break;
            }
            match extract_routine(self.parser, self.catalog, self.config, &task, &mut router) {
                Ok(Some(summary)) => stats.record(summary),
                Ok(None) => stats.routines_skipped += 1,
                Err(err) => {
                    error!(routine = %task.name, error = %err, "fatal error, aborting run");
                    self.abort.store(true, Ordering::Release);
                    return Err(err);
                }
            }
            stats.routines_completed += 1;
            self.progress.inc(1);
        }
        Ok(stats)
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }
}

/// Routes each fact to its sink's channel, blocking while that sink is full.
#[derive(Clone)]
struct FactRouter {
    tables: Sender<Fact>,
    portfolios: Sender<Fact>,
    errors: Sender<Fact>,
}

impl FactEmitter for FactRouter {
    fn emit(&mut self, fact: Fact) -> Result<(), LineageError> {
        let kind = fact.kind();
        let tx = match kind {
            FactKind::TableUsed => &self.tables,
            FactKind::PortfolioReferenced => &self.portfolios,
            FactKind::ParseError => &self.errors,
        };
        tx.send(fact)
            .map_err(|_| LineageError::SinkClosed(kind.label()))
    }
}

/// Move tasks from the feed onto the queue until the feed ends, the run
/// aborts, or no worker is left to receive.
fn pump<F: RoutineFeed>(
    feed: &mut F,
    tasks: Sender<RoutineTask>,
    abort: &AtomicBool,
) -> Result<usize, LineageError> {
    let mut fed = 0usize;
    while !abort.load(Ordering::Acquire) {
        let task = match feed.next_routine() {
            Ok(Some(task)) => task,
            Ok(None) => break,
            Err(err) => {
                error!(error = %err, "routine feed failed, aborting run");
                abort.store(true, Ordering::Release);
                return Err(err);
            }
        };
        if tasks.send(task).is_err() {
            break;
        }
        fed += 1;
    }
    Ok(fed)
}

fn sink_thread_name(kind: FactKind) -> String {
    format!("lineage-sink-{}", kind.label())
}

fn spawn<'scope, T, F>(
    scope: &'scope Scope<'scope, '_>,
    name: String,
    f: F,
) -> Result<ScopedJoinHandle<'scope, T>, LineageError>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn_scoped(scope, f)
        .map_err(|e| LineageError::Thread {
            name,
            message: e.to_string(),
        })
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> Result<T, LineageError> {
    let name = handle.thread().name().unwrap_or("unnamed").to_string();
    handle.join().map_err(|_| LineageError::Thread {
        name,
        message: "thread panicked".to_string(),
    })
}
