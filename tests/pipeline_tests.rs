mod support;

use std::sync::atomic::{AtomicUsize, Ordering};

use sproc_lineage::config::LineageConfig;
use sproc_lineage::error::LineageError;
use sproc_lineage::parser::events::{ParseListener, RoutineParser};
use sproc_lineage::pipeline::feed::{RoutineFeed, RoutineTask, TaskListFeed};
use sproc_lineage::pipeline::orchestrator::{LineageReports, Pipeline};

use support::{catalog, code_pairs, pair, table_pairs, ScriptedParser};

fn routines() -> Vec<RoutineTask> {
    (0..40)
        .map(|i| {
            let script = format!(
                "table BRS.dbo.Positions\n\
                 table Trades\n\
                 alias t\n\
                 table #work_{i}\n\
                 literal 'AA%'\n\
                 ident CORE\n\
                 {}\
                 end",
                if i % 5 == 0 { "error 1 1 bad token\n" } else { "" }
            );
            RoutineTask::new(format!("usp_{i:02}"), script)
        })
        .collect()
}

fn run_with(config: &LineageConfig, tasks: Vec<RoutineTask>) -> Result<LineageReports, LineageError> {
    let catalog = catalog(&["Positions", "Trades"], &["AAA", "AAB", "CORE", "ZZZ"]);
    let parser = ScriptedParser;
    Pipeline::new(&catalog, &parser, config).run(&mut TaskListFeed::new(tasks))
}

#[test]
fn pool_size_does_not_change_the_fact_multiset() {
    let single = run_with(&LineageConfig::default().with_pool_size(1), routines()).unwrap();
    let pooled = run_with(&LineageConfig::default(), routines()).unwrap();

    assert_eq!(table_pairs(&single), table_pairs(&pooled));
    assert_eq!(code_pairs(&single), code_pairs(&pooled));
    assert_eq!(single.error_counts, pooled.error_counts);
    assert_eq!(pooled.stats.routines_completed, 40);
    assert_eq!(pooled.tables_used.rows.len(), 80);
    assert_eq!(pooled.portfolio_codes.rows.len(), 120);
    assert_eq!(pooled.error_counts.total(), 8);
    assert_eq!(pooled.error_counts.counts.get("usp_05"), Some(&1));
}

#[test]
fn per_routine_facts_are_deduplicated_and_filtered() {
    let reports = run_with(&LineageConfig::default(), routines()).unwrap();
    let first: Vec<_> = table_pairs(&reports)
        .into_iter()
        .filter(|(routine, _)| routine == "usp_00")
        .collect();
    assert_eq!(first, vec![pair("usp_00", "POSITIONS"), pair("usp_00", "TRADES")]);
    assert!(reports
        .tables_used
        .rows
        .iter()
        .all(|(_, table)| !table.starts_with('#')));
}

#[test]
fn empty_feed_yields_empty_reports() {
    let reports = run_with(&LineageConfig::default(), Vec::new()).unwrap();
    assert_eq!(reports, LineageReports::default());
}

#[test]
fn blank_routines_are_skipped_but_counted() {
    let reports = run_with(
        &LineageConfig::default(),
        vec![
            RoutineTask::new("usp_blank", "   "),
            RoutineTask::new("usp_real", "table Trades\nend"),
        ],
    )
    .unwrap();
    assert_eq!(reports.stats.routines_completed, 2);
    assert_eq!(reports.stats.routines_skipped, 1);
    assert_eq!(table_pairs(&reports), vec![pair("usp_real", "TRADES")]);
}

#[test]
fn fatal_name_aborts_the_whole_run() {
    let mut tasks = routines();
    tasks.insert(3, RoutineTask::new("usp_linked", "table srv.BRS.dbo.Trades\nend"));
    let err = run_with(&LineageConfig::default(), tasks).expect_err("run should abort");
    assert!(matches!(
        err,
        LineageError::UnhandledQualifiedName { segments: 4, .. }
    ));
}

#[test]
fn capacity_one_still_drains_everything() {
    let mut config = LineageConfig::default().with_pool_size(3);
    config.channel_capacity = 1;
    let reports = run_with(&config, routines()).unwrap();
    assert_eq!(reports.stats.routines_completed, 40);
    assert_eq!(reports.tables_used.rows.len(), 80);
    assert_eq!(reports.portfolio_codes.rows.len(), 120);
}

/// Counts how many routines the parser saw.
struct CountingParser {
    parsed: AtomicUsize,
}

impl RoutineParser for CountingParser {
    fn parse(&self, source: &str, listener: &mut dyn ParseListener) -> Result<(), LineageError> {
        self.parsed.fetch_add(1, Ordering::SeqCst);
        ScriptedParser.parse(source, listener)
    }
}

/// Feed that yields a fixed number of routines and then fails.
struct FailingFeed {
    left: usize,
}

impl RoutineFeed for FailingFeed {
    fn next_routine(&mut self) -> Result<Option<RoutineTask>, LineageError> {
        if self.left == 0 {
            return Err(LineageError::Feed {
                path: "routines/broken.sql".into(),
                source: std::io::Error::other("disk went away"),
            });
        }
        self.left -= 1;
        Ok(Some(RoutineTask::new("usp_ok", "table Trades\nend")))
    }
}

#[test]
fn feed_failure_is_fatal() {
    let catalog = catalog(&["Trades"], &[]);
    let parser = CountingParser {
        parsed: AtomicUsize::new(0),
    };
    let config = LineageConfig::default();
    let err = Pipeline::new(&catalog, &parser, &config)
        .run(&mut FailingFeed { left: 2 })
        .expect_err("feed failure should abort");
    assert!(matches!(err, LineageError::Feed { .. }));
    assert!(parser.parsed.load(Ordering::SeqCst) <= 2);
}
