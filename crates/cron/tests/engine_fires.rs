//! Integration coverage for the run loop in `engine.rs`: a `Once` job
//! due a moment from now should fire exactly once through a real
//! `CronEngine::spawn`, not just through `PeriodSchedule::next_after`
//! in isolation.

use conversant_cron::{CronEngine, CronHandler, CronJob, Cycle, EndCondition, HolidayCalendar};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingHandler {
    fires: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl CronHandler for CountingHandler {
    async fn run(&self, _job: &CronJob) {
        self.fires.fetch_add(1, Ordering::SeqCst);
    }
}

fn job_due_in(millis: i64) -> CronJob {
    let start = chrono::Local::now().naive_local() + chrono::Duration::milliseconds(millis);
    CronJob {
        filename: "clock0001.json".into(),
        is_active: true,
        name: "integration-once".into(),
        start_time: start,
        lunar: false,
        cycle: Cycle::Once,
        cycle_details: HashSet::new(),
        skip_holidays: false,
        skip_weekdays: false,
        repeat: false,
        repeat_interval_secs: 0.0,
        repeat_duration_secs: 0.0,
        end: EndCondition::Forever,
        end_count: 0,
        end_date: None,
    }
}

#[tokio::test]
async fn once_job_fires_exactly_once_through_the_run_loop() {
    let fires = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(CountingHandler { fires: fires.clone() });
    let holidays = HolidayCalendar::new(std::env::temp_dir().join("conversant-cron-engine-test"));

    let engine = CronEngine::spawn(vec![job_due_in(50)], holidays, handler);

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1, "Once job should fire exactly once");

    // Give the run loop one more pass; it must not fire again (the
    // schedule has no recurrence once its single fire has happened).
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);

    engine.stop();
}

#[tokio::test]
async fn snapshot_reflects_added_job_without_blocking_the_run_loop() {
    let fires = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(CountingHandler { fires });
    let holidays = HolidayCalendar::new(std::env::temp_dir().join("conversant-cron-engine-test-2"));

    let engine = CronEngine::spawn(vec![], holidays, handler);
    assert!(engine.snapshot().is_empty());

    engine.add(job_due_in(60_000));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(engine.snapshot().len(), 1);

    engine.remove("clock0001.json");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(engine.snapshot().is_empty());

    engine.stop();
}
