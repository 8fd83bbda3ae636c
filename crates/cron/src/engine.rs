//! The run loop: sort entries by next fire time, sleep until the
//! earliest, fire everything due, recompute, repeat (spec §4.4.1).

use crate::holiday::HolidayCalendar;
use crate::schedule::{CronJob, PeriodSchedule};
use chrono::{Local, NaiveDateTime};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

#[async_trait::async_trait]
pub trait CronHandler: Send + Sync {
    async fn run(&self, job: &CronJob);
}

struct Entry {
    job: CronJob,
    next: Option<NaiveDateTime>,
    prev: Option<NaiveDateTime>,
    executions: u32,
}

enum Command {
    Add(CronJob),
    Remove(String),
    Stop,
}

pub struct CronEngine {
    entries: Arc<RwLock<Vec<Entry>>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl CronEngine {
    pub fn spawn(jobs: Vec<CronJob>, holidays: HolidayCalendar, handler: Arc<dyn CronHandler>) -> Self {
        let entries = Arc::new(RwLock::new(
            jobs.into_iter().map(|job| Entry { job, next: None, prev: None, executions: 0 }).collect::<Vec<_>>(),
        ));
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(run_loop(entries.clone(), holidays, handler, rx));

        Self { entries, commands: tx }
    }

    pub fn add(&self, job: CronJob) {
        let _ = self.commands.send(Command::Add(job));
    }

    pub fn remove(&self, filename: &str) {
        let _ = self.commands.send(Command::Remove(filename.to_string()));
    }

    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Snapshot of current jobs, safe to call while the loop is running
    /// since entry access is lock-guarded (spec §4.4.1 last line).
    pub fn snapshot(&self) -> Vec<CronJob> {
        self.entries.read().iter().map(|e| e.job.clone()).collect()
    }
}

/// Sorts stale entries (`next == prev`, or no schedule at all) to the
/// tail regardless of their timestamp; otherwise orders by `next`
/// ascending (spec §4.4.1 step 2).
fn entry_order(a: &Entry, b: &Entry) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let a_stale = a.next == a.prev || a.next.is_none();
    let b_stale = b.next == b.prev || b.next.is_none();
    match (a_stale, b_stale) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.next.cmp(&b.next),
    }
}

async fn run_loop(
    entries: Arc<RwLock<Vec<Entry>>>,
    holidays: HolidayCalendar,
    handler: Arc<dyn CronHandler>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let now = Local::now().naive_local();
    {
        let mut guard = entries.write();
        for entry in guard.iter_mut() {
            let schedule = PeriodSchedule::new(&entry.job, &holidays, entry.executions);
            entry.next = schedule.next_after(now).await;
        }
    }

    loop {
        let now = Local::now().naive_local();
        let mut effective: Option<NaiveDateTime> = None;

        {
            let mut guard = entries.write();
            guard.sort_by(|a, b| entry_order(a, b));

            for entry in guard.iter_mut() {
                if entry.next == entry.prev {
                    continue;
                }
                match entry.next {
                    Some(next) if next > now => {
                        effective = Some(next);
                        break;
                    }
                    Some(next) => entry.prev = Some(next),
                    None => entry.prev = entry.next,
                }
            }
        }

        let effective = effective.unwrap_or_else(|| now + chrono::Duration::days(365 * 15));
        let wait = (effective - now).to_std().unwrap_or(Duration::from_secs(0));

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let fire_time = Local::now().naive_local();
                let mut due = Vec::new();
                {
                    let mut guard = entries.write();
                    guard.retain(|e| e.next != e.prev || e.next.is_none());
                    for entry in guard.iter_mut() {
                        if entry.next == Some(effective) {
                            entry.prev = Some(fire_time);
                            entry.executions += 1;
                            due.push(entry.job.clone());
                            let schedule = PeriodSchedule::new(&entry.job, &holidays, entry.executions);
                            entry.next = schedule.next_after(fire_time).await;
                        }
                    }
                }
                for job in due {
                    let handler = handler.clone();
                    tokio::spawn(async move { handler.run(&job).await });
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Add(job)) => {
                        let schedule_now = Local::now().naive_local();
                        let executions = 0;
                        let mut new_entry = Entry { job, next: None, prev: None, executions };
                        let next = {
                            let schedule = PeriodSchedule::new(&new_entry.job, &holidays, executions);
                            schedule.next_after(schedule_now).await
                        };
                        new_entry.next = next;
                        entries.write().push(new_entry);
                    }
                    Some(Command::Remove(filename)) => {
                        entries.write().retain(|e| e.job.filename != filename);
                    }
                    Some(Command::Stop) | None => return,
                }
            }
        }
    }
}

/// Keeps per-filename execution counters for [`EndCondition::Count`]
/// across engine restarts (spec.md §3 `CronJob` persistence).
pub type ExecutionCounters = HashMap<String, u32>;
