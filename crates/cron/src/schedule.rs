//! `CronJob` and its runtime projection `PeriodSchedule::next`.

use crate::holiday::HolidayCalendar;
use crate::lunar::{self, LunarDate};
use crate::solarterm;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i8)]
pub enum Cycle {
    Once = 0,
    Daily = 1,
    Weekly = 2,
    Monthly = 3,
    Yearly = -1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EndCondition {
    Forever = 0,
    Count = 1,
    Date = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub filename: String,
    pub is_active: bool,
    pub name: String,
    pub start_time: NaiveDateTime,
    pub lunar: bool,
    pub cycle: Cycle,
    pub cycle_details: HashSet<i32>,
    pub skip_holidays: bool,
    pub skip_weekdays: bool,
    pub repeat: bool,
    pub repeat_interval_secs: f64,
    pub repeat_duration_secs: f64,
    pub end: EndCondition,
    pub end_count: u32,
    pub end_date: Option<NaiveDateTime>,
}

/// The repeat window derived from a fire: `repeat_count` sub-fires at
/// `k * repeat_interval` offsets from the primary fire time.
#[derive(Debug, Clone, Copy)]
pub struct RepeatWindow {
    pub repeat_count: u32,
    pub interval: ChronoDuration,
}

impl CronJob {
    pub fn repeat_window(&self) -> Option<RepeatWindow> {
        if !self.repeat {
            return None;
        }
        let interval_secs = self.repeat_interval_secs.max(1.0);
        let repeat_count = if self.repeat_duration_secs >= 1.0 {
            (self.repeat_duration_secs / interval_secs).floor() as u32
        } else {
            self.repeat_duration_secs as u32
        }
        .max(1);
        Some(RepeatWindow { repeat_count, interval: ChronoDuration::seconds(interval_secs as i64) })
    }
}

/// Runtime projection of a [`CronJob`]: computes the next fire time on
/// demand rather than storing it, so the engine's sort-by-next pass
/// always reflects the latest holiday/lunar state.
pub struct PeriodSchedule<'a> {
    pub job: &'a CronJob,
    pub holidays: &'a HolidayCalendar,
    pub executions: u32,
}

impl<'a> PeriodSchedule<'a> {
    pub fn new(job: &'a CronJob, holidays: &'a HolidayCalendar, executions: u32) -> Self {
        Self { job, holidays, executions }
    }

    pub async fn is_expired(&self, candidate: Option<NaiveDateTime>) -> bool {
        match self.job.end {
            EndCondition::Forever => false,
            EndCondition::Count => self.executions >= self.job.end_count,
            EndCondition::Date => match (candidate, self.job.end_date) {
                (Some(next), Some(end)) => next > end,
                _ => false,
            },
        }
    }

    /// Computes the next valid fire time strictly after `now`, or `None`
    /// if the schedule has expired or the cycle can never fire again
    /// (`Once` already fired in the past relative to a prior call).
    pub async fn next_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.job.cycle == Cycle::Once {
            let fire = if self.job.start_time > now { self.job.start_time } else { now };
            return self.accept_if_valid(fire, now).await;
        }

        let anchor_time = self.job.start_time.time();
        let mut candidate = self.seed(now, anchor_time);

        // Bound the search so a pathological filter combination (e.g. an
        // empty cycle_details that can never match) doesn't spin forever.
        // The seed itself is tested before any stepping, so a still-future
        // occurrence on today's date is not skipped.
        for _ in 0..3660 {
            if self.is_expired(Some(candidate)).await {
                return None;
            }
            if let Some(accepted) = self.accept_if_valid(candidate, now).await {
                return Some(accepted);
            }
            candidate = self.advance(candidate, anchor_time);
        }
        None
    }

    /// Whether this is the yearly "walk the 24 solar terms" mode rather
    /// than a plain yearly anniversary of `start_time`'s month/day.
    fn is_solar_term_yearly(&self) -> bool {
        self.job.cycle == Cycle::Yearly && !self.job.cycle_details.is_empty() && !self.job.lunar
    }

    /// The first candidate handed to the test-then-advance loop. The date
    /// component tracks `now` (or a still-future `start_time`), but
    /// `hh:mm:ss` — and, for Monthly/plain-Yearly, the day-of-month — are
    /// always taken from `start_time`, never from `now`'s wall clock.
    /// Mirrors the Go original's `reset()`, which builds every candidate
    /// as `time.Date(y, m, d, hour, min, sec, …)` with only `hour,min,sec`
    /// (and, for month-anchored cycles, `d`) coming from
    /// `StartTime.Clock()`/`StartTime.Day()`.
    fn seed(&self, now: NaiveDateTime, anchor_time: NaiveTime) -> NaiveDateTime {
        match self.job.cycle {
            Cycle::Once => unreachable!("Once returns early in next_after"),
            Cycle::Daily | Cycle::Weekly => {
                let date = self.job.start_time.date().max(now.date());
                NaiveDateTime::new(date, anchor_time)
            }
            Cycle::Monthly => {
                let date = self.job.start_time.date().max(now.date());
                anchored_month_day(date.year(), date.month(), self.job.start_time.day(), anchor_time)
            }
            Cycle::Yearly => {
                if self.is_solar_term_yearly() {
                    // The date is found entirely by `advance`'s day-by-day
                    // term scan; the seed only needs to be on/after `now`.
                    NaiveDateTime::new(now.date(), anchor_time)
                } else {
                    let date = self.job.start_time.date().max(now.date());
                    anchored_month_day(date.year(), self.job.start_time.month(), self.job.start_time.day(), anchor_time)
                }
            }
        }
    }

    /// Steps `from` one cycle stride forward, re-imposing the
    /// `start_time`-derived clock/day anchor on every step rather than
    /// carrying forward whatever the previous candidate happened to hold
    /// (so a short-month clamp, e.g. Jan 31 -> Feb 28, does not drift the
    /// anchor day to 28 for every later month).
    fn advance(&self, from: NaiveDateTime, anchor_time: NaiveTime) -> NaiveDateTime {
        match self.job.cycle {
            Cycle::Once => from,
            Cycle::Daily | Cycle::Weekly => from + ChronoDuration::days(1),
            Cycle::Monthly => {
                let stepped = add_months(from, 1);
                anchored_month_day(stepped.year(), stepped.month(), self.job.start_time.day(), anchor_time)
            }
            Cycle::Yearly => {
                if self.is_solar_term_yearly() {
                    // Scan day-by-day to the next *actual* term date
                    // rather than blindly stepping a fixed 14 days, which
                    // almost never lands back on a ~15.2-day-spaced term.
                    let scan_from = from.date() + ChronoDuration::days(1);
                    match solarterm::next_term_on_or_after(scan_from) {
                        Some((date, _)) => NaiveDateTime::new(date, anchor_time),
                        None => from + ChronoDuration::days(365),
                    }
                } else {
                    let stepped = add_months(from, 12);
                    anchored_month_day(stepped.year(), self.job.start_time.month(), self.job.start_time.day(), anchor_time)
                }
            }
        }
    }

    async fn accept_if_valid(&self, candidate: NaiveDateTime, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if candidate <= now {
            return None;
        }

        let candidate = if self.job.lunar { self.project_lunar(candidate)? } else { candidate };
        if candidate <= now {
            return None;
        }

        if !self.matches_cycle_details(candidate).await {
            return None;
        }

        if self.job.skip_holidays && self.holidays.is_holiday(candidate.date()).await {
            return None;
        }
        if self.job.skip_weekdays && self.holidays.is_workday(candidate.date()).await {
            return None;
        }

        Some(candidate)
    }

    /// Re-expresses `candidate`'s date in lunar coordinates (year/month/
    /// day carried from `start_time`, leap forced false) and converts
    /// back to Gregorian. A lunar day that overflows its actual month
    /// length (e.g. the 30th in a 29-day month) has no valid mapping for
    /// this candidate; the caller's search loop tries the next stride.
    fn project_lunar(&self, candidate: NaiveDateTime) -> Option<NaiveDateTime> {
        let anchor = lunar::solar_to_lunar(self.job.start_time.date())?;
        let target_year = lunar::solar_to_lunar(candidate.date())?.year;
        let lunar_date = LunarDate { year: target_year, month: anchor.month, day: anchor.day, is_leap: false };
        let solar_date = lunar::lunar_to_solar(&lunar_date)?;
        Some(NaiveDateTime::new(solar_date, candidate.time()))
    }

    async fn matches_cycle_details(&self, candidate: NaiveDateTime) -> bool {
        let details = &self.job.cycle_details;
        // An empty set and an explicit `0` both mean "every occurrence"
        // (spec.md §9 open question (ii)): the source's cycleDetails bitmask
        // has no slot for "all", so 0 is overloaded as that sentinel.
        if details.is_empty() || details.contains(&0) {
            return true;
        }
        match self.job.cycle {
            Cycle::Daily => details.contains(&(candidate.day() as i32)),
            Cycle::Weekly => {
                let iso_weekday = candidate.weekday().number_from_monday() as i32;
                details.contains(&iso_weekday)
            }
            Cycle::Monthly => details.contains(&(candidate.month() as i32)),
            Cycle::Yearly => {
                if self.job.lunar {
                    true
                } else if let Some(term) = solarterm::solar_term_on(candidate.date()) {
                    let idx = solarterm::SOLAR_TERMS.iter().position(|t| *t == term).unwrap() as i32 + 1;
                    details.contains(&idx)
                } else {
                    false
                }
            }
            Cycle::Once => true,
        }
    }
}

/// Builds `year-month-day hh:mm:ss` with `day` clamped to the target
/// month's actual length (e.g. an anchor day of 31 in a 30-day month).
fn anchored_month_day(year: i32, month: u32, day: u32, anchor_time: NaiveTime) -> NaiveDateTime {
    let day = day.min(days_in_month(year, month));
    NaiveDateTime::new(NaiveDate::from_ymd_opt(year, month, day).unwrap(), anchor_time)
}

fn add_months(dt: NaiveDateTime, months: i32) -> NaiveDateTime {
    let total = (dt.year() * 12 + dt.month() as i32 - 1) + months;
    let year = total.div_euclid(12);
    let month = (total.rem_euclid(12) + 1) as u32;
    let day = dt.day().min(days_in_month(year, month));
    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(dt.hour(), dt.minute(), dt.second())
        .unwrap()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        chrono::NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        chrono::NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .unwrap();
    (next - chrono::NaiveDate::from_ymd_opt(year, month, 1).unwrap()).num_days() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn plain_job(cycle: Cycle, start: NaiveDateTime) -> CronJob {
        CronJob {
            filename: "test.job".into(),
            is_active: true,
            name: "test".into(),
            start_time: start,
            lunar: false,
            cycle,
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
    async fn once_in_the_past_fires_at_now() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let job = plain_job(Cycle::Once, start);
        let calendar = HolidayCalendar::new(std::env::temp_dir());
        let schedule = PeriodSchedule::new(&job, &calendar, 0);
        let now = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(schedule.next_after(now).await, Some(now));
    }

    #[tokio::test]
    async fn repeat_duration_half_a_second_clamps_to_one() {
        let mut job = plain_job(Cycle::Daily, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap());
        job.repeat = true;
        job.repeat_interval_secs = 5.0;
        job.repeat_duration_secs = 0.5;
        let window = job.repeat_window().unwrap();
        assert_eq!(window.repeat_count, 1);
    }

    #[tokio::test]
    async fn lunar_yearly_resolves_to_the_correct_gregorian_day() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 29).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let mut job = plain_job(Cycle::Yearly, start);
        job.lunar = true;
        let calendar = HolidayCalendar::new(std::env::temp_dir());
        let schedule = PeriodSchedule::new(&job, &calendar, 0);
        let now = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let next = schedule.next_after(now).await.unwrap();
        // Full datetime, not just the date: the fire must keep
        // `start_time`'s 08:00 clock, not whatever time `now` happened
        // to read.
        assert_eq!(next, NaiveDate::from_ymd_opt(2026, 2, 17).unwrap().and_hms_opt(8, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn daily_job_still_considers_today_when_start_time_is_in_the_past() {
        // start_time is years in the past, but its 08:00 clock must still
        // be what a Daily job fires at — and if `now` is earlier than
        // 08:00 today, today's occurrence must not be skipped in favor
        // of tomorrow.
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let job = plain_job(Cycle::Daily, start);
        let calendar = HolidayCalendar::new(std::env::temp_dir());
        let schedule = PeriodSchedule::new(&job, &calendar, 0);
        let now = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let next = schedule.next_after(now).await.unwrap();
        assert_eq!(next, NaiveDate::from_ymd_opt(2026, 3, 5).unwrap().and_hms_opt(8, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn solar_term_yearly_resolves_to_dongzhi() {
        // Scenario 5: cycleDetails [22] is 冬至 (index 21 in SOLAR_TERMS,
        // 1-based 22), now = 2025-06-15, expected next ~= 2025-12-21.
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(7, 30, 0).unwrap();
        let mut job = plain_job(Cycle::Yearly, start);
        job.cycle_details = HashSet::from([22]);
        let calendar = HolidayCalendar::new(std::env::temp_dir());
        let schedule = PeriodSchedule::new(&job, &calendar, 0);
        let now = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let next = schedule.next_after(now).await.unwrap();
        assert_eq!(next, NaiveDate::from_ymd_opt(2025, 12, 21).unwrap().and_hms_opt(7, 30, 0).unwrap());
    }
}
