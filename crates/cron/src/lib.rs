//! Scheduler: lunar/solar calendar math, the holiday lookup cache, and
//! the cron run loop that drives scheduled script jobs.

pub mod duration;
pub mod engine;
pub mod holiday;
pub mod lunar;
pub mod schedule;
pub mod solarterm;

pub use duration::{parse_repeat_window, RepeatWindow as RepeatWindowSpec};
pub use engine::{CronEngine, CronHandler};
pub use holiday::HolidayCalendar;
pub use lunar::{solar_to_lunar, LunarDate};
pub use schedule::{Cycle, CronJob, EndCondition, PeriodSchedule, RepeatWindow};
