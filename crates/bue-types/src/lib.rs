pub mod models;
pub mod schedule;

pub use models::{Event, PhotoRef, User, saved_by};
pub use schedule::{EVENT_TIME_FORMAT, ScheduleError, format_time_range, group_by_start_date};
