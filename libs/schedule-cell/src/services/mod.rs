pub mod calendar;
pub mod schedule;
pub mod slots;

pub use schedule::ScheduleService;
pub use slots::SlotService;
