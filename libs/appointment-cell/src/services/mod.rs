// libs/appointment-cell/src/services/mod.rs

pub mod booking;
pub mod reconcile;

pub use booking::BookingService;
pub use reconcile::ScheduleReconciler;
