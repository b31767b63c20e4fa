// libs/messaging-cell/src/services/mod.rs

pub mod messages;

pub use messages::MessagingService;
