// libs/notification-cell/src/services/mod.rs

pub mod dispatch;
pub mod gateway;

pub use dispatch::CancellationNotifier;
pub use gateway::{PushGatewayClient, WebPushGatewayClient};
