pub mod dispatch;
pub mod fleet;
pub mod snapshot;
