pub mod admin;
pub mod health;
pub mod redeem;

pub use admin::admin_handler;
pub use health::health_handler;
pub use redeem::{redeem_handler, redeem_status_handler};
