pub mod health;
pub mod metrics;
pub mod reconcile;

pub use health::health_check;
pub use reconcile::{reconcile, reconcile_download};
