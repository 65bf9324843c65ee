pub mod forwarder;
pub mod metrics;

pub use forwarder::{DownstreamResponse, ForwardError, Forwarder, ReconcileEndpoint};
pub use metrics::{get_metrics, init_metrics};
