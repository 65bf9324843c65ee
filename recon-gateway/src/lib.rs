//! recon-gateway: relays ETH/ZZB reconciliation uploads to the downstream
//! reconciliation service and hands its answer back unchanged.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::AppState;
