pub mod actions;
pub mod config_store;
pub mod event_router;
pub mod poll_cycle;
pub mod remote_config;
pub mod watchdog;
