pub mod admin;
pub mod manager;
pub mod notifications;
pub mod persistence;
pub mod remote;
