pub mod admin;
pub mod daemon;
