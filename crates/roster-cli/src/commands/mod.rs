//! Command handlers

pub mod account;
pub mod config;
pub mod init;
pub mod person;
pub mod shell;
pub mod status;
pub mod sync;
pub mod watch;
