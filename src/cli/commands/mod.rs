pub mod collect_logs;
pub mod config;
pub mod init;
pub mod monitor;
pub mod reset;
pub mod run;
pub mod status;
