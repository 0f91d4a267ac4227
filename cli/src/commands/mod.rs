//! Command implementations

pub mod backup;
pub mod config;
pub mod firewall;
pub mod init;
pub mod join;
pub mod join_command;
pub mod prepare;
pub mod reset;
pub mod restore;
pub mod status;
pub mod version;
pub mod vswitch;
