//! Unit tests for hzkube CLI
//!
//! These tests use scripted dependencies and run fast without touching the host.

mod helpers;

mod cluster_init_service;
mod etcd_backup_service;
mod join_service;
mod reset_service;
mod status_service;
mod vswitch_service;
