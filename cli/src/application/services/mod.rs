//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod cluster_init;
pub mod etcd_backup;
pub mod etcd_restore;
pub mod exec;
pub mod firewall;
pub mod join;
pub mod join_command;
pub mod kubeconfig;
pub mod preflight;
pub mod prepare;
pub mod reset;
pub mod status;
pub mod vswitch;
