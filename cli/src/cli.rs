//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Bootstrap and operate kubeadm clusters on Hetzner bare metal over a vSwitch
#[derive(Parser)]
#[command(
    name = "hzkube",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Assume yes for confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Config file [default: /etc/hzkube/config.yaml]
    #[arg(long, global = true, env = "HZKUBE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Configure the vSwitch VLAN interface
    Vswitch(commands::vswitch::VswitchArgs),

    /// Install host prerequisites, containerd and Kubernetes packages
    Prepare,

    /// Allow cluster traffic from the vSwitch in iptables
    Firewall,

    /// Bootstrap the first control plane
    Init(commands::init::InitArgs),

    /// Join this node to a cluster
    Join(commands::join::JoinArgs),

    /// Print the join command for a new node
    JoinCommand(commands::join_command::JoinCommandArgs),

    /// Snapshot the local etcd member
    Backup(commands::backup::BackupArgs),

    /// Restore the local etcd member from a snapshot
    Restore(commands::restore::RestoreArgs),

    /// Show node, Calico and etcd health
    Status,

    /// Undo init/join on this node
    Reset,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Whether JSON output was requested; used by `main` to format errors.
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.json
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            verbose: _,
            config,
            command,
        } = self;
        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes, config },
        });

        match command {
            Command::Vswitch(args) => commands::vswitch::run(&app, args).await,
            Command::Prepare => commands::prepare::run(&app).await,
            Command::Firewall => commands::firewall::run(&app).await,
            Command::Init(args) => commands::init::run(&app, args).await,
            Command::Join(args) => commands::join::run(&app, args).await,
            Command::JoinCommand(args) => commands::join_command::run(&app, args).await,
            Command::Backup(args) => commands::backup::run(&app, args).await,
            Command::Restore(args) => commands::restore::run(&app, args).await,
            Command::Status => commands::status::run(&app).await,
            Command::Reset => commands::reset::run(&app).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
