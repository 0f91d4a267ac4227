//! `hzkube vswitch`: configure the Hetzner vSwitch VLAN interface.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::preflight::{require_binaries, require_root};
use crate::application::services::vswitch::{NETPLAN_FILE, VswitchRequest, configure_vswitch};
use crate::domain::Ipv4Cidr;
use crate::domain::network::validate_vlan_id;
use crate::output::json;

/// Arguments for the vswitch command.
#[derive(Args)]
pub struct VswitchArgs {
    /// Address with prefix on the vSwitch, e.g. 10.0.0.2/24
    pub address: String,
    /// VLAN id (4000-4091); defaults to vswitch.vlan_id
    #[arg(long)]
    pub vlan: Option<u16>,
    /// Uplink interface; defaults to vswitch.parent_interface or the default route
    #[arg(long)]
    pub parent: Option<String>,
}

/// Run the vswitch command.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or configuration fails.
pub async fn run(app: &AppContext, args: VswitchArgs) -> Result<ExitCode> {
    let address = Ipv4Cidr::parse(&args.address)?;
    address.ensure_host_address()?;
    if let Some(vlan) = args.vlan {
        validate_vlan_id(vlan)?;
    }
    let config = app.config_store.load()?;

    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["netplan", "ip"]).await?;

    let result = configure_vswitch(
        &app.runner,
        &app.fs,
        &app.reporter(),
        &VswitchRequest {
            address,
            settings: &config.vswitch,
            vlan_id: args.vlan,
            parent: args.parent.as_deref(),
            netplan_file: Path::new(NETPLAN_FILE),
        },
    )
    .await?;

    if app.is_json() {
        json::print(&serde_json::json!({
            "interface": result.interface,
            "address": result.address.to_string(),
            "netplan_file": result.netplan_file,
        }))?;
    }
    Ok(ExitCode::SUCCESS)
}
