//! Host identity detection.
//!
//! The fleet key is the MAC address of the first non-loopback interface: it
//! survives hostname and DHCP-lease changes, which the orchestrator relies on
//! for host upserts.

use anyhow::Context as _;

use crate::error::AgentError;

#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub mac_address: String,
    pub hostname: String,
    pub ip_address: String,
}

pub fn detect() -> Result<HostIdentity, AgentError> {
    let mac = mac_address::get_mac_address()
        .context("enumerate network interfaces")?
        .ok_or(AgentError::NoMacAddress)?;

    let ip = local_ip_address::local_ip().context("detect local IP address")?;

    let hostname = hostname::get()
        .context("read hostname")?
        .to_string_lossy()
        .into_owned();

    Ok(HostIdentity {
        mac_address: mac.to_string(),
        hostname,
        ip_address: ip.to_string(),
    })
}
