//! IPv4 address parsing and subnet arithmetic for the vSwitch network.
//!
//! Pure functions only, no I/O.

use std::fmt;
use std::net::Ipv4Addr;

use crate::domain::error::NetworkError;

/// Lowest VLAN id Hetzner accepts for a vSwitch.
pub const VLAN_ID_MIN: u16 = 4000;
/// Highest VLAN id Hetzner accepts for a vSwitch.
pub const VLAN_ID_MAX: u16 = 4091;

/// Parse a dotted-quad IPv4 address, validating every octet.
///
/// Unlike `Ipv4Addr::from_str`, leading zeros are accepted and read as
/// decimal, and errors name the offending octet.
///
/// # Errors
///
/// Returns an error if the input does not have exactly four numeric octets
/// in `0..=255`.
pub fn parse_ipv4(input: &str) -> Result<Ipv4Addr, NetworkError> {
    let parts: Vec<&str> = input.split('.').collect();
    if parts.len() != 4 {
        return Err(NetworkError::OctetCount {
            input: input.to_string(),
            parts: parts.len(),
        });
    }
    let mut octets = [0u8; 4];
    for (idx, part) in parts.iter().enumerate() {
        let position = idx + 1;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NetworkError::OctetNotNumeric {
                input: input.to_string(),
                position,
                octet: (*part).to_string(),
            });
        }
        let value: u32 = part.parse().map_err(|_| NetworkError::OctetNotNumeric {
            input: input.to_string(),
            position,
            octet: (*part).to_string(),
        })?;
        octets[idx] = u8::try_from(value).map_err(|_| NetworkError::OctetOutOfRange {
            input: input.to_string(),
            position,
            value,
        })?;
    }
    Ok(Ipv4Addr::from(octets))
}

/// Convert an address to its 32-bit big-endian integer form.
#[must_use]
pub fn ip_to_u32(ip: Ipv4Addr) -> u32 {
    u32::from(ip)
}

/// Netmask for a prefix length. `prefix_mask(0)` is `0`.
#[must_use]
pub fn prefix_mask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - u32::from(p)),
    }
}

/// An IPv4 address with a prefix length, e.g. `10.0.0.2/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    /// Address as written (host bits preserved).
    pub address: Ipv4Addr,
    /// Prefix length, `0..=32`.
    pub prefix: u8,
}

impl Ipv4Cidr {
    /// Parse `a.b.c.d/p`. The prefix is required.
    ///
    /// # Errors
    ///
    /// Returns an error if the address or the prefix is malformed.
    pub fn parse(input: &str) -> Result<Self, NetworkError> {
        let (addr, prefix) = input
            .split_once('/')
            .ok_or_else(|| NetworkError::MissingPrefix(input.to_string()))?;
        let address = parse_ipv4(addr)?;
        let prefix_ok = !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit());
        let prefix = prefix
            .parse::<u8>()
            .ok()
            .filter(|p| prefix_ok && *p <= 32)
            .ok_or_else(|| NetworkError::InvalidPrefix {
                input: input.to_string(),
                prefix: prefix.to_string(),
            })?;
        Ok(Self { address, prefix })
    }

    /// Netmask of this prefix.
    #[must_use]
    pub fn mask(&self) -> u32 {
        prefix_mask(self.prefix)
    }

    /// Network address (host bits cleared).
    #[must_use]
    pub fn network_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(ip_to_u32(self.address) & self.mask())
    }

    /// Broadcast address (host bits set).
    #[must_use]
    pub fn broadcast_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(ip_to_u32(self.address) | !self.mask())
    }

    /// The subnet this address belongs to, e.g. `10.0.0.0/24`.
    #[must_use]
    pub fn network(&self) -> Self {
        Self {
            address: self.network_address(),
            prefix: self.prefix,
        }
    }

    /// Subnet-membership check: `(ip & mask) == (net & mask)`.
    #[must_use]
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = self.mask();
        (ip_to_u32(ip) & mask) == (ip_to_u32(self.address) & mask)
    }

    /// Reject network and broadcast addresses as host addresses.
    ///
    /// `/31` and `/32` have no reserved addresses and always pass.
    ///
    /// # Errors
    ///
    /// Returns an error naming which reserved address was given.
    pub fn ensure_host_address(&self) -> Result<(), NetworkError> {
        if self.prefix >= 31 {
            return Ok(());
        }
        let kind = if self.address == self.network_address() {
            "network"
        } else if self.address == self.broadcast_address() {
            "broadcast"
        } else {
            return Ok(());
        };
        Err(NetworkError::NotAHostAddress {
            address: self.address.to_string(),
            kind,
            network: self.network().to_string(),
        })
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

/// Whether two subnets share any address.
#[must_use]
pub fn cidrs_overlap(a: &Ipv4Cidr, b: &Ipv4Cidr) -> bool {
    let mask = prefix_mask(a.prefix.min(b.prefix));
    (ip_to_u32(a.address) & mask) == (ip_to_u32(b.address) & mask)
}

/// Require `ip` to lie inside `subnet`.
///
/// # Errors
///
/// Returns [`NetworkError::OutsideSubnet`] otherwise.
pub fn ensure_in_subnet(ip: Ipv4Addr, subnet: &Ipv4Cidr) -> Result<(), NetworkError> {
    if subnet.contains(ip) {
        Ok(())
    } else {
        Err(NetworkError::OutsideSubnet {
            address: ip.to_string(),
            subnet: subnet.network().to_string(),
        })
    }
}

/// Require the pod network to be disjoint from the vSwitch subnet.
///
/// # Errors
///
/// Returns [`NetworkError::Overlap`] if the ranges intersect.
pub fn ensure_disjoint(pod: &Ipv4Cidr, vswitch: &Ipv4Cidr) -> Result<(), NetworkError> {
    if cidrs_overlap(pod, vswitch) {
        Err(NetworkError::Overlap {
            pod: pod.network().to_string(),
            vswitch: vswitch.network().to_string(),
        })
    } else {
        Ok(())
    }
}

/// Validate a Hetzner vSwitch VLAN id.
///
/// # Errors
///
/// Returns an error if the id is outside `4000..=4091`.
pub fn validate_vlan_id(id: u16) -> Result<u16, NetworkError> {
    if (VLAN_ID_MIN..=VLAN_ID_MAX).contains(&id) {
        Ok(id)
    } else {
        Err(NetworkError::VlanOutOfRange(id))
    }
}

/// Name of the VLAN sub-interface, e.g. `enp0s31f6.4000`.
#[must_use]
pub fn vlan_interface_name(parent: &str, vlan_id: u16) -> String {
    format!("{parent}.{vlan_id}")
}

/// Extract the uplink device from `ip -o -4 route show to default`.
///
/// # Errors
///
/// Returns [`NetworkError::NoDefaultRoute`] if no line carries a `dev` field.
pub fn parse_default_route_interface(output: &str) -> Result<String, NetworkError> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with("default"))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            fields.find(|f| *f == "dev").and(fields.next())
        })
        .map(ToString::to_string)
        .ok_or(NetworkError::NoDefaultRoute)
}

/// Whether `ip -o -4 addr show dev <iface>` lists the given address.
#[must_use]
pub fn addr_output_has(output: &str, cidr: &Ipv4Cidr) -> bool {
    let needle = cidr.to_string();
    output
        .lines()
        .any(|line| line.split_whitespace().any(|field| field == needle))
}
