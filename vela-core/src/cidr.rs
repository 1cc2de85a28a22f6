//! Cidr - IPv4 address blocks and binary subnetting

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors for address block parsing and subnetting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidrError {
    #[error("Invalid CIDR notation '{0}': expected IP/prefix")]
    InvalidFormat(String),

    #[error("Invalid IPv4 address '{0}'")]
    InvalidAddress(String),

    #[error("Invalid prefix length '{0}': must be 0-32")]
    InvalidPrefix(String),

    #[error("Cannot split {block} into /{new_prefix} blocks")]
    PrefixNotLonger { block: AddressBlock, new_prefix: u8 },
}

/// A contiguous IPv4 range in prefix notation (e.g., 172.255.0.0/16)
///
/// Host bits of the base address are always cleared, so `172.255.100.0/16`
/// and `172.255.0.0/16` are the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressBlock {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl AddressBlock {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, CidrError> {
        if prefix_len > 32 {
            return Err(CidrError::InvalidPrefix(prefix_len.to_string()));
        }
        let network = Ipv4Addr::from(u32::from(address) & mask(prefix_len));
        if network != address {
            log::warn!(
                "address block {}/{} has host bits set, using {}/{}",
                address,
                prefix_len,
                network,
                prefix_len
            );
        }
        Ok(Self {
            network,
            prefix_len,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Last address in the block
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !mask(self.prefix_len))
    }

    /// Consecutive non-overlapping `/new_prefix` blocks, lowest address first
    pub fn subnets(&self, new_prefix: u8) -> Result<Subnets, CidrError> {
        if new_prefix <= self.prefix_len || new_prefix > 32 {
            return Err(CidrError::PrefixNotLonger {
                block: *self,
                new_prefix,
            });
        }
        Ok(Subnets {
            next: u64::from(u32::from(self.network)),
            end: u64::from(u32::from(self.broadcast())) + 1,
            step: 1u64 << (32 - u32::from(new_prefix)),
            prefix_len: new_prefix,
        })
    }

    pub fn contains(&self, other: &AddressBlock) -> bool {
        other.prefix_len >= self.prefix_len
            && u32::from(other.network) & mask(self.prefix_len) == u32::from(self.network)
    }

    pub fn overlaps(&self, other: &AddressBlock) -> bool {
        self.contains(other) || other.contains(self)
    }
}

fn mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    }
}

/// Iterator over the sub-blocks of an [`AddressBlock`]
#[derive(Debug, Clone)]
pub struct Subnets {
    next: u64,
    end: u64,
    step: u64,
    prefix_len: u8,
}

impl Iterator for Subnets {
    type Item = AddressBlock;

    fn next(&mut self) -> Option<AddressBlock> {
        if self.next >= self.end {
            return None;
        }
        let network = Ipv4Addr::from(self.next as u32);
        self.next += self.step;
        Some(AddressBlock {
            network,
            prefix_len: self.prefix_len,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = ((self.end - self.next) / self.step) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Subnets {}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for AddressBlock {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = s
            .split_once('/')
            .ok_or_else(|| CidrError::InvalidFormat(s.to_string()))?;

        // Ipv4Addr parsing accepts exactly four decimal octets
        let address = address
            .parse::<Ipv4Addr>()
            .map_err(|_| CidrError::InvalidAddress(address.to_string()))?;

        let prefix_len = prefix
            .parse::<u8>()
            .map_err(|_| CidrError::InvalidPrefix(prefix.to_string()))?;

        Self::new(address, prefix_len)
    }
}

impl TryFrom<String> for AddressBlock {
    type Error = CidrError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AddressBlock> for String {
    fn from(block: AddressBlock) -> Self {
        block.to_string()
    }
}
