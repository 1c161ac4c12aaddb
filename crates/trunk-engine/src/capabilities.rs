//! Hardware capability bitmask.
//!
//! A trunk may only claim a capability when every member port supports it,
//! so the trunk mask is the bitwise AND over all members. With zero members
//! the mask reverts to the trunk's configured private bits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

/// A bitmask of hardware/driver features.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Capabilities(u32);

impl Capabilities {
    /// Full-duplex operation. Round-robin distribution is only safe to
    /// claim trunk-wide when every member is full duplex.
    pub const FULL_DUPLEX: Capabilities = Capabilities(0x0001);
    /// IPv4 checksum offload.
    pub const CSUM_IPV4: Capabilities = Capabilities(0x0002);
    /// IPv6 checksum offload.
    pub const CSUM_IPV6: Capabilities = Capabilities(0x0004);
    /// TCP segmentation offload.
    pub const TSO: Capabilities = Capabilities(0x0008);
    /// Hardware 802.1Q tag insertion/stripping.
    pub const HW_VLAN_TAGGING: Capabilities = Capabilities(0x0010);
    /// Jumbo MTU support.
    pub const JUMBO_MTU: Capabilities = Capabilities(0x0020);

    /// Every defined capability bit.
    pub const ALL: Capabilities = Capabilities(0x003f);

    /// The empty mask.
    pub const fn none() -> Self {
        Capabilities(0)
    }

    /// Builds a mask from raw bits. Undefined bits are preserved.
    pub const fn from_bits(bits: u32) -> Self {
        Capabilities(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `other` is present in `self`.
    pub const fn contains(&self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no bits are set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Looks up a single capability bit by its configuration name.
    pub fn from_name(name: &str) -> Option<Capabilities> {
        match name.to_lowercase().as_str() {
            "full-duplex" => Some(Self::FULL_DUPLEX),
            "csum-ipv4" => Some(Self::CSUM_IPV4),
            "csum-ipv6" => Some(Self::CSUM_IPV6),
            "tso" => Some(Self::TSO),
            "hw-vlan-tagging" => Some(Self::HW_VLAN_TAGGING),
            "jumbo-mtu" => Some(Self::JUMBO_MTU),
            _ => None,
        }
    }
}

impl BitAnd for Capabilities {
    type Output = Capabilities;

    fn bitand(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 & rhs.0)
    }
}

impl BitAndAssign for Capabilities {
    fn bitand_assign(&mut self, rhs: Capabilities) {
        self.0 &= rhs.0;
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Capabilities) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Capabilities, &str); 6] = [
            (Capabilities::FULL_DUPLEX, "full-duplex"),
            (Capabilities::CSUM_IPV4, "csum-ipv4"),
            (Capabilities::CSUM_IPV6, "csum-ipv6"),
            (Capabilities::TSO, "tso"),
            (Capabilities::HW_VLAN_TAGGING, "hw-vlan-tagging"),
            (Capabilities::JUMBO_MTU, "jumbo-mtu"),
        ];

        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}
