//! Deterministic flow hash.
//!
//! All packets of one flow must leave through the same member port, so the
//! hash is a pure function of the frame's addressing fields and the trunk's
//! seed. Mixing is order-dependent: source is mixed before destination, and
//! swapping the two MACs is not guaranteed to collide.

use crate::frame::Frame;

/// Mixes a byte buffer into a running 32-bit hash (FNV-1a style
/// multiply-xor, seeded, order-dependent).
pub fn mix32(buf: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    for &b in buf {
        h ^= u32::from(b);
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

/// Hashes a frame's identifying fields into a 32-bit value.
///
/// Source MAC, destination MAC, then the VLAN ID if one is present, then
/// the IPv4 (4+4 byte) or IPv6 (16+16 byte) addresses when the claimed
/// network header actually fits. Truncated frames stop mixing early and
/// return whatever has been accumulated; this never fails.
pub fn flow_hash(frame: &Frame, seed: u32) -> u32 {
    let mut h = seed;

    if let Some(src) = frame.src_mac() {
        h = mix32(src.as_bytes(), h);
    } else {
        return h;
    }
    if let Some(dst) = frame.dst_mac() {
        h = mix32(dst.as_bytes(), h);
    } else {
        return h;
    }

    if let Some(vlan) = frame.vlan_id() {
        h = mix32(&vlan.to_be_bytes(), h);
    }

    if let Some((src, dst)) = frame.ipv4_addrs() {
        h = mix32(src, h);
        h = mix32(dst, h);
    } else if let Some((src, dst)) = frame.ipv6_addrs() {
        h = mix32(src, h);
        h = mix32(dst, h);
    }

    h
}
