//! Ethernet frame wrapper with best-effort header accessors.
//!
//! The engine never rejects a malformed frame at parse time: accessors
//! return `None` when the claimed header does not fit and the flow hash
//! simply stops mixing at that point.

use trunk_types::MacAddress;

/// EtherType: IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// EtherType: 802.1Q VLAN tag.
pub const ETHERTYPE_VLAN: u16 = 0x8100;
/// EtherType: IPv6.
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
/// EtherType: 802.3 Slow Protocols (LACP, Marker).
pub const ETHERTYPE_SLOW: u16 = 0x8809;
/// EtherType: 802.1X port authentication (EAPOL). The only traffic allowed
/// to bypass the trunk on a member interface.
pub const ETHERTYPE_PAE: u16 = 0x888e;

/// Slow Protocols subtype: LACPDU.
pub const SLOW_SUBTYPE_LACP: u8 = 0x01;
/// Slow Protocols subtype: Marker PDU.
pub const SLOW_SUBTYPE_MARKER: u8 = 0x02;

const ETHER_HDR_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;

/// One Ethernet frame moving through the trunk.
///
/// Carries the raw bytes, an optional out-of-band VLAN tag (as delivered by
/// hardware VLAN stripping) and, after acceptance, the name of the aggregate
/// the frame is considered to have arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    vlan: Option<u16>,
    ingress: Option<String>,
}

impl Frame {
    /// Wraps raw frame bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Frame {
            data,
            vlan: None,
            ingress: None,
        }
    }

    /// Attaches an out-of-band VLAN tag. It takes precedence over any
    /// inline 802.1Q header.
    pub fn with_vlan(mut self, vlan_id: u16) -> Self {
        self.vlan = Some(vlan_id & 0x0fff);
        self
    }

    /// Raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Frame length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-length frame.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The interface the frame is tagged as having arrived on.
    pub fn ingress(&self) -> Option<&str> {
        self.ingress.as_deref()
    }

    /// Retags the frame as arriving on `name` (the aggregate, once the
    /// receive path accepts it).
    pub fn set_ingress(&mut self, name: &str) {
        self.ingress = Some(name.to_string());
    }

    /// Destination MAC, if the frame is long enough.
    pub fn dst_mac(&self) -> Option<MacAddress> {
        let bytes: [u8; 6] = self.data.get(0..6)?.try_into().ok()?;
        Some(MacAddress::new(bytes))
    }

    /// Source MAC, if the frame is long enough.
    pub fn src_mac(&self) -> Option<MacAddress> {
        let bytes: [u8; 6] = self.data.get(6..12)?.try_into().ok()?;
        Some(MacAddress::new(bytes))
    }

    fn raw_ethertype(&self) -> Option<u16> {
        let b = self.data.get(12..14)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Effective VLAN ID: the out-of-band tag wins, else an inline 802.1Q
    /// header is consulted.
    pub fn vlan_id(&self) -> Option<u16> {
        if self.vlan.is_some() {
            return self.vlan;
        }
        if self.raw_ethertype()? == ETHERTYPE_VLAN {
            let b = self.data.get(14..16)?;
            return Some(u16::from_be_bytes([b[0], b[1]]) & 0x0fff);
        }
        None
    }

    /// EtherType after skipping any inline VLAN header.
    pub fn ethertype(&self) -> Option<u16> {
        let ethertype = self.raw_ethertype()?;
        if ethertype == ETHERTYPE_VLAN {
            let b = self.data.get(16..18)?;
            Some(u16::from_be_bytes([b[0], b[1]]))
        } else {
            Some(ethertype)
        }
    }

    /// Offset of the network-layer payload.
    fn payload_offset(&self) -> Option<usize> {
        match self.raw_ethertype()? {
            ETHERTYPE_VLAN => Some(ETHER_HDR_LEN + VLAN_TAG_LEN),
            _ => Some(ETHER_HDR_LEN),
        }
    }

    /// Payload bytes after the Ethernet (and VLAN) header.
    pub fn payload(&self) -> Option<&[u8]> {
        self.data.get(self.payload_offset()?..)
    }

    /// True for a Slow Protocols (LACP/Marker) control frame.
    pub fn is_slow_protocol(&self) -> bool {
        self.ethertype() == Some(ETHERTYPE_SLOW)
    }

    /// Slow Protocols subtype byte, for control frames.
    pub fn slow_subtype(&self) -> Option<u8> {
        if !self.is_slow_protocol() {
            return None;
        }
        self.payload()?.first().copied()
    }

    /// True for an 802.1X (EAPOL) frame.
    pub fn is_pae(&self) -> bool {
        self.ethertype() == Some(ETHERTYPE_PAE)
    }

    /// IPv4 source and destination address slices, when the header fits.
    pub fn ipv4_addrs(&self) -> Option<(&[u8], &[u8])> {
        if self.ethertype()? != ETHERTYPE_IPV4 {
            return None;
        }
        let p = self.payload()?;
        Some((p.get(12..16)?, p.get(16..20)?))
    }

    /// IPv6 source and destination address slices, when the header fits.
    pub fn ipv6_addrs(&self) -> Option<(&[u8], &[u8])> {
        if self.ethertype()? != ETHERTYPE_IPV6 {
            return None;
        }
        let p = self.payload()?;
        Some((p.get(8..24)?, p.get(24..40)?))
    }
}

/// Builds a minimal Ethernet frame (test and demo helper).
pub fn build_frame(dst: MacAddress, src: MacAddress, ethertype: u16, payload: &[u8]) -> Frame {
    let mut data = Vec::with_capacity(ETHER_HDR_LEN + payload.len());
    data.extend_from_slice(dst.as_bytes());
    data.extend_from_slice(src.as_bytes());
    data.extend_from_slice(&ethertype.to_be_bytes());
    data.extend_from_slice(payload);
    Frame::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0x02, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_basic_accessors() {
        let f = build_frame(mac(1), mac(2), ETHERTYPE_IPV4, &[0u8; 20]);
        assert_eq!(f.dst_mac(), Some(mac(1)));
        assert_eq!(f.src_mac(), Some(mac(2)));
        assert_eq!(f.ethertype(), Some(ETHERTYPE_IPV4));
        assert_eq!(f.vlan_id(), None);
    }

    #[test]
    fn test_inline_vlan() {
        let mut data = Vec::new();
        data.extend_from_slice(mac(1).as_bytes());
        data.extend_from_slice(mac(2).as_bytes());
        data.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        data.extend_from_slice(&0x0064u16.to_be_bytes()); // VLAN 100
        data.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        data.extend_from_slice(&[0u8; 20]);
        let f = Frame::new(data);

        assert_eq!(f.vlan_id(), Some(100));
        assert_eq!(f.ethertype(), Some(ETHERTYPE_IPV4));
        assert!(f.ipv4_addrs().is_some());
    }

    #[test]
    fn test_out_of_band_vlan_wins() {
        let f = build_frame(mac(1), mac(2), ETHERTYPE_IPV4, &[0u8; 20]).with_vlan(42);
        assert_eq!(f.vlan_id(), Some(42));
    }

    #[test]
    fn test_ipv4_addrs() {
        let mut ip = vec![0u8; 20];
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 5]);
        let f = build_frame(mac(1), mac(2), ETHERTYPE_IPV4, &ip);
        let (src, dst) = f.ipv4_addrs().unwrap();
        assert_eq!(src, &[10, 0, 0, 1]);
        assert_eq!(dst, &[10, 0, 0, 5]);
    }

    #[test]
    fn test_truncated_ipv4_is_none() {
        // Claims IPv4 but only carries 8 payload bytes.
        let f = build_frame(mac(1), mac(2), ETHERTYPE_IPV4, &[0u8; 8]);
        assert!(f.ipv4_addrs().is_none());
        assert_eq!(f.ethertype(), Some(ETHERTYPE_IPV4));
    }

    #[test]
    fn test_slow_protocol_subtype() {
        let f = build_frame(
            MacAddress::SLOW_PROTOCOLS,
            mac(2),
            ETHERTYPE_SLOW,
            &[SLOW_SUBTYPE_LACP, 0x01],
        );
        assert!(f.is_slow_protocol());
        assert_eq!(f.slow_subtype(), Some(SLOW_SUBTYPE_LACP));
    }

    #[test]
    fn test_runt_frame() {
        let f = Frame::new(vec![0xff; 4]);
        assert!(f.dst_mac().is_none());
        assert!(f.ethertype().is_none());
        assert!(f.slow_subtype().is_none());
    }
}
