//! Conversions between wire endpoint fields and the v1 in-memory form.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::ZipkinError;

/// Pack a dotted-quad string into the big-endian signed 32-bit form.
///
/// An empty string and a single-segment name ("localhost") both yield
/// zero; anything else must be four decimal segments in `[0, 255]`.
pub(crate) fn ipv4_from_string(s: &str) -> Result<i32, ZipkinError> {
    if s.is_empty() {
        return Ok(0);
    }
    let segments: Vec<&str> = s.split('.').collect();
    if segments.len() == 1 {
        return Ok(0);
    }
    if segments.len() != 4 {
        return Err(ZipkinError::WrongIpv4);
    }
    let mut packed: u32 = 0;
    for segment in segments {
        let octet: u8 = segment.parse().map_err(|_| ZipkinError::WrongIpv4)?;
        packed = (packed << 8) | u32::from(octet);
    }
    Ok(packed as i32)
}

/// Dotted-quad form of a packed address; `None` when the address is zero.
pub(crate) fn ipv4_to_string(ipv4: i32) -> Option<String> {
    if ipv4 == 0 {
        return None;
    }
    Some(Ipv4Addr::from(ipv4 as u32).to_string())
}

/// Parse an RFC 4291 textual address into its raw 16 bytes.
pub(crate) fn ipv6_from_string(s: &str) -> Result<Vec<u8>, ZipkinError> {
    let addr: Ipv6Addr = s.parse().map_err(|_| ZipkinError::WrongIpv6)?;
    Ok(addr.octets().to_vec())
}

/// Textual form of a raw 16-byte address; `None` when absent.
pub(crate) fn ipv6_to_string(bytes: &[u8]) -> Option<String> {
    let octets: [u8; 16] = bytes.try_into().ok()?;
    Some(Ipv6Addr::from(octets).to_string())
}

/// Narrow an unsigned wire port into the signed 16-bit stored form.
/// Values in `[32768, 65535]` land as `port - 65536`.
pub(crate) fn port_from_wire(port: i64) -> i16 {
    port as u16 as i16
}

/// Widen a stored port back to its unsigned wire value.
pub(crate) fn port_to_wire(port: i16) -> u16 {
    port as u16
}
