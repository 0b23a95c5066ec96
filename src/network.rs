//! Host address discovery and the connectivity pre-check.
//!
//! The server binds to `0.0.0.0` by default, which is useless to print as a
//! target for clients. [`advertised_address`] resolves the hostname and picks
//! the most LAN-like address instead:
//! - RFC 1918: 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16  → Private
//! - RFC 3927: 169.254.0.0/16                              → LinkLocal
//! - 127.0.0.0/8, ::1                                      → Loopback
//! - Everything else                                       → Other

use std::ffi::CStr;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

/// This host's name, or `None` when the libc call fails or yields nothing.
fn local_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: `buf` is writable for `buf.len()` bytes; gethostname writes at most that.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let name = CStr::from_bytes_until_nul(&buf).ok()?.to_str().ok()?;
    (!name.is_empty()).then(|| name.to_owned())
}

/// Coarse classification of a host address, ordered by preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IpClass {
    Private,
    Other,
    LinkLocal,
    Loopback,
}

pub fn classify_ip(addr: &IpAddr) -> IpClass {
    match addr {
        IpAddr::V4(v4) if v4.is_loopback() => IpClass::Loopback,
        IpAddr::V4(v4) if v4.is_link_local() => IpClass::LinkLocal,
        IpAddr::V4(v4) if v4.is_private() => IpClass::Private,
        IpAddr::V6(v6) if v6.is_loopback() => IpClass::Loopback,
        // fe80::/10
        IpAddr::V6(v6) if v6.segments()[0] & 0xffc0 == 0xfe80 => IpClass::LinkLocal,
        _ => IpClass::Other,
    }
}

/// Pick the best address from `candidates` by [`IpClass`], IPv4 before IPv6.
pub fn best_lan_address<I>(candidates: I) -> Option<IpAddr>
where
    I: IntoIterator<Item = IpAddr>,
{
    candidates
        .into_iter()
        .min_by_key(|ip| (classify_ip(ip), ip.is_ipv6()))
}

/// Address a client should dial to reach a listener bound at `bound`.
///
/// Specific bind addresses are returned unchanged. For unspecified ones the
/// hostname is resolved; `127.0.0.1` is the fallback.
pub fn advertised_address(bound: SocketAddr) -> SocketAddr {
    if !bound.ip().is_unspecified() {
        return bound;
    }

    let Some(hostname) = local_hostname() else {
        debug!("hostname unavailable, advertising loopback");
        return SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port());
    };
    let resolved: Vec<IpAddr> = match (hostname.as_str(), 0u16).to_socket_addrs() {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(e) => {
            debug!(%hostname, error = %e, "hostname did not resolve");
            Vec::new()
        }
    };

    let ip = best_lan_address(resolved).unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    SocketAddr::new(ip, bound.port())
}

/// Whether a TCP handshake with `host:port` completes within `timeout`.
///
/// The probe connection is closed immediately; a server started by this tool
/// will count it as a zero-byte session.
pub async fn check_connectivity(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => {
            debug!(%host, %port, "connectivity check succeeded");
            true
        }
        Ok(Err(e)) => {
            debug!(%host, %port, error = %e, "connectivity check failed");
            false
        }
        Err(_) => {
            debug!(%host, %port, timeout_ms = timeout.as_millis() as u64, "connectivity check timed out");
            false
        }
    }
}
