//! IPv4 socket addresses.
//!
//! `Address` is the typed form of a `sockaddr_in`. Conversions to and from the
//! raw structure go through the helpers below so that network byte order is
//! applied in exactly one place.

use super::SocketError;
use socket2::SockAddr;
use std::fmt;
use std::mem;
use std::net::Ipv4Addr;
use std::ptr;

/// An IPv4 host and port, both in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    host: [u8; 4],
    port: u16,
}

impl Address {
    pub fn new(host: [u8; 4], port: u16) -> Self {
        Self { host, port }
    }

    /// Parse a dotted-quad host and pair it with `port`.
    pub fn parse(host: &str, port: u16) -> Result<Self, SocketError> {
        Ok(Self::new(parse_ipv4(host)?, port))
    }

    pub fn loopback(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST.octets(), port)
    }

    pub fn host(&self) -> [u8; 4] {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Marshal into the raw OS structure, port and address in network order.
    pub fn to_sockaddr_in(&self) -> libc::sockaddr_in {
        // SAFETY: sockaddr_in is plain old data; all-zero is a valid value.
        let mut raw: libc::sockaddr_in = unsafe { mem::zeroed() };
        raw.sin_family = libc::AF_INET as libc::sa_family_t;
        raw.sin_port = port_to_network_order(self.port);
        raw.sin_addr = libc::in_addr {
            s_addr: host_to_network_order(self.host),
        };
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        ))]
        {
            raw.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
        }
        raw
    }

    /// Destructure a raw OS structure back into host and port.
    pub fn from_sockaddr_in(raw: &libc::sockaddr_in) -> Self {
        Self {
            host: host_from_network_order(raw.sin_addr.s_addr),
            port: port_from_network_order(raw.sin_port),
        }
    }

    /// The `socket2` form handed to bind.
    pub fn to_sock_addr(&self) -> SockAddr {
        let raw = self.to_sockaddr_in();
        // SAFETY: sockaddr_storage is plain old data, and it is large enough
        // and aligned for every sockaddr variant, including sockaddr_in.
        unsafe {
            let mut storage: libc::sockaddr_storage = mem::zeroed();
            ptr::write(
                (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_in>(),
                raw,
            );
            SockAddr::new(
                storage,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        }
    }

    /// Read an address returned by accept or getsockname.
    ///
    /// Fails with `EAFNOSUPPORT` for anything that is not an IPv4 address.
    pub fn from_sock_addr(addr: &SockAddr) -> Result<Self, SocketError> {
        if addr.family() != libc::AF_INET as libc::sa_family_t
            || (addr.len() as usize) < mem::size_of::<libc::sockaddr_in>()
        {
            return Err(SocketError::from_errno(libc::EAFNOSUPPORT));
        }
        // SAFETY: family and length were checked above, so the storage holds a
        // complete sockaddr_in.
        let raw = unsafe { ptr::read_unaligned(addr.as_ptr().cast::<libc::sockaddr_in>()) };
        Ok(Self::from_sockaddr_in(&raw))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", format_ipv4(self.host), self.port)
    }
}

/// Parse a canonical dotted quad such as `127.0.0.1`.
///
/// Shorthand forms (`127.1`), hex or octal octets and leading zeros are
/// rejected, so every accepted string formats back to itself.
pub fn parse_ipv4(s: &str) -> Result<[u8; 4], SocketError> {
    s.parse::<Ipv4Addr>()
        .map(|ip| ip.octets())
        .map_err(|_| SocketError::AddressParse(format!("'{s}'")))
}

pub fn format_ipv4(host: [u8; 4]) -> String {
    Ipv4Addr::from(host).to_string()
}

pub fn port_to_network_order(port: u16) -> u16 {
    port.to_be()
}

pub fn port_from_network_order(raw: u16) -> u16 {
    u16::from_be(raw)
}

/// `s_addr` value whose in-memory bytes are the octets in order.
fn host_to_network_order(host: [u8; 4]) -> u32 {
    u32::from_be_bytes(host).to_be()
}

fn host_from_network_order(raw: u32) -> [u8; 4] {
    u32::from_be(raw).to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(parse_ipv4("127.0.0.1").unwrap(), [127, 0, 0, 1]);
        assert_eq!(parse_ipv4("0.0.0.0").unwrap(), [0, 0, 0, 0]);
        assert_eq!(parse_ipv4("255.255.255.255").unwrap(), [255, 255, 255, 255]);
    }

    #[test]
    fn test_parse_ipv4_rejects_malformed() {
        for bad in [
            "",
            "localhost",
            "256.0.0.1",
            "1.2.3",
            "1.2.3.4.5",
            "127.1",
            "01.2.3.4",
            " 1.2.3.4",
            "1.2.3.-4",
        ] {
            match parse_ipv4(bad) {
                Err(SocketError::AddressParse(msg)) => assert!(msg.contains(bad)),
                other => panic!("{bad:?} parsed as {:?}", other),
            }
        }
    }

    #[test]
    fn test_sockaddr_in_is_network_order() {
        let raw = Address::new([10, 1, 2, 3], 8000).to_sockaddr_in();

        assert_eq!(raw.sin_family, libc::AF_INET as libc::sa_family_t);
        // Memory layout must be big-endian regardless of host order.
        assert_eq!(raw.sin_port.to_ne_bytes(), [0x1f, 0x40]);
        assert_eq!(raw.sin_addr.s_addr.to_ne_bytes(), [10, 1, 2, 3]);
    }

    #[test]
    fn test_sock_addr_round_trip() {
        let addr = Address::new([192, 168, 0, 17], 11211);
        let sock = addr.to_sock_addr();

        assert_eq!(
            sock.as_socket_ipv4().map(|v4| (v4.ip().octets(), v4.port())),
            Some(([192, 168, 0, 17], 11211))
        );
        assert_eq!(Address::from_sock_addr(&sock).unwrap(), addr);
    }

    #[test]
    fn test_from_sock_addr_rejects_ipv6() {
        let v6: SockAddr = "[::1]:80".parse::<std::net::SocketAddr>().unwrap().into();
        assert!(matches!(
            Address::from_sock_addr(&v6),
            Err(SocketError::System(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::loopback(8000).to_string(), "127.0.0.1:8000");
    }

    proptest! {
        #[test]
        fn prop_ipv4_text_round_trip(host in any::<[u8; 4]>()) {
            let text = format!("{}.{}.{}.{}", host[0], host[1], host[2], host[3]);
            let parsed = parse_ipv4(&text).unwrap();
            prop_assert_eq!(parsed, host);
            prop_assert_eq!(format_ipv4(parsed), text);
        }

        #[test]
        fn prop_port_round_trip(port in any::<u16>()) {
            prop_assert_eq!(port_from_network_order(port_to_network_order(port)), port);
        }

        #[test]
        fn prop_sockaddr_in_round_trip(host in any::<[u8; 4]>(), port in any::<u16>()) {
            let addr = Address::new(host, port);
            prop_assert_eq!(Address::from_sockaddr_in(&addr.to_sockaddr_in()), addr);
        }
    }
}
