use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::{Error, Result};

/// The kind of local address to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// 10/8, 172.16/12 and 192.168/16.
    Private,
    /// 127/8.
    Loopback,
}

impl AddressClass {
    /// Returns the IPv4 form of `ip` if it belongs to this class.
    ///
    /// IPv4-mapped IPv6 addresses are treated as their IPv4 form, every other
    /// IPv6 address is rejected.
    pub fn matches(self, ip: IpAddr) -> Option<Ipv4Addr> {
        let IpAddr::V4(v4) = ip.to_canonical() else {
            return None;
        };

        let ok = match self {
            Self::Private => v4.is_private(),
            Self::Loopback => v4.is_loopback(),
        };
        ok.then_some(v4)
    }
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => f.write_str("private"),
            Self::Loopback => f.write_str("loopback"),
        }
    }
}

/// Picks the first address of `class` in enumeration order.
pub fn select_from<I>(addrs: I, class: AddressClass) -> Result<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs
        .into_iter()
        .find_map(|ip| class.matches(ip))
        .ok_or(Error::NoAddress(class))
}

/// Scans the host interfaces once and returns the first address of `class`.
///
/// The order is whatever the platform reports, so with several candidates the
/// pick is stable per host but not sorted.
pub fn select_address(class: AddressClass) -> Result<Ipv4Addr> {
    let interfaces = if_addrs::get_if_addrs().map_err(Error::Interfaces)?;
    let ip = select_from(interfaces.iter().map(|iface| iface.ip()), class)?;
    tracing::debug!(%ip, %class, "selected local address");
    Ok(ip)
}

pub fn private_ipv4() -> Result<Ipv4Addr> {
    select_address(AddressClass::Private)
}

pub fn loopback_ipv4() -> Result<Ipv4Addr> {
    select_address(AddressClass::Loopback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn first_private_address_wins() {
        let addrs = vec![
            v4(127, 0, 0, 1),
            v4(8, 8, 8, 8),
            v4(192, 168, 1, 20),
            v4(10, 0, 0, 5),
        ];
        let ip = select_from(addrs, AddressClass::Private).unwrap();
        assert_eq!(ip, Ipv4Addr::new(192, 168, 1, 20));
    }

    #[test]
    fn ipv6_is_never_selected() {
        // fd00::/8 is private in IPv6 terms but has no IPv4 form.
        let addrs = vec![
            IpAddr::V6("fd00::1".parse().unwrap()),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            v4(172, 16, 4, 2),
        ];
        assert_eq!(
            select_from(addrs.clone(), AddressClass::Private).unwrap(),
            Ipv4Addr::new(172, 16, 4, 2)
        );
        assert!(matches!(
            select_from(addrs, AddressClass::Loopback),
            Err(Error::NoAddress(AddressClass::Loopback))
        ));
    }

    #[test]
    fn mapped_ipv6_counts_as_ipv4() {
        let mapped = IpAddr::V6(Ipv4Addr::new(10, 1, 2, 3).to_ipv6_mapped());
        let ip = select_from([mapped], AddressClass::Private).unwrap();
        assert_eq!(ip, Ipv4Addr::new(10, 1, 2, 3));
    }

    #[test]
    fn no_match_is_an_error() {
        let addrs = vec![v4(8, 8, 8, 8), v4(172, 32, 0, 1), v4(127, 0, 0, 1)];
        let err = select_from(addrs, AddressClass::Private).unwrap_err();
        assert!(matches!(err, Error::NoAddress(AddressClass::Private)));
        assert_eq!(err.to_string(), "unable to find a private ipv4 address");

        assert!(select_from(Vec::new(), AddressClass::Loopback).is_err());
    }

    #[test]
    fn loopback_range() {
        let ip = select_from([v4(10, 0, 0, 1), v4(127, 3, 0, 1)], AddressClass::Loopback).unwrap();
        assert_eq!(ip, Ipv4Addr::new(127, 3, 0, 1));
    }
}
