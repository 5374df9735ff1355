//! SSRF guard for every URL the importer is asked to touch.
//!
//! The check is purely syntactic: no DNS lookups, no network I/O. Anything that
//! cannot be parsed is rejected.

use crate::error::ImportError;
use ipnet::IpNet;
use once_cell::sync::Lazy;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "metadata.google.internal"];

static BLOCKED_CIDRS: Lazy<Vec<IpNet>> = Lazy::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "127.0.0.0/8",
        "169.254.0.0/16", // link-local, cloud metadata
        "172.16.0.0/12",
        "192.168.0.0/16",
        "::/128",
        "::1/128",
        "fc00::/7",
        "fe80::/10",
    ]
    .iter()
    .filter_map(|cidr| cidr.parse().ok())
    .collect()
});

/// Why a URL was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafeReason {
    Malformed,
    Scheme(String),
    MissingHost,
    BlockedHost(String),
    BlockedAddress(IpAddr),
}

impl std::fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsafeReason::Malformed => write!(f, "malformed URL"),
            UnsafeReason::Scheme(s) => write!(f, "scheme '{s}' is not allowed"),
            UnsafeReason::MissingHost => write!(f, "URL has no host"),
            UnsafeReason::BlockedHost(h) => write!(f, "host '{h}' is internal"),
            UnsafeReason::BlockedAddress(ip) => write!(f, "address {ip} is private or reserved"),
        }
    }
}

impl From<UnsafeReason> for ImportError {
    fn from(reason: UnsafeReason) -> Self {
        ImportError::UnsafeUrl {
            reason: reason.to_string(),
        }
    }
}

pub fn is_safe(url: &str) -> bool {
    validate(url).is_ok()
}

/// Parses and validates a candidate URL.
pub fn validate(url: &str) -> Result<Url, UnsafeReason> {
    let parsed = Url::parse(url.trim()).map_err(|_| UnsafeReason::Malformed)?;
    check(&parsed)?;
    Ok(parsed)
}

/// Validates an already-parsed URL, e.g. a redirect hop.
pub fn check(url: &Url) -> Result<(), UnsafeReason> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UnsafeReason::Scheme(other.to_string())),
    }

    match url.host() {
        None => Err(UnsafeReason::MissingHost),
        Some(Host::Domain(domain)) => check_domain(domain),
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => check_ipv6(ip),
    }
}

fn check_domain(domain: &str) -> Result<(), UnsafeReason> {
    let host = domain.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Err(UnsafeReason::MissingHost);
    }
    if BLOCKED_HOSTNAMES.contains(&host.as_str())
        || host.ends_with(".localhost")
        || host.ends_with(".internal")
    {
        return Err(UnsafeReason::BlockedHost(host));
    }
    // A domain that still parses as an address gets the address checks
    if let Ok(ip) = host.parse::<IpAddr>() {
        return check_ip(ip);
    }
    Ok(())
}

fn check_ipv6(ip: Ipv6Addr) -> Result<(), UnsafeReason> {
    if let Some(v4) = to_mapped_ipv4(&ip) {
        check_ip(IpAddr::V4(v4)).map_err(|_| UnsafeReason::BlockedAddress(IpAddr::V6(ip)))?;
    }
    check_ip(IpAddr::V6(ip))
}

fn check_ip(ip: IpAddr) -> Result<(), UnsafeReason> {
    if BLOCKED_CIDRS.iter().any(|net| net.contains(&ip)) {
        return Err(UnsafeReason::BlockedAddress(ip));
    }
    Ok(())
}

/// `::ffff:a.b.c.d`
fn to_mapped_ipv4(ip: &Ipv6Addr) -> Option<Ipv4Addr> {
    match ip.segments() {
        [0, 0, 0, 0, 0, 0xffff, hi, lo] => Some(Ipv4Addr::new(
            (hi >> 8) as u8,
            hi as u8,
            (lo >> 8) as u8,
            lo as u8,
        )),
        _ => None,
    }
}
