//! Outbound address policy.
//!
//! Callback and redirect targets come from API callers, so by default every
//! outbound call made on their behalf is refused when the host resolves to a
//! private or reserved address.

use std::net::IpAddr;

use bastion_core::error::AppError;
use url::Url;

/// Reject `url` if its host is, or resolves to, a private/reserved IP.
///
/// Blocked targets surface as [`AppError::InvalidInput`] so they are
/// answered with a client error instead of being retried.
pub async fn ensure_public(url: &Url) -> Result<(), AppError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidInput(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| AppError::InvalidInput("URL has no host".to_string()))?;
    let bare_host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = bare_host.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(blocked(host, ip));
        }
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((bare_host, port))
        .await
        .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    match addrs.iter().find(|addr| is_private_ip(addr.ip())) {
        Some(addr) => Err(blocked(host, addr.ip())),
        None => Ok(()),
    }
}

fn blocked(host: &str, ip: IpAddr) -> AppError {
    AppError::InvalidInput(format!(
        "Outbound request blocked: {host} resolves to private/reserved IP {ip}"
    ))
}

/// Loopback, RFC 1918, link-local, CGN, documentation and unique-local
/// ranges, including IPv4-mapped IPv6 forms.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                // 100.64.0.0/10
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fe80::/10
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
                // fc00::/7
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}
