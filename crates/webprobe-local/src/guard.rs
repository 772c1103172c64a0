//! Address safety guard: refuse hosts in private, loopback or link-local space.
//!
//! Only literal names and IP addresses are classified; IPv4-mapped IPv6 literals
//! (`::ffff:a.b.c.d`) are judged by their IPv4 address. Hostnames are not resolved,
//! so a public name that resolves into private space is not caught here.

use std::net::Ipv6Addr;
use webprobe_core::{Error, Result, UrlTarget};

/// True if `hostname` must never be contacted.
pub fn is_forbidden(hostname: &str) -> bool {
    let h = hostname
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();

    if matches!(h.as_str(), "localhost" | "127.0.0.1" | "0.0.0.0" | "::1") {
        return true;
    }
    if h.ends_with(".local") {
        return true;
    }
    if let Ok(ip) = h.parse::<Ipv6Addr>() {
        return is_forbidden_v6(&ip);
    }
    ipv4_octets(&h).is_some_and(is_forbidden_v4)
}

fn is_forbidden_v4(octets: [u8; 4]) -> bool {
    match octets {
        [0, 0, 0, 0] | [10, ..] | [127, ..] | [192, 168, ..] | [169, 254, ..] => true,
        [172, b, ..] => (16..=31).contains(&b),
        _ => false,
    }
}

fn is_forbidden_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_forbidden_v4(v4.octets());
    }
    // fe80::/10 link-local
    ip.is_loopback() || ip.is_unspecified() || (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Dotted-quad decomposition. Anything else (names, IPv6, short forms) yields `None`.
fn ipv4_octets(h: &str) -> Option<[u8; 4]> {
    let mut out = [0u8; 4];
    let mut parts = h.split('.');
    for slot in out.iter_mut() {
        let p = parts.next()?;
        if p.is_empty() || p.len() > 3 || !p.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = p.parse::<u8>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// The forbidden host of `url`, if any. Used for redirect hops.
pub fn forbidden_host(url: &url::Url) -> Option<String> {
    let host = match url.host()? {
        url::Host::Ipv6(ip) => ip.to_string(),
        h => h.to_string(),
    };
    is_forbidden(&host).then_some(host)
}

/// Fail with [`Error::BlockedAddress`] when the target's host is forbidden.
pub fn check_target(target: &UrlTarget) -> Result<()> {
    let host = target.host();
    if is_forbidden(&host) {
        tracing::warn!(host = %host, "blocked request to private address");
        return Err(Error::BlockedAddress(host));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn forbidden_hosts_are_classified() {
        for h in [
            "localhost",
            "127.0.0.1",
            "0.0.0.0",
            "::1",
            "foo.local",
            "10.1.2.3",
            "172.20.5.5",
            "192.168.1.1",
            "169.254.169.254",
            "fe80::1",
            "::",
        ] {
            assert!(is_forbidden(h), "{h} should be forbidden");
        }
    }

    #[test]
    fn public_hosts_pass() {
        for h in [
            "8.8.8.8",
            "example.com",
            "172.15.0.1",
            "172.32.0.1",
            "192.169.0.1",
            "169.255.0.1",
            "2606:4700::1111",
            "::ffff:8.8.8.8",
        ] {
            assert!(!is_forbidden(h), "{h} should be allowed");
        }
    }

    #[test]
    fn case_and_brackets_do_not_bypass() {
        assert!(is_forbidden("LOCALHOST"));
        assert!(is_forbidden("[::1]"));
        assert!(is_forbidden("printer.LOCAL"));
        assert!(is_forbidden("localhost."));
    }

    #[test]
    fn malformed_quads_are_not_ips() {
        assert!(!is_forbidden("10.0.0"));
        assert!(!is_forbidden("10.0.0.0.5"));
        assert!(!is_forbidden("10.0.0.256"));
        assert!(!is_forbidden("10.example.com"));
    }

    #[test]
    fn check_target_reports_blocked_host() {
        let t = UrlTarget::parse("http://192.168.0.10/admin").unwrap();
        let err = check_target(&t).unwrap_err();
        assert_eq!(err.code(), "blocked_address");

        let ok = UrlTarget::parse("https://example.com/").unwrap();
        assert!(check_target(&ok).is_ok());
    }

    #[test]
    fn ipv4_mapped_ipv6_literals_are_judged_as_ipv4() {
        for raw in [
            "http://[::ffff:127.0.0.1]/",
            "http://[::ffff:10.0.0.1]:8080/x",
            "http://[::ffff:192.168.1.1]/",
        ] {
            let t = UrlTarget::parse(raw).unwrap();
            assert_eq!(check_target(&t).unwrap_err().code(), "blocked_address", "{raw}");
            assert!(forbidden_host(t.url()).is_some(), "{raw}");
        }
        let t = UrlTarget::parse("http://[::ffff:8.8.8.8]/").unwrap();
        assert!(check_target(&t).is_ok());
    }

    #[test]
    fn forbidden_host_reads_url_hosts() {
        let u = url::Url::parse("http://[::1]:8080/x").unwrap();
        assert_eq!(forbidden_host(&u).as_deref(), Some("::1"));
        let u = url::Url::parse("https://example.com/").unwrap();
        assert_eq!(forbidden_host(&u), None);
    }

    proptest! {
        #[test]
        fn every_ten_slash_eight_address_is_forbidden(b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            let h = format!("10.{b}.{c}.{d}");
            prop_assert!(is_forbidden(&h));
        }

        #[test]
        fn one_seventy_two_block_matches_second_octet_range(b in any::<u8>(), d in any::<u8>()) {
            let h = format!("172.{b}.0.{d}");
            prop_assert_eq!(is_forbidden(&h), (16..=31).contains(&b));
        }

        #[test]
        fn mapped_form_agrees_with_dotted_quad(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            let quad = format!("{a}.{b}.{c}.{d}");
            let mapped = format!("::ffff:{quad}");
            prop_assert_eq!(is_forbidden(&mapped), is_forbidden(&quad));
        }

        #[test]
        fn never_panics(s in any::<String>()) {
            let _ = is_forbidden(&s);
        }
    }
}
