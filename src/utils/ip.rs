//! IP 地址处理工具
//!
//! 为限流中间件和点击记录提供客户端标识，支持：
//! - 可信代理配置（trusted_proxies）
//! - CIDR 匹配
//! - 私有 IP 自动检测

use std::net::{IpAddr, SocketAddr};

use actix_web::dev::ConnectionInfo;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 无法识别客户端时使用的共享标识
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 允许携带 `X-Forwarded-For` 的代理列表（单 IP 或 CIDR）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies(pub Vec<String>);

impl TrustedProxies {
    pub fn new(proxies: Vec<String>) -> Self {
        Self(proxies)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            // fc00::/7 (ULA), fe80::/10 (link-local), ::1
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// 检查 IP 是否在可信代理列表中
pub fn is_trusted_proxy(ip: &str, trusted_proxies: &[String]) -> bool {
    let Some(ip_addr) = parse_ip(ip) else {
        return false;
    };

    trusted_proxies.iter().any(|proxy| {
        if proxy.contains('/') {
            ip_in_cidr(&ip_addr, proxy)
        } else {
            proxy
                .trim()
                .parse::<IpAddr>()
                .is_ok_and(|proxy_addr| proxy_addr == ip_addr)
        }
    })
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.trim().split_once('/') else {
        return false;
    };
    let Ok(prefix_len) = prefix_len.parse::<u8>() else {
        return false;
    };
    let Ok(network_addr) = network.parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            (u32::from_be_bytes(ip.octets()) & mask) == (u32::from_be_bytes(net.octets()) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            (u128::from_be_bytes(ip.octets()) & mask) == (u128::from_be_bytes(net.octets()) & mask)
        }
        _ => false,
    }
}

/// 从请求头提取转发的 IP：`X-Forwarded-For` 第一跳，其次 `X-Real-IP`
pub fn extract_forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(normalize_addr)
        .filter(|ip| !ip.is_empty())
}

/// 提取真实客户端 IP
///
/// 策略（按优先级）：
/// 1. 无对端地址 → 使用转发头，否则 [`UNKNOWN_CLIENT`]
/// 2. 显式配置 trusted_proxies → 仅当对端匹配时使用转发头
/// 3. 未配置且对端为私有 IP/localhost → 视为反向代理，使用转发头
/// 4. 默认 → 使用对端 IP，忽略可伪造的转发头
pub fn extract_client_ip(
    info: &ConnectionInfo,
    headers: &HeaderMap,
    trusted_proxies: &[String],
) -> String {
    let Some(peer) = info.peer_addr() else {
        return extract_forwarded_ip(headers).unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    };
    let peer_ip = normalize_addr(peer);

    if !trusted_proxies.is_empty() {
        if is_trusted_proxy(&peer_ip, trusted_proxies) {
            let real_ip = extract_forwarded_ip(headers).unwrap_or_else(|| peer_ip.clone());
            debug!("Trusted proxy (explicit): {} -> {}", peer_ip, real_ip);
            return real_ip;
        }
        debug!(
            "Connection from {}, not in trusted_proxies, using peer IP",
            peer_ip
        );
        return peer_ip;
    }

    if parse_ip(&peer_ip).is_some_and(|ip| is_private_or_local(&ip))
        && let Some(real_ip) = extract_forwarded_ip(headers)
    {
        debug!(
            "Auto-detect proxy (private IP {}): using forwarded IP {}",
            peer_ip, real_ip
        );
        return real_ip;
    }

    peer_ip
}

/// `1.2.3.4:5678` -> `1.2.3.4`，`[::1]:80` -> `::1`，无法解析时原样返回
pub fn normalize_addr(raw: &str) -> String {
    let raw = raw.trim();
    match parse_ip(raw) {
        Some(ip) => ip.to_string(),
        None => raw.to_string(),
    }
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    if let Ok(socket_addr) = raw.parse::<SocketAddr>() {
        Some(socket_addr.ip())
    } else {
        raw.parse::<IpAddr>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::HttpRequest;
    use actix_web::test::TestRequest;

    fn client_ip(req: &HttpRequest, trusted: &[String]) -> String {
        extract_client_ip(&req.connection_info(), req.headers(), trusted)
    }

    #[test]
    fn test_normalize_addr() {
        assert_eq!(normalize_addr("10.0.0.1:8080"), "10.0.0.1");
        assert_eq!(normalize_addr("[::1]:443"), "::1");
        assert_eq!(normalize_addr("192.168.1.9"), "192.168.1.9");
        assert_eq!(normalize_addr(" host-name "), "host-name");
    }

    #[test]
    fn test_is_private_or_local() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"172.16.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(&"198.51.100.9".parse().unwrap()));
        assert!(!is_private_or_local(
            &"2001:4860:4860::8888".parse().unwrap()
        ));
    }

    #[test]
    fn test_ip_in_cidr() {
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        assert!(ip_in_cidr(&ip, "192.168.1.0/24"));
        assert!(ip_in_cidr(&ip, "0.0.0.0/0"));
        assert!(!ip_in_cidr(&ip, "192.168.2.0/24"));
        assert!(!ip_in_cidr(&ip, "192.168.1.0/33"));
        assert!(!ip_in_cidr(&ip, "::/0"));

        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(ip_in_cidr(&ip, "2001:db8::/32"));
        assert!(!ip_in_cidr(&ip, "2001:db9::/32"));
    }

    #[test]
    fn test_is_trusted_proxy() {
        let proxies = vec!["127.0.0.1".to_string(), "192.168.1.0/24".to_string()];
        assert!(is_trusted_proxy("127.0.0.1", &proxies));
        assert!(is_trusted_proxy("127.0.0.1:8080", &proxies));
        assert!(is_trusted_proxy("192.168.1.50", &proxies));
        assert!(!is_trusted_proxy("8.8.8.8", &proxies));
        assert!(!is_trusted_proxy("not-an-ip", &proxies));
    }

    #[test]
    fn test_private_peer_forwarded_for_is_honoured() {
        let req = TestRequest::default()
            .peer_addr("127.0.0.1:5555".parse().unwrap())
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .to_http_request();
        assert_eq!(client_ip(&req, &[]), "203.0.113.7");
    }

    #[test]
    fn test_public_peer_forwarded_for_is_ignored() {
        let req = TestRequest::default()
            .peer_addr("198.51.100.9:4000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "10.9.9.1"))
            .to_http_request();
        assert_eq!(client_ip(&req, &[]), "198.51.100.9");
    }

    #[test]
    fn test_explicit_trusted_proxies() {
        let trusted = vec!["198.51.100.0/24".to_string()];

        let via_proxy = TestRequest::default()
            .peer_addr("198.51.100.9:4000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_http_request();
        assert_eq!(client_ip(&via_proxy, &trusted), "203.0.113.7");

        // 显式列表存在时，私有地址不再自动信任
        let private_peer = TestRequest::default()
            .peer_addr("10.0.0.1:4000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_http_request();
        assert_eq!(client_ip(&private_peer, &trusted), "10.0.0.1");
    }

    #[test]
    fn test_real_ip_header_fallback() {
        let req = TestRequest::default()
            .peer_addr("10.0.0.1:4000".parse().unwrap())
            .insert_header(("X-Real-IP", "203.0.113.8"))
            .to_http_request();
        assert_eq!(client_ip(&req, &[]), "203.0.113.8");
    }

    #[test]
    fn test_extract_falls_back_to_peer() {
        let req = TestRequest::default()
            .peer_addr("198.51.100.2:4000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req, &[]), "198.51.100.2");
    }
}
