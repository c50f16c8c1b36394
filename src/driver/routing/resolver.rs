//! 주소 해석기
//!
//! 시드 주소를 실제 엔드포인트 목록으로 확장합니다 (DNS 방식).

use std::net::ToSocketAddrs;

use super::super::address::ServerAddress;

/// 주소 해석기
pub trait AddressResolver: Send + Sync {
    /// 주소를 해석
    ///
    /// 결과는 중복 없이 해석된 순서대로 반환됩니다.
    fn resolve(&self, address: &ServerAddress) -> Vec<ServerAddress>;
}

impl<F> AddressResolver for F
where
    F: Fn(&ServerAddress) -> Vec<ServerAddress> + Send + Sync,
{
    fn resolve(&self, address: &ServerAddress) -> Vec<ServerAddress> {
        dedup(self(address))
    }
}

/// 시스템 DNS 해석기
///
/// 호스트 이름을 모든 IP 주소로 확장하고 원래 포트를 유지합니다.
/// 해석에 실패하면 원래 주소 하나만 반환합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

impl AddressResolver for DnsResolver {
    fn resolve(&self, address: &ServerAddress) -> Vec<ServerAddress> {
        match (address.host.as_str(), address.port).to_socket_addrs() {
            Ok(resolved) => {
                let addresses = dedup(
                    resolved
                        .map(|socket| ServerAddress::new(socket.ip().to_string(), address.port))
                        .collect(),
                );
                if addresses.is_empty() {
                    tracing::warn!("DNS returned no addresses for '{}'", address);
                    vec![address.clone()]
                } else {
                    addresses
                }
            }
            Err(e) => {
                tracing::warn!("Failed to resolve address '{}' to IPs: {}", address, e);
                vec![address.clone()]
            }
        }
    }
}

fn dedup(addresses: Vec<ServerAddress>) -> Vec<ServerAddress> {
    let mut unique: Vec<ServerAddress> = Vec::with_capacity(addresses.len());
    for address in addresses {
        if !unique.contains(&address) {
            unique.push(address);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_resolver_ip_literal() {
        let resolved = DnsResolver.resolve(&ServerAddress::new("127.0.0.1", 7690));
        assert_eq!(resolved, vec![ServerAddress::new("127.0.0.1", 7690)]);
    }

    #[test]
    fn test_dns_resolver_keeps_port() {
        let resolved = DnsResolver.resolve(&ServerAddress::new("::1", 9000));
        assert_eq!(resolved, vec![ServerAddress::new("::1", 9000)]);
    }

    #[test]
    fn test_closure_resolver_dedups_in_order() {
        let resolver = |_: &ServerAddress| {
            vec![
                ServerAddress::new("10.0.0.2", 7687),
                ServerAddress::new("10.0.0.1", 7687),
                ServerAddress::new("10.0.0.2", 7687),
            ]
        };

        let resolved = resolver.resolve(&ServerAddress::new("cluster", 7687));
        assert_eq!(
            resolved,
            vec![
                ServerAddress::new("10.0.0.2", 7687),
                ServerAddress::new("10.0.0.1", 7687),
            ]
        );
    }
}
