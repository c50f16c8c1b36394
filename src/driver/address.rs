//! 서버 주소
//!
//! 클러스터 멤버의 네트워크 엔드포인트 (host + port)

use std::fmt;

use super::error::{DriverError, DriverResult};

/// 기본 포트
pub const DEFAULT_PORT: u16 = 7687;

const ROUTING_SCHEMES: [&str; 3] = ["zeta4g://", "zeta4g+s://", "zeta4g+ssc://"];

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerAddress {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host[:port]` 형식 파싱
    ///
    /// IPv6 주소는 `[::1]:7687`처럼 대괄호로 감싸야 합니다.
    pub fn parse(s: &str) -> DriverResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DriverError::configuration("Empty server address"));
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| DriverError::configuration(format!("Invalid server address '{}'", s)))?;
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => {
                    let port = tail.strip_prefix(':').ok_or_else(|| {
                        DriverError::configuration(format!("Invalid server address '{}'", s))
                    })?;
                    parse_port(port)?
                }
            };
            return Ok(Self::new(host, port));
        }

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [host] => Ok(Self::new(*host, DEFAULT_PORT)),
            [host, port] if !host.is_empty() => Ok(Self::new(*host, parse_port(port)?)),
            _ => Err(DriverError::configuration(format!(
                "Invalid server address '{}'",
                s
            ))),
        }
    }

    /// URI에서 파싱
    ///
    /// 스킴, 경로, 쿼리 문자열은 무시합니다.
    pub fn from_uri(uri: &str) -> DriverResult<Self> {
        let rest = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
        let authority = rest.split(['/', '?']).next().unwrap_or_default();
        Self::parse(authority)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

fn parse_port(s: &str) -> DriverResult<u16> {
    s.parse()
        .map_err(|_| DriverError::configuration(format!("Invalid port '{}'", s)))
}

/// URI가 라우팅 드라이버용인지 확인
pub fn is_routing_uri(uri: &str) -> bool {
    ROUTING_SCHEMES.iter().any(|scheme| uri.starts_with(scheme))
}
