//! 클러스터 구성
//!
//! 한 번의 디스커버리 호출이 만들어내는 불변 토폴로지 스냅샷입니다.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::super::address::ServerAddress;
use super::super::error::{DriverError, DriverResult};
use super::table::ServerRole;

/// TTL 상한 (Instant 덧셈 오버플로 방지)
const MAX_TTL: Duration = Duration::from_secs(u32::MAX as u64);

// ============================================================================
// RoutingRecord - 라우팅 프로시저 응답 레코드
// ============================================================================

/// 라우팅 프로시저 응답 레코드
///
/// ```text
/// { ttl: 300,
///   servers: [ { role: "WRITE", addresses: ["a:7687"] },
///              { role: "READ",  addresses: ["b:7687", "c:7687"] },
///              { role: "ROUTE", addresses: ["a:7687", "b:7687"] } ],
///   db: "zeta4g" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRecord {
    /// 유효 기간 (초)
    pub ttl: i64,
    /// 역할별 서버 목록
    pub servers: Vec<ServerEntry>,
    /// 데이터베이스 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
}

/// 역할별 서버 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// 역할 (READ / WRITE / ROUTE)
    pub role: String,
    /// `host:port` 주소 목록
    pub addresses: Vec<String>,
}

// ============================================================================
// ClusterComposition - 클러스터 구성
// ============================================================================

/// 클러스터 구성
///
/// 생성 후에는 변경되지 않습니다. 새 디스커버리는 항상 새 값을 만듭니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterComposition {
    routers: Vec<ServerAddress>,
    readers: Vec<ServerAddress>,
    writers: Vec<ServerAddress>,
    ttl: Duration,
    database: String,
}

impl ClusterComposition {
    /// 새 구성 생성
    ///
    /// 각 역할의 주소는 처음 나온 순서를 유지하며 중복이 제거됩니다.
    pub fn new(
        database: impl Into<String>,
        ttl: Duration,
        routers: Vec<ServerAddress>,
        readers: Vec<ServerAddress>,
        writers: Vec<ServerAddress>,
    ) -> Self {
        Self {
            routers: unique(routers),
            readers: unique(readers),
            writers: unique(writers),
            ttl: ttl.min(MAX_TTL),
            database: database.into(),
        }
    }

    /// 라우팅 프로시저 레코드에서 파싱
    pub fn parse(record: &RoutingRecord, default_database: &str) -> DriverResult<Self> {
        let mut routers = Vec::new();
        let mut readers = Vec::new();
        let mut writers = Vec::new();

        for entry in &record.servers {
            let role: ServerRole = entry.role.parse().map_err(|_| {
                DriverError::protocol(format!("Unknown server role '{}'", entry.role))
            })?;
            let target = match role {
                ServerRole::Route => &mut routers,
                ServerRole::Read => &mut readers,
                ServerRole::Write => &mut writers,
            };
            for address in &entry.addresses {
                let address = ServerAddress::parse(address).map_err(|e| {
                    DriverError::protocol(format!("Invalid address in routing record: {}", e))
                })?;
                target.push(address);
            }
        }

        let database = record.db.as_deref().unwrap_or(default_database);
        let ttl = Duration::from_secs(record.ttl.max(0) as u64);

        Ok(Self::new(database, ttl, routers, readers, writers))
    }

    /// 라우터 목록
    pub fn routers(&self) -> &[ServerAddress] {
        &self.routers
    }

    /// 리더 목록
    pub fn readers(&self) -> &[ServerAddress] {
        &self.readers
    }

    /// 라이터 목록
    pub fn writers(&self) -> &[ServerAddress] {
        &self.writers
    }

    /// TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 데이터베이스 이름
    pub fn database(&self) -> &str {
        &self.database
    }

    /// 쓰기 가능한 서버가 있는지 확인
    pub fn has_writers(&self) -> bool {
        !self.writers.is_empty()
    }

    /// 모든 역할의 서버 합집합
    pub fn servers(&self) -> HashSet<ServerAddress> {
        self.routers
            .iter()
            .chain(&self.readers)
            .chain(&self.writers)
            .cloned()
            .collect()
    }

    /// `now` 기준 만료 시각
    pub fn expires_at(&self, now: Instant) -> Instant {
        now.checked_add(self.ttl).unwrap_or(now)
    }
}

impl fmt::Display for ClusterComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClusterComposition{{database={}, ttl={}s, routers={}, readers={}, writers={}}}",
            self.database,
            self.ttl.as_secs(),
            join(&self.routers),
            join(&self.readers),
            join(&self.writers),
        )
    }
}

fn unique(addresses: Vec<ServerAddress>) -> Vec<ServerAddress> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .into_iter()
        .filter(|a| seen.insert(a.clone()))
        .collect()
}

fn join(addresses: &[ServerAddress]) -> String {
    let parts: Vec<String> = addresses.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}
