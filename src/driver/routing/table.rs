//! 라우팅 테이블
//!
//! 클러스터의 서버 역할별 목록을 관리합니다.
//!
//! 테이블은 드라이버 수명 동안 공유되며, 모든 상태가 하나의 락 아래 있어
//! [`RoutingTable::update`]로 교체될 때 읽는 쪽은 이전 테이블 전체 또는
//! 새 테이블 전체만 보게 됩니다.

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;
use std::time::Instant;

use parking_lot::RwLock;

use super::super::address::ServerAddress;
use super::super::error::DriverError;
use super::composition::ClusterComposition;

/// 서버 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRole {
    /// 라우팅 테이블 제공자
    Route,
    /// 쓰기 트랜잭션 처리 (리더)
    Write,
    /// 읽기 트랜잭션 처리 (팔로워)
    Read,
}

impl ServerRole {
    /// 역할을 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Route => "ROUTE",
            Self::Write => "WRITE",
            Self::Read => "READ",
        }
    }
}

impl FromStr for ServerRole {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ROUTE" => Ok(Self::Route),
            "WRITE" => Ok(Self::Write),
            "READ" => Ok(Self::Read),
            _ => Err(DriverError::protocol(format!("Unknown server role '{}'", s))),
        }
    }
}

#[derive(Debug, Clone)]
struct TableState {
    /// 라우터 순환 큐 (앞에서 꺼내 뒤로 보냄)
    routers: VecDeque<ServerAddress>,
    readers: Vec<ServerAddress>,
    writers: Vec<ServerAddress>,
    /// 만료 시각 (부트스트랩 테이블은 None)
    expires_at: Option<Instant>,
}

/// 라우팅 테이블의 일관된 스냅샷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTableSnapshot {
    /// 데이터베이스 이름
    pub database: String,
    /// 라우터 목록 (현재 순환 순서)
    pub routers: Vec<ServerAddress>,
    /// 리더 목록
    pub readers: Vec<ServerAddress>,
    /// 라이터 목록
    pub writers: Vec<ServerAddress>,
    /// 만료 시각
    pub expires_at: Option<Instant>,
}

/// 라우팅 테이블
#[derive(Debug)]
pub struct RoutingTable {
    database: String,
    state: RwLock<TableState>,
}

impl RoutingTable {
    /// 초기 라우터로 테이블 생성
    ///
    /// 리더/라이터는 비어 있고 만료 시각이 없으므로, 첫 디스커버리 전까지는
    /// 라우터 목록만 의미가 있습니다.
    pub fn new(database: impl Into<String>, initial_routers: Vec<ServerAddress>) -> Self {
        let mut routers = VecDeque::with_capacity(initial_routers.len());
        for router in initial_routers {
            if !routers.contains(&router) {
                routers.push_back(router);
            }
        }

        Self {
            database: database.into(),
            state: RwLock::new(TableState {
                routers,
                readers: Vec::new(),
                writers: Vec::new(),
                expires_at: None,
            }),
        }
    }

    /// 데이터베이스 이름
    pub fn database(&self) -> &str {
        &self.database
    }

    /// 순환 순서상 다음 라우터
    ///
    /// 꺼낸 라우터는 큐의 뒤로 이동하므로 `router_size()`번 호출하면 각 라우터를
    /// 정확히 한 번씩 방문합니다. 도중에 잊힌 주소는 아직 방문하지 않은 주소의
    /// 순서에 영향을 주지 않습니다. 라우터가 없으면 `None`.
    pub fn next_router(&self) -> Option<ServerAddress> {
        let mut state = self.state.write();
        let router = state.routers.pop_front()?;
        state.routers.push_back(router.clone());
        Some(router)
    }

    /// 알려진 라우터 수
    pub fn router_size(&self) -> usize {
        self.state.read().routers.len()
    }

    /// 모든 역할에서 주소 제거 (없는 주소는 무시)
    pub fn forget(&self, address: &ServerAddress) {
        let mut state = self.state.write();
        state.routers.retain(|a| a != address);
        state.readers.retain(|a| a != address);
        state.writers.retain(|a| a != address);
    }

    /// 라이터 목록에서만 주소 제거
    pub fn forget_writer(&self, address: &ServerAddress) {
        self.state.write().writers.retain(|a| a != address);
    }

    /// 새 클러스터 구성으로 테이블 전체 교체
    ///
    /// 병합하지 않습니다. 더 이상 테이블에 없는 서버 목록을 반환합니다.
    pub fn update(&self, composition: &ClusterComposition, now: Instant) -> HashSet<ServerAddress> {
        let next = TableState {
            routers: composition.routers().iter().cloned().collect(),
            readers: composition.readers().to_vec(),
            writers: composition.writers().to_vec(),
            expires_at: Some(composition.expires_at(now)),
        };
        let retained = composition.servers();

        let previous = std::mem::replace(&mut *self.state.write(), next);
        servers_of(&previous)
            .into_iter()
            .filter(|a| !retained.contains(a))
            .collect()
    }

    /// 라우터 목록 (현재 순환 순서)
    pub fn routers(&self) -> Vec<ServerAddress> {
        self.state.read().routers.iter().cloned().collect()
    }

    /// 리더 목록
    pub fn readers(&self) -> Vec<ServerAddress> {
        self.state.read().readers.clone()
    }

    /// 라이터 목록
    pub fn writers(&self) -> Vec<ServerAddress> {
        self.state.read().writers.clone()
    }

    /// 모든 역할의 서버 합집합
    pub fn servers(&self) -> HashSet<ServerAddress> {
        servers_of(&self.state.read())
    }

    /// 만료 시각
    pub fn expires_at(&self) -> Option<Instant> {
        self.state.read().expires_at
    }

    /// 일관된 스냅샷
    pub fn snapshot(&self) -> RoutingTableSnapshot {
        let state = self.state.read();
        RoutingTableSnapshot {
            database: self.database.clone(),
            routers: state.routers.iter().cloned().collect(),
            readers: state.readers.clone(),
            writers: state.writers.clone(),
            expires_at: state.expires_at,
        }
    }
}

fn servers_of(state: &TableState) -> HashSet<ServerAddress> {
    state
        .routers
        .iter()
        .chain(&state.readers)
        .chain(&state.writers)
        .cloned()
        .collect()
}
