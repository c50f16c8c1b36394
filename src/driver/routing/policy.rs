//! 라우팅 정책
//!
//! 서버 선택 전략을 정의합니다.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use super::super::address::ServerAddress;

/// 라우팅 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// 라운드 로빈 (기본값)
    #[default]
    RoundRobin,
    /// 최소 연결
    LeastConnections,
    /// 랜덤
    Random,
}

/// 서버 선택기
#[derive(Debug)]
pub struct ServerSelector {
    /// 라우팅 정책
    policy: RoutingPolicy,
    /// 라운드 로빈 인덱스
    round_robin_index: AtomicUsize,
}

impl ServerSelector {
    /// 새 선택기 생성
    pub fn new(policy: RoutingPolicy) -> Self {
        Self {
            policy,
            round_robin_index: AtomicUsize::new(0),
        }
    }

    /// 기본 선택기 (라운드 로빈)
    pub fn round_robin() -> Self {
        Self::new(RoutingPolicy::RoundRobin)
    }

    /// 최소 연결 선택기
    pub fn least_connections() -> Self {
        Self::new(RoutingPolicy::LeastConnections)
    }

    /// 랜덤 선택기
    pub fn random() -> Self {
        Self::new(RoutingPolicy::Random)
    }

    /// 서버 목록에서 하나 선택
    ///
    /// `load`는 서버별 사용 중 연결 수이며 `LeastConnections`에서만 사용됩니다.
    /// 동률이면 목록에서 먼저 나온 서버가 선택됩니다.
    pub fn select<'a, F>(&self, servers: &'a [ServerAddress], load: F) -> Option<&'a ServerAddress>
    where
        F: Fn(&ServerAddress) -> usize,
    {
        if servers.is_empty() {
            return None;
        }

        match self.policy {
            RoutingPolicy::RoundRobin => {
                let index = self.round_robin_index.fetch_add(1, Ordering::Relaxed);
                Some(&servers[index % servers.len()])
            }
            RoutingPolicy::Random => {
                let index = rand::thread_rng().gen_range(0..servers.len());
                Some(&servers[index])
            }
            RoutingPolicy::LeastConnections => servers.iter().min_by_key(|s| load(*s)),
        }
    }

    /// 인덱스 리셋
    pub fn reset(&self) {
        self.round_robin_index.store(0, Ordering::Relaxed);
    }

    /// 현재 정책 조회
    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }
}

impl Default for ServerSelector {
    fn default() -> Self {
        Self::round_robin()
    }
}
