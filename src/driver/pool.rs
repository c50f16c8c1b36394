//! Connection Pool
//!
//! 서버 주소별 연결 풀링
//!
//! 연결은 [`PooledConnection`] 가드로 대여되며, 가드가 스코프를 벗어나면
//! 어떤 경로로 빠져나가든 (정상 반환, 조기 반환, 에러 전파) 풀로 돌아가거나 폐기됩니다.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::address::ServerAddress;
use super::error::{DriverError, DriverResult};
use super::routing::CancellationToken;

/// 취소 토큰 확인 주기 (반환 대기 중)
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

// ============================================================================
// Connector - 연결 생성기
// ============================================================================

/// 연결 생성기
///
/// 실제 전송 계층(핸드셰이크, 인증 포함)은 프로토콜 계층이 구현합니다.
/// 인증 실패는 [`DriverError::Authentication`]으로 보고해야 디스커버리가
/// 즉시 중단됩니다.
pub trait Connector: Send + Sync + 'static {
    /// 연결 타입
    type Connection: Send + 'static;

    /// 주어진 주소로 새 연결 생성
    fn connect(&self, address: &ServerAddress) -> DriverResult<Self::Connection>;
}

// ============================================================================
// PoolConfig - 풀 설정
// ============================================================================

/// 연결 풀 설정
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `max_size` | 100 | 서버당 최대 연결 수 |
/// | `max_lifetime` | 1시간 | 연결 최대 수명 |
/// | `idle_timeout` | 5분 | 유휴 타임아웃 |
/// | `connection_acquisition_timeout` | 60초 | 연결 획득 대기 한도 |
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 서버당 최대 연결 수
    pub max_size: usize,
    /// 연결 최대 수명
    pub max_lifetime: Duration,
    /// 유휴 타임아웃
    pub idle_timeout: Duration,
    /// 연결 획득 타임아웃
    pub connection_acquisition_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            max_lifetime: Duration::from_secs(3600),
            idle_timeout: Duration::from_secs(300),
            connection_acquisition_timeout: Duration::from_secs(60),
        }
    }
}

impl PoolConfig {
    /// 빌더 패턴으로 풀 설정 생성
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// 풀 설정 빌더
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// 서버당 최대 연결 수 설정
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// 연결 최대 수명 설정
    pub fn max_lifetime(mut self, duration: Duration) -> Self {
        self.config.max_lifetime = duration;
        self
    }

    /// 유휴 타임아웃 설정
    pub fn idle_timeout(mut self, duration: Duration) -> Self {
        self.config.idle_timeout = duration;
        self
    }

    /// 연결 획득 타임아웃 설정
    pub fn connection_acquisition_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_acquisition_timeout = duration;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    /// 현재 크기 (유휴 + 사용 중)
    pub size: usize,
    /// 유휴 연결 수
    pub idle: usize,
    /// 사용 중인 연결 수
    pub in_use: usize,
    /// 풀이 관리 중인 서버 수
    pub servers: usize,
    /// 총 획득 횟수
    pub total_acquisitions: u64,
    /// 총 생성 횟수
    pub total_created: u64,
    /// 총 닫힌 연결 수
    pub total_closed: u64,
    /// 총 타임아웃 횟수
    pub total_timeouts: u64,
}

// ============================================================================
// 내부 상태
// ============================================================================

struct IdleConnection<T> {
    id: u64,
    connection: T,
    created_at: Instant,
    last_used: Instant,
}

impl<T> IdleConnection<T> {
    fn is_reusable(&self, config: &PoolConfig) -> bool {
        self.created_at.elapsed() <= config.max_lifetime
            && self.last_used.elapsed() <= config.idle_timeout
    }
}

struct ServerPool<T> {
    /// purge 이후 반환되는 연결을 구분하기 위한 세대 번호
    generation: u64,
    idle: VecDeque<IdleConnection<T>>,
    in_use: usize,
}

impl<T> ServerPool<T> {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            idle: VecDeque::new(),
            in_use: 0,
        }
    }
}

struct PoolState<T> {
    servers: HashMap<ServerAddress, ServerPool<T>>,
    open: bool,
}

// ============================================================================
// ConnectionPool - 연결 풀
// ============================================================================

/// 서버 주소별 연결 풀
pub struct ConnectionPool<C: Connector> {
    /// 연결 생성기
    connector: C,
    /// 풀 설정
    config: PoolConfig,
    /// 서버별 유휴/사용 중 상태
    state: Mutex<PoolState<C::Connection>>,
    /// 연결 반환 알림
    released: Condvar,
    /// 다음 연결 ID
    next_id: AtomicU64,
    /// 다음 세대 번호
    next_generation: AtomicU64,
    total_created: AtomicU64,
    total_acquisitions: AtomicU64,
    total_closed: AtomicU64,
    total_timeouts: AtomicU64,
}

impl<C: Connector> ConnectionPool<C> {
    /// 새 연결 풀 생성
    pub fn new(connector: C, config: PoolConfig) -> Self {
        Self {
            connector,
            config,
            state: Mutex::new(PoolState {
                servers: HashMap::new(),
                open: true,
            }),
            released: Condvar::new(),
            next_id: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
            total_created: AtomicU64::new(0),
            total_acquisitions: AtomicU64::new(0),
            total_closed: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
        }
    }

    /// 연결 획득
    ///
    /// 유효한 유휴 연결이 있으면 재사용하고, 없으면 새로 연결합니다.
    /// 서버당 `max_size`에 도달하면 반환을 기다리며, `connection_acquisition_timeout`
    /// 이 지나면 [`DriverError::Timeout`]을 반환합니다.
    pub fn acquire(self: &Arc<Self>, address: &ServerAddress) -> DriverResult<PooledConnection<C>> {
        self.acquire_inner(address, None)
    }

    /// 취소 가능한 연결 획득
    ///
    /// 반환을 기다리는 동안 `cancel`이 취소되면 [`DriverError::Cancelled`]를 반환합니다.
    pub fn acquire_with_cancel(
        self: &Arc<Self>,
        address: &ServerAddress,
        cancel: &CancellationToken,
    ) -> DriverResult<PooledConnection<C>> {
        self.acquire_inner(address, Some(cancel))
    }

    fn acquire_inner(
        self: &Arc<Self>,
        address: &ServerAddress,
        cancel: Option<&CancellationToken>,
    ) -> DriverResult<PooledConnection<C>> {
        // None이면 무한 대기
        let deadline = Instant::now().checked_add(self.config.connection_acquisition_timeout);
        let mut state = self.state.lock();

        let generation = loop {
            if !state.open {
                return Err(DriverError::pool("Pool is closed"));
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(DriverError::cancelled(format!(
                    "Connection acquisition towards {} was cancelled",
                    address
                )));
            }

            let next_generation = &self.next_generation;
            let server = state
                .servers
                .entry(address.clone())
                .or_insert_with(|| ServerPool::new(next_generation.fetch_add(1, Ordering::Relaxed)));

            while let Some(idle) = server.idle.pop_front() {
                if idle.is_reusable(&self.config) {
                    server.in_use += 1;
                    let generation = server.generation;
                    self.total_acquisitions.fetch_add(1, Ordering::Relaxed);
                    return Ok(PooledConnection {
                        id: idle.id,
                        address: address.clone(),
                        generation,
                        created_at: idle.created_at,
                        broken: false,
                        connection: Some(idle.connection),
                        pool: Arc::clone(self),
                    });
                }
                self.total_closed.fetch_add(1, Ordering::Relaxed);
            }

            if server.in_use < self.config.max_size {
                // 연결 생성 동안 슬롯을 선점
                server.in_use += 1;
                break server.generation;
            }

            let now = Instant::now();
            if matches!(deadline, Some(deadline) if now >= deadline) {
                self.total_timeouts.fetch_add(1, Ordering::Relaxed);
                return Err(DriverError::timeout(format!(
                    "Unable to acquire connection to {} within {:?}",
                    address, self.config.connection_acquisition_timeout
                )));
            }

            // 취소 토큰은 풀의 condvar를 깨우지 않으므로 주기적으로 확인
            let wake = match (deadline, cancel) {
                (deadline, Some(_)) => {
                    let poll = now + CANCEL_POLL_INTERVAL;
                    Some(deadline.map_or(poll, |d| d.min(poll)))
                }
                (deadline, None) => deadline,
            };
            match wake {
                Some(wake) => {
                    self.released.wait_until(&mut state, wake);
                }
                None => self.released.wait(&mut state),
            }
        };
        drop(state);

        match self.connector.connect(address) {
            Ok(connection) => {
                self.total_created.fetch_add(1, Ordering::Relaxed);
                self.total_acquisitions.fetch_add(1, Ordering::Relaxed);
                Ok(PooledConnection {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    address: address.clone(),
                    generation,
                    created_at: Instant::now(),
                    broken: false,
                    connection: Some(connection),
                    pool: Arc::clone(self),
                })
            }
            Err(e) => {
                self.release(address, generation, None);
                Err(e)
            }
        }
    }

    /// 연결 반환 (가드의 Drop에서 호출)
    fn release(&self, address: &ServerAddress, generation: u64, entry: Option<IdleConnection<C::Connection>>) {
        let discarded = {
            let mut state = self.state.lock();
            let open = state.open;
            match state.servers.get_mut(address) {
                Some(server) if server.generation == generation => {
                    server.in_use = server.in_use.saturating_sub(1);
                    let discarded = match entry {
                        Some(entry) if open && entry.is_reusable(&self.config) => {
                            server.idle.push_back(entry);
                            None
                        }
                        other => other,
                    };
                    // 연결에 실패한 주소 등 빈 항목은 남기지 않음
                    if server.in_use == 0 && server.idle.is_empty() {
                        state.servers.remove(address);
                    }
                    discarded
                }
                _ => entry,
            }
        };

        if discarded.is_some() {
            self.total_closed.fetch_add(1, Ordering::Relaxed);
        }
        drop(discarded);
        self.released.notify_all();
    }

    /// 특정 서버의 모든 연결 폐기
    ///
    /// 유휴 연결은 즉시 닫히고, 사용 중인 연결은 반환 시점에 닫힙니다.
    pub fn purge(&self, address: &ServerAddress) {
        let removed = self.state.lock().servers.remove(address);
        if let Some(server) = removed {
            tracing::debug!(
                "Purged {} idle connection(s) to {}",
                server.idle.len(),
                address
            );
            self.total_closed
                .fetch_add(server.idle.len() as u64, Ordering::Relaxed);
        }
        self.released.notify_all();
    }

    /// 풀 닫기
    pub fn close(&self) {
        let servers = {
            let mut state = self.state.lock();
            state.open = false;
            std::mem::take(&mut state.servers)
        };
        let closed: usize = servers.values().map(|s| s.idle.len()).sum();
        self.total_closed.fetch_add(closed as u64, Ordering::Relaxed);
        self.released.notify_all();
    }

    /// 열린 상태 확인
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// 풀 설정
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 특정 서버의 사용 중인 연결 수
    pub fn in_use_count(&self, address: &ServerAddress) -> usize {
        self.state
            .lock()
            .servers
            .get(address)
            .map_or(0, |s| s.in_use)
    }

    /// 특정 서버의 유휴 연결 수
    pub fn idle_count(&self, address: &ServerAddress) -> usize {
        self.state
            .lock()
            .servers
            .get(address)
            .map_or(0, |s| s.idle.len())
    }

    /// 풀이 관리 중인 서버 주소
    pub fn addresses(&self) -> Vec<ServerAddress> {
        let mut addresses: Vec<ServerAddress> = self.state.lock().servers.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.state.lock();
        let idle: usize = state.servers.values().map(|s| s.idle.len()).sum();
        let in_use: usize = state.servers.values().map(|s| s.in_use).sum();

        PoolMetrics {
            size: idle + in_use,
            idle,
            in_use,
            servers: state.servers.len(),
            total_acquisitions: self.total_acquisitions.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metrics = self.metrics();
        f.debug_struct("ConnectionPool")
            .field("servers", &metrics.servers)
            .field("idle", &metrics.idle)
            .field("in_use", &metrics.in_use)
            .finish()
    }
}

// ============================================================================
// PooledConnection - 풀링된 연결
// ============================================================================

/// 풀링된 연결 (스코프 가드)
///
/// Drop 시점에 풀로 반환됩니다. [`mark_broken`](Self::mark_broken)으로 표시된
/// 연결, purge된 서버의 연결, 닫힌 풀의 연결은 반환 대신 폐기됩니다.
pub struct PooledConnection<C: Connector> {
    id: u64,
    address: ServerAddress,
    generation: u64,
    created_at: Instant,
    broken: bool,
    // Drop 전까지 항상 Some
    connection: Option<C::Connection>,
    pool: Arc<ConnectionPool<C>>,
}

impl<C: Connector> PooledConnection<C> {
    /// 연결 ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 서버 주소
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// 생성 시간
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// 실패로 표시 (반환 시 폐기)
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// 실패 표시 여부
    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection is present until dropped")
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection is present until dropped")
    }
}

impl<C: Connector> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("broken", &self.broken)
            .field("age", &self.created_at.elapsed())
            .finish()
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let entry = match self.connection.take() {
            Some(connection) if !self.broken => Some(IdleConnection {
                id: self.id,
                connection,
                created_at: self.created_at,
                last_used: Instant::now(),
            }),
            Some(connection) => {
                drop(connection);
                self.pool.total_closed.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        };
        self.pool.release(&self.address, self.generation, entry);
    }
}

// ============================================================================
// Tests
// ============================================================================
