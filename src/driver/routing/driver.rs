//! 라우팅 드라이버
//!
//! 데이터베이스별 라우팅 테이블을 관리하고, 접근 모드에 맞는 서버로 연결을
//! 분배합니다. 테이블 갱신 시점은 호출자가 결정합니다.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::super::address::ServerAddress;
use super::super::config::RoutingDriverConfig;
use super::super::error::{DriverError, DriverResult};
use super::super::pool::{ConnectionPool, Connector, PoolMetrics, PooledConnection};
use super::clock::{CancellationToken, Clock, SystemClock};
use super::composition::ClusterComposition;
use super::policy::{RoutingPolicy, ServerSelector};
use super::provider::ClusterCompositionProvider;
use super::rediscovery::Rediscovery;
use super::resolver::{AddressResolver, DnsResolver};
use super::table::{RoutingTable, RoutingTableSnapshot};

/// 접근 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// 읽기
    #[default]
    Read,
    /// 쓰기
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "read"),
            AccessMode::Write => write!(f, "write"),
        }
    }
}

/// 데이터베이스별 라우팅 상태
struct DatabaseRouting {
    table: RoutingTable,
    /// 테이블당 디스커버리는 한 번에 하나
    refresh_lock: Mutex<()>,
}

/// 라우팅 드라이버
///
/// `zeta4g://` 시드 주소에서 시작해 데이터베이스별 [`RoutingTable`]을 유지합니다.
///
/// ```ignore
/// let config = RoutingDriverConfig::new("zeta4g://cluster.local:7687?region=eu")?;
/// let provider = RoutingProcedureProvider::new(config.routing.routing_context.clone());
/// let driver = RoutingDriver::new(config, connector, provider)?;
///
/// driver.refresh("zeta4g")?;
/// let connection = driver.acquire("zeta4g", AccessMode::Write)?;
/// ```
pub struct RoutingDriver<C: Connector, P> {
    config: RoutingDriverConfig,
    rediscovery: Rediscovery<P>,
    pool: Arc<ConnectionPool<C>>,
    /// 데이터베이스별 라우팅 테이블
    tables: RwLock<HashMap<String, Arc<DatabaseRouting>>>,
    selector: ServerSelector,
    /// 진행 중인 디스커버리 취소용
    cancel: CancellationToken,
    open: AtomicBool,
    total_refreshes: AtomicU64,
    failed_refreshes: AtomicU64,
}

impl<C, P> RoutingDriver<C, P>
where
    C: Connector,
    P: ClusterCompositionProvider<C::Connection>,
{
    /// 새 라우팅 드라이버 생성 (시스템 시계, DNS 해석기 사용)
    pub fn new(config: RoutingDriverConfig, connector: C, provider: P) -> DriverResult<Self> {
        Self::with_collaborators(
            config,
            connector,
            provider,
            Arc::new(SystemClock),
            Arc::new(DnsResolver),
        )
    }

    /// 시계와 주소 해석기를 지정해 생성
    pub fn with_collaborators(
        config: RoutingDriverConfig,
        connector: C,
        provider: P,
        clock: Arc<dyn Clock>,
        resolver: Arc<dyn AddressResolver>,
    ) -> DriverResult<Self> {
        config.routing.validate()?;

        let rediscovery = Rediscovery::new(
            config.initial_router.clone(),
            config.routing.clone(),
            clock,
            resolver,
            provider,
        );
        let pool = Arc::new(ConnectionPool::new(connector, config.pool.clone()));

        Ok(Self {
            config,
            rediscovery,
            pool,
            tables: RwLock::new(HashMap::new()),
            selector: ServerSelector::default(),
            cancel: CancellationToken::new(),
            open: AtomicBool::new(true),
            total_refreshes: AtomicU64::new(0),
            failed_refreshes: AtomicU64::new(0),
        })
    }

    /// 라우팅 정책 설정
    pub fn with_routing_policy(mut self, policy: RoutingPolicy) -> Self {
        self.selector = ServerSelector::new(policy);
        self
    }

    /// 드라이버 설정
    pub fn config(&self) -> &RoutingDriverConfig {
        &self.config
    }

    /// 연결 풀
    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    /// 라우팅 정책
    pub fn routing_policy(&self) -> RoutingPolicy {
        self.selector.policy()
    }

    /// 라우팅 테이블 스냅샷
    pub fn routing_table(&self, database: &str) -> Option<RoutingTableSnapshot> {
        self.tables.read().get(database).map(|r| r.table.snapshot())
    }

    /// 라우팅 테이블 갱신
    ///
    /// 디스커버리를 실행해 새 구성을 설치하고, 어떤 테이블에도 남지 않은 서버의
    /// 연결을 풀에서 제거합니다. 같은 데이터베이스에 대한 동시 호출은 직렬화됩니다.
    pub fn refresh(&self, database: &str) -> DriverResult<ClusterComposition> {
        self.ensure_open()?;

        let routing = self.database_routing(database);
        let _guard = routing.refresh_lock.lock();
        self.total_refreshes.fetch_add(1, Ordering::Relaxed);

        let before = routing.table.servers();
        let composition = self
            .rediscovery
            .lookup_cluster_composition(&self.pool, &routing.table, &self.cancel)
            .map_err(|e| {
                self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                e
            })?;

        let current = composition.servers();
        for address in before.difference(&current) {
            if !self.is_referenced(address) {
                tracing::debug!("Purging connections to '{}' no longer in any routing table", address);
                self.pool.purge(address);
            }
        }

        tracing::debug!("Routing table for database '{}' refreshed", database);
        Ok(composition)
    }

    /// 라우팅 테이블을 블로킹 스레드 풀에서 갱신
    pub async fn refresh_in_background(
        self: Arc<Self>,
        database: impl Into<String>,
    ) -> DriverResult<ClusterComposition>
    where
        C: 'static,
        P: 'static,
    {
        let database = database.into();
        tokio::task::spawn_blocking(move || self.refresh(&database))
            .await
            .map_err(|e| DriverError::connection(format!("Background refresh failed: {}", e)))?
    }

    /// 접근 모드에 맞는 서버의 연결 획득
    ///
    /// 연결할 수 없는 서버는 테이블에서 잊고 다음 후보를 시도합니다. 후보가
    /// 없으면 [`DriverError::ServiceUnavailable`]을 반환합니다.
    pub fn acquire(&self, database: &str, mode: AccessMode) -> DriverResult<PooledConnection<C>> {
        self.ensure_open()?;

        let routing = self.database_routing(database);
        let mut candidates = match mode {
            AccessMode::Read => routing.table.readers(),
            AccessMode::Write => routing.table.writers(),
        };

        loop {
            let address = self
                .selector
                .select(&candidates, |a| self.pool.in_use_count(a))
                .cloned()
                .ok_or_else(|| {
                    DriverError::service_unavailable(format!(
                        "Failed to obtain connection towards {} server for database '{}'",
                        mode, database
                    ))
                })?;

            match self.pool.acquire(&address) {
                Ok(connection) => return Ok(connection),
                Err(e @ (DriverError::Connection(_)
                | DriverError::Io(_)
                | DriverError::ServiceUnavailable { .. })) => {
                    tracing::error!("Failed to obtain a connection towards address '{}': {}", address, e);
                    routing.table.forget(&address);
                    self.pool.purge(&address);
                    candidates.retain(|a| a != &address);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 서버 연결 실패 알림
    ///
    /// 모든 역할에서 서버를 잊고 해당 서버의 연결을 폐기합니다.
    pub fn on_connection_failure(&self, database: &str, address: &ServerAddress) {
        if let Some(routing) = self.tables.read().get(database) {
            routing.table.forget(address);
        }
        self.pool.purge(address);
    }

    /// 쓰기 실패 알림 (리더 교체 등)
    ///
    /// 라이터 목록에서만 제거합니다.
    pub fn on_write_failure(&self, database: &str, address: &ServerAddress) {
        if let Some(routing) = self.tables.read().get(database) {
            routing.table.forget_writer(address);
        }
    }

    /// 드라이버 종료
    ///
    /// 진행 중인 디스커버리의 백오프 대기를 깨우고 풀을 닫습니다.
    pub fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.pool.close();
        tracing::debug!("Routing driver closed");
    }

    /// 열린 상태 확인
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// 드라이버 메트릭
    pub fn metrics(&self) -> RoutingDriverMetrics {
        RoutingDriverMetrics {
            routing_table_count: self.tables.read().len(),
            total_refreshes: self.total_refreshes.load(Ordering::Relaxed),
            failed_refreshes: self.failed_refreshes.load(Ordering::Relaxed),
            pool: self.pool.metrics(),
        }
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DriverError::session("Driver is closed"))
        }
    }

    fn database_routing(&self, database: &str) -> Arc<DatabaseRouting> {
        if let Some(routing) = self.tables.read().get(database) {
            return routing.clone();
        }

        let mut tables = self.tables.write();
        tables
            .entry(database.to_string())
            .or_insert_with(|| {
                Arc::new(DatabaseRouting {
                    table: RoutingTable::new(database, vec![self.config.initial_router.clone()]),
                    refresh_lock: Mutex::new(()),
                })
            })
            .clone()
    }

    fn is_referenced(&self, address: &ServerAddress) -> bool {
        let tables = self.tables.read();
        let known: HashSet<ServerAddress> = tables
            .values()
            .flat_map(|r| r.table.servers())
            .collect();
        known.contains(address)
    }
}

impl<C: Connector, P> fmt::Debug for RoutingDriver<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingDriver")
            .field("initial_router", &self.config.initial_router)
            .field("open", &self.open.load(Ordering::SeqCst))
            .field("routing_policy", &self.selector.policy())
            .finish()
    }
}

/// 라우팅 드라이버 메트릭
#[derive(Debug, Clone, Default)]
pub struct RoutingDriverMetrics {
    /// 라우팅 테이블 수
    pub routing_table_count: usize,
    /// 총 갱신 시도 횟수
    pub total_refreshes: u64,
    /// 실패한 갱신 횟수
    pub failed_refreshes: u64,
    /// 연결 풀 메트릭
    pub pool: PoolMetrics,
}
