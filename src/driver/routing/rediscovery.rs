//! 재탐색 (Rediscovery)
//!
//! 라우팅 테이블을 새 클러스터 구성으로 갱신하는 재시도 루프입니다.
//!
//! ```text
//! lookup_cluster_composition
//!   └── (백오프 대기) → sweep → 실패 횟수 증가 → ...
//!         ├── 알려진 라우터를 순환 순서대로 한 번씩
//!         └── 전부 실패하면 시드 주소를 DNS로 재해석해 아직 시도하지 않은 주소
//! ```
//!
//! 인증/권한 실패는 즉시 전체 호출을 중단합니다. 그 밖의 후보별 실패는 해당
//! 주소를 테이블에서 잊고 다음 후보로 넘어갑니다. 라이터가 없는 구성은 거부되지만
//! 그 라우터는 잊지 않습니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::super::address::ServerAddress;
use super::super::config::RoutingSettings;
use super::super::error::{DriverError, DriverResult, FailureKind};
use super::super::pool::{ConnectionPool, Connector};
use super::clock::{CancellationToken, Clock};
use super::composition::ClusterComposition;
use super::provider::ClusterCompositionProvider;
use super::resolver::AddressResolver;
use super::table::RoutingTable;

const NO_ROUTERS_AVAILABLE: &str = "Could not perform discovery. No routing servers available.";
const INTERRUPTED: &str = "Thread was interrupted while performing discovery";

/// 취소를 원인으로 하는 디스커버리 중단 에러
fn interrupted(cause: Option<DriverError>) -> DriverError {
    let cause = match cause {
        Some(cause) if cause.is_cancelled() => cause,
        _ => DriverError::cancelled("Discovery was cancelled"),
    };
    DriverError::service_unavailable_caused_by(INTERRUPTED, cause)
}

/// 재탐색기
pub struct Rediscovery<P> {
    /// 시드 라우터 (DNS 재해석 대상)
    initial_router: ServerAddress,
    settings: RoutingSettings,
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn AddressResolver>,
    provider: P,
}

impl<P> Rediscovery<P> {
    /// 새 재탐색기 생성
    pub fn new(
        initial_router: ServerAddress,
        settings: RoutingSettings,
        clock: Arc<dyn Clock>,
        resolver: Arc<dyn AddressResolver>,
        provider: P,
    ) -> Self {
        Self {
            initial_router,
            settings,
            clock,
            resolver,
            provider,
        }
    }

    /// 시드 라우터
    pub fn initial_router(&self) -> &ServerAddress {
        &self.initial_router
    }

    /// 디스커버리 설정
    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    /// 시계
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 라이터가 있는 클러스터 구성을 얻을 때까지 재시도
    ///
    /// 성공하면 구성을 테이블에 설치하고 반환합니다. 스윕이
    /// `max_routing_failures`번 실패하면 [`DriverError::ServiceUnavailable`]을,
    /// 인증/권한 실패가 나면 그 에러를 그대로 반환합니다. 백오프 대기 중 `cancel`이
    /// 취소되면 취소를 원인으로 하는 `ServiceUnavailable`을 반환합니다.
    ///
    /// 호출 스레드를 블로킹합니다.
    pub fn lookup_cluster_composition<C>(
        &self,
        connections: &Arc<ConnectionPool<C>>,
        table: &RoutingTable,
        cancel: &CancellationToken,
    ) -> DriverResult<ClusterComposition>
    where
        C: Connector,
        P: ClusterCompositionProvider<C::Connection>,
    {
        let mut failures = 0u32;
        let mut delay = Duration::ZERO;
        let mut start = self.clock.now();

        loop {
            let wait = match start.checked_add(delay) {
                Some(deadline) => deadline.saturating_duration_since(self.clock.now()),
                None => delay,
            };
            self.sleep(wait, cancel)?;
            start = self.clock.now();

            if let Some(composition) = self.lookup_on_known_routers(connections, table, cancel)? {
                table.update(&composition, self.clock.now());
                return Ok(composition);
            }

            failures += 1;
            if cancel.is_cancelled() {
                return Err(interrupted(None));
            }
            if failures >= self.settings.max_routing_failures {
                return Err(DriverError::service_unavailable(NO_ROUTERS_AVAILABLE));
            }

            delay = self.settings.retry_timeout_delay.max(delay.saturating_mul(2));
            tracing::debug!(
                "Discovery sweep {} for database '{}' failed, retrying in {:?}",
                failures,
                table.database(),
                delay
            );
        }
    }

    fn lookup_on_known_routers<C>(
        &self,
        connections: &Arc<ConnectionPool<C>>,
        table: &RoutingTable,
        cancel: &CancellationToken,
    ) -> DriverResult<Option<ClusterComposition>>
    where
        C: Connector,
        P: ClusterCompositionProvider<C::Connection>,
    {
        let size = table.router_size();
        let mut tried = HashSet::with_capacity(size);

        for _ in 0..size {
            let Some(address) = table.next_router() else {
                break;
            };
            if !tried.insert(address.clone()) {
                // 순환이 한 바퀴 돌았음
                break;
            }
            if let Some(composition) = self.lookup_on_router(&address, connections, table, cancel)? {
                return Ok(Some(composition));
            }
        }

        let resolved = self.resolver.resolve(&self.initial_router);
        for address in resolved.iter().filter(|a| !tried.contains(*a)) {
            if let Some(composition) = self.lookup_on_router(address, connections, table, cancel)? {
                return Ok(Some(composition));
            }
        }

        Ok(None)
    }

    fn lookup_on_router<C>(
        &self,
        address: &ServerAddress,
        connections: &Arc<ConnectionPool<C>>,
        table: &RoutingTable,
        cancel: &CancellationToken,
    ) -> DriverResult<Option<ClusterComposition>>
    where
        C: Connector,
        P: ClusterCompositionProvider<C::Connection>,
    {
        if cancel.is_cancelled() {
            return Err(interrupted(None));
        }

        // 연결은 결과를 살펴보기 전에 클로저 끝에서 반환된다
        let result = connections
            .acquire_with_cancel(address, cancel)
            .and_then(|mut connection| {
                let result = self
                    .provider
                    .get_cluster_composition(&mut *connection, table.database());
                if result.is_err() {
                    connection.mark_broken();
                }
                result
            });

        let composition = match result {
            Ok(composition) => composition,
            // 취소로 인한 실패는 라우터 탓이 아니므로 테이블을 건드리지 않음
            Err(e) if cancel.is_cancelled() || e.is_cancelled() => {
                return Err(interrupted(Some(e)));
            }
            Err(e) => match e.failure_kind() {
                FailureKind::Fatal => return Err(e),
                FailureKind::Retryable => {
                    tracing::error!("Failed to connect to routing server '{}': {}", address, e);
                    table.forget(address);
                    return Ok(None);
                }
            },
        };

        tracing::info!("Got cluster composition {}", composition);
        if composition.has_writers() {
            Ok(Some(composition))
        } else {
            tracing::debug!(
                "Cluster composition from '{}' has no writers, trying next router",
                address
            );
            Ok(None)
        }
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> DriverResult<()> {
        if duration.is_zero() {
            return Ok(());
        }
        self.clock
            .sleep(duration, cancel)
            .map_err(|e| DriverError::service_unavailable_caused_by(INTERRUPTED, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    use parking_lot::Mutex;

    use crate::driver::pool::PoolConfig;

    // ------------------------------------------------------------------------
    // 테스트용 협력자
    // ------------------------------------------------------------------------

    struct FakeClock {
        base: Instant,
        elapsed: Mutex<Duration>,
        sleeps: Mutex<Vec<Duration>>,
        interrupt_sleep: AtomicBool,
    }

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                base: Instant::now(),
                elapsed: Mutex::new(Duration::ZERO),
                sleeps: Mutex::new(Vec::new()),
                interrupt_sleep: AtomicBool::new(false),
            })
        }

        fn advance(&self, by: Duration) {
            *self.elapsed.lock() += by;
        }

        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().clone()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.base + *self.elapsed.lock()
        }

        fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> DriverResult<()> {
            if self.interrupt_sleep.load(Ordering::SeqCst) {
                cancel.cancel();
            }
            if cancel.is_cancelled() {
                return Err(DriverError::cancelled("interrupted"));
            }
            self.sleeps.lock().push(duration);
            self.advance(duration);
            Ok(())
        }
    }

    #[derive(Clone)]
    enum Behavior {
        Unreachable,
        RejectsCredentials,
        Responds(ClusterComposition),
        BreaksMidCall,
        ForbidsProcedure,
        /// 호출 도중 토큰을 취소하고 연결 에러로 끝남
        CancelsMidCall(CancellationToken),
    }

    /// 주소별 동작 스크립트와 시도 기록
    #[derive(Default)]
    struct Cluster {
        behaviors: Mutex<HashMap<ServerAddress, Behavior>>,
        attempts: Mutex<Vec<ServerAddress>>,
        routers_seen: Mutex<Vec<Vec<ServerAddress>>>,
        observed_table: Mutex<Option<Arc<RoutingTable>>>,
    }

    impl Cluster {
        fn set(&self, address: &ServerAddress, behavior: Behavior) {
            self.behaviors.lock().insert(address.clone(), behavior);
        }

        fn behavior(&self, address: &ServerAddress) -> Behavior {
            self.behaviors
                .lock()
                .get(address)
                .cloned()
                .unwrap_or(Behavior::Unreachable)
        }

        fn attempts(&self) -> Vec<ServerAddress> {
            self.attempts.lock().clone()
        }
    }

    struct FakeConnector {
        cluster: Arc<Cluster>,
    }

    struct FakeConnection {
        address: ServerAddress,
    }

    impl Connector for FakeConnector {
        type Connection = FakeConnection;

        fn connect(&self, address: &ServerAddress) -> DriverResult<FakeConnection> {
            match self.cluster.behavior(address) {
                Behavior::Unreachable => {
                    self.cluster.attempts.lock().push(address.clone());
                    Err(DriverError::connection(format!("{} refused", address)))
                }
                Behavior::RejectsCredentials => {
                    self.cluster.attempts.lock().push(address.clone());
                    Err(DriverError::authentication("invalid credentials"))
                }
                _ => Ok(FakeConnection {
                    address: address.clone(),
                }),
            }
        }
    }

    struct FakeProvider {
        cluster: Arc<Cluster>,
        clock: Arc<FakeClock>,
        cost: Duration,
    }

    impl ClusterCompositionProvider<FakeConnection> for FakeProvider {
        fn get_cluster_composition(
            &self,
            connection: &mut FakeConnection,
            _database: &str,
        ) -> DriverResult<ClusterComposition> {
            self.cluster.attempts.lock().push(connection.address.clone());
            if let Some(table) = self.cluster.observed_table.lock().as_ref() {
                self.cluster.routers_seen.lock().push(table.routers());
            }
            self.clock.advance(self.cost);

            match self.cluster.behavior(&connection.address) {
                Behavior::Responds(composition) => Ok(composition),
                Behavior::BreaksMidCall => Err(DriverError::protocol("connection reset")),
                Behavior::ForbidsProcedure => Err(DriverError::authorization("not allowed")),
                Behavior::CancelsMidCall(cancel) => {
                    cancel.cancel();
                    Err(DriverError::connection("connection closed"))
                }
                Behavior::Unreachable | Behavior::RejectsCredentials => {
                    Err(DriverError::connection("unexpected"))
                }
            }
        }
    }

    struct Harness {
        cluster: Arc<Cluster>,
        clock: Arc<FakeClock>,
        pool: Arc<ConnectionPool<FakeConnector>>,
        rediscovery: Rediscovery<FakeProvider>,
    }

    fn harness(
        seed: &ServerAddress,
        resolved: Vec<ServerAddress>,
        max_routing_failures: u32,
        attempt_cost: Duration,
    ) -> Harness {
        let cluster = Arc::new(Cluster::default());
        let clock = FakeClock::new();
        let pool = Arc::new(ConnectionPool::new(
            FakeConnector {
                cluster: cluster.clone(),
            },
            PoolConfig::default(),
        ));
        let settings = RoutingSettings::builder()
            .with_max_routing_failures(max_routing_failures)
            .with_retry_timeout_delay(ms(100))
            .build()
            .unwrap();
        let resolver = move |_: &ServerAddress| resolved.clone();
        let rediscovery = Rediscovery::new(
            seed.clone(),
            settings,
            clock.clone(),
            Arc::new(resolver),
            FakeProvider {
                cluster: cluster.clone(),
                clock: clock.clone(),
                cost: attempt_cost,
            },
        );

        Harness {
            cluster,
            clock,
            pool,
            rediscovery,
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn addr(host: &str) -> ServerAddress {
        ServerAddress::new(host, 7687)
    }

    fn addrs(hosts: &[&str]) -> Vec<ServerAddress> {
        hosts.iter().map(|h| addr(h)).collect()
    }

    fn composition(routers: &[&str], readers: &[&str], writers: &[&str]) -> ClusterComposition {
        ClusterComposition::new(
            "zeta4g",
            Duration::from_secs(300),
            addrs(routers),
            addrs(readers),
            addrs(writers),
        )
    }

    // ------------------------------------------------------------------------
    // 테스트
    // ------------------------------------------------------------------------

    #[test]
    fn test_gives_up_after_max_routing_failures() {
        let h = harness(&addr("seed"), addrs(&["r3"]), 3, Duration::ZERO);
        let table = RoutingTable::new("zeta4g", addrs(&["r1", "r2"]));

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, DriverError::ServiceUnavailable { .. }));
        assert!(!err.is_cancelled());
        // 첫 스윕: r1, r2, DNS r3 / 이후 스윕: 라우터가 모두 잊혀 DNS r3만
        assert_eq!(h.cluster.attempts(), addrs(&["r1", "r2", "r3", "r3", "r3"]));
        assert_eq!(h.clock.sleeps(), vec![ms(100), ms(200)]);
        assert_eq!(table.router_size(), 0);
        // 도달 불가 주소는 풀에 빈 항목을 남기지 않음
        assert!(h.pool.addresses().is_empty());
    }

    #[test]
    fn test_authentication_failure_on_connect_aborts_immediately() {
        let h = harness(&addr("seed"), addrs(&["r3"]), 5, Duration::ZERO);
        h.cluster.set(&addr("r1"), Behavior::RejectsCredentials);
        h.cluster
            .set(&addr("r2"), Behavior::Responds(composition(&["r2"], &["r2"], &["r2"])));
        let table = RoutingTable::new("zeta4g", addrs(&["r1", "r2"]));

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, DriverError::Authentication(_)));
        assert_eq!(h.cluster.attempts(), addrs(&["r1"]));
        assert!(h.clock.sleeps().is_empty());
        // 인증 실패한 라우터는 잊지 않음
        assert_eq!(table.router_size(), 2);
    }

    #[test]
    fn test_authorization_failure_mid_call_aborts_and_releases_connection() {
        let h = harness(&addr("seed"), addrs(&["r3"]), 5, Duration::ZERO);
        h.cluster.set(&addr("r1"), Behavior::ForbidsProcedure);
        let table = RoutingTable::new("zeta4g", addrs(&["r1", "r2"]));

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, DriverError::Authorization(_)));
        assert_eq!(h.cluster.attempts(), addrs(&["r1"]));
        assert_eq!(h.pool.metrics().in_use, 0);
        assert_eq!(h.pool.idle_count(&addr("r1")), 0);
    }

    #[test]
    fn test_sweep_visits_each_router_once_and_forgets_failures() {
        let h = harness(&addr("seed"), vec![], 2, Duration::ZERO);
        h.cluster
            .set(&addr("r1"), Behavior::Responds(composition(&["r1"], &["r1"], &[])));
        h.cluster
            .set(&addr("r3"), Behavior::Responds(composition(&["r3"], &["r3"], &[])));
        let table = RoutingTable::new("zeta4g", addrs(&["r1", "r2", "r3"]));

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, DriverError::ServiceUnavailable { .. }));
        assert_eq!(
            h.cluster.attempts(),
            addrs(&["r1", "r2", "r3", "r1", "r3"])
        );
        assert_eq!(table.routers(), addrs(&["r1", "r3"]));
    }

    #[test]
    fn test_writerless_composition_is_never_accepted() {
        let h = harness(&addr("r1"), addrs(&["r1"]), 2, Duration::ZERO);
        h.cluster
            .set(&addr("r1"), Behavior::Responds(composition(&["r1"], &["r1"], &[])));
        let table = RoutingTable::new("zeta4g", addrs(&["r1"]));

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, DriverError::ServiceUnavailable { .. }));
        // DNS 결과 r1은 이미 시도했으므로 스윕마다 한 번
        assert_eq!(h.cluster.attempts(), addrs(&["r1", "r1"]));
        // 라우터 자체는 정상이므로 잊지 않음
        assert_eq!(table.routers(), addrs(&["r1"]));
        assert!(table.readers().is_empty());
        assert!(table.expires_at().is_none());
    }

    #[test]
    fn test_backoff_grows_from_floor() {
        let h = harness(&addr("seed"), vec![], 4, Duration::ZERO);
        let table = RoutingTable::new("zeta4g", addrs(&["r1"]));

        let _ = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new());

        assert_eq!(h.clock.sleeps(), vec![ms(100), ms(200), ms(400)]);
    }

    #[test]
    fn test_backoff_accounts_for_sweep_duration() {
        let h = harness(&addr("r1"), addrs(&["r1"]), 3, ms(30));
        h.cluster
            .set(&addr("r1"), Behavior::Responds(composition(&["r1"], &["r1"], &[])));
        let table = RoutingTable::new("zeta4g", addrs(&["r1"]));

        let _ = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new());

        // 각 스윕이 30ms 걸리므로 다음 스윕은 이전 스윕 시작 + 지연 시점에 시작
        assert_eq!(h.clock.sleeps(), vec![ms(70), ms(170)]);
    }

    #[test]
    fn test_successful_composition_replaces_table() {
        let h = harness(&addr("seed"), vec![], 1, Duration::ZERO);
        h.cluster
            .set(&addr("a"), Behavior::Responds(composition(&["a", "b"], &["a"], &["b"])));
        let table = RoutingTable::new("zeta4g", addrs(&["a"]));
        table.update(
            &composition(&["a", "x"], &["x", "y"], &["x"]),
            h.clock.now(),
        );

        let result = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap();

        assert_eq!(result, composition(&["a", "b"], &["a"], &["b"]));
        assert_eq!(table.routers(), addrs(&["a", "b"]));
        assert_eq!(table.readers(), addrs(&["a"]));
        assert_eq!(table.writers(), addrs(&["b"]));
        assert_eq!(
            table.expires_at(),
            Some(h.clock.now() + Duration::from_secs(300))
        );
        assert_eq!(h.pool.metrics().in_use, 0);
    }

    #[test]
    fn test_dns_fallback_after_failed_and_writerless_routers() {
        let h = harness(&addr("seed"), addrs(&["r3"]), 1, Duration::ZERO);
        let expected = composition(&["r1", "r2", "r3"], &["r3"], &["r2", "r3"]);
        h.cluster
            .set(&addr("r2"), Behavior::Responds(composition(&["r2"], &["r2"], &[])));
        h.cluster.set(&addr("r3"), Behavior::Responds(expected.clone()));
        let table = Arc::new(RoutingTable::new("zeta4g", addrs(&["r1", "r2"])));
        *h.cluster.observed_table.lock() = Some(table.clone());

        let result = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap();

        assert_eq!(result, expected);
        assert_eq!(h.cluster.attempts(), addrs(&["r1", "r2", "r3"]));
        // r3 조회 시점에 r1은 이미 잊힘, r2는 유지
        let seen = h.cluster.routers_seen.lock().clone();
        assert_eq!(seen.last().unwrap(), &addrs(&["r2"]));
        // 새 구성이 r1을 다시 포함
        assert_eq!(table.routers(), addrs(&["r1", "r2", "r3"]));
    }

    #[test]
    fn test_single_router_single_failure_budget() {
        let h = harness(&addr("r1"), addrs(&["r1"]), 1, Duration::ZERO);
        let table = RoutingTable::new("zeta4g", addrs(&["r1"]));

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, DriverError::ServiceUnavailable { .. }));
        assert_eq!(h.cluster.attempts(), addrs(&["r1"]));
        assert!(h.clock.sleeps().is_empty());
    }

    #[test]
    fn test_broken_connection_mid_call_is_forgotten() {
        let h = harness(&addr("seed"), vec![], 1, Duration::ZERO);
        h.cluster.set(&addr("r1"), Behavior::BreaksMidCall);
        h.cluster
            .set(&addr("r2"), Behavior::Responds(composition(&["r2"], &["r2"], &["r2"])));
        let table = Arc::new(RoutingTable::new("zeta4g", addrs(&["r1", "r2"])));
        *h.cluster.observed_table.lock() = Some(table.clone());

        let result = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap();

        assert_eq!(result.writers(), addrs(&["r2"]).as_slice());
        assert_eq!(h.cluster.routers_seen.lock()[1], addrs(&["r2"]));
        // 실패한 연결은 풀로 돌아가지 않음
        assert_eq!(h.pool.idle_count(&addr("r1")), 0);
        assert_eq!(h.pool.idle_count(&addr("r2")), 1);
        assert_eq!(h.pool.metrics().total_closed, 1);
    }

    #[test]
    fn test_dns_fallback_tries_resolved_in_order_skipping_tried() {
        let h = harness(&addr("seed"), addrs(&["r1", "d1", "d2"]), 1, Duration::ZERO);
        h.cluster
            .set(&addr("d2"), Behavior::Responds(composition(&["d2"], &["d2"], &["d2"])));
        let table = RoutingTable::new("zeta4g", addrs(&["r1"]));

        h.rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap();

        assert_eq!(h.cluster.attempts(), addrs(&["r1", "d1", "d2"]));
    }

    #[test]
    fn test_interrupted_backoff_is_terminal_and_observable() {
        let h = harness(&addr("seed"), vec![], 5, Duration::ZERO);
        h.clock.interrupt_sleep.store(true, Ordering::SeqCst);
        let table = RoutingTable::new("zeta4g", addrs(&["r1"]));
        let cancel = CancellationToken::new();

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &cancel)
            .unwrap_err();

        assert!(matches!(err, DriverError::ServiceUnavailable { .. }));
        assert!(err.is_cancelled());
        assert!(cancel.is_cancelled());
        // 첫 스윕만 수행됨
        assert_eq!(h.cluster.attempts(), addrs(&["r1"]));
    }

    #[test]
    fn test_cancelled_token_stops_before_any_attempt() {
        let h = harness(&addr("seed"), addrs(&["r2"]), 5, Duration::ZERO);
        let table = RoutingTable::new("zeta4g", addrs(&["r1"]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &cancel)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(h.cluster.attempts().is_empty());
        assert_eq!(table.router_size(), 1);
    }

    #[test]
    fn test_cancel_while_waiting_for_connection_keeps_table() {
        let mut h = harness(&addr("seed"), addrs(&["seed"]), 3, Duration::ZERO);
        h.pool = Arc::new(ConnectionPool::new(
            FakeConnector {
                cluster: h.cluster.clone(),
            },
            PoolConfig::builder()
                .max_size(1)
                .connection_acquisition_timeout(Duration::from_secs(30))
                .build(),
        ));
        h.cluster.set(
            &addr("seed"),
            Behavior::Responds(composition(&["seed"], &["seed"], &["seed"])),
        );
        let table = RoutingTable::new("zeta4g", addrs(&["seed"]));
        let cancel = CancellationToken::new();

        // 유일한 슬롯을 점유해 디스커버리가 반환을 기다리게 함
        let _held = h.pool.acquire(&addr("seed")).unwrap();

        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(ms(50));
                cancel.cancel();
            })
        };

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &cancel)
            .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, DriverError::ServiceUnavailable { .. }));
        assert!(err.is_cancelled());
        assert_eq!(table.routers(), addrs(&["seed"]));
        assert!(h.cluster.attempts().is_empty());
        assert!(h.clock.sleeps().is_empty());
    }

    #[test]
    fn test_failure_caused_by_cancel_does_not_forget_router() {
        let h = harness(&addr("seed"), vec![], 1, Duration::ZERO);
        let table = RoutingTable::new("zeta4g", addrs(&["r1", "r2"]));
        let cancel = CancellationToken::new();
        h.cluster.set(&addr("r1"), Behavior::CancelsMidCall(cancel.clone()));

        let err = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &cancel)
            .unwrap_err();

        assert!(matches!(err, DriverError::ServiceUnavailable { .. }));
        assert!(err.is_cancelled());
        // 순환으로 순서만 바뀌고 r1은 남아 있음
        assert_eq!(table.routers(), addrs(&["r2", "r1"]));
        assert_eq!(h.cluster.attempts(), addrs(&["r1"]));
    }

    #[test]
    fn test_empty_table_uses_dns_fallback() {
        let h = harness(&addr("seed"), addrs(&["s1"]), 1, Duration::ZERO);
        h.cluster
            .set(&addr("s1"), Behavior::Responds(composition(&["s1"], &["s1"], &["s1"])));
        let table = RoutingTable::new("zeta4g", vec![]);

        let result = h
            .rediscovery
            .lookup_cluster_composition(&h.pool, &table, &CancellationToken::new())
            .unwrap();

        assert_eq!(result.routers(), addrs(&["s1"]).as_slice());
        assert_eq!(table.router_size(), 1);
    }
}
