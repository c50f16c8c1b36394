//! 라우팅 모듈
//!
//! 클러스터 환경에서 자동 라우팅을 지원합니다.
//!
//! # 개요
//!
//! 라우팅 드라이버는 `zeta4g://` 시드 주소에서 시작해 클러스터의 라우터,
//! 리더, 라이터 목록을 발견하고 데이터베이스별 [`RoutingTable`]에 유지합니다.
//!
//! - [`Rediscovery`] - 라우터 순환 + DNS 재해석 + 지수 백오프 재시도
//! - [`RoutingTable`] - 순환 라우터 큐와 역할별 서버 목록
//! - [`RoutingDriver`] - 갱신 직렬화, 풀 정리, 접근 모드별 서버 선택
//!
//! # 예시
//!
//! ```ignore
//! use zeta4g_routing::driver::routing::{AccessMode, RoutingDriver, RoutingProcedureProvider};
//! use zeta4g_routing::driver::RoutingDriverConfig;
//!
//! let config = RoutingDriverConfig::new("zeta4g://server1:7687?region=eu")?;
//! let provider = RoutingProcedureProvider::new(config.routing.routing_context.clone());
//! let driver = RoutingDriver::new(config, connector, provider)?;
//!
//! // 테이블 갱신 (만료 판단은 호출자 몫)
//! driver.refresh("zeta4g")?;
//!
//! // 쓰기 연결 (라이터로 라우팅)
//! let connection = driver.acquire("zeta4g", AccessMode::Write)?;
//! ```

mod clock;
mod composition;
mod driver;
mod policy;
mod provider;
mod rediscovery;
mod resolver;
mod table;

pub use clock::{CancellationToken, Clock, SystemClock};
pub use composition::{ClusterComposition, RoutingRecord, ServerEntry};
pub use driver::{AccessMode, RoutingDriver, RoutingDriverMetrics};
pub use policy::{RoutingPolicy, ServerSelector};
pub use provider::{
    ClusterCompositionProvider, RoutingProcedureProvider, RoutingProcedureRunner, RoutingRequest,
    PROCEDURE_NOT_FOUND_CODE,
};
pub use rediscovery::Rediscovery;
pub use resolver::{AddressResolver, DnsResolver};
pub use table::{RoutingTable, RoutingTableSnapshot, ServerRole};
