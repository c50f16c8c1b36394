//! Driver Module
//!
//! 클러스터 디스커버리와 라우팅
//!
//! # Components
//!
//! - 서버 주소 (ServerAddress)
//! - 디스커버리/풀 설정 (RoutingSettings, RoutingDriverConfig, PoolConfig)
//! - 연결 풀링 (ConnectionPool, PooledConnection)
//! - 라우팅 드라이버 (RoutingDriver, RoutingTable, Rediscovery)
//!
//! # Example
//!
//! ```ignore
//! use zeta4g_routing::driver::{RoutingDriverConfig, RoutingSettings};
//! use zeta4g_routing::driver::routing::{AccessMode, RoutingDriver};
//! use std::time::Duration;
//!
//! let settings = RoutingSettings::builder()
//!     .with_max_routing_failures(3)
//!     .with_retry_timeout_delay(Duration::from_secs(1))
//!     .build()?;
//!
//! let config = RoutingDriverConfig::new("zeta4g://cluster.local:7687")?
//!     .with_routing_settings(settings);
//!
//! let driver = RoutingDriver::new(config, connector, provider)?;
//! driver.refresh("zeta4g")?;
//! let connection = driver.acquire("zeta4g", AccessMode::Read)?;
//! ```

pub mod routing;
mod address;
mod config;
mod error;
mod pool;

// Re-exports
pub use address::{is_routing_uri, ServerAddress, DEFAULT_PORT};
pub use config::{RoutingContext, RoutingDriverConfig, RoutingSettings, RoutingSettingsBuilder};
pub use error::{DriverError, DriverResult, FailureKind};
pub use pool::{ConnectionPool, Connector, PoolConfig, PoolConfigBuilder, PoolMetrics, PooledConnection};
