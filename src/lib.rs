//! # Zeta4G Routing
//!
//! Cluster discovery and routing-table maintenance for the
//! [Zeta4G](https://github.com/zeta9044/zeta4g) graph database driver.
//!
//! ## Features
//!
//! - **Rediscovery** - Rotates through known routers, falls back to DNS
//!   re-resolution of the seed address, and retries with exponential backoff
//! - **Routing Tables** - Per-database router, reader and writer sets,
//!   replaced atomically on every successful discovery
//! - **Connection Pooling** - Scoped, per-server pooled connections that are
//!   always returned or discarded
//! - **Load Balancing** - Round-robin, least-connections and random policies
//! - **Cancellation** - Backoff waits can be interrupted when the driver closes
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! zeta4g-routing = "0.1"
//! ```
//!
//! ## Basic Usage
//!
//! The crate does not speak the wire protocol. Plug in a [`Connector`] that
//! opens connections and a [`ClusterCompositionProvider`] that runs the
//! discovery call on one of them:
//!
//! ```rust
//! use zeta4g_routing::{
//!     AccessMode, ClusterComposition, ClusterCompositionProvider, Connector,
//!     DriverResult, RoutingDriver, RoutingDriverConfig, ServerAddress,
//! };
//! use std::time::Duration;
//!
//! struct TcpConnector;
//!
//! impl Connector for TcpConnector {
//!     type Connection = ServerAddress;
//!
//!     fn connect(&self, address: &ServerAddress) -> DriverResult<ServerAddress> {
//!         Ok(address.clone())
//!     }
//! }
//!
//! struct StaticProvider;
//!
//! impl ClusterCompositionProvider<ServerAddress> for StaticProvider {
//!     fn get_cluster_composition(
//!         &self,
//!         connection: &mut ServerAddress,
//!         database: &str,
//!     ) -> DriverResult<ClusterComposition> {
//!         let me = vec![connection.clone()];
//!         Ok(ClusterComposition::new(
//!             database,
//!             Duration::from_secs(300),
//!             me.clone(),
//!             me.clone(),
//!             me,
//!         ))
//!     }
//! }
//!
//! # fn main() -> DriverResult<()> {
//! let config = RoutingDriverConfig::new("zeta4g://127.0.0.1:7687")?;
//! let driver = RoutingDriver::new(config, TcpConnector, StaticProvider)?;
//!
//! driver.refresh("zeta4g")?;
//! let connection = driver.acquire("zeta4g", AccessMode::Write)?;
//! assert_eq!(connection.address().port, 7687);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`DriverResult`]. Discovery distinguishes fatal
//! failures (authentication, authorization) from retryable ones:
//!
//! ```rust
//! use zeta4g_routing::{DriverError, FailureKind};
//!
//! let err = DriverError::authentication("bad credentials");
//! assert_eq!(err.failure_kind(), FailureKind::Fatal);
//!
//! let err = DriverError::connection("refused");
//! assert_eq!(err.failure_kind(), FailureKind::Retryable);
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Addresses, configuration, errors and the connection pool
//! - [`driver::routing`] - Discovery engine, routing tables and the routing driver
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;

// Re-exports for convenience
pub use driver::{
    ConnectionPool, Connector, DriverError, DriverResult, FailureKind, PoolConfig,
    PooledConnection, RoutingContext, RoutingDriverConfig, RoutingSettings, ServerAddress,
};

pub use driver::routing::{
    AccessMode, AddressResolver, CancellationToken, ClusterComposition,
    ClusterCompositionProvider, Clock, Rediscovery, RoutingDriver, RoutingPolicy,
    RoutingProcedureProvider, RoutingTable,
};

/// Config alias for convenience
pub type Config = RoutingDriverConfig;
