//! 클러스터 구성 조회
//!
//! 연결 하나에 대해 원격 디스커버리 호출을 수행하고 [`ClusterComposition`]을
//! 돌려줍니다. 메시지 인코딩은 연결 구현이 담당합니다.

use std::collections::BTreeMap;

use super::super::config::RoutingContext;
use super::super::error::{DriverError, DriverResult};
use super::composition::{ClusterComposition, RoutingRecord};

/// 라우팅 프로시저가 없을 때 서버가 돌려주는 에러 코드
pub const PROCEDURE_NOT_FOUND_CODE: &str = "Neo.ClientError.Procedure.ProcedureNotFound";

/// 클러스터 구성 조회기
///
/// 인증/권한 실패는 [`DriverError::Authentication`] 또는
/// [`DriverError::Authorization`]으로 보고해야 하며, 그 외의 실패는
/// 재시도 가능한 실패로 취급됩니다.
pub trait ClusterCompositionProvider<T>: Send + Sync {
    /// 연결을 통해 `database`의 클러스터 구성 조회
    fn get_cluster_composition(&self, connection: &mut T, database: &str) -> DriverResult<ClusterComposition>;
}

/// 라우팅 프로시저 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRequest {
    /// 대상 데이터베이스
    pub database: String,
    /// 라우팅 컨텍스트
    pub context: BTreeMap<String, String>,
}

/// 라우팅 프로시저를 실행할 수 있는 연결
pub trait RoutingProcedureRunner {
    /// 라우팅 프로시저를 실행하고 응답 레코드를 반환
    fn run_routing_procedure(&mut self, request: &RoutingRequest) -> DriverResult<Vec<RoutingRecord>>;
}

/// 라우팅 프로시저 기반 조회기
#[derive(Debug, Clone, Default)]
pub struct RoutingProcedureProvider {
    context: RoutingContext,
}

impl RoutingProcedureProvider {
    /// 새 조회기 생성
    pub fn new(context: RoutingContext) -> Self {
        Self { context }
    }

    /// 라우팅 컨텍스트
    pub fn context(&self) -> &RoutingContext {
        &self.context
    }
}

impl<T: RoutingProcedureRunner> ClusterCompositionProvider<T> for RoutingProcedureProvider {
    fn get_cluster_composition(&self, connection: &mut T, database: &str) -> DriverResult<ClusterComposition> {
        let request = RoutingRequest {
            database: database.to_string(),
            context: self.context.entries().clone(),
        };

        let records = connection.run_routing_procedure(&request).map_err(|e| {
            if matches!(&e, DriverError::Server { code, .. } if code == PROCEDURE_NOT_FOUND_CODE) {
                DriverError::service_unavailable_caused_by(
                    "Failed to run routing procedure on server. \
                     Please make sure that there is a cluster up and running.",
                    e,
                )
            } else {
                e
            }
        })?;

        match records.as_slice() {
            [record] => ClusterComposition::parse(record, database),
            [] => Err(DriverError::protocol("Routing table response has no records")),
            _ => Err(DriverError::protocol(format!(
                "Routing table response has {} records, expected exactly one",
                records.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::address::ServerAddress;
    use crate::driver::error::FailureKind;
    use crate::driver::routing::composition::ServerEntry;

    struct ScriptedConnection {
        response: Option<DriverResult<Vec<RoutingRecord>>>,
        requests: Vec<RoutingRequest>,
    }

    impl ScriptedConnection {
        fn new(response: DriverResult<Vec<RoutingRecord>>) -> Self {
            Self {
                response: Some(response),
                requests: Vec::new(),
            }
        }
    }

    impl RoutingProcedureRunner for ScriptedConnection {
        fn run_routing_procedure(&mut self, request: &RoutingRequest) -> DriverResult<Vec<RoutingRecord>> {
            self.requests.push(request.clone());
            self.response
                .take()
                .unwrap_or_else(|| Err(DriverError::connection("already consumed")))
        }
    }

    fn record() -> RoutingRecord {
        RoutingRecord {
            ttl: 120,
            servers: vec![
                ServerEntry {
                    role: "WRITE".to_string(),
                    addresses: vec!["w:7687".to_string()],
                },
                ServerEntry {
                    role: "ROUTE".to_string(),
                    addresses: vec!["r:7687".to_string()],
                },
            ],
            db: None,
        }
    }

    #[test]
    fn test_single_record_is_parsed() {
        let provider = RoutingProcedureProvider::new(RoutingContext::new().with("region", "eu"));
        let mut connection = ScriptedConnection::new(Ok(vec![record()]));

        let composition = provider.get_cluster_composition(&mut connection, "movies").unwrap();

        assert_eq!(composition.database(), "movies");
        assert_eq!(composition.writers(), &[ServerAddress::new("w", 7687)]);
        assert_eq!(connection.requests.len(), 1);
        assert_eq!(connection.requests[0].database, "movies");
        assert_eq!(
            connection.requests[0].context.get("region").map(String::as_str),
            Some("eu")
        );
    }

    #[test]
    fn test_no_records_is_protocol_error() {
        let provider = RoutingProcedureProvider::default();
        let mut connection = ScriptedConnection::new(Ok(vec![]));

        let result = provider.get_cluster_composition(&mut connection, "zeta4g");
        assert!(matches!(result, Err(DriverError::Protocol(_))));
    }

    #[test]
    fn test_multiple_records_is_protocol_error() {
        let provider = RoutingProcedureProvider::default();
        let mut connection = ScriptedConnection::new(Ok(vec![record(), record()]));

        let result = provider.get_cluster_composition(&mut connection, "zeta4g");
        assert!(matches!(result, Err(DriverError::Protocol(_))));
    }

    #[test]
    fn test_procedure_not_found_is_service_unavailable() {
        let provider = RoutingProcedureProvider::default();
        let mut connection = ScriptedConnection::new(Err(DriverError::server(
            PROCEDURE_NOT_FOUND_CODE,
            "no such procedure",
        )));

        let err = provider
            .get_cluster_composition(&mut connection, "zeta4g")
            .unwrap_err();
        assert!(matches!(err, DriverError::ServiceUnavailable { .. }));
        assert_eq!(err.failure_kind(), FailureKind::Retryable);
    }

    #[test]
    fn test_security_error_passes_through_as_fatal() {
        let provider = RoutingProcedureProvider::default();
        let mut connection = ScriptedConnection::new(Err(DriverError::from_server_code(
            "Neo.ClientError.Security.Unauthorized",
            "bad credentials",
        )));

        let err = provider
            .get_cluster_composition(&mut connection, "zeta4g")
            .unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::Fatal);
    }
}
