//! 라우팅 설정
//!
//! 디스커버리 재시도 정책, 라우팅 컨텍스트, 라우팅 드라이버 설정

use std::collections::BTreeMap;
use std::time::Duration;

use super::address::{is_routing_uri, ServerAddress};
use super::error::{DriverError, DriverResult};
use super::pool::PoolConfig;

// ============================================================================
// RoutingContext - 라우팅 컨텍스트
// ============================================================================

/// 라우팅 컨텍스트
///
/// URI 쿼리 문자열(`zeta4g://host?region=eu`)로 전달되며,
/// 라우팅 프로시저 호출 시 서버로 그대로 전송됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingContext {
    entries: BTreeMap<String, String>,
}

impl RoutingContext {
    /// 빈 컨텍스트
    pub fn new() -> Self {
        Self::default()
    }

    /// URI 쿼리 문자열에서 파싱
    pub fn from_uri(uri: &str) -> DriverResult<Self> {
        let mut context = Self::new();
        let Some((_, query)) = uri.split_once('?') else {
            return Ok(context);
        };

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                DriverError::configuration(format!("Invalid routing context parameter '{}'", pair))
            })?;
            if key.is_empty() || value.is_empty() {
                return Err(DriverError::configuration(format!(
                    "Illegal empty routing context parameter '{}'",
                    pair
                )));
            }
            if context.entries.contains_key(key) {
                return Err(DriverError::configuration(format!(
                    "Duplicated routing context parameter '{}'",
                    key
                )));
            }
            context.entries.insert(key.to_string(), value.to_string());
        }

        Ok(context)
    }

    /// 항목 추가
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// 값 조회
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// 비어있는지 확인
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 전체 항목
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

// ============================================================================
// RoutingSettings - 디스커버리 설정
// ============================================================================

/// 디스커버리 설정
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `max_routing_failures` | 1 | 포기하기 전 허용되는 스윕 실패 횟수 |
/// | `retry_timeout_delay` | 5초 | 스윕 간 백오프 최소값 |
/// | `routing_context` | 비어있음 | 라우팅 프로시저에 전달할 컨텍스트 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingSettings {
    /// 최대 스윕 실패 횟수
    pub max_routing_failures: u32,
    /// 백오프 최소 지연
    pub retry_timeout_delay: Duration,
    /// 라우팅 컨텍스트
    pub routing_context: RoutingContext,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            max_routing_failures: 1,
            retry_timeout_delay: Duration::from_secs(5),
            routing_context: RoutingContext::default(),
        }
    }
}

impl RoutingSettings {
    /// 빌더 패턴으로 설정 생성
    pub fn builder() -> RoutingSettingsBuilder {
        RoutingSettingsBuilder::default()
    }

    /// 설정 검증
    pub fn validate(&self) -> DriverResult<()> {
        if self.max_routing_failures == 0 {
            return Err(DriverError::configuration(
                "max_routing_failures must be at least 1",
            ));
        }
        Ok(())
    }
}

/// 디스커버리 설정 빌더
#[derive(Debug, Clone, Default)]
pub struct RoutingSettingsBuilder {
    settings: RoutingSettings,
}

impl RoutingSettingsBuilder {
    /// 최대 스윕 실패 횟수 설정
    pub fn with_max_routing_failures(mut self, failures: u32) -> Self {
        self.settings.max_routing_failures = failures;
        self
    }

    /// 백오프 최소 지연 설정
    pub fn with_retry_timeout_delay(mut self, delay: Duration) -> Self {
        self.settings.retry_timeout_delay = delay;
        self
    }

    /// 라우팅 컨텍스트 설정
    pub fn with_routing_context(mut self, context: RoutingContext) -> Self {
        self.settings.routing_context = context;
        self
    }

    /// 빌드
    pub fn build(self) -> DriverResult<RoutingSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

// ============================================================================
// RoutingDriverConfig - 라우팅 드라이버 설정
// ============================================================================

/// 라우팅 드라이버 설정
#[derive(Debug, Clone)]
pub struct RoutingDriverConfig {
    /// 시드 라우터 주소 (DNS 재해석 대상)
    pub initial_router: ServerAddress,
    /// 디스커버리 설정
    pub routing: RoutingSettings,
    /// 연결 풀 설정
    pub pool: PoolConfig,
}

impl RoutingDriverConfig {
    /// URI로 설정 생성
    ///
    /// URI 형식: `zeta4g://host:port?key=value`
    pub fn new(uri: &str) -> DriverResult<Self> {
        if !is_routing_uri(uri) {
            return Err(DriverError::configuration(format!(
                "Routing driver requires a zeta4g:// URI, got '{}'",
                uri
            )));
        }

        let initial_router = ServerAddress::from_uri(uri)?;
        let routing = RoutingSettings {
            routing_context: RoutingContext::from_uri(uri)?,
            ..RoutingSettings::default()
        };

        Ok(Self {
            initial_router,
            routing,
            pool: PoolConfig::default(),
        })
    }

    /// 디스커버리 설정 교체
    pub fn with_routing_settings(mut self, settings: RoutingSettings) -> Self {
        self.routing = settings;
        self
    }

    /// 연결 풀 설정 교체
    pub fn with_pool_config(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_settings_default() {
        let settings = RoutingSettings::default();
        assert_eq!(settings.max_routing_failures, 1);
        assert_eq!(settings.retry_timeout_delay, Duration::from_secs(5));
        assert!(settings.routing_context.is_empty());
    }

    #[test]
    fn test_routing_settings_builder() {
        let settings = RoutingSettings::builder()
            .with_max_routing_failures(3)
            .with_retry_timeout_delay(Duration::from_millis(100))
            .build()
            .unwrap();

        assert_eq!(settings.max_routing_failures, 3);
        assert_eq!(settings.retry_timeout_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_routing_settings_rejects_zero_failures() {
        let result = RoutingSettings::builder()
            .with_max_routing_failures(0)
            .build();
        assert!(matches!(result, Err(DriverError::Configuration(_))));
    }

    #[test]
    fn test_routing_context_from_uri() {
        let context = RoutingContext::from_uri("zeta4g://host:7687?region=eu&policy=fast").unwrap();
        assert_eq!(context.get("region"), Some("eu"));
        assert_eq!(context.get("policy"), Some("fast"));
        assert_eq!(context.entries().len(), 2);

        let context = RoutingContext::from_uri("zeta4g://host:7687").unwrap();
        assert!(context.is_empty());
    }

    #[test]
    fn test_routing_context_invalid() {
        assert!(RoutingContext::from_uri("zeta4g://host?region").is_err());
        assert!(RoutingContext::from_uri("zeta4g://host?region=").is_err());
        assert!(RoutingContext::from_uri("zeta4g://host?a=1&a=2").is_err());
    }

    #[test]
    fn test_routing_driver_config() {
        let config = RoutingDriverConfig::new("zeta4g://server1:7688?region=eu").unwrap();
        assert_eq!(config.initial_router, ServerAddress::new("server1", 7688));
        assert_eq!(config.routing.routing_context.get("region"), Some("eu"));
        assert_eq!(config.routing.max_routing_failures, 1);
    }

    #[test]
    fn test_routing_driver_config_requires_routing_scheme() {
        let result = RoutingDriverConfig::new("bolt://localhost:7687");
        assert!(matches!(result, Err(DriverError::Configuration(_))));
    }
}
