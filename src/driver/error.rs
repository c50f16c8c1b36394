//! Driver Error Types
//!
//! 드라이버 에러 정의

use std::io;
use thiserror::Error;

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 연결 에러
    #[error("Connection error: {0}")]
    Connection(String),

    /// 인증 에러
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 권한 에러
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// 프로토콜 에러
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 세션 에러
    #[error("Session error: {0}")]
    Session(String),

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 풀 에러
    #[error("Pool error: {0}")]
    Pool(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 서버 에러
    #[error("Server error: {code} - {message}")]
    Server {
        /// 에러 코드
        code: String,
        /// 에러 메시지
        message: String,
    },

    /// 서비스 불가
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// 에러 메시지
        message: String,
        /// 원인
        #[source]
        source: Option<Box<DriverError>>,
    },

    /// 취소됨
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// 라우팅 관점의 실패 분류
///
/// 디스커버리는 후보마다 이 값을 확인합니다. `Fatal`이면 즉시 중단하고,
/// `Retryable`이면 해당 주소를 잊고 다음 후보로 넘어갑니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 재시도해도 소용없는 실패 (인증/권한)
    Fatal,
    /// 다른 후보로 재시도 가능한 실패
    Retryable,
}

impl DriverError {
    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 인증 에러 생성
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// 권한 에러 생성
    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 세션 에러 생성
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 풀 에러 생성
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 서비스 불가 에러 생성
    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: msg.into(),
            source: None,
        }
    }

    /// 원인을 포함한 서비스 불가 에러 생성
    pub fn service_unavailable_caused_by(msg: impl Into<String>, cause: DriverError) -> Self {
        Self::ServiceUnavailable {
            message: msg.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// 취소 에러 생성
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// 서버 에러 생성
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 서버 에러 코드로부터 에러 생성
    ///
    /// 에러 코드는 "Neo.{Category}.{SubCategory}.{ErrorType}" 형식을 따릅니다.
    /// 보안 관련 코드는 인증/권한 에러로 분류됩니다.
    pub fn from_server_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();

        if is_authorization_code(&code) {
            Self::Authorization(message)
        } else if is_authentication_code(&code) {
            Self::Authentication(message)
        } else if code.starts_with("Neo.TransientError") {
            Self::service_unavailable(message)
        } else {
            Self::Server { code, message }
        }
    }

    /// 디스커버리에서의 실패 분류
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Authentication(_) | Self::Authorization(_) => FailureKind::Fatal,
            _ => FailureKind::Retryable,
        }
    }

    /// 재시도 가능 여부
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::Io(_) => true,
            Self::ServiceUnavailable { .. } => !self.is_cancelled(),
            Self::Server { code, .. } => is_retryable_code(code),
            _ => false,
        }
    }

    /// 클라이언트 에러 여부
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::Authorization(_) | Self::Configuration(_)
        )
    }

    /// 취소로 인해 발생한 에러인지 확인 (원인 체인 포함)
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::ServiceUnavailable {
                source: Some(cause),
                ..
            } => cause.is_cancelled(),
            _ => false,
        }
    }
}

/// 재시도 가능한 에러 코드 확인
fn is_retryable_code(code: &str) -> bool {
    code.starts_with("Neo.TransientError")
        || code == "Neo.ClientError.Cluster.NotALeader"
        || code == "Neo.ClientError.General.ForbiddenOnReadOnlyDatabase"
}

fn is_authentication_code(code: &str) -> bool {
    code.starts_with("Neo.ClientError.Security")
}

fn is_authorization_code(code: &str) -> bool {
    code.starts_with("Neo.ClientError.Security")
        && (code.contains("Forbidden") || code.contains("Authorization"))
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================
