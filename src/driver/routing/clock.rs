//! 시계와 취소 토큰
//!
//! 디스커버리의 백오프 대기는 주입된 [`Clock`]을 통해 이루어지며,
//! [`CancellationToken`]으로 중단할 수 있습니다.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::super::error::{DriverError, DriverResult};

// ============================================================================
// CancellationToken - 취소 토큰
// ============================================================================

#[derive(Default)]
struct CancellationState {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// 협력적 취소 토큰
///
/// 한 번 취소되면 되돌릴 수 없으며, 모든 복제본이 같은 상태를 공유합니다.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

impl CancellationToken {
    /// 새 토큰 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 취소
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    /// 취소 여부
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// 최대 `timeout` 동안 취소를 기다림
    ///
    /// 취소되었으면 `true`, 시간이 다 되면 `false`를 반환합니다.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            match deadline {
                Some(deadline) => {
                    if self.inner.condvar.wait_until(&mut cancelled, deadline).timed_out() {
                        break;
                    }
                }
                None => self.inner.condvar.wait(&mut cancelled),
            }
        }
        *cancelled
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ============================================================================
// Clock - 시계
// ============================================================================

/// 단조 시계 + 중단 가능한 대기
pub trait Clock: Send + Sync {
    /// 현재 시각
    fn now(&self) -> Instant;

    /// `duration` 동안 대기
    ///
    /// 대기 중 토큰이 취소되면 [`DriverError::Cancelled`]를 반환합니다.
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> DriverResult<()>;
}

/// 시스템 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> DriverResult<()> {
        if cancel.wait_timeout(duration) {
            Err(DriverError::cancelled("Sleep was interrupted"))
        } else {
            Ok(())
        }
    }
}
