//! 조회 요청 재시도 유틸리티.
//!
//! 네트워크 오류, Rate Limit 등 일시적인 오류에 대해 재시도합니다.
//! 주문 제출/취소처럼 멱등하지 않은 요청에는 사용하지 않습니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use trader_exchange::retry::{with_retry, RetryConfig};
//!
//! let positions = with_retry(&RetryConfig::default(), || client.get_positions(None)).await?;
//! ```

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::ExchangeError;

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외).
    pub max_retries: u32,
    /// 기본 대기 시간.
    pub base_delay: Duration,
    /// 최대 대기 시간.
    pub max_delay: Duration,
    /// 백오프 배수.
    pub backoff_multiplier: f64,
    /// 지터(±25%) 추가 여부.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    fn delay_for(&self, attempt: u32, error: &ExchangeError) -> Duration {
        let base = error
            .retry_delay_ms()
            .map(Duration::from_millis)
            .unwrap_or(self.base_delay);

        let scaled = base.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_secs_f64(scaled).min(self.max_delay);

        if !self.add_jitter {
            return delay;
        }
        let jitter_range = delay.as_millis() as f64 * 0.25;
        let jitter = (unit_noise() * 2.0 - 1.0) * jitter_range;
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }
}

/// 0.0 ~ 1.0 범위의 시간 기반 노이즈.
fn unit_noise() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    nanos as f64 / u32::MAX as f64
}

/// 재시도가 포함된 비동기 작업 실행.
///
/// 치명적이거나 재시도 불가능한 에러는 즉시 반환하고,
/// 최대 재시도 횟수를 넘으면 마지막 에러를 반환합니다.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, ExchangeError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "재시도 후 성공");
                }
                return Ok(result);
            }
            Err(e) if e.is_fatal() || !e.is_retryable() => return Err(e),
            Err(e) if attempt >= config.max_retries => {
                warn!(error = %e, attempts = attempt + 1, "최대 재시도 횟수 초과");
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_for(attempt, &e);
                warn!(
                    error = %e,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "재시도 대기 중"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    fn quick() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(5),
            add_jitter: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&quick(), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ExchangeError::NetworkError("timeout".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn api_errors_are_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&quick(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ExchangeError::ApiError {
                    code: 109400,
                    message: "invalid".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&quick(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ExchangeError::Disconnected("reset".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
