//! Автоматический выключатель для вызовов API бронирования.
//!
//! Пока API отвечает сбоями подряд, выключатель перестаёт пропускать запросы
//! и отдаёт сетевую ошибку сразу, не дожидаясь таймаута HTTP-клиента.

use std::sync::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Состояния "Автоматического выключателя" (Circuit Breaker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// **Closed**: нормальный режим, запросы разрешены.
    Closed,
    /// **Open**: запросы запрещены после серии сбоев.
    Open,
    /// **HalfOpen**: после таймаута в Open пропускается пробный запрос.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Счетчик последовательных сбоев.
    failure_count: u32,
    /// Момент перехода в Open.
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    /// Порог сбоев, после которого выключатель переходит в Open.
    failure_threshold: u32,
    /// Сколько держать Open, прежде чем пропустить пробный запрос.
    open_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
            }),
            failure_threshold: failure_threshold.max(1),
            open_timeout: Duration::from_secs(timeout_seconds),
        }
    }

    // Отравленный мьютекс не делает счетчики недействительными
    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Проверяет, можно ли выполнить следующий запрос.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(self.open_timeout);

                if elapsed >= self.open_timeout {
                    inner.state = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();

        if inner.state == CircuitState::HalfOpen {
            info!("Circuit breaker recovered - transitioning to Closed state");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    error!(
                        "Circuit breaker OPENED - {} failures reached threshold {}",
                        inner.failure_count, self.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                warn!("Circuit breaker test failed - returning to Open state");
            }
            CircuitState::Open => {}
        }
    }

    /// Текущее состояние и число сбоев подряд, для мониторинга.
    pub fn status(&self) -> (CircuitState, u32) {
        let inner = self.lock();
        (inner.state, inner.failure_count)
    }
}
