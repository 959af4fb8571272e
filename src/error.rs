//! Таксономия ошибок клиента бронирования.
//!
//! Все ошибки workflow - обычные данные: они клонируются, сравниваются и
//! сериализуются вместе со снапшотом сессии.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{SeatId, SeatStatus};
use crate::workflow::Phase;

/// Ошибка, возвращаемая операциями workflow и клиентом API.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReservationError {
    /// Транспортный сбой или открытый Circuit Breaker. Можно повторить.
    #[error("network error: {message}")]
    Network { message: String },

    /// Места заняты другим покупателем. Нужен новый выбор мест, а не повтор запроса.
    #[error("seats no longer available: {message}")]
    Contention { seats: Vec<SeatId>, message: String },

    /// Некорректный запрос (локально или по ответу сервера).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Непрозрачная ошибка 5xx. Считается временной.
    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },
}

impl ReservationError {
    pub fn network(message: impl Into<String>) -> Self {
        ReservationError::Network { message: message.into() }
    }

    /// Временные ошибки можно повторить тем же запросом.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReservationError::Network { .. } | ReservationError::Server { .. }
        )
    }

    pub fn is_contention(&self) -> bool {
        matches!(self, ReservationError::Contention { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("select at least one seat")]
    EmptySelection,

    #[error("show has no identifier")]
    InvalidShow,

    #[error("response for show {show_id} arrived after the session moved on")]
    StaleShow { show_id: String },

    #[error("seat {seat_id} is not part of the loaded seat map")]
    UnknownSeat { seat_id: SeatId },

    #[error("seat {seat_id} is not available ({status})")]
    SeatUnavailable { seat_id: SeatId, status: SeatStatus },

    #[error("{operation} is not allowed while {phase}")]
    WrongPhase { operation: String, phase: Phase },

    #[error("seat map is stale, refresh it before locking again")]
    ResyncRequired,

    #[error("seat lock expired")]
    LockExpired,

    #[error("total amount of the selection overflows")]
    AmountOverflow,

    #[error("request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Ошибки чтения конфигурации из окружения.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}
