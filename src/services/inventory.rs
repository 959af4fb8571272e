//! inventory.rs
//!
//! Клиент удалённого API бронирования: карта мест, блокировка, подтверждение.
//!
//! Ключевые компоненты:
//! 1.  **SeatInventory**: трейт-шов между workflow и API. Workflow зависит только
//!     от него, поэтому в тестах его можно подменить.
//! 2.  **HttpSeatInventory**: реализация поверх `reqwest`. Каждый вызов проходит
//!     через `CircuitBreaker`, ответы с ошибкой раскладываются по таксономии
//!     `ReservationError`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::{
    config::{ApiConfig, CircuitBreakerConfig},
    error::{ReservationError, ValidationError},
    models::{Booking, LockToken, Seat, SeatDto, SeatId, Show, ShowId},
};

/// Результат успешной блокировки.
#[derive(Debug, Clone)]
pub struct LockGrant {
    pub token: LockToken,
    /// Карта мест по версии сервера на момент блокировки. Может быть пустой.
    pub seats: Vec<Seat>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Тело запроса на подтверждение бронирования.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub show_id: ShowId,
    pub seat_ids: Vec<SeatId>,
    pub amount: u64,
    pub lock_token: LockToken,
}

/// Операции API, от которых зависит workflow бронирования.
#[async_trait]
pub trait SeatInventory: Send + Sync {
    async fn fetch_seats(&self, show_id: &ShowId) -> Result<Vec<Seat>, ReservationError>;

    /// Атомарно блокирует весь набор мест.
    async fn lock_seats(
        &self,
        show_id: &ShowId,
        seat_ids: &[SeatId],
    ) -> Result<LockGrant, ReservationError>;

    async fn confirm_booking(&self, request: &ConfirmRequest) -> Result<Booking, ReservationError>;
}

// --- Модели данных API ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LockSeatsRequest<'a> {
    show_id: &'a ShowId,
    seat_ids: &'a [SeatId],
}

#[derive(Debug, Deserialize)]
struct SeatsResponse {
    seats: Vec<SeatDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockSeatsResponse {
    lock_token: LockToken,
    #[serde(default)]
    seats: Vec<SeatDto>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BookingResponse {
    booking: Booking,
}

#[derive(Debug, Deserialize)]
struct BookingsResponse {
    bookings: Vec<Booking>,
}

#[derive(Debug, Deserialize)]
struct ShowsResponse {
    shows: Vec<Show>,
}

/// Тело ответа с ошибкой.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: Option<String>,
    message: Option<String>,
    #[serde(default)]
    unavailable_seats: Vec<SeatId>,
}

/// Раскладывает неуспешный HTTP-ответ по таксономии ошибок.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> ReservationError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                trimmed.to_string()
            }
        });

    if status.is_server_error() {
        return ReservationError::Server {
            status: status.as_u16(),
            message,
        };
    }

    if status == StatusCode::CONFLICT
        || (status.is_client_error() && !parsed.unavailable_seats.is_empty())
    {
        return ReservationError::Contention {
            seats: parsed.unavailable_seats,
            message,
        };
    }

    ValidationError::Rejected {
        status: status.as_u16(),
        message,
    }
    .into()
}

/// HTTP-клиент API бронирования.
#[derive(Clone)]
pub struct HttpSeatInventory {
    base_url: Url,
    auth_token: Option<String>,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl HttpSeatInventory {
    /// Создает клиент на основе настроек приложения.
    pub fn from_config(
        api: &ApiConfig,
        breaker: &CircuitBreakerConfig,
    ) -> Result<Self, ReservationError> {
        let base_url = Url::parse(&api.base_url)
            .map_err(|e| ReservationError::network(format!("invalid API url {}: {}", api.base_url, e)))?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_seconds))
            .build()
            .map_err(|e| ReservationError::network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            auth_token: api.auth_token.clone(),
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                breaker.timeout_seconds,
            )),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ReservationError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ReservationError::network(format!("API url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Выполняет запрос через Circuit Breaker и декодирует тело ответа.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ReservationError> {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking booking API request");
            return Err(ReservationError::network(
                "booking API temporarily unavailable (circuit open)",
            ));
        }

        let request = match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let result = async {
            let response = request
                .send()
                .await
                .map_err(|e| ReservationError::network(e.to_string()))?;
            let status = response.status();

            if status.is_success() {
                response
                    .json::<T>()
                    .await
                    .map_err(|e| ReservationError::network(format!("malformed response: {}", e)))
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(classify_failure(status, &body))
            }
        }
        .await;

        match &result {
            Err(e) if e.is_retryable() => {
                error!("Booking API request failed: {}", e);
                self.circuit_breaker.record_failure();
            }
            _ => self.circuit_breaker.record_success(),
        }

        result
    }

    /// Загружает бронирование для страницы билета.
    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking, ReservationError> {
        info!("Fetching booking: booking_id={}", booking_id);
        let url = self.url(&["bookings", booking_id])?;
        let response: BookingResponse = self.execute(self.http_client.get(url)).await?;
        Ok(response.booking)
    }

    /// История бронирований текущего пользователя.
    pub async fn user_bookings(&self) -> Result<Vec<Booking>, ReservationError> {
        let url = self.url(&["bookings", "user", "all"])?;
        let response: BookingsResponse = self.execute(self.http_client.get(url)).await?;
        debug!("Loaded {} bookings", response.bookings.len());
        Ok(response.bookings)
    }

    /// Сеансы фильма вместе с ценами.
    pub async fn movie_shows(&self, movie_id: &str) -> Result<Vec<Show>, ReservationError> {
        info!("Fetching shows: movie_id={}", movie_id);
        let url = self.url(&["movies", movie_id])?;
        let response: ShowsResponse = self.execute(self.http_client.get(url)).await?;
        Ok(response.shows)
    }

    pub fn circuit_breaker_status(&self) -> (CircuitState, u32) {
        self.circuit_breaker.status()
    }
}

#[async_trait]
impl SeatInventory for HttpSeatInventory {
    async fn fetch_seats(&self, show_id: &ShowId) -> Result<Vec<Seat>, ReservationError> {
        info!("Fetching seat map: show_id={}", show_id);
        let url = self.url(&["bookings", "seats", show_id.as_str()])?;
        let response: SeatsResponse = self.execute(self.http_client.get(url)).await?;
        Ok(response.seats.into_iter().map(Seat::from).collect())
    }

    async fn lock_seats(
        &self,
        show_id: &ShowId,
        seat_ids: &[SeatId],
    ) -> Result<LockGrant, ReservationError> {
        info!("Locking seats: show_id={}, seats={}", show_id, seat_ids.len());
        let url = self.url(&["bookings", "lock-seats"])?;
        let body = LockSeatsRequest { show_id, seat_ids };
        let response: LockSeatsResponse =
            self.execute(self.http_client.post(url).json(&body)).await?;

        Ok(LockGrant {
            token: response.lock_token,
            seats: response.seats.into_iter().map(Seat::from).collect(),
            expires_at: response.expires_at,
        })
    }

    async fn confirm_booking(&self, request: &ConfirmRequest) -> Result<Booking, ReservationError> {
        info!(
            "Confirming booking: show_id={}, seats={}, amount={}",
            request.show_id,
            request.seat_ids.len(),
            request.amount
        );
        let url = self.url(&["bookings", "confirm"])?;
        let response: BookingResponse =
            self.execute(self.http_client.post(url).json(request)).await?;
        Ok(response.booking)
    }
}
