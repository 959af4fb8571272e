use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::SeatId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BookingId {
    fn from(id: &str) -> Self {
        BookingId(id.to_string())
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Токен, подтверждающий временное право на набор мест. Выдаётся API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(token: impl Into<String>) -> Self {
        LockToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Токен не должен попадать в логи целиком
impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "LockToken({}…)", prefix)
    }
}

/// Удерживаемая блокировка мест.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLock {
    pub token: LockToken,
    pub seats: Vec<SeatId>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SeatLock {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Бронирование, выданное API после подтверждения.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub seats: Vec<BookingSeat>,
}

/// Место внутри бронирования: API присылает либо полный объект, либо только id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookingSeat {
    Detailed { id: SeatId, number: String },
    Id(SeatId),
}

impl BookingSeat {
    pub fn id(&self) -> &SeatId {
        match self {
            BookingSeat::Detailed { id, .. } | BookingSeat::Id(id) => id,
        }
    }
}
