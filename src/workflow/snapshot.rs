use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Phase;
use crate::error::ReservationError;
use crate::models::{Booking, Seat, SeatId, SeatLock, Show};

/// Снимок состояния сессии только для чтения. Его рендерит слой представления
/// и его же сохраняет `SessionRepository`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    pub show: Option<Show>,
    pub seats: Vec<Seat>,
    pub selection: Vec<SeatId>,
    pub total_amount: u64,
    pub lock: Option<SeatLock>,
    pub booking: Option<Booking>,
    pub last_error: Option<ReservationError>,
    /// После конфликта мест карту нужно перечитать до новой блокировки.
    pub resync_required: bool,
    pub updated_at: DateTime<Utc>,
}

impl ReservationSnapshot {
    pub fn empty(session_id: Uuid) -> Self {
        Self {
            session_id,
            phase: Phase::Idle,
            show: None,
            seats: Vec::new(),
            selection: Vec::new(),
            total_amount: 0,
            lock: None,
            booking: None,
            last_error: None,
            resync_required: false,
            updated_at: Utc::now(),
        }
    }

    pub fn has_lock(&self) -> bool {
        self.lock.is_some()
    }

    pub fn seat(&self, seat_id: &SeatId) -> Option<&Seat> {
        self.seats.iter().find(|seat| &seat.id == seat_id)
    }
}
