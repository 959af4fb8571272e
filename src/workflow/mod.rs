//! workflow
//!
//! Клиентская машина состояний бронирования мест для одного сеанса.
//!
//! Все операции берут `&self`: состояние лежит под мьютексом, который никогда
//! не удерживается через `.await`. Поэтому пока один запрос к API в полёте,
//! другие операции можно *вызвать*, но фаза сессии отклонит всё, что не
//! подходит к текущему состоянию. Каждый запрос помечается эпохой сессии;
//! `select_show` и `reset` увеличивают эпоху, и ответ со старой эпохой
//! отбрасывается, а не применяется к новой сессии.

mod phase;
mod selection;
mod snapshot;

pub use phase::Phase;
pub use selection::{SelectionSet, Toggle};
pub use snapshot::ReservationSnapshot;

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{ReservationError, ValidationError},
    models::{Booking, Seat, SeatId, SeatLock, SeatStatus, Show},
    services::inventory::{ConfirmRequest, SeatInventory},
    sessions::{InMemorySessionRepository, SessionRepository},
};

struct SessionState {
    session_id: Uuid,
    /// Метка для ответов API; растёт при смене сеанса и сбросе.
    epoch: u64,
    phase: Phase,
    show: Option<Show>,
    seats: Vec<Seat>,
    selection: SelectionSet,
    total_amount: u64,
    lock: Option<SeatLock>,
    booking: Option<Booking>,
    last_error: Option<ReservationError>,
    resync_required: bool,
}

impl SessionState {
    fn fresh(epoch: u64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            epoch,
            phase: Phase::Idle,
            show: None,
            seats: Vec::new(),
            selection: SelectionSet::new(),
            total_amount: 0,
            lock: None,
            booking: None,
            last_error: None,
            resync_required: false,
        }
    }

    fn snapshot(&self) -> ReservationSnapshot {
        ReservationSnapshot {
            session_id: self.session_id,
            phase: self.phase,
            show: self.show.clone(),
            seats: self.seats.clone(),
            selection: self.selection.ids(),
            total_amount: self.total_amount,
            lock: self.lock.clone(),
            booking: self.booking.clone(),
            last_error: self.last_error.clone(),
            resync_required: self.resync_required,
            updated_at: Utc::now(),
        }
    }

    fn recompute_total(&mut self) -> Result<(), ReservationError> {
        self.total_amount = match &self.show {
            Some(show) => self.selection.total(&self.seats, &show.pricing)?,
            None => 0,
        };
        Ok(())
    }

    /// Пересчёт после смены карты мест; переполнение всплывёт при блокировке.
    fn refresh_total(&mut self) {
        if let Err(e) = self.recompute_total() {
            warn!("Session {}: {}", self.session_id, e);
        }
    }

    fn require_phase(&self, expected: Phase, operation: &str) -> Result<(), ReservationError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ValidationError::WrongPhase {
                operation: operation.to_string(),
                phase: self.phase,
            }
            .into())
        }
    }

    fn stale(&self, epoch: u64, show: &Show) -> Option<ReservationError> {
        if self.epoch == epoch {
            return None;
        }
        warn!(
            "Discarding response for show {} (session epoch {} -> {})",
            show.id, epoch, self.epoch
        );
        Some(
            ValidationError::StaleShow {
                show_id: show.id.to_string(),
            }
            .into(),
        )
    }

    fn prune_selection(&mut self) -> Vec<SeatId> {
        self.selection.prune(&self.seats)
    }

    fn set_status(&mut self, seat_ids: &[SeatId], status: SeatStatus) {
        for seat in self.seats.iter_mut().filter(|s| seat_ids.contains(&s.id)) {
            seat.status = status;
        }
    }

    /// Снимает локальную блокировку: места снова свободны, выбор сохраняется.
    fn drop_lock(&mut self) {
        if let Some(lock) = self.lock.take() {
            let ours: Vec<SeatId> = self
                .seats
                .iter()
                .filter(|s| s.status == SeatStatus::LockedBySelf && lock.seats.contains(&s.id))
                .map(|s| s.id.clone())
                .collect();
            self.set_status(&ours, SeatStatus::Available);
        }
        self.phase = Phase::Browsing;
    }
}

/// Workflow выбора и бронирования мест для одного пользователя.
pub struct SeatReservationWorkflow<I> {
    inventory: I,
    sessions: Arc<dyn SessionRepository>,
    state: Mutex<SessionState>,
}

impl<I: SeatInventory> SeatReservationWorkflow<I> {
    /// Workflow со снапшотами в памяти процесса.
    pub fn new(inventory: I) -> Self {
        Self::with_repository(inventory, Arc::new(InMemorySessionRepository::new()))
    }

    pub fn with_repository(inventory: I, sessions: Arc<dyn SessionRepository>) -> Self {
        Self {
            inventory,
            sessions,
            state: Mutex::new(SessionState::fresh(0)),
        }
    }

    /// Восстанавливает сессию из сохранённого снапшота. Запросы, бывшие в полёте,
    /// считаются потерянными: фаза переводится в ближайшую устойчивую.
    pub fn restore(
        inventory: I,
        sessions: Arc<dyn SessionRepository>,
        snapshot: ReservationSnapshot,
    ) -> Self {
        let settled = snapshot.phase.settled();
        let mut state = SessionState {
            session_id: snapshot.session_id,
            epoch: 0,
            phase: settled,
            show: snapshot.show,
            seats: snapshot.seats,
            selection: snapshot.selection.into_iter().collect(),
            total_amount: 0,
            lock: snapshot.lock,
            booking: snapshot.booking,
            last_error: snapshot.last_error,
            resync_required: snapshot.resync_required,
        };
        if snapshot.phase == Phase::Locking {
            // результат блокировки неизвестен
            state.resync_required = true;
            state.lock = None;
        }
        state.refresh_total();
        info!("Restored session {} in phase {}", state.session_id, state.phase);

        let workflow = Self {
            inventory,
            sessions,
            state: Mutex::new(state),
        };
        {
            let state = workflow.state();
            workflow.persist(&state);
        }
        workflow
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, state: &SessionState) {
        if let Err(e) = self.sessions.save(&state.snapshot()) {
            warn!("Failed to save session {}: {}", state.session_id, e);
        }
    }

    fn discard_session(&self, session_id: Uuid) {
        if let Err(e) = self.sessions.remove(session_id) {
            warn!("Failed to remove session {}: {}", session_id, e);
        }
    }

    /// Фиксирует ошибку в снапшоте и возвращает её вызывающему.
    fn fail(&self, state: &mut SessionState, error: ReservationError) -> ReservationError {
        warn!("Session {} ({}): {}", state.session_id, state.phase, error);
        state.last_error = Some(error.clone());
        self.persist(state);
        error
    }

    pub fn session_id(&self) -> Uuid {
        self.state().session_id
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn total_amount(&self) -> u64 {
        self.state().total_amount
    }

    pub fn snapshot(&self) -> ReservationSnapshot {
        self.state().snapshot()
    }

    /// Начинает новую сессию для сеанса и загружает карту мест.
    ///
    /// Допустима из любой фазы: ответы по предыдущему сеансу после этого
    /// отбрасываются.
    pub async fn select_show(&self, show: Show) -> Result<(), ReservationError> {
        let epoch = {
            let mut state = self.state();
            if show.id.as_str().trim().is_empty() {
                return Err(self.fail(&mut state, ValidationError::InvalidShow.into()));
            }

            let previous = state.session_id;
            let epoch = state.epoch + 1;
            *state = SessionState::fresh(epoch);
            state.phase = Phase::Loading;
            state.show = Some(show.clone());
            self.discard_session(previous);
            self.persist(&state);
            info!("Session {} loading seats for show {}", state.session_id, show.id);
            epoch
        };

        self.load_seats(epoch, show).await
    }

    /// Повторная загрузка карты мест после `Failed`.
    pub async fn retry(&self) -> Result<(), ReservationError> {
        let (epoch, show) = {
            let mut state = self.state();
            if let Err(e) = state.require_phase(Phase::Failed, "retry") {
                return Err(self.fail(&mut state, e));
            }
            let Some(show) = state.show.clone() else {
                return Err(self.fail(&mut state, ValidationError::InvalidShow.into()));
            };
            state.epoch += 1;
            state.phase = Phase::Loading;
            state.last_error = None;
            self.persist(&state);
            (state.epoch, show)
        };

        self.load_seats(epoch, show).await
    }

    async fn load_seats(&self, epoch: u64, show: Show) -> Result<(), ReservationError> {
        let result = self.inventory.fetch_seats(&show.id).await;

        let mut state = self.state();
        if let Some(stale) = state.stale(epoch, &show) {
            return Err(stale);
        }

        match result {
            Ok(seats) => {
                info!("Loaded {} seats for show {}", seats.len(), show.id);
                state.seats = seats;
                state.prune_selection();
                state.refresh_total();
                state.phase = Phase::Browsing;
                state.last_error = None;
                self.persist(&state);
                Ok(())
            }
            Err(e) => {
                state.phase = Phase::Failed;
                Err(self.fail(&mut state, e))
            }
        }
    }

    /// Добавляет место в выбор или убирает его оттуда и пересчитывает сумму.
    pub fn toggle_seat(&self, seat_id: &SeatId) -> Result<Toggle, ReservationError> {
        let mut state = self.state();
        if let Err(e) = state.require_phase(Phase::Browsing, "toggle_seat") {
            return Err(self.fail(&mut state, e));
        }

        let Some(status) = state.seats.iter().find(|s| &s.id == seat_id).map(|s| s.status) else {
            let error = ValidationError::UnknownSeat {
                seat_id: seat_id.clone(),
            };
            return Err(self.fail(&mut state, error.into()));
        };

        if !state.selection.contains(seat_id) && status != SeatStatus::Available {
            let error = ValidationError::SeatUnavailable {
                seat_id: seat_id.clone(),
                status,
            };
            return Err(self.fail(&mut state, error.into()));
        }

        let toggle = state.selection.toggle(seat_id);
        if let Err(e) = state.recompute_total() {
            state.selection.toggle(seat_id);
            return Err(self.fail(&mut state, e));
        }
        debug!(
            "Seat {} {:?}, total={}",
            seat_id, toggle, state.total_amount
        );
        self.persist(&state);
        Ok(toggle)
    }

    /// Отправляет весь выбор одним атомарным запросом блокировки.
    ///
    /// Пока запрос в полёте, повторный вызов отклоняется без обращения к API.
    /// При конфликте карта мест перечитывается целиком: частичному ответу
    /// сервера не доверяем.
    pub async fn request_lock(&self) -> Result<SeatLock, ReservationError> {
        let (epoch, show, seat_ids) = {
            let mut state = self.state();
            if let Err(e) = state.require_phase(Phase::Browsing, "request_lock") {
                return Err(self.fail(&mut state, e));
            }
            if state.resync_required {
                return Err(self.fail(&mut state, ValidationError::ResyncRequired.into()));
            }
            if state.selection.is_empty() {
                return Err(self.fail(&mut state, ValidationError::EmptySelection.into()));
            }
            let Some(show) = state.show.clone() else {
                return Err(self.fail(&mut state, ValidationError::InvalidShow.into()));
            };
            if let Err(e) = state.recompute_total() {
                return Err(self.fail(&mut state, e));
            }

            state.phase = Phase::Locking;
            state.last_error = None;
            self.persist(&state);
            (state.epoch, show, state.selection.ids())
        };

        match self.inventory.lock_seats(&show.id, &seat_ids).await {
            Ok(grant) => {
                let mut state = self.state();
                if let Some(stale) = state.stale(epoch, &show) {
                    return Err(stale);
                }

                if !grant.seats.is_empty() {
                    state.seats = grant.seats;
                }
                state.set_status(&seat_ids, SeatStatus::LockedBySelf);

                let lock = SeatLock {
                    token: grant.token,
                    seats: seat_ids,
                    expires_at: grant.expires_at,
                };
                state.lock = Some(lock.clone());
                state.refresh_total();
                state.phase = Phase::Locked;
                state.last_error = None;
                info!(
                    "Session {} locked {} seats, total={}",
                    state.session_id,
                    lock.seats.len(),
                    state.total_amount
                );
                self.persist(&state);
                Ok(lock)
            }
            Err(error) if error.is_contention() => {
                self.resync_after_contention(epoch, &show, error).await
            }
            Err(error) => {
                let mut state = self.state();
                if let Some(stale) = state.stale(epoch, &show) {
                    return Err(stale);
                }
                state.phase = Phase::Browsing;
                Err(self.fail(&mut state, error))
            }
        }
    }

    /// Фаза остаётся `Locking`, пока карта перечитывается, так что новая
    /// блокировка до конца синхронизации невозможна.
    async fn resync_after_contention(
        &self,
        epoch: u64,
        show: &Show,
        error: ReservationError,
    ) -> Result<SeatLock, ReservationError> {
        warn!("Seat contention on show {}: {}", show.id, error);
        let stale = self.state().stale(epoch, show);
        if let Some(stale) = stale {
            return Err(stale);
        }
        let resync = self.inventory.fetch_seats(&show.id).await;

        let mut state = self.state();
        if let Some(stale) = state.stale(epoch, show) {
            return Err(stale);
        }

        let rejected = match &error {
            ReservationError::Contention { seats, .. } => seats.clone(),
            _ => Vec::new(),
        };
        state.selection.remove_all(&rejected);

        match resync {
            Ok(seats) => {
                state.seats = seats;
                state.resync_required = false;
            }
            Err(e) => {
                warn!("Seat map resync failed for show {}: {}", show.id, e);
                state.set_status(&rejected, SeatStatus::LockedByOther);
                state.resync_required = true;
            }
        }

        let dropped = state.prune_selection();
        if !dropped.is_empty() {
            info!("Dropped {} unavailable seats from selection", dropped.len());
        }
        state.refresh_total();
        state.phase = Phase::Browsing;
        Err(self.fail(&mut state, error))
    }

    /// Перечитывает карту мест в `Browsing` и снимает требование синхронизации.
    pub async fn refresh_seats(&self) -> Result<(), ReservationError> {
        let (epoch, show) = {
            let mut state = self.state();
            if let Err(e) = state.require_phase(Phase::Browsing, "refresh_seats") {
                return Err(self.fail(&mut state, e));
            }
            let Some(show) = state.show.clone() else {
                return Err(self.fail(&mut state, ValidationError::InvalidShow.into()));
            };
            (state.epoch, show)
        };

        let result = self.inventory.fetch_seats(&show.id).await;

        let mut state = self.state();
        if let Some(stale) = state.stale(epoch, &show) {
            return Err(stale);
        }
        // пока шло обновление, сессия могла уйти в блокировку
        if let Err(e) = state.require_phase(Phase::Browsing, "refresh_seats") {
            debug!("Ignoring seat refresh for show {}: {}", show.id, e);
            return Err(e);
        }

        match result {
            Ok(seats) => {
                state.seats = seats;
                let dropped = state.prune_selection();
                if !dropped.is_empty() {
                    info!("Dropped {} unavailable seats from selection", dropped.len());
                }
                state.refresh_total();
                state.resync_required = false;
                state.last_error = None;
                self.persist(&state);
                Ok(())
            }
            Err(e) => Err(self.fail(&mut state, e)),
        }
    }

    /// Подтверждает бронирование удерживаемых мест.
    ///
    /// Ошибка подтверждения считается временной: блокировка сохраняется и
    /// сессия возвращается в `Locked`, чтобы можно было повторить без нового
    /// выбора мест.
    pub async fn confirm_booking(&self) -> Result<Booking, ReservationError> {
        let (epoch, show, request) = {
            let mut state = self.state();
            if let Err(e) = state.require_phase(Phase::Locked, "confirm_booking") {
                return Err(self.fail(&mut state, e));
            }
            let (Some(show), Some(lock)) = (state.show.clone(), state.lock.clone()) else {
                return Err(self.fail(&mut state, ValidationError::InvalidShow.into()));
            };
            if lock.is_expired_at(Utc::now()) {
                state.drop_lock();
                return Err(self.fail(&mut state, ValidationError::LockExpired.into()));
            }
            if let Err(e) = state.recompute_total() {
                return Err(self.fail(&mut state, e));
            }

            let request = ConfirmRequest {
                show_id: show.id.clone(),
                seat_ids: lock.seats.clone(),
                amount: state.total_amount,
                lock_token: lock.token,
            };
            state.phase = Phase::Confirming;
            state.last_error = None;
            self.persist(&state);
            (state.epoch, show, request)
        };

        let result = self.inventory.confirm_booking(&request).await;

        let mut state = self.state();
        if let Some(stale) = state.stale(epoch, &show) {
            return Err(stale);
        }

        match result {
            Ok(booking) => {
                state.set_status(&request.seat_ids, SeatStatus::Booked);
                state.lock = None;
                state.booking = Some(booking.clone());
                state.phase = Phase::Confirmed;
                state.last_error = None;
                info!(
                    "Session {} confirmed booking {} for {}",
                    state.session_id, booking.id, request.amount
                );
                self.discard_session(state.session_id);
                Ok(booking)
            }
            Err(e) => {
                state.phase = Phase::Locked;
                Err(self.fail(&mut state, e))
            }
        }
    }

    /// Отпускает блокировку локально. Сервер снимет её сам по таймауту.
    pub fn release_lock(&self) -> Result<(), ReservationError> {
        let mut state = self.state();
        if let Err(e) = state.require_phase(Phase::Locked, "release_lock") {
            return Err(self.fail(&mut state, e));
        }
        state.drop_lock();
        info!("Session {} released its seat lock", state.session_id);
        self.persist(&state);
        Ok(())
    }

    /// Возвращает сессию в `Browsing`, если срок блокировки истёк к `now`.
    pub fn expire_lock_if_due(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state();
        let expired = state.phase == Phase::Locked
            && state.lock.as_ref().is_some_and(|lock| lock.is_expired_at(now));
        if expired {
            state.drop_lock();
            self.fail(&mut state, ValidationError::LockExpired.into());
        }
        expired
    }

    /// Сбрасывает сессию в `Idle` из любой фазы, ничего не сообщая серверу.
    pub fn reset(&self) {
        let mut state = self.state();
        let previous = state.session_id;
        let epoch = state.epoch + 1;
        *state = SessionState::fresh(epoch);
        self.discard_session(previous);
        info!("Session {} reset", previous);
    }
}
