pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod sessions;
pub mod workflow;

use std::sync::Arc;
use tracing::info;

pub use error::{ReservationError, ValidationError};
pub use workflow::{Phase, ReservationSnapshot, SeatReservationWorkflow, Toggle};

use services::HttpSeatInventory;
use sessions::{FileSessionRepository, InMemorySessionRepository, SessionRepository};

// Shared state для клиента: конфиг, HTTP-клиент API и хранилище сессий
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub inventory: HttpSeatInventory,
    pub sessions: Arc<dyn SessionRepository>,
}

impl AppState {
    pub fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let inventory = HttpSeatInventory::from_config(&config.api, &config.circuit_breaker)?;

        let sessions: Arc<dyn SessionRepository> = match &config.app.session_dir {
            Some(dir) => Arc::new(FileSessionRepository::open(dir)?),
            None => Arc::new(InMemorySessionRepository::new()),
        };
        info!("Booking API at {}", config.api.base_url);

        Ok(Arc::new(Self {
            config,
            inventory,
            sessions,
        }))
    }

    /// Новая сессия бронирования поверх общего клиента и хранилища.
    pub fn workflow(&self) -> SeatReservationWorkflow<HttpSeatInventory> {
        SeatReservationWorkflow::with_repository(self.inventory.clone(), self.sessions.clone())
    }

    /// Продолжает сохранённую сессию, если она есть в хранилище.
    pub fn resume(
        &self,
        session_id: uuid::Uuid,
    ) -> Result<Option<SeatReservationWorkflow<HttpSeatInventory>>, sessions::RepositoryError> {
        Ok(self.sessions.load(session_id)?.map(|snapshot| {
            SeatReservationWorkflow::restore(self.inventory.clone(), self.sessions.clone(), snapshot)
        }))
    }
}
