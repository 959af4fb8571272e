pub mod circuit_breaker;
pub mod inventory;

pub use inventory::{ConfirmRequest, HttpSeatInventory, LockGrant, SeatInventory};
