pub mod seat;
pub mod show;
pub mod booking;

pub use seat::{Seat, SeatCategory, SeatDto, SeatId, SeatStatus};
pub use show::{Show, ShowId, ShowPricing, Theatre};
pub use booking::{Booking, BookingId, BookingSeat, LockToken, SeatLock};
