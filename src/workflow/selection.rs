use std::collections::BTreeSet;

use crate::error::ValidationError;
use crate::models::{Seat, SeatId, ShowPricing};

/// Результат переключения места.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Selected,
    Deselected,
}

/// Места, выбранные пользователем и ещё не заблокированные.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    seats: BTreeSet<SeatId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, seat_id: &SeatId) -> Toggle {
        if self.seats.remove(seat_id) {
            Toggle::Deselected
        } else {
            self.seats.insert(seat_id.clone());
            Toggle::Selected
        }
    }

    pub fn contains(&self, seat_id: &SeatId) -> bool {
        self.seats.contains(seat_id)
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn ids(&self) -> Vec<SeatId> {
        self.seats.iter().cloned().collect()
    }

    /// Убирает указанные места, возвращает сколько было убрано.
    pub fn remove_all<'a>(&mut self, seat_ids: impl IntoIterator<Item = &'a SeatId>) -> usize {
        seat_ids
            .into_iter()
            .filter(|id| self.seats.remove(*id))
            .count()
    }

    /// Оставляет только места, которые есть в карте и всё ещё свободны.
    pub fn prune(&mut self, seats: &[Seat]) -> Vec<SeatId> {
        let mut dropped = Vec::new();
        self.seats.retain(|id| {
            let keep = seats.iter().any(|seat| &seat.id == id && seat.is_available());
            if !keep {
                dropped.push(id.clone());
            }
            keep
        });
        dropped
    }

    /// Сумма цен выбранных мест, точная целочисленная.
    pub fn total(&self, seats: &[Seat], pricing: &ShowPricing) -> Result<u64, ValidationError> {
        seats
            .iter()
            .filter(|seat| self.seats.contains(&seat.id))
            .try_fold(0u64, |sum, seat| sum.checked_add(pricing.price_of(seat.category)))
            .ok_or(ValidationError::AmountOverflow)
    }
}

impl FromIterator<SeatId> for SelectionSet {
    fn from_iter<T: IntoIterator<Item = SeatId>>(iter: T) -> Self {
        Self {
            seats: iter.into_iter().collect(),
        }
    }
}
