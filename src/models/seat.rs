use serde::{Deserialize, Serialize};
use std::fmt;

/// Непрозрачный идентификатор места, уникальный в пределах сеанса.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(String);

impl SeatId {
    pub fn new(id: impl Into<String>) -> Self {
        SeatId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SeatId {
    fn from(id: &str) -> Self {
        SeatId(id.to_string())
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Категория места, определяет цену.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatCategory {
    Normal,
    Premium,
    Recliner,
}

/// Статус места. Источник истины - сервер; `LockedBySelf` ставится
/// локально между успешной блокировкой и подтверждением/сбросом/истечением.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatStatus {
    Available,
    LockedByOther,
    LockedBySelf,
    Booked,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SeatStatus::Available => "available",
            SeatStatus::LockedByOther => "locked-by-other",
            SeatStatus::LockedBySelf => "locked-by-self",
            SeatStatus::Booked => "booked",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    /// Подпись для зала, например "A12".
    pub number: String,
    pub category: SeatCategory,
    pub status: SeatStatus,
}

impl Seat {
    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }
}

/// Место в том виде, в котором его отдаёт API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatDto {
    pub id: SeatId,
    pub number: String,
    #[serde(rename = "type")]
    pub category: SeatCategory,
    #[serde(default)]
    pub booked: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_by_me: bool,
}

impl From<SeatDto> for Seat {
    fn from(dto: SeatDto) -> Self {
        let status = if dto.booked {
            SeatStatus::Booked
        } else if dto.locked && dto.locked_by_me {
            SeatStatus::LockedBySelf
        } else if dto.locked {
            SeatStatus::LockedByOther
        } else {
            SeatStatus::Available
        };

        Seat {
            id: dto.id,
            number: dto.number,
            category: dto.category,
            status,
        }
    }
}
