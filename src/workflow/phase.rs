use serde::{Deserialize, Serialize};
use std::fmt;

/// Фаза сессии бронирования. Служит и защитой от повторного входа:
/// операция, чья входная фаза не совпадает с текущей, сразу отклоняется.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Сеанс не выбран.
    Idle,
    /// Загружается карта мест.
    Loading,
    /// Карта загружена, выбор мест можно менять.
    Browsing,
    /// Запрос блокировки в полёте.
    Locking,
    /// Блокировка удерживается, ждём подтверждения.
    Locked,
    /// Запрос подтверждения в полёте.
    Confirming,
    /// Бронирование выдано. Терминальная фаза сессии.
    Confirmed,
    /// Карта мест не загрузилась; доступен `retry`.
    Failed,
}

impl Phase {
    /// Есть ли запрос к API, ответ на который ещё не пришёл.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Loading | Phase::Locking | Phase::Confirming)
    }

    /// Фаза, в которой можно продолжить сессию после восстановления из хранилища:
    /// ответы на запросы, бывшие в полёте, уже не придут.
    pub fn settled(self) -> Phase {
        match self {
            Phase::Loading => Phase::Failed,
            Phase::Locking => Phase::Browsing,
            Phase::Confirming => Phase::Locked,
            other => other,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Browsing => "browsing",
            Phase::Locking => "locking",
            Phase::Locked => "locked",
            Phase::Confirming => "confirming",
            Phase::Confirmed => "confirmed",
            Phase::Failed => "failed",
        };
        f.write_str(label)
    }
}
