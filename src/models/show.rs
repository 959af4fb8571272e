use serde::{Deserialize, Serialize};
use std::fmt;

use super::SeatCategory;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShowId(String);

impl ShowId {
    pub fn new(id: impl Into<String>) -> Self {
        ShowId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ShowId {
    fn from(id: &str) -> Self {
        ShowId(id.to_string())
    }
}

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Цены сеанса по категориям, в минимальных единицах валюты.
/// Не меняются, пока сеанс загружен.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowPricing {
    #[serde(rename = "priceNormal")]
    pub normal: u64,
    #[serde(rename = "pricePremium")]
    pub premium: u64,
    #[serde(rename = "priceRecliner")]
    pub recliner: u64,
}

impl ShowPricing {
    pub fn price_of(&self, category: SeatCategory) -> u64 {
        match category {
            SeatCategory::Normal => self.normal,
            SeatCategory::Premium => self.premium,
            SeatCategory::Recliner => self.recliner,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theatre {
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
}

/// Сеанс, полученный слоем представления до входа в выбор мест.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    #[serde(default)]
    pub timing: Option<String>,
    #[serde(default)]
    pub screen: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub theatre: Option<Theatre>,
    #[serde(flatten)]
    pub pricing: ShowPricing,
}

impl Show {
    pub fn new(id: impl Into<String>, pricing: ShowPricing) -> Self {
        Show {
            id: ShowId::new(id),
            timing: None,
            screen: None,
            date: None,
            theatre: None,
            pricing,
        }
    }
}
