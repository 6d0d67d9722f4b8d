use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::ReviewError;

/// An open (or closed) holding of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    /// Explicit stop, possibly trailed above entry. `None` means the
    /// default stop distance applies.
    pub stop_loss: Option<f64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn new(
        user_id: String,
        symbol: String,
        quantity: f64,
        entry_price: f64,
        stop_loss: Option<f64>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            symbol: symbol.to_uppercase(),
            quantity,
            entry_price,
            stop_loss,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Cheap local sanity checks run before any external call.
    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.symbol.trim().is_empty() {
            return Err(ReviewError::Validation(format!("position {} has no symbol", self.id)));
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(ReviewError::Validation(format!(
                "position {} has non-positive quantity {}",
                self.id, self.quantity
            )));
        }
        if !(self.entry_price.is_finite() && self.entry_price > 0.0) {
            return Err(ReviewError::Validation(format!(
                "position {} has non-positive entry price {}",
                self.id, self.entry_price
            )));
        }
        Ok(())
    }

    /// Effective stop price given the default stop distance (fraction).
    pub fn effective_stop(&self, default_stop_fraction: f64) -> f64 {
        self.stop_loss
            .unwrap_or(self.entry_price * (1.0 - default_stop_fraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_quantity() {
        let p = Position::new("u1".into(), "btc".into(), 0.0, 100.0, None);
        assert!(matches!(p.validate(), Err(ReviewError::Validation(_))));
    }

    #[test]
    fn test_symbol_uppercased_and_default_stop() {
        let p = Position::new("u1".into(), "ethusdt".into(), 1.0, 200.0, None);
        assert_eq!(p.symbol, "ETHUSDT");
        assert!((p.effective_stop(0.1) - 180.0).abs() < 1e-9);
        assert!(p.validate().is_ok());
    }
}
