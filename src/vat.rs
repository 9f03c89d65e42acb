//! VAT calculator behind the public site

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::constants::vat::MAX_RATE_PERCENT;

/// What the entered amount is
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VatMode {
    /// Amount is the net price; VAT is added on top
    Add,
    /// Amount is the gross total; VAT is taken out
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VatError {
    #[error("Please enter a valid VAT rate (0-100%)")]
    InvalidRate,
    #[error("Please enter a valid net price")]
    InvalidNetPrice,
    #[error("Please enter a valid total price")]
    InvalidTotalPrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VatBreakdown {
    pub net: f64,
    pub vat: f64,
    pub total: f64,
    pub rate_percent: f64,
}

impl VatBreakdown {
    /// Amounts rounded to cents, as shown to visitors
    pub fn rounded(&self) -> (f64, f64, f64) {
        (round_cents(self.net), round_cents(self.vat), round_cents(self.total))
    }
}

impl fmt::Display for VatBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Net amount:  {:.2}", self.net)?;
        writeln!(f, "VAT ({}%):  {:.2}", self.rate_percent, self.vat)?;
        write!(f, "Total:       {:.2}", self.total)
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn calculate(amount: f64, rate_percent: f64, mode: VatMode) -> Result<VatBreakdown, VatError> {
    if !rate_percent.is_finite() || rate_percent <= 0.0 || rate_percent > MAX_RATE_PERCENT {
        return Err(VatError::InvalidRate);
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(match mode {
            VatMode::Add => VatError::InvalidNetPrice,
            VatMode::Remove => VatError::InvalidTotalPrice,
        });
    }

    let rate = rate_percent / 100.0;
    let (net, vat, total) = match mode {
        VatMode::Add => {
            let vat = amount * rate;
            (amount, vat, amount + vat)
        }
        VatMode::Remove => {
            let net = amount / (1.0 + rate);
            (net, amount - net, amount)
        }
    };

    Ok(VatBreakdown {
        net,
        vat,
        total,
        rate_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_vat() {
        let breakdown = calculate(100.0, 20.0, VatMode::Add).unwrap();
        assert_eq!(breakdown.rounded(), (100.0, 20.0, 120.0));
    }

    #[test]
    fn test_remove_vat() {
        let breakdown = calculate(120.0, 20.0, VatMode::Remove).unwrap();
        assert_eq!(breakdown.rounded(), (100.0, 20.0, 120.0));
    }

    #[test]
    fn test_display_uses_two_decimals() {
        let breakdown = calculate(10.0, 7.7, VatMode::Add).unwrap();
        let shown = breakdown.to_string();
        assert!(shown.contains("Net amount:  10.00"));
        assert!(shown.contains("VAT (7.7%):  0.77"));
        assert!(shown.contains("Total:       10.77"));
    }

    #[test]
    fn test_rejects_bad_rate() {
        for rate in [0.0, -5.0, 100.5, f64::NAN] {
            assert_eq!(calculate(100.0, rate, VatMode::Add), Err(VatError::InvalidRate));
        }
        assert!(calculate(100.0, 100.0, VatMode::Add).is_ok());
    }

    #[test]
    fn test_rejects_bad_amount_per_mode() {
        assert_eq!(calculate(0.0, 20.0, VatMode::Add), Err(VatError::InvalidNetPrice));
        assert_eq!(calculate(-1.0, 20.0, VatMode::Remove), Err(VatError::InvalidTotalPrice));
        assert_eq!(
            VatError::InvalidRate.to_string(),
            "Please enter a valid VAT rate (0-100%)"
        );
    }
}
