//! The transaction half-order produced by the order splitter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::error::{Error, Result};

/// One side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "sell")]
    Sell,
}

impl Side {
    pub fn from_str(label: &str) -> Result<Self> {
        match label.to_ascii_lowercase().as_str() {
            "b" | "buy" => Ok(Side::Buy),
            "s" | "sell" => Ok(Side::Sell),
            other => Err(Error::IncorrectPoolFormat {
                detail: format!("unrecognized transaction side: {other}"),
            }),
        }
    }
}

/// An immutable record of one side of a trade (a half-order).
#[derive(Debug, Clone)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    pub asset: Asset,
    pub side: Side,
    pub amount: Decimal,
    pub spot_fiat: Decimal,
    pub fee: Decimal,
    pub fee_asset: Asset,
    pub fee_spot_fiat: Decimal,
}

impl Transaction {
    pub fn new(
        timestamp: DateTime<Utc>,
        asset: Asset,
        side: Side,
        amount: Decimal,
        spot_fiat: Decimal,
        fee: Decimal,
        fee_asset: Asset,
        fee_spot_fiat: Decimal,
    ) -> Result<Self> {
        if asset.is_fiat() && fee != Decimal::ZERO {
            return Err(Error::InvariantViolation {
                detail: format!(
                    "fee must be zero when the transaction asset ({}) is fiat",
                    asset.ticker
                ),
            });
        }

        Ok(Self {
            timestamp,
            asset,
            side,
            amount,
            spot_fiat,
            fee,
            fee_asset,
            fee_spot_fiat,
        })
    }

    pub fn amount_fiat(&self) -> Decimal {
        self.amount * self.spot_fiat
    }

    pub fn fee_fiat(&self) -> Decimal {
        self.fee * self.fee_spot_fiat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eth() -> Asset {
        Asset::new("Ethereum", "ETH", true, 18)
    }

    fn usd() -> Asset {
        Asset::new("US Dollar", "USD", true, 2)
    }

    #[test]
    fn fiat_asset_with_nonzero_fee_is_rejected() {
        let result = Transaction::new(
            Utc::now(),
            usd(),
            Side::Buy,
            dec!(100),
            dec!(1),
            dec!(1),
            usd(),
            dec!(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn derived_fiat_amounts_multiply_spot() {
        let txn = Transaction::new(
            Utc::now(),
            eth(),
            Side::Buy,
            dec!(5),
            dec!(1000),
            dec!(0.01),
            eth(),
            dec!(1000),
        )
        .unwrap();
        assert_eq!(txn.amount_fiat(), dec!(5000));
        assert_eq!(txn.fee_fiat(), dec!(10));
    }
}
