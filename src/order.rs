//! The raw two-asset trade as ingested, and the order splitter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::asset::Asset;
use crate::error::{Error, Result};
use crate::transaction::{Side, Transaction};

/// Truncates `value` to the minor-unit granularity of `asset`, matching the
/// original source's `int(total / smallest_unit) * smallest_unit` — integer
/// division truncates toward zero, not round-to-nearest.
fn round_to_minor_units(value: Decimal, asset: &Asset) -> Decimal {
    let quantum = asset.smallest_unit();
    if quantum.is_zero() {
        return value;
    }
    (value / quantum).trunc() * quantum
}

/// A raw two-asset trade as ingested. By convention `amount` is
/// denominated in `market_1` units and `total` in `market_2` units.
#[derive(Debug, Clone)]
pub struct Order {
    pub date: DateTime<Utc>,
    pub market_1: Asset,
    pub market_2: Asset,
    pub kind: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee: Decimal,
    pub fee_asset: Asset,
    pub spot_1_fiat: Decimal,
    pub spot_2_fiat: Decimal,
    pub fee_spot_fiat: Decimal,
}

impl Order {
    pub fn total(&self) -> Decimal {
        round_to_minor_units(self.amount * self.price, &self.market_2)
    }
}

/// Decomposes an [`Order`] into a buy leg and a sell leg.
///
/// | kind | buy asset | buy amount | sell asset | sell amount | fee goes to |
/// |------|-----------|------------|------------|-------------|-------------|
/// | BUY  | market_1  | amount     | market_2   | total       | buy_txn     |
/// | SELL | market_2  | total      | market_1   | amount      | sell_txn    |
pub fn split_order(order: &Order) -> Result<(Transaction, Transaction)> {
    let total = order.total();

    if order.market_1.is_fiat() && order.market_2.is_fiat() {
        return Err(Error::InvariantViolation {
            detail: "an order cannot trade fiat for fiat".to_owned(),
        });
    }

    let (buy_fee, sell_fee) = match order.kind {
        Side::Buy => (order.fee, Decimal::ZERO),
        Side::Sell => (Decimal::ZERO, order.fee),
    };

    let buy_txn = match order.kind {
        Side::Buy => Transaction::new(
            order.date,
            order.market_1.clone(),
            Side::Buy,
            order.amount,
            order.spot_1_fiat,
            buy_fee,
            order.fee_asset.clone(),
            order.fee_spot_fiat,
        )?,
        Side::Sell => Transaction::new(
            order.date,
            order.market_2.clone(),
            Side::Buy,
            total,
            order.spot_2_fiat,
            buy_fee,
            order.fee_asset.clone(),
            order.fee_spot_fiat,
        )?,
    };

    let sell_txn = match order.kind {
        Side::Buy => Transaction::new(
            order.date,
            order.market_2.clone(),
            Side::Sell,
            total,
            order.spot_2_fiat,
            sell_fee,
            order.fee_asset.clone(),
            order.fee_spot_fiat,
        )?,
        Side::Sell => Transaction::new(
            order.date,
            order.market_1.clone(),
            Side::Sell,
            order.amount,
            order.spot_1_fiat,
            sell_fee,
            order.fee_asset.clone(),
            order.fee_spot_fiat,
        )?,
    };

    Ok((buy_txn, sell_txn))
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
    fn buy_order_attaches_fee_to_the_buy_leg() {
        let order = Order {
            date: Utc::now(),
            market_1: eth(),
            market_2: usd(),
            kind: Side::Buy,
            price: dec!(1000),
            amount: dec!(5),
            fee: dec!(10),
            fee_asset: usd(),
            spot_1_fiat: dec!(1000),
            spot_2_fiat: dec!(1),
            fee_spot_fiat: dec!(1),
        };

        let (buy_txn, sell_txn) = split_order(&order).unwrap();
        assert_eq!(buy_txn.asset.ticker, "ETH");
        assert_eq!(buy_txn.amount, dec!(5));
        assert_eq!(buy_txn.fee, dec!(10));
        assert_eq!(sell_txn.asset.ticker, "USD");
        assert_eq!(sell_txn.amount, dec!(5000));
        assert_eq!(sell_txn.fee, Decimal::ZERO);
    }

    #[test]
    fn sell_order_attaches_fee_to_the_sell_leg() {
        let order = Order {
            date: Utc::now(),
            market_1: eth(),
            market_2: usd(),
            kind: Side::Sell,
            price: dec!(1200),
            amount: dec!(4),
            fee: dec!(5),
            fee_asset: usd(),
            spot_1_fiat: dec!(1200),
            spot_2_fiat: dec!(1),
            fee_spot_fiat: dec!(1),
        };

        let (buy_txn, sell_txn) = split_order(&order).unwrap();
        assert_eq!(buy_txn.asset.ticker, "USD");
        assert_eq!(buy_txn.amount, dec!(4800));
        assert_eq!(buy_txn.fee, Decimal::ZERO);
        assert_eq!(sell_txn.asset.ticker, "ETH");
        assert_eq!(sell_txn.amount, dec!(4));
        assert_eq!(sell_txn.fee, dec!(5));
    }

    #[test]
    fn fiat_for_fiat_order_is_an_invariant_violation() {
        let order = Order {
            date: Utc::now(),
            market_1: usd(),
            market_2: Asset::new("Euro", "EUR", true, 2),
            kind: Side::Buy,
            price: dec!(1.1),
            amount: dec!(100),
            fee: Decimal::ZERO,
            fee_asset: usd(),
            spot_1_fiat: dec!(1),
            spot_2_fiat: dec!(1.1),
            fee_spot_fiat: dec!(1),
        };
        assert!(split_order(&order).is_err());
    }
}
