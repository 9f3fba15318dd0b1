//! The order execution driver and sell matcher.

use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;

use crate::asset::Asset;
use crate::error::{Error, Result};
use crate::lot::Lot;
use crate::order::{split_order, Order};
use crate::registry::{LotRegistry, SortKey};
use crate::transaction::{Side, Transaction};

/// Lot-selection strategy for the sell matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fifo,
    Lifo,
}

impl Strategy {
    pub fn from_str(label: &str) -> Result<Self> {
        match label.to_ascii_uppercase().as_str() {
            "FIFO" => Ok(Strategy::Fifo),
            "LIFO" => Ok(Strategy::Lifo),
            other => Err(Error::IncorrectPoolFormat {
                detail: format!("unrecognized ordering strategy: {other}"),
            }),
        }
    }
}

/// Processes a full orderbook, sorted ascending by date. Fiat-fiat
/// legs never create or close lots; buy legs into fiat are skipped entirely.
pub fn execute_orderbook(
    orders: &[Order],
    registry: &mut LotRegistry,
    strategy: Strategy,
) -> Result<()> {
    for order in orders {
        execute_order(order, registry, strategy)?;
    }
    Ok(())
}

/// Executes one order: splits into legs, closing open lots on the sell leg
/// and opening a new lot on the buy leg, in that order.
pub fn execute_order(order: &Order, registry: &mut LotRegistry, strategy: Strategy) -> Result<()> {
    let (buy_txn, sell_txn) = split_order(order)?;

    if !sell_txn.asset.is_fiat() && sell_txn.amount > Decimal::ZERO {
        execute_sell(&sell_txn, registry, strategy)?;
    }

    if !buy_txn.asset.is_fiat() && buy_txn.amount > Decimal::ZERO {
        let lot = Lot::open(
            buy_txn.asset.clone(),
            buy_txn.amount,
            buy_txn.timestamp,
            buy_txn.amount_fiat(),
            buy_txn.fee_fiat(),
        );
        registry.push(lot);
    }

    Ok(())
}

/// Consumes one sell transaction, closing sufficient open lots of the sold
/// asset per the configured strategy, splitting and recursing as needed.
pub fn execute_sell(
    sell_txn: &Transaction,
    registry: &mut LotRegistry,
    strategy: Strategy,
) -> Result<()> {
    debug!(
        "execute_sell asset={} amount={} date={}",
        sell_txn.asset.ticker, sell_txn.amount, sell_txn.timestamp
    );

    let mut candidates: Vec<usize> = (0..registry.len())
        .filter(|&i| {
            let lot = registry.get(i).unwrap();
            !lot.closed() && lot.asset.ticker.eq_ignore_ascii_case(&sell_txn.asset.ticker)
        })
        .collect();

    if candidates.is_empty() {
        return Err(Error::NoMatchingPool {
            ticker: sell_txn.asset.ticker.clone(),
            date: sell_txn.timestamp,
        });
    }

    match strategy {
        Strategy::Fifo => candidates.sort_by_key(|&i| registry.get(i).unwrap().purchase_date),
        // A single stable descending sort, not an ascending sort followed by
        // `reverse()`: `reverse()` flips the whole vector, so equal-date
        // lots would end up in reverse-insertion order (most recently
        // inserted first). Sorting directly by descending date is stable,
        // so equal-date lots keep insertion order, matching spec §4.6's
        // "stable by insertion order" tie-break.
        Strategy::Lifo => candidates.sort_by(|&a, &b| {
            registry.get(b).unwrap().purchase_date.cmp(&registry.get(a).unwrap().purchase_date)
        }),
    }
    let matched_index = candidates[0];
    let matched = registry.get(matched_index).unwrap().clone();

    let mut sell_amount = sell_txn.amount;
    let mut delta = sell_amount - matched.amount;

    // Dust rounding: snap a near-exact match to exact.
    let fraction = (delta / sell_amount).abs();
    if fraction < rust_decimal_macros::dec!(0.01)
        && (delta.abs() * sell_txn.spot_fiat) < Decimal::ONE
    {
        sell_amount = matched.amount;
        delta = Decimal::ZERO;
    }

    if delta == Decimal::ZERO {
        // Exact match: close the matched lot outright.
        let mut closed = matched;
        closed.close(sell_txn.timestamp, sell_txn.amount_fiat(), sell_txn.fee_fiat());
        registry.set(matched_index, closed);
        return Ok(());
    }

    if delta < Decimal::ZERO {
        // Matched lot has surplus: split off the sold portion and close it,
        // leaving the remainder open.
        let (sold_part, remainder) = matched.split(sell_amount);
        let mut closed = sold_part;
        closed.close(sell_txn.timestamp, sell_txn.amount_fiat(), sell_txn.fee_fiat());
        registry.set(matched_index, closed);
        registry.push(remainder);
        return Ok(());
    }

    // delta > 0: the matched lot is insufficient. Close it entirely against
    // a fractional slice of the sale, assigning the *entire* sell fee to
    // this first closure, then recurse on the remainder.
    let matched_fraction = matched.amount / sell_amount;
    let mut closed = matched;
    let id = closed.id;
    let sale_value = sell_txn.amount_fiat() * matched_fraction;
    closed.close(sell_txn.timestamp, sale_value, sell_txn.fee_fiat());
    registry.set(matched_index, closed);
    debug!("lot {id} insufficient, recursing on residual delta={delta}");

    let residual = Transaction::new(
        sell_txn.timestamp,
        sell_txn.asset.clone(),
        Side::Sell,
        delta,
        sell_txn.spot_fiat,
        Decimal::ZERO,
        sell_txn.fee_asset.clone(),
        sell_txn.fee_spot_fiat,
    )?;
    execute_sell(&residual, registry, strategy)
}

/// Returns a copy of `registry` sorted by purchase date; convenience for
/// callers projecting a driver run's output (`execute_orderbook` itself
/// mutates lots in insertion order and does not re-sort).
pub fn sorted_by_purchase(registry: &LotRegistry) -> LotRegistry {
    let mut out = registry.clone();
    out.sort(SortKey::PurchaseDate);
    out
}
