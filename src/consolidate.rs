//! Groups same-day, same-asset, same-classification lots for reporting.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lot::Lot;
use crate::registry::LotRegistry;
use crate::time::various_dates_marker;

fn rounded_to_cent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Grouping key: (ticker, sale day, wash flag, long/short term).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    ticker: String,
    sale_day: NaiveDate,
    is_wash: bool,
    long_term: bool,
}

fn group_key(lot: &Lot) -> GroupKey {
    GroupKey {
        ticker: lot.asset.ticker.clone(),
        sale_day: lot.sale_date.unwrap().date_naive(),
        is_wash: lot.wash.is_wash(),
        long_term: lot.long_term().unwrap(),
    }
}

/// Consolidates the closed lots of `registry` into one synthetic lot per
/// (asset, sale day, wash, term) group. Open lots pass through unchanged.
/// Raises `InvariantViolation` if the consolidated aggregates diverge from
/// the pre-consolidation aggregates by more than a cent.
pub fn consolidate(registry: &LotRegistry) -> Result<LotRegistry> {
    let pre_proceeds = registry.closed().proceeds();
    let pre_cost_basis = registry.closed().cost_basis();
    let pre_disallowed_loss = registry.disallowed_loss();
    let pre_net_gain = registry.closed().net_gain();

    let mut groups: BTreeMap<GroupKey, Vec<&Lot>> = BTreeMap::new();
    let mut out = LotRegistry::new();

    for lot in registry.iter() {
        if !lot.closed() {
            out.push(lot.clone());
            continue;
        }
        groups.entry(group_key(lot)).or_default().push(lot);
    }

    for (key, lots) in groups {
        out.push(consolidate_group(&key, &lots));
    }

    let post_proceeds = out.closed().proceeds();
    let post_cost_basis = out.closed().cost_basis();
    let post_disallowed_loss = out.disallowed_loss();
    let post_net_gain = out.closed().net_gain();

    if (post_proceeds - pre_proceeds).abs() > Decimal::new(1, 2)
        || (post_cost_basis - pre_cost_basis).abs() > Decimal::new(1, 2)
        || (post_disallowed_loss - pre_disallowed_loss).abs() > Decimal::new(1, 2)
        || (post_net_gain - pre_net_gain).abs() > Decimal::new(1, 2)
    {
        return Err(Error::InvariantViolation {
            detail: "consolidation changed an aggregate beyond rounding tolerance".to_owned(),
        });
    }

    Ok(out)
}

fn consolidate_group(key: &GroupKey, lots: &[&Lot]) -> Lot {
    let first = lots[0];
    let distinct_purchase_days: std::collections::BTreeSet<NaiveDate> =
        lots.iter().map(|lot| lot.purchase_date.date_naive()).collect();

    let purchase_date = if distinct_purchase_days.len() > 1 {
        various_dates_marker()
    } else {
        first.purchase_date
    };

    let amount: Decimal = lots.iter().map(|lot| lot.amount).sum();
    let purchase_cost_fiat: Decimal =
        rounded_to_cent(lots.iter().map(|lot| lot.purchase_cost_fiat).sum());
    let purchase_fee_fiat: Decimal =
        rounded_to_cent(lots.iter().map(|lot| lot.purchase_fee_fiat).sum());
    let sale_value_fiat: Decimal = rounded_to_cent(lots.iter().map(|lot| lot.sale_value_fiat).sum());
    let sale_fee_fiat: Decimal = rounded_to_cent(lots.iter().map(|lot| lot.sale_fee_fiat).sum());
    let addition_to_cost_fiat: Decimal =
        rounded_to_cent(lots.iter().map(|lot| lot.wash.addition_to_cost_fiat).sum());
    let disallowed_loss_fiat: Decimal =
        rounded_to_cent(lots.iter().map(|lot| lot.wash.disallowed_loss_fiat).sum());

    let sale_date = first.sale_date.unwrap();

    // `Lot::wash.is_wash()` keys off `triggered_by_id` alone, so the
    // synthetic lot needs one to stay flagged through consolidation
    // (spec.md §4.9; matches the original's `"Wash Sale": "W"` carried onto
    // the grouped row in `util/util.py`). Every member of a `is_wash` group
    // already carries a `triggered_by_id`, so the first member's stands in.
    let triggered_by_id = key.is_wash.then(|| first.wash.triggered_by_id.unwrap());

    let mut merged = Lot {
        id: Uuid::new_v4(),
        asset: first.asset.clone(),
        amount,
        purchase_date,
        purchase_cost_fiat,
        purchase_fee_fiat,
        sale_date: Some(sale_date),
        sale_value_fiat,
        sale_fee_fiat,
        wash: crate::lot::Wash {
            triggered_by_id,
            triggers_id: None,
            addition_to_cost_fiat,
            disallowed_loss_fiat,
            holding_period_modifier: chrono::Duration::zero(),
        },
    };

    // The purchase date may have collapsed to the "Various Dates" sentinel,
    // which would otherwise corrupt the derived holding period. Fold the
    // difference into the modifier so the synthetic lot's holding period
    // (and hence its SHORT/LONG term) matches the representative member's
    // actual holding period exactly.
    let representative_days = first.holding_period().unwrap().num_days();
    let actual_days = merged.holding_period().unwrap().num_days();
    merged.wash.holding_period_modifier =
        chrono::Duration::days(representative_days - actual_days);

    merged
}
