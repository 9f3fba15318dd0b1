//! The wash-sale resolver: a fixed-point pass applying wash-sale loss
//! disallowance and holding-period carryover to the lot registry.

use log::debug;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::registry::LotRegistry;

/// Runs `execute_wash` to a fixed point: repeats until no `potential_wash`
/// lot has a qualifying replacement.
pub fn execute_washes(registry: &mut LotRegistry) -> Result<()> {
    loop {
        let mut candidates: Vec<usize> = (0..registry.len())
            .filter(|&i| registry.get(i).unwrap().potential_wash())
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }

        candidates.sort_by_key(|&i| registry.get(i).unwrap().sale_date);

        let mut matched = false;
        for loss_index in candidates {
            if let Some(trigger_index) = find_wash_match(registry, loss_index) {
                execute_wash(registry, loss_index, trigger_index)?;
                matched = true;
                break;
            }
        }

        if !matched {
            // Every remaining potential_wash lot has no qualifying
            // replacement; nothing more can be done.
            return Ok(());
        }
    }
}

/// Among lots with the same asset as `registry[loss_index]`, sorted by
/// purchase date ascending, finds the first lot whose purchase date is
/// within the loss lot's wash window, on or after the sale date, and whose
/// `triggers_id` is still unset.
fn find_wash_match(registry: &LotRegistry, loss_index: usize) -> Option<usize> {
    let loss = registry.get(loss_index).unwrap();

    let mut candidates: Vec<usize> = (0..registry.len())
        .filter(|&i| {
            if i == loss_index {
                return false;
            }
            let lot = registry.get(i).unwrap();
            lot.asset.ticker.eq_ignore_ascii_case(&loss.asset.ticker)
                && lot.wash.triggers_id.is_none()
                && loss.within_wash_window(lot.purchase_date)
        })
        .collect();

    candidates.sort_by_key(|&i| registry.get(i).unwrap().purchase_date);
    candidates.into_iter().next()
}

/// Pairs loss lot `loss_index` with replacement `trigger_index`, splitting
/// either side if their amounts differ, then transfers the disallowed loss
/// and holding period.
fn execute_wash(registry: &mut LotRegistry, loss_index: usize, trigger_index: usize) -> Result<()> {
    let mut loss = registry.get(loss_index).unwrap().clone();
    let mut trigger = registry.get(trigger_index).unwrap().clone();

    let loss_amt = loss.amount;
    let trigger_amt = trigger.amount;
    let mut delta = trigger_amt - loss_amt;

    // Dust check analogous to the sell matcher's.
    let fraction = (delta / loss_amt).abs();
    let sale_value = loss.sale_value_fiat;
    if fraction < rust_decimal_macros::dec!(0.01) && (loss_amt * fraction * sale_value) < Decimal::ONE
    {
        delta = Decimal::ZERO;
    }

    debug!(
        "execute_wash loss={} trigger={} delta={}",
        loss.id, trigger.id, delta
    );

    if delta > Decimal::ZERO {
        // Replacement is larger than the loss: split off the excess,
        // leaving the trigger at exactly `loss_amt`.
        let (retained, fragment) = trigger.split(loss_amt);
        trigger = retained;
        registry.push(fragment);
    } else if delta < Decimal::ZERO {
        // Loss is larger than the replacement: split the loss lot. The
        // portion sized `trigger_amt` keeps the loss lot's id and becomes
        // the paired wash lot; the remainder re-enters the fixed point.
        let (paired, remainder) = loss.split(trigger_amt);
        loss = paired;
        registry.push(remainder);
    }

    let loss_net_gain_before = loss.net_gain().ok_or_else(|| Error::InvariantViolation {
        detail: "wash pairing requires a closed loss lot".to_owned(),
    })?;

    loss.wash.triggered_by_id = Some(trigger.id);
    loss.wash.disallowed_loss_fiat = -loss_net_gain_before;

    trigger.wash.triggers_id = Some(loss.id);
    trigger.wash.addition_to_cost_fiat = loss.wash.disallowed_loss_fiat;
    trigger.wash.holding_period_modifier = loss.holding_period().ok_or_else(|| {
        Error::InvariantViolation {
            detail: "wash pairing requires a closed loss lot".to_owned(),
        }
    })?;

    let post_net_gain = loss.net_gain().unwrap().round_dp(2);
    if post_net_gain != Decimal::ZERO {
        return Err(Error::InvariantViolation {
            detail: format!("wash pairing failed to zero net gain, got {post_net_gain}"),
        });
    }

    // The loss and trigger indices may have shifted relative to each other
    // only in value, not position: both were read before any push, so their
    // original indices remain valid slots to overwrite.
    registry.set(loss_index, loss);
    registry.set(trigger_index, trigger);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::engine::{execute_orderbook, Strategy};
    use crate::order::Order;
    use crate::transaction::Side;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn eth() -> Asset {
        Asset::new("Ethereum", "ETH", true, 18)
    }

    fn usd() -> Asset {
        Asset::new("US Dollar", "USD", true, 2)
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn order(kind: Side, amount: Decimal, price: Decimal, when: DateTime<Utc>) -> Order {
        Order {
            date: when,
            market_1: eth(),
            market_2: usd(),
            kind,
            price,
            amount,
            fee: Decimal::ZERO,
            fee_asset: usd(),
            spot_1_fiat: price,
            spot_2_fiat: Decimal::ONE,
            fee_spot_fiat: Decimal::ONE,
        }
    }

    // Simple wash: a loss lot paired against a split of the replacement buy.
    #[test]
    fn scenario_s3_simple_wash_splits_the_replacement() {
        let orders = vec![
            order(Side::Buy, dec!(5), dec!(1000), date(2022, 1, 1)),
            order(Side::Sell, dec!(5), dec!(900), date(2022, 1, 10)),
            order(Side::Buy, dec!(6), dec!(1000), date(2022, 1, 15)),
            order(Side::Sell, dec!(6), dec!(1100), date(2022, 2, 1)),
        ];
        let mut reg = LotRegistry::new();
        let gain_before = {
            execute_orderbook(&orders, &mut reg, Strategy::Fifo).unwrap();
            reg.closed().net_gain()
        };
        assert_eq!(gain_before, dec!(-50));

        execute_washes(&mut reg).unwrap();

        assert_eq!(reg.closed().net_gain(), dec!(-50));
        assert_eq!(reg.disallowed_loss(), dec!(500));
        let washed = reg.wash();
        assert_eq!(washed.len(), 1);
        assert_eq!(washed.get(0).unwrap().net_gain().unwrap().round_dp(2), Decimal::ZERO);
    }

    // Same-day wash nets the disallowed loss back to zero gain.
    #[test]
    fn scenario_s5_same_day_wash_nets_to_zero() {
        let orders = vec![
            order(Side::Buy, dec!(5), dec!(1000), date(2022, 1, 1)),
            order(Side::Sell, dec!(5), dec!(900), date(2022, 1, 10)),
            order(Side::Buy, dec!(5), dec!(900), date(2022, 1, 10)),
            order(Side::Sell, dec!(5), dec!(1000), date(2022, 2, 1)),
        ];
        let mut reg = LotRegistry::new();
        execute_orderbook(&orders, &mut reg, Strategy::Fifo).unwrap();
        assert_eq!(reg.closed().net_gain(), dec!(0));

        execute_washes(&mut reg).unwrap();

        assert_eq!(reg.closed().net_gain(), dec!(0));
        for lot in reg.closed().iter() {
            assert_eq!(lot.net_gain().unwrap().round_dp(2), Decimal::ZERO);
        }
    }

    // Chain wash cascading through two pairings.
    #[test]
    fn scenario_s4_chain_wash_preserves_aggregate_net_gain() {
        let orders = vec![
            order(Side::Buy, dec!(5), dec!(1000), date(2022, 1, 1)),
            order(Side::Sell, dec!(5), dec!(900), date(2022, 1, 5)),
            order(Side::Buy, dec!(5), dec!(1000), date(2022, 1, 10)),
            order(Side::Sell, dec!(5), dec!(900), date(2022, 1, 15)),
            order(Side::Buy, dec!(5), dec!(1000), date(2022, 1, 20)),
            order(Side::Sell, dec!(5), dec!(500), date(2022, 1, 25)),
        ];
        let mut reg = LotRegistry::new();
        execute_orderbook(&orders, &mut reg, Strategy::Fifo).unwrap();
        let gain_before = reg.closed().net_gain();

        execute_washes(&mut reg).unwrap();

        assert_eq!(reg.closed().net_gain(), gain_before);
        assert!(reg.disallowed_loss() > Decimal::ZERO);
    }

    #[test]
    fn non_fungible_assets_are_never_paired() {
        let mut reg = LotRegistry::new();
        let mut nft = crate::lot::Lot::open(
            Asset::new("CryptoPunk #1", "PUNK1", false, 0),
            dec!(1),
            date(2022, 1, 1),
            dec!(5000),
            dec!(0),
        );
        nft.close(date(2022, 1, 10), dec!(1), dec!(0));
        reg.push(nft);
        execute_washes(&mut reg).unwrap();
        assert!(!reg.get(0).unwrap().wash.is_wash());
    }
}
