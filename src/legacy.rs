//! Legacy v1 pool import: a prior format with separate purchase- and
//! sale-pool tables keyed by integer pool ids. Integer ids are remapped to
//! fresh UUIDs so cross-references (`triggers_id` / `triggered_by_id`)
//! between the two tables keep resolving, mirroring the original
//! `convert_v1_ids` / `convert_purchase_v1_ids` / `convert_sale_v1_ids`
//! trio, collapsed here into one pass per table plus two shared id maps.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::asset::AssetRegistry;
use crate::error::Result;
use crate::lot::{Lot, Wash};
use crate::registry::LotRegistry;

/// A still-open position in the v1 purchase-pool table.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyPurchaseRow {
    pub id: u64,
    pub asset: String,
    pub amount: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub purchase_cost_fiat: Decimal,
    pub purchase_fee_fiat: Decimal,
    /// Id of a v1 sale-pool row whose disallowed loss was rolled into this
    /// purchase, if any.
    pub triggers_id: Option<u64>,
}

/// A closed position in the v1 sale-pool table. `holding_period_days` is
/// the v1 *total* holding period (purchase-to-sale plus any wash carry),
/// unlike the current format's `holding_period_modifier`, which stores only
/// the carried-over delta.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacySaleRow {
    pub id: u64,
    pub asset: String,
    pub amount: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub purchase_cost_fiat: Decimal,
    pub purchase_fee_fiat: Decimal,
    pub sale_date: DateTime<Utc>,
    pub sale_value_fiat: Decimal,
    pub sale_fee_fiat: Decimal,
    pub disallowed_loss_fiat: Decimal,
    pub holding_period_days: i64,
    /// Id of a v1 purchase-pool row that absorbed this sale's disallowed
    /// loss, if any.
    pub triggered_by_id: Option<u64>,
}

/// Imports a v1 purchase-pool/sale-pool pair into a current-format
/// [`LotRegistry`]. Integer ids are remapped through `purchase_ids`
/// and `sale_ids` (built fresh per call, shared across both tables) so that
/// cross-table references keep resolving after the remap.
pub fn import_v1(
    purchase_rows: &[LegacyPurchaseRow],
    sale_rows: &[LegacySaleRow],
    asset_registry: &AssetRegistry,
) -> Result<LotRegistry> {
    let purchase_ids: HashMap<u64, Uuid> =
        purchase_rows.iter().map(|row| (row.id, Uuid::new_v4())).collect();
    let sale_ids: HashMap<u64, Uuid> = sale_rows.iter().map(|row| (row.id, Uuid::new_v4())).collect();

    let mut registry = LotRegistry::new();

    for row in purchase_rows {
        let asset = asset_registry.get(&row.asset)?.clone();
        registry.push(Lot {
            id: purchase_ids[&row.id],
            asset,
            amount: row.amount,
            purchase_date: row.purchase_date,
            purchase_cost_fiat: row.purchase_cost_fiat,
            purchase_fee_fiat: row.purchase_fee_fiat,
            sale_date: None,
            sale_value_fiat: Decimal::ZERO,
            sale_fee_fiat: Decimal::ZERO,
            wash: Wash {
                triggered_by_id: None,
                triggers_id: row.triggers_id.and_then(|id| sale_ids.get(&id).copied()),
                addition_to_cost_fiat: Decimal::ZERO,
                disallowed_loss_fiat: Decimal::ZERO,
                holding_period_modifier: chrono::Duration::zero(),
            },
        });
    }

    for row in sale_rows {
        let asset = asset_registry.get(&row.asset)?.clone();
        // v1 stored the *total* holding period; the current format wants
        // only the wash-carried-over delta, so subtract the raw
        // purchase-to-sale span.
        let raw_span = (row.sale_date - row.purchase_date).num_days();
        let holding_period_modifier = chrono::Duration::days(row.holding_period_days - raw_span);

        registry.push(Lot {
            id: sale_ids[&row.id],
            asset,
            amount: row.amount,
            purchase_date: row.purchase_date,
            purchase_cost_fiat: row.purchase_cost_fiat,
            purchase_fee_fiat: row.purchase_fee_fiat,
            sale_date: Some(row.sale_date),
            sale_value_fiat: row.sale_value_fiat,
            sale_fee_fiat: row.sale_fee_fiat,
            wash: Wash {
                triggered_by_id: row.triggered_by_id.and_then(|id| purchase_ids.get(&id).copied()),
                triggers_id: None,
                addition_to_cost_fiat: Decimal::ZERO,
                disallowed_loss_fiat: row.disallowed_loss_fiat,
                holding_period_modifier,
            },
        });
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn registry() -> AssetRegistry {
        AssetRegistry::from_assets(vec![Asset::new("Ethereum", "ETH", true, 18)])
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn cross_references_resolve_after_id_remap() {
        let purchases = vec![LegacyPurchaseRow {
            id: 1,
            asset: "ETH".to_owned(),
            amount: dec!(6),
            purchase_date: date(2022, 1, 15),
            purchase_cost_fiat: dec!(6000),
            purchase_fee_fiat: Decimal::ZERO,
            triggers_id: Some(100),
        }];
        let sales = vec![LegacySaleRow {
            id: 100,
            asset: "ETH".to_owned(),
            amount: dec!(5),
            purchase_date: date(2022, 1, 1),
            purchase_cost_fiat: dec!(5000),
            purchase_fee_fiat: Decimal::ZERO,
            sale_date: date(2022, 1, 10),
            sale_value_fiat: dec!(4500),
            sale_fee_fiat: Decimal::ZERO,
            disallowed_loss_fiat: dec!(500),
            holding_period_days: 9,
            triggered_by_id: Some(1),
        }];

        let reg = import_v1(&purchases, &sales, &registry()).unwrap();
        assert_eq!(reg.len(), 2);

        let purchase_lot = reg.iter().find(|lot| !lot.closed()).unwrap();
        let sale_lot = reg.iter().find(|lot| lot.closed()).unwrap();

        assert_eq!(purchase_lot.wash.triggers_id, Some(sale_lot.id));
        assert_eq!(sale_lot.wash.triggered_by_id, Some(purchase_lot.id));
        assert_eq!(sale_lot.wash.holding_period_modifier, chrono::Duration::zero());
    }

    #[test]
    fn rows_without_wash_references_import_cleanly() {
        let purchases = vec![LegacyPurchaseRow {
            id: 1,
            asset: "ETH".to_owned(),
            amount: dec!(5),
            purchase_date: date(2022, 1, 1),
            purchase_cost_fiat: dec!(5000),
            purchase_fee_fiat: Decimal::ZERO,
            triggers_id: None,
        }];
        let reg = import_v1(&purchases, &[], &registry()).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(!reg.get(0).unwrap().closed());
        assert!(reg.get(0).unwrap().wash.triggers_id.is_none());
    }
}
