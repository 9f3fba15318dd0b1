//! Orderbook ingest: the external-collaborator interface, reduced to
//! the minimal CSV reader its preconditions describe. Fee-symbol resolution,
//! same-day aggregation, and spot-price back-filling are assumed already
//! done by whatever produced the file.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::asset::AssetRegistry;
use crate::error::{Error, Result};
use crate::order::Order;
use crate::transaction::Side;

/// One already-aggregated, already-spot-filled row of the orderbook
/// schema, as it appears in the CSV file handed to the core.
#[derive(Debug, Deserialize)]
struct OrderRow {
    #[serde(rename = "Date(UTC)")]
    date: String,
    #[serde(rename = "Market")]
    market: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Price")]
    price: Decimal,
    #[serde(rename = "Amount")]
    amount: Decimal,
    #[serde(rename = "Fee")]
    fee: Decimal,
    #[serde(rename = "Fee Asset")]
    fee_asset: String,
    #[serde(rename = "Market 1 Fiat Spot Price")]
    spot_1_fiat: Decimal,
    #[serde(rename = "Market 2 Fiat Spot Price")]
    spot_2_fiat: Decimal,
    #[serde(rename = "Fee Asset Fiat Spot Price")]
    fee_spot_fiat: Decimal,
}

/// Splits a `"A-B"` or bare `"A"` market string into its two tickers,
/// pairing a bare ticker with `default_fiat`.
pub fn split_market<'a>(market: &'a str, default_fiat: &'a str) -> (&'a str, &'a str) {
    match market.split_once('-') {
        Some((a, b)) => (a, b),
        None => (market, default_fiat),
    }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::IncorrectPoolFormat {
            detail: format!("unparseable order date {raw:?}: {e}"),
        })
}

/// Reads an orderbook CSV, resolving asset tickers against `registry`
/// and pairing bare markets with `default_fiat`. Rows are returned in file
/// order; the caller is responsible for the ascending-date ordering the
/// driver requires.
pub fn read_orderbook<R: std::io::Read>(
    reader: R,
    registry: &AssetRegistry,
    default_fiat: &str,
) -> Result<Vec<Order>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut orders = Vec::new();

    for result in csv_reader.deserialize() {
        let row: OrderRow = result.map_err(|e| Error::IncorrectPoolFormat {
            detail: e.to_string(),
        })?;

        let (ticker_1, ticker_2) = split_market(&row.market, default_fiat);
        let market_1 = registry.get(ticker_1)?.clone();
        let market_2 = registry.get(ticker_2)?.clone();
        let fee_asset = registry.get(&row.fee_asset)?.clone();

        orders.push(Order {
            date: parse_date(&row.date)?,
            market_1,
            market_2,
            kind: Side::from_str(&row.kind)?,
            price: row.price,
            amount: row.amount,
            fee: row.fee,
            fee_asset,
            spot_1_fiat: row.spot_1_fiat,
            spot_2_fiat: row.spot_2_fiat,
            fee_spot_fiat: row.fee_spot_fiat,
        });
    }

    Ok(orders)
}
