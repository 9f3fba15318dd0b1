//! The lot registry: an indexable, filterable collection of lots.

use std::collections::BTreeSet;
use std::ops::Add;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::lot::Lot;

fn rounded_to_cent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Key used to order a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    PurchaseDate,
    /// Ascending by sale date; open lots (no sale date) sort after all
    /// closed lots, per the original source's `sort_pools(by="sale")`.
    SaleDate,
    Asset,
}

/// An indexable, filterable collection of lots. All mutation proceeds by
/// replacement at index — a lot is never aliased across two registries.
#[derive(Debug, Clone, Default)]
pub struct LotRegistry {
    lots: Vec<Lot>,
}

impl LotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lots(lots: Vec<Lot>) -> Self {
        Self { lots }
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn push(&mut self, lot: Lot) {
        self.lots.push(lot);
    }

    /// Locates a lot by identity.
    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.lots.iter().position(|lot| lot.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&Lot> {
        self.lots.get(index)
    }

    /// Replaces the lot at `index` in place.
    pub fn set(&mut self, index: usize, lot: Lot) {
        self.lots[index] = lot;
    }

    /// Sorts in place by `key`. Stable under repeated invocation on the
    /// same key.
    pub fn sort(&mut self, key: SortKey) {
        match key {
            SortKey::PurchaseDate => self.lots.sort_by_key(|lot| lot.purchase_date),
            SortKey::SaleDate => self.lots.sort_by_key(|lot| match lot.sale_date {
                Some(date) => (0, date),
                None => (1, DateTime::<Utc>::MAX_UTC),
            }),
            SortKey::Asset => self.lots.sort_by(|a, b| a.asset.ticker.cmp(&b.asset.ticker)),
        }
    }

    fn filtered(&self, predicate: impl Fn(&Lot) -> bool) -> LotRegistry {
        LotRegistry::from_lots(self.lots.iter().filter(|lot| predicate(lot)).cloned().collect())
    }

    pub fn by_asset(&self, ticker: &str) -> LotRegistry {
        self.filtered(|lot| lot.asset.ticker.eq_ignore_ascii_case(ticker))
    }

    pub fn open(&self) -> LotRegistry {
        self.filtered(|lot| !lot.closed())
    }

    pub fn closed(&self) -> LotRegistry {
        self.filtered(Lot::closed)
    }

    pub fn long(&self) -> LotRegistry {
        self.filtered(|lot| lot.long_term() == Some(true))
    }

    pub fn short(&self) -> LotRegistry {
        self.filtered(|lot| lot.long_term() == Some(false))
    }

    pub fn wash(&self) -> LotRegistry {
        self.filtered(|lot| lot.wash.is_wash())
    }

    pub fn not_wash(&self) -> LotRegistry {
        self.filtered(|lot| !lot.wash.is_wash())
    }

    pub fn fungible(&self) -> LotRegistry {
        self.filtered(|lot| lot.asset.fungible)
    }

    pub fn nfts(&self) -> LotRegistry {
        self.filtered(|lot| !lot.asset.fungible)
    }

    /// Lots whose purchase (or, if `by_sale`, sale) date falls in `year`.
    pub fn by_year(&self, year: i32, by_sale: bool) -> LotRegistry {
        self.filtered(|lot| {
            let date = if by_sale { lot.sale_date } else { Some(lot.purchase_date) };
            date.map(|d| d.year() == year).unwrap_or(false)
        })
    }

    /// Lots whose purchase (or, if `by_sale`, sale) date matches `date` at
    /// day resolution.
    pub fn by_date(&self, date: DateTime<Utc>, by_sale: bool) -> LotRegistry {
        self.filtered(|lot| {
            let candidate = if by_sale { lot.sale_date } else { Some(lot.purchase_date) };
            candidate.map(|d| d.date_naive() == date.date_naive()).unwrap_or(false)
        })
    }

    /// Lots whose purchase (or, if `by_sale`, sale) date matches `date`
    /// exactly (to the timestamp), per spec.md §4.4's "by date match
    /// (day-resolution or exact)".
    pub fn by_exact_date(&self, date: DateTime<Utc>, by_sale: bool) -> LotRegistry {
        self.filtered(|lot| {
            let candidate = if by_sale { lot.sale_date } else { Some(lot.purchase_date) };
            candidate.map(|d| d == date).unwrap_or(false)
        })
    }

    pub fn tickers(&self) -> BTreeSet<String> {
        self.lots.iter().map(|lot| lot.asset.ticker.clone()).collect()
    }

    pub fn assets(&self) -> Vec<crate::asset::Asset> {
        let mut seen = BTreeSet::new();
        self.lots
            .iter()
            .filter_map(|lot| {
                if seen.insert(lot.asset.ticker.clone()) {
                    Some(lot.asset.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Summed proceeds over closed lots, rounded to 2 decimals.
    pub fn proceeds(&self) -> Decimal {
        rounded_to_cent(self.lots.iter().filter_map(Lot::proceeds).sum())
    }

    pub fn cost_basis(&self) -> Decimal {
        rounded_to_cent(
            self.lots
                .iter()
                .filter(|lot| lot.closed())
                .map(Lot::cost_basis)
                .sum(),
        )
    }

    pub fn disallowed_loss(&self) -> Decimal {
        rounded_to_cent(self.lots.iter().map(|lot| lot.wash.disallowed_loss_fiat).sum())
    }

    pub fn net_gain(&self) -> Decimal {
        rounded_to_cent(self.lots.iter().filter_map(Lot::net_gain).sum())
    }
}

impl Add for LotRegistry {
    type Output = LotRegistry;

    fn add(self, rhs: LotRegistry) -> LotRegistry {
        let mut lots = self.lots;
        lots.extend(rhs.lots);
        LotRegistry::from_lots(lots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn eth() -> Asset {
        Asset::new("Ethereum", "ETH", true, 18)
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn open_lot(amount: Decimal, purchase: DateTime<Utc>) -> Lot {
        Lot::open(eth(), amount, purchase, amount * dec!(1000), dec!(0))
    }

    #[test]
    fn open_closed_partition_every_lot_exactly_once() {
        let mut reg = LotRegistry::new();
        reg.push(open_lot(dec!(5), date(2022, 1, 1)));
        let mut closed = open_lot(dec!(3), date(2022, 1, 2));
        closed.close(date(2022, 2, 1), dec!(3500), dec!(0));
        reg.push(closed);

        assert_eq!(reg.open().len(), 1);
        assert_eq!(reg.closed().len(), 1);
    }

    #[test]
    fn sale_date_sort_places_open_lots_last() {
        let mut reg = LotRegistry::new();
        let mut closed = open_lot(dec!(3), date(2022, 1, 1));
        closed.close(date(2022, 3, 1), dec!(3500), dec!(0));
        reg.push(open_lot(dec!(5), date(2022, 1, 5)));
        reg.push(closed);

        reg.sort(SortKey::SaleDate);
        assert!(reg.get(0).unwrap().closed());
        assert!(!reg.get(1).unwrap().closed());
    }

    #[test]
    fn aggregates_sum_only_closed_lots_rounded_to_cents() {
        let mut reg = LotRegistry::new();
        let mut a = open_lot(dec!(5), date(2022, 1, 1));
        a.close(date(2022, 2, 1), dec!(5000), dec!(0));
        let mut b = open_lot(dec!(4), date(2022, 1, 2));
        b.close(date(2022, 3, 1), dec!(4800), dec!(0));
        reg.push(a);
        reg.push(b);
        reg.push(open_lot(dec!(1), date(2022, 1, 3)));

        assert_eq!(reg.proceeds(), dec!(9800));
        assert_eq!(reg.cost_basis(), dec!(9000));
        assert_eq!(reg.net_gain(), dec!(800));
    }

    #[test]
    fn index_of_locates_by_identity() {
        let mut reg = LotRegistry::new();
        let lot = open_lot(dec!(1), date(2022, 1, 1));
        let id = lot.id;
        reg.push(lot);
        assert_eq!(reg.index_of(id), Some(0));
        assert_eq!(reg.index_of(Uuid::new_v4()), None);
    }

    #[test]
    fn by_date_matches_day_resolution_by_exact_date_matches_timestamp() {
        let morning = date(2022, 1, 1);
        let evening = morning + chrono::Duration::hours(18);

        let mut reg = LotRegistry::new();
        reg.push(open_lot(dec!(1), morning));
        reg.push(open_lot(dec!(2), evening));

        assert_eq!(reg.by_date(morning, false).len(), 2);
        assert_eq!(reg.by_exact_date(morning, false).len(), 1);
        assert_eq!(reg.by_exact_date(evening, false).len(), 1);
    }
}
