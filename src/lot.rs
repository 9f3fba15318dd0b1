//! The tax lot and its wash-sale metadata.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::asset::Asset;

/// A holding period of 366 days or more is long-term.
const LONG_TERM_DAYS: i64 = 366;

fn rounded_to_cent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Wash-sale metadata attached to a lot. Defaults to the
/// zero/null state, meaning the lot has not participated in a wash pairing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wash {
    /// Id of the replacement purchase whose acquisition invalidated this
    /// lot's realized loss. Non-null iff this lot *is* a wash sale.
    pub triggered_by_id: Option<Uuid>,
    /// Id of the closed loss lot this lot's purchase invalidated. Non-null
    /// iff this lot *absorbed* a disallowed loss.
    pub triggers_id: Option<Uuid>,
    /// Disallowed-loss amount rolled into this lot's cost basis (buyer-side).
    pub addition_to_cost_fiat: Decimal,
    /// Amount of the realized loss disallowed on this lot (seller-side).
    pub disallowed_loss_fiat: Decimal,
    /// Duration added to this lot's holding period (buyer-side inherits the
    /// seller's holding duration).
    pub holding_period_modifier: Duration,
}

impl Wash {
    pub fn is_wash(&self) -> bool {
        self.triggered_by_id.is_some()
    }
}

/// An open or closed tax lot.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub id: Uuid,
    pub asset: Asset,
    pub amount: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub purchase_cost_fiat: Decimal,
    pub purchase_fee_fiat: Decimal,
    pub sale_date: Option<DateTime<Utc>>,
    pub sale_value_fiat: Decimal,
    pub sale_fee_fiat: Decimal,
    pub wash: Wash,
}

impl Lot {
    /// Opens a new lot from a buy leg.
    pub fn open(
        asset: Asset,
        amount: Decimal,
        purchase_date: DateTime<Utc>,
        purchase_cost_fiat: Decimal,
        purchase_fee_fiat: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            asset,
            amount,
            purchase_date,
            purchase_cost_fiat,
            purchase_fee_fiat,
            sale_date: None,
            sale_value_fiat: Decimal::ZERO,
            sale_fee_fiat: Decimal::ZERO,
            wash: Wash::default(),
        }
    }

    pub fn closed(&self) -> bool {
        self.sale_date.is_some()
    }

    pub fn cost_basis(&self) -> Decimal {
        self.purchase_cost_fiat + self.purchase_fee_fiat + self.wash.addition_to_cost_fiat
    }

    /// Realized proceeds net of the sale fee. `None` for an open lot.
    pub fn proceeds(&self) -> Option<Decimal> {
        self.sale_date.map(|_| self.sale_value_fiat - self.sale_fee_fiat)
    }

    /// Time held, including any wash-carried-over modifier. `None` if open.
    pub fn holding_period(&self) -> Option<Duration> {
        self.sale_date
            .map(|sale_date| (sale_date - self.purchase_date) + self.wash.holding_period_modifier)
    }

    pub fn long_term(&self) -> Option<bool> {
        self.holding_period().map(|d| d.num_days() >= LONG_TERM_DAYS)
    }

    /// Realized gain or loss, after any disallowed-loss adjustment.
    /// `None` for an open lot.
    pub fn net_gain(&self) -> Option<Decimal> {
        self.proceeds()
            .map(|proceeds| proceeds - self.cost_basis() + self.wash.disallowed_loss_fiat)
    }

    /// Whether this lot is a candidate to be paired as a wash-sale loss.
    pub fn potential_wash(&self) -> bool {
        self.closed()
            && self.asset.fungible
            && self.wash.triggered_by_id.is_none()
            && self.net_gain().map(|g| g < Decimal::ZERO).unwrap_or(false)
    }

    /// Closes this (open) lot against a sale, in place.
    pub fn close(
        &mut self,
        sale_date: DateTime<Utc>,
        sale_value_fiat: Decimal,
        sale_fee_fiat: Decimal,
    ) {
        self.sale_date = Some(sale_date);
        self.sale_value_fiat = sale_value_fiat;
        self.sale_fee_fiat = sale_fee_fiat;
    }

    /// Splits this lot into a retained portion (amount `retained_amount`,
    /// keeping this lot's id) and a fragment of the remainder, which
    /// receives a fresh id. All fiat fields are scaled proportionally.
    ///
    /// Panics via `debug_assert` is avoided; callers are expected to check
    /// `0 < retained_amount < self.amount` and surface
    /// `Error::InvariantViolation` otherwise — see `crate::registry` split
    /// helpers, which own that validation.
    pub fn split(&self, retained_amount: Decimal) -> (Lot, Lot) {
        let retained_fraction = retained_amount / self.amount;
        let fragment_fraction = Decimal::ONE - retained_fraction;

        let mut retained = self.clone();
        retained.amount = retained_amount;
        retained.purchase_cost_fiat = rounded_to_cent(self.purchase_cost_fiat * retained_fraction);
        retained.purchase_fee_fiat = rounded_to_cent(self.purchase_fee_fiat * retained_fraction);
        retained.wash.addition_to_cost_fiat =
            rounded_to_cent(self.wash.addition_to_cost_fiat * retained_fraction);
        if self.closed() {
            retained.sale_value_fiat = rounded_to_cent(self.sale_value_fiat * retained_fraction);
            retained.sale_fee_fiat = rounded_to_cent(self.sale_fee_fiat * retained_fraction);
            retained.wash.disallowed_loss_fiat =
                rounded_to_cent(self.wash.disallowed_loss_fiat * retained_fraction);
        }

        let mut fragment = self.clone();
        fragment.id = Uuid::new_v4();
        fragment.amount = self.amount - retained_amount;
        fragment.purchase_cost_fiat = rounded_to_cent(self.purchase_cost_fiat * fragment_fraction);
        fragment.purchase_fee_fiat = rounded_to_cent(self.purchase_fee_fiat * fragment_fraction);
        fragment.wash.addition_to_cost_fiat =
            rounded_to_cent(self.wash.addition_to_cost_fiat * fragment_fraction);
        if self.closed() {
            fragment.sale_value_fiat = rounded_to_cent(self.sale_value_fiat * fragment_fraction);
            fragment.sale_fee_fiat = rounded_to_cent(self.sale_fee_fiat * fragment_fraction);
            fragment.wash.disallowed_loss_fiat =
                rounded_to_cent(self.wash.disallowed_loss_fiat * fragment_fraction);
        }

        (retained, fragment)
    }

    /// Whether `candidate_purchase_date` falls in this lot's ±31-day wash
    /// window, measured from this (closed, loss) lot's sale date, and is on
    /// or after the sale per this implementation's convention.
    pub fn within_wash_window(&self, candidate_purchase_date: DateTime<Utc>) -> bool {
        let Some(sale_date) = self.sale_date else {
            return false;
        };
        let delta = candidate_purchase_date - sale_date;
        candidate_purchase_date >= sale_date && delta.num_days().abs() < 31
    }
}
