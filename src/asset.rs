//! Asset model and asset registry.

use std::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_true() -> bool {
    true
}

/// A named, tickered position: a cryptocurrency, an NFT, or a fiat currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub ticker: String,
    #[serde(default = "default_true")]
    pub fungible: bool,
    /// Count of fractional digits permitted by the asset's minor unit.
    /// Fixed at 0 for non-fungible assets.
    pub decimals: u32,
}

impl Asset {
    pub fn new(name: impl Into<String>, ticker: impl Into<String>, fungible: bool, decimals: u32) -> Self {
        let decimals = if fungible { decimals } else { 0 };
        Self {
            name: name.into(),
            ticker: ticker.into(),
            fungible,
            decimals,
        }
    }

    /// The smallest representable unit of this asset, `10^(-decimals)`.
    pub fn smallest_unit(&self) -> Decimal {
        Decimal::new(1, self.decimals)
    }

    /// Whether this asset's ticker is a recognized fiat currency.
    pub fn is_fiat(&self) -> bool {
        is_fiat_ticker(&self.ticker)
    }

    pub fn matches(&self, key: &str) -> bool {
        self.name.eq_ignore_ascii_case(key) || self.ticker.eq_ignore_ascii_case(key)
    }
}

/// Well-known fiat tickers. Kept as a fixed whitelist rather than a lookup
/// into the asset registry itself, matching the original source's
/// `is_asset_fiat`, which consults a dedicated fiat currency list rather than
/// the general asset registry (avoiding a circular import in the source, and
/// here avoiding a dependency from `Asset` back onto `AssetRegistry`).
const FIAT_TICKERS: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "NZD", "CNY", "HKD", "SGD", "SEK", "NOK",
    "DKK",
];

pub fn is_fiat_ticker(ticker: &str) -> bool {
    FIAT_TICKERS.iter().any(|f| f.eq_ignore_ascii_case(ticker))
}

/// An insertion-ordered collection of assets, keyed by ticker or name
/// (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assets(assets: Vec<Asset>) -> Self {
        Self { assets }
    }

    pub fn push(&mut self, asset: Asset) {
        self.assets.push(asset);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    /// Looks up an asset by ticker or name. The oldest matching entry wins.
    pub fn get(&self, key: &str) -> Result<&Asset> {
        self.assets
            .iter()
            .find(|asset| asset.matches(key))
            .ok_or_else(|| Error::AssetNotFound {
                ticker: key.to_owned(),
            })
    }

    pub fn fungible(&self) -> AssetRegistry {
        AssetRegistry::from_assets(self.assets.iter().filter(|a| a.fungible).cloned().collect())
    }

    pub fn nft(&self) -> AssetRegistry {
        AssetRegistry::from_assets(self.assets.iter().filter(|a| !a.fungible).cloned().collect())
    }

    pub fn fiat(&self) -> AssetRegistry {
        AssetRegistry::from_assets(self.assets.iter().filter(|a| a.is_fiat()).cloned().collect())
    }
}

impl Add for AssetRegistry {
    type Output = AssetRegistry;

    /// Concatenates two registries, preserving insertion order. Duplicate
    /// tickers are left as-is; the older entry wins on lookup since `get`
    /// returns the first match.
    fn add(self, rhs: AssetRegistry) -> AssetRegistry {
        let mut assets = self.assets;
        assets.extend(rhs.assets);
        AssetRegistry::from_assets(assets)
    }
}

/// Deserializable row shape for YAML asset-registry documents:
/// `{name, ticker, fungible, decimals}`, keyed by ticker.
#[derive(Debug, Deserialize)]
struct AssetEntry {
    name: String,
    ticker: String,
    #[serde(default = "default_true")]
    fungible: bool,
    #[serde(default)]
    decimals: u32,
}

/// Loads a YAML asset registry document (a map of ticker -> entry).
pub fn import_registry(yaml: &str) -> Result<AssetRegistry> {
    let entries: std::collections::BTreeMap<String, AssetEntry> = serde_yaml::from_str(yaml)
        .map_err(|e| Error::IncorrectPoolFormat {
            detail: e.to_string(),
        })?;

    let assets = entries
        .into_values()
        .map(|entry| Asset::new(entry.name, entry.ticker, entry.fungible, entry.decimals))
        .collect();

    Ok(AssetRegistry::from_assets(assets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth() -> Asset {
        Asset::new("Ethereum", "ETH", true, 18)
    }

    fn usd() -> Asset {
        Asset::new("US Dollar", "USD", true, 2)
    }

    #[test]
    fn lookup_is_case_insensitive_by_ticker_or_name() {
        let mut reg = AssetRegistry::new();
        reg.push(eth());
        assert_eq!(reg.get("eth").unwrap().ticker, "ETH");
        assert_eq!(reg.get("ethereum").unwrap().ticker, "ETH");
        assert!(reg.get("BTC").is_err());
    }

    #[test]
    fn fiat_detection_uses_the_whitelist() {
        assert!(usd().is_fiat());
        assert!(!eth().is_fiat());
    }

    #[test]
    fn non_fungible_assets_force_zero_decimals() {
        let nft = Asset::new("CryptoPunk #1", "PUNK1", false, 8);
        assert_eq!(nft.decimals, 0);
    }

    #[test]
    fn concatenation_preserves_order_and_oldest_wins_on_lookup() {
        let a = AssetRegistry::from_assets(vec![Asset::new("Ethereum", "ETH", true, 18)]);
        let b = AssetRegistry::from_assets(vec![Asset::new("Ethereum Classic", "ETH", true, 18)]);
        let combined = a + b;
        assert_eq!(combined.len(), 2);
        assert_eq!(combined.get("ETH").unwrap().name, "Ethereum");
    }

    #[test]
    fn import_registry_defaults_fungible_to_true() {
        let yaml = "USD:\n  name: US Dollar\n  ticker: USD\n  decimals: 2\n";
        let reg = import_registry(yaml).unwrap();
        assert!(reg.get("USD").unwrap().fungible);
    }
}
