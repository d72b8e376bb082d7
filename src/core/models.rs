use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    FloorPrice,
    MarketCap,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::FloorPrice, Metric::MarketCap];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::FloorPrice => "Floor price",
            Metric::MarketCap => "Market cap",
        }
    }

    pub fn label_format(&self) -> LabelFormat {
        match self {
            Metric::FloorPrice => LabelFormat::FloorPrice,
            Metric::MarketCap => LabelFormat::MarketCap,
        }
    }
}

/// A fetched value, already rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSample {
    pub value: String,
}

impl PriceSample {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Floor prices are always shown with five decimals. Ties round away
    /// from zero on the exact binary value.
    pub fn floor_price(price: f64) -> Self {
        match Decimal::from_f64_retain(price) {
            Some(exact) => {
                let mut rounded =
                    exact.round_dp_with_strategy(5, RoundingStrategy::MidpointAwayFromZero);
                rounded.rescale(5);
                Self::new(rounded.to_string())
            }
            None => Self::new(format!("{price:.5}")),
        }
    }

    /// Market caps keep the representation the API sent.
    pub fn market_cap(cap: &serde_json::Number) -> Self {
        Self::new(cap.to_string())
    }
}

impl fmt::Display for PriceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTarget {
    pub id: String,
}

impl ChannelTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFormat {
    FloorPrice,
    MarketCap,
}

impl LabelFormat {
    pub fn render(&self, sample: &PriceSample) -> String {
        match self {
            LabelFormat::FloorPrice => format!("KASPER Floor: {} KAS", sample.value),
            LabelFormat::MarketCap => format!("MC: {}", sample.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_price_rounds_to_five_decimals() {
        assert_eq!(PriceSample::floor_price(0.00012345).value, "0.00012");
        assert_eq!(PriceSample::floor_price(1.23).value, "1.23000");
        assert_eq!(PriceSample::floor_price(42.0).value, "42.00000");
    }

    #[test]
    fn test_floor_price_ties_round_up() {
        assert_eq!(PriceSample::floor_price(0.015625).value, "0.01563");
        assert_eq!(PriceSample::floor_price(2.5e-6).value, "0.00000");
    }

    #[test]
    fn test_market_cap_keeps_json_representation() {
        let integer: serde_json::Number = serde_json::from_str("150").unwrap();
        let fractional: serde_json::Number = serde_json::from_str("1234.5").unwrap();

        assert_eq!(PriceSample::market_cap(&integer).value, "150");
        assert_eq!(PriceSample::market_cap(&fractional).value, "1234.5");
    }

    #[test]
    fn test_label_formats() {
        let floor = PriceSample::floor_price(1.23);
        let cap = PriceSample::new("150");

        assert_eq!(
            LabelFormat::FloorPrice.render(&floor),
            "KASPER Floor: 1.23000 KAS"
        );
        assert_eq!(LabelFormat::MarketCap.render(&cap), "MC: 150");
    }

    #[test]
    fn test_metric_label_format_mapping() {
        assert_eq!(Metric::FloorPrice.label_format(), LabelFormat::FloorPrice);
        assert_eq!(Metric::MarketCap.label_format(), LabelFormat::MarketCap);
    }
}
