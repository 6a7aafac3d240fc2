//! Price prediction engine

pub mod features;
mod inference;
mod output;

pub use features::{
    clean_price, FeatureBuilder, FeatureConfig, RawSignals, DEFAULT_ANCHOR_PRICE,
    DEFAULT_DISCOUNT, MYTECH_MARKUP, TUNISIANET_MARKUP,
};
pub use inference::{ForestParams, PriceModel};
pub use output::{
    ClampConfig, ClampOutcome, OutputFormatter, CEILING_RATIO, FLOOR_RATIO, PRICE_DECIMALS,
};
