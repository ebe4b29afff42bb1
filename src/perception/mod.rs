//! The fixed, non-plugin perception chain: basic conversion, BEV extraction,
//! dynamic-obstacle prediction. These run before the
//! `PerceptionPluginManager` and are deterministic and non-failing for
//! well-formed input.

pub mod basic_converter;
pub mod bev_extractor;
pub mod dynamic_predictor;

pub use basic_converter::BasicDataConverter;
pub use bev_extractor::BevObstacleExtractor;
pub use dynamic_predictor::{DynamicObstaclePredictor, PredictionModel};
