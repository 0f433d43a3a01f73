//! Feature engineering
//!
//! Converts logged shot events into per-shot contextual features.

pub mod builder;
pub mod efficiency;
pub mod window;

pub use builder::{FeatureBuilder, FeatureRow};
pub use efficiency::{player_efficiency, spot_breakdown, PlayerEfficiency, SpotBreakdown};
