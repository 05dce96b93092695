//! Token pricing by model tier.
//!
//! Prices are held in microdollars per million tokens so that cost arithmetic stays in
//! integers until it is shown to the user.

use crate::providers::base::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPricing {
    pub input_per_million: u64,
    pub output_per_million: u64,
}

impl ModelPricing {
    pub const fn new(input_per_million: u64, output_per_million: u64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Cost of `usage` in microdollars
    pub fn cost_microdollars(&self, usage: &Usage) -> u64 {
        token_cost(usage.input_tokens, self.input_per_million)
            + token_cost(usage.output_tokens, self.output_per_million)
    }

    pub fn cost_usd(&self, usage: &Usage) -> f64 {
        self.cost_microdollars(usage) as f64 / 1_000_000.0
    }
}

pub const OPUS: ModelPricing = ModelPricing::new(15_000_000, 75_000_000);
pub const SONNET: ModelPricing = ModelPricing::new(3_000_000, 15_000_000);
pub const HAIKU: ModelPricing = ModelPricing::new(800_000, 4_000_000);

/// Pricing for a model id, matched on its tier name
pub fn pricing_for(model: &str) -> Option<ModelPricing> {
    let model = model.to_ascii_lowercase();
    if model.contains("opus") {
        Some(OPUS)
    } else if model.contains("sonnet") {
        Some(SONNET)
    } else if model.contains("haiku") {
        Some(HAIKU)
    } else {
        None
    }
}

/// Cost of a turn in US dollars, `None` for models without known pricing
pub fn cost_usd(model: &str, usage: &Usage) -> Option<f64> {
    pricing_for(model).map(|pricing| pricing.cost_usd(usage))
}

fn token_cost(tokens: u32, per_million: u64) -> u64 {
    // u32 * u64 cannot overflow u128
    let product = u128::from(tokens) * u128::from(per_million);
    (product / 1_000_000) as u64
}
