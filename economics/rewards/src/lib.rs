pub mod calculator;
pub mod rules;
pub mod types;

pub use calculator::calculate_rewards;
pub use rules::{rule_for, RewardRule, BATCHING_HF_VERSION, REWARD_RULES};
pub use types::*;
