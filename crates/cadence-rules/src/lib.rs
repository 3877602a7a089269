pub mod config;
pub mod engine;
pub mod error;
pub mod hash;

pub use config::{
    AepConfig, ContactOverride, GlobalRules, MonthDay, PostWindowCondition, PostWindowRule,
    RuleConfig, StateRule, StateRuleKind, StateSpecialOverride, TimingConstants,
};
pub use engine::{ContactRuleEngine, EffectiveRules};
pub use error::RuleConfigError;
