mod delta;
mod materialize;
mod narrative;
mod rules;
mod template;
mod topics;

pub use delta::{SENTIMENT_FLIP_THRESHOLD, compute_delta, is_sentiment_flip, sentiment_label};
pub use materialize::{FactMaterializer, Materialized};
pub use narrative::{group_facts_by_object, narrative_fact, narrative_fact_key};
pub use rules::{RuleMatch, RuleOutcome, SkipReason, evaluate_rule};
pub use template::{Placeholders, render};
pub use topics::{TopicPromotionReport, promote_topics, qualifies_for_promotion};
