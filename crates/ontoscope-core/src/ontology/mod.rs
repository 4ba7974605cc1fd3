mod model;
mod parse;
mod schema;
mod validate;

pub use model::{
    ActionType, Cardinality, Class, ClassSeed, Metric, Operator, ROOT_CLASS_WILDCARD,
    RelationTypeDef, RelationTypeSeed, Rule, RuleActionConfig, RuleCondition, RuleSeed,
    SchemaDocument, TraverseConfig,
};
pub use parse::{DocumentFormat, parse_schema_document};
pub use schema::{
    ClassSummary, RelationTypeSummary, SchemaCache, SchemaSnapshot, SchemaSummary,
};
pub use validate::{KnownSlugs, RuleWarning, is_supported_condition, validate_schema_document};
