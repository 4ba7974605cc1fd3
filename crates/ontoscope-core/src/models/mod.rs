mod fact;
mod object;
mod observation;
mod period;

pub use fact::{
    DerivedFact, FactEvidence, FactQuery, FactSeverity, FactType, SaveOutcome, SavedFact,
};
pub use object::{
    AspectMention, Mention, ObjectRecord, ObjectRelation, ObjectStatus, ObjectType, RelationEdge,
    Sentiment, TOPIC_STATUS_PROPERTY, TopicStatus, TraverseDirection,
};
pub use observation::{AspectDelta, AspectObservation, EntityObservation, ObservationDelta};
pub use period::{
    PERIOD_DATE_FORMAT, Period, PeriodType, current_period_start, format_period_date,
    parse_period_date, step_back,
};
