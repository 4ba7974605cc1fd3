use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::TopicPromotionConfig;
use crate::error::Result;
use crate::models::{Mention, ObjectType, TOPIC_STATUS_PROPERTY, TopicStatus};
use crate::traits::EntityDirectory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopicPromotionReport {
    pub candidates: usize,
    pub promoted: usize,
    pub failures: usize,
}

/// Distinct post count when the mentions clear both promotion thresholds.
pub fn qualifies_for_promotion(mentions: &[Mention], config: &TopicPromotionConfig) -> Option<usize> {
    if mentions.len() < config.min_mentions {
        return None;
    }
    let distinct_posts = mentions
        .iter()
        .map(|mention| mention.post_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    (distinct_posts >= config.min_distinct_posts).then_some(distinct_posts)
}

/// Marks emerging content topics active once they are mentioned widely enough.
/// Per-topic failures are logged and counted.
pub fn promote_topics(
    directory: &dyn EntityDirectory,
    config: &TopicPromotionConfig,
) -> Result<TopicPromotionReport> {
    let mut report = TopicPromotionReport::default();
    let active_status = TopicStatus::Active.as_str();

    for object in directory.list_active_objects()? {
        if object.object_type != ObjectType::ContentTopic
            || object.topic_status() == Some(active_status)
        {
            continue;
        }
        report.candidates += 1;

        let mentions = match directory.find_mentions_by_object(&object.id, config.mention_scan_limit) {
            Ok(mentions) => mentions,
            Err(err) => {
                tracing::warn!(object_id = %object.id, error = %err, "topic mention scan failed");
                report.failures += 1;
                continue;
            }
        };
        let Some(distinct_posts) = qualifies_for_promotion(&mentions, config) else {
            continue;
        };

        let patch = Map::from_iter([(
            TOPIC_STATUS_PROPERTY.to_string(),
            Value::String(active_status.to_string()),
        )]);
        if let Err(err) = directory.update_properties(&object.id, &patch) {
            tracing::warn!(
                object_id = %object.id,
                topic = %object.canonical_name,
                error = %err,
                "topic promotion failed"
            );
            report.failures += 1;
            continue;
        }
        report.promoted += 1;
        tracing::info!(
            object_id = %object.id,
            topic = %object.canonical_name,
            mentions = mentions.len(),
            distinct_posts,
            "topic promoted to active"
        );
    }
    Ok(report)
}
