use std::collections::HashMap;

use crate::models::{AspectDelta, AspectObservation, EntityObservation, ObservationDelta};

/// Sentiment at or above this value counts as positive.
pub const SENTIMENT_FLIP_THRESHOLD: f64 = 0.5;

#[must_use]
pub fn is_sentiment_flip(previous: f64, current: f64) -> bool {
    (previous >= SENTIMENT_FLIP_THRESHOLD) != (current >= SENTIMENT_FLIP_THRESHOLD)
}

#[must_use]
pub fn sentiment_label(score: f64) -> &'static str {
    if score >= SENTIMENT_FLIP_THRESHOLD {
        "positive"
    } else {
        "negative"
    }
}

/// Period-over-period difference for one entity.
///
/// Without a previous observation every current aspect is new and both
/// percentage deltas stay at zero.
pub fn compute_delta(
    current: EntityObservation,
    previous: Option<EntityObservation>,
    object_name: &str,
    class_slug: &str,
) -> ObservationDelta {
    let mut delta = ObservationDelta {
        object_id: current.object_id.clone(),
        object_name: object_name.to_string(),
        class_slug: class_slug.to_string(),
        current,
        previous: None,
        sentiment_delta: 0.0,
        sentiment_delta_pct: 0.0,
        mention_delta: 0,
        mention_delta_pct: 0.0,
        new_aspects: Vec::new(),
        removed_aspects: Vec::new(),
        aspect_deltas: Vec::new(),
    };

    let Some(previous) = previous else {
        delta.new_aspects = delta
            .current
            .aspect_data
            .iter()
            .map(|aspect| aspect.aspect.clone())
            .collect();
        return delta;
    };

    delta.sentiment_delta = delta.current.avg_sentiment - previous.avg_sentiment;
    if previous.avg_sentiment != 0.0 {
        delta.sentiment_delta_pct = delta.sentiment_delta / previous.avg_sentiment.abs() * 100.0;
    }

    delta.mention_delta = i64::from(delta.current.mention_count) - i64::from(previous.mention_count);
    if previous.mention_count > 0 {
        let previous_count = f64::from(previous.mention_count);
        delta.mention_delta_pct =
            (f64::from(delta.current.mention_count) - previous_count) / previous_count * 100.0;
    }

    let previous_aspects = index_aspects(&previous.aspect_data);
    let current_aspects = index_aspects(&delta.current.aspect_data);

    for current_aspect in &delta.current.aspect_data {
        match previous_aspects.get(current_aspect.aspect.as_str()) {
            None => delta.new_aspects.push(current_aspect.aspect.clone()),
            Some(previous_aspect) => delta.aspect_deltas.push(AspectDelta {
                aspect: current_aspect.aspect.clone(),
                current_count: current_aspect.count,
                previous_count: previous_aspect.count,
                current_sentiment: current_aspect.avg_sentiment,
                previous_sentiment: previous_aspect.avg_sentiment,
                sentiment_delta: current_aspect.avg_sentiment - previous_aspect.avg_sentiment,
                is_flipped: is_sentiment_flip(
                    previous_aspect.avg_sentiment,
                    current_aspect.avg_sentiment,
                ),
            }),
        }
    }
    delta.removed_aspects = previous
        .aspect_data
        .iter()
        .filter(|aspect| !current_aspects.contains_key(aspect.aspect.as_str()))
        .map(|aspect| aspect.aspect.clone())
        .collect();

    delta.previous = Some(previous);
    delta
}

fn index_aspects(aspects: &[AspectObservation]) -> HashMap<&str, &AspectObservation> {
    aspects
        .iter()
        .map(|aspect| (aspect.aspect.as_str(), aspect))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Period, PeriodType};

    fn period() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2026, 2, 9).expect("date"),
            PeriodType::Week,
        )
    }

    fn observation(mentions: u32, sentiment: f64, aspects: &[(&str, u32, f64)]) -> EntityObservation {
        EntityObservation {
            mention_count: mentions,
            avg_sentiment: sentiment,
            aspect_data: aspects
                .iter()
                .map(|(aspect, count, avg)| AspectObservation {
                    aspect: (*aspect).to_string(),
                    count: *count,
                    avg_sentiment: *avg,
                })
                .collect(),
            ..EntityObservation::silent("p1", period())
        }
    }

    #[test]
    fn sentiment_percentage_uses_absolute_previous() {
        let delta = compute_delta(
            observation(10, 0.4, &[]),
            Some(observation(10, 0.8, &[])),
            "Phone",
            "product",
        );
        assert!((delta.sentiment_delta_pct - -50.0).abs() < 1e-9);

        let negative_base = compute_delta(
            observation(10, -0.2, &[]),
            Some(observation(10, -0.4, &[])),
            "Phone",
            "product",
        );
        assert!((negative_base.sentiment_delta_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn mention_percentage_and_zero_previous() {
        let delta = compute_delta(
            observation(30, 0.5, &[]),
            Some(observation(20, 0.5, &[])),
            "Phone",
            "product",
        );
        assert_eq!(delta.mention_delta, 10);
        assert!((delta.mention_delta_pct - 50.0).abs() < 1e-9);

        let from_zero = compute_delta(
            observation(5, 0.5, &[]),
            Some(observation(0, 0.0, &[])),
            "Phone",
            "product",
        );
        assert_eq!(from_zero.mention_delta_pct, 0.0);
        assert_eq!(from_zero.sentiment_delta_pct, 0.0);
    }

    #[test]
    fn missing_previous_marks_all_aspects_new() {
        let delta = compute_delta(
            observation(4, 0.7, &[("battery", 2, 0.4), ("screen", 1, 0.9)]),
            None,
            "Phone",
            "product",
        );
        assert_eq!(delta.new_aspects, ["battery", "screen"]);
        assert!(delta.aspect_deltas.is_empty());
        assert_eq!(delta.sentiment_delta_pct, 0.0);
        assert_eq!(delta.mention_delta_pct, 0.0);
        assert!(!delta.has_previous());
    }

    #[test]
    fn aspects_are_diffed_by_name_with_flip_detection() {
        let delta = compute_delta(
            observation(8, 0.5, &[("battery", 3, 0.3), ("camera", 2, 0.55), ("price", 1, 0.2)]),
            Some(observation(
                8,
                0.5,
                &[("battery", 4, 0.6), ("camera", 2, 0.6), ("screen", 5, 0.7)],
            )),
            "Phone",
            "product",
        );
        assert_eq!(delta.new_aspects, ["price"]);
        assert_eq!(delta.removed_aspects, ["screen"]);
        let battery = &delta.aspect_deltas[0];
        assert_eq!(battery.aspect, "battery");
        assert!(battery.is_flipped);
        assert_eq!(battery.current_count, 3);
        assert_eq!(battery.previous_count, 4);
        let camera = &delta.aspect_deltas[1];
        assert!(!camera.is_flipped);
    }

    #[test]
    fn sentiment_labels_split_at_threshold() {
        assert_eq!(sentiment_label(0.5), "positive");
        assert_eq!(sentiment_label(0.49), "negative");
        assert!(is_sentiment_flip(0.6, 0.3));
        assert!(!is_sentiment_flip(0.6, 0.55));
    }
}
