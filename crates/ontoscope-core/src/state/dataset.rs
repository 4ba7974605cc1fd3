use serde::Serialize;

use crate::dataset::DatasetDocument;
use crate::error::Result;

use super::SqliteStateStore;
use super::objects::{insert_aspect, insert_mention, upsert_object, upsert_relation};
use super::observations::upsert_observation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetImportReport {
    pub objects: usize,
    pub relations: usize,
    pub mentions: usize,
    pub aspects: usize,
    pub observations: usize,
}

impl SqliteStateStore {
    /// Writes a dataset in one transaction. Objects and observations are upserted;
    /// mentions and aspects are appended.
    pub fn import_dataset(&self, doc: &DatasetDocument) -> Result<DatasetImportReport> {
        let report = self.with_tx(|tx| {
            for object in &doc.objects {
                upsert_object(tx, object)?;
            }
            for relation in &doc.relations {
                upsert_relation(tx, relation)?;
            }
            for mention in &doc.mentions {
                insert_mention(tx, mention)?;
            }
            for aspect in &doc.aspects {
                insert_aspect(tx, aspect)?;
            }
            for observation in &doc.observations {
                upsert_observation(tx, observation)?;
            }
            Ok(DatasetImportReport {
                objects: doc.objects.len(),
                relations: doc.relations.len(),
                mentions: doc.mentions.len(),
                aspects: doc.aspects.len(),
                observations: doc.observations.len(),
            })
        })?;
        tracing::info!(
            objects = report.objects,
            relations = report.relations,
            mentions = report.mentions,
            aspects = report.aspects,
            observations = report.observations,
            "dataset imported"
        );
        Ok(report)
    }
}
