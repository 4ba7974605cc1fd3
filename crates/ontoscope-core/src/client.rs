use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dataset::DatasetDocument;
use crate::engine::{CancelFlag, Collaborators, EvaluationReport, OntologyEngine};
use crate::error::{OntoscopeError, Result};
use crate::models::{DerivedFact, FactQuery, Period};
use crate::ontology::{DocumentFormat, SchemaSummary, parse_schema_document};
use crate::state::{DatasetImportReport, SchemaImportReport, SqliteStateStore};
use crate::traits::NarrativeGenerator;

const STATE_FILE_NAME: &str = ".ontoscope_state.sqlite3";

/// What one evaluation call should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub period: Period,
    /// Aggregate raw mentions into observations first.
    #[serde(default)]
    pub materialize: bool,
    /// Draft narrative insights through the configured LLM endpoint.
    #[serde(default)]
    pub narrative: bool,
}

impl EvaluateRequest {
    pub const fn for_period(period: Period) -> Self {
        Self {
            period,
            materialize: false,
            narrative: false,
        }
    }
}

/// Local facade: one SQLite state file under `root` serving every collaborator.
#[derive(Clone)]
pub struct Ontoscope {
    pub state: SqliteStateStore,
    root: PathBuf,
    config: EngineConfig,
    engine: Arc<Mutex<OntologyEngine>>,
    cancel: CancelFlag,
}

impl std::fmt::Debug for Ontoscope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ontoscope")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Ontoscope {
    pub fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(root_dir, EngineConfig::from_env())
    }

    pub fn open_with_config(root_dir: impl Into<PathBuf>, config: EngineConfig) -> Result<Self> {
        let root = root_dir.into();
        fs::create_dir_all(&root)?;
        let state = SqliteStateStore::open(root.join(STATE_FILE_NAME))?;
        let engine = OntologyEngine::new(
            Collaborators::from_backend(Arc::new(state.clone())),
            config.clone(),
        );
        let cancel = engine.cancel_flag();
        Ok(Self {
            state,
            root,
            config,
            engine: Arc::new(Mutex::new(engine)),
            cancel,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Signal shared with every evaluation run from this facade.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Runs one evaluation while holding the `evaluation:{period_type}` lease.
    pub fn evaluate(&self, request: EvaluateRequest) -> Result<EvaluationReport> {
        let generator = if request.narrative {
            Some(self.narrative_generator()?)
        } else {
            None
        };
        self.evaluate_with_generator(request, generator)
    }

    /// Same as [`Self::evaluate`] with a caller-supplied narrative generator.
    pub fn evaluate_with_generator(
        &self,
        request: EvaluateRequest,
        generator: Option<Arc<dyn NarrativeGenerator>>,
    ) -> Result<EvaluationReport> {
        let lease_name = format!("evaluation:{}", request.period.period_type);
        let owner = uuid::Uuid::new_v4().to_string();
        let ttl = i64::try_from(self.config.lease_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                OntoscopeError::Validation(format!(
                    "lease ttl out of range: {}s",
                    self.config.lease_ttl_secs
                ))
            })?;
        let _lease = self.state.lease(&lease_name, &owner, ttl)?;

        let mut engine = self
            .engine
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("engine"))?;
        engine.set_narrative_generator(generator);
        if request.materialize {
            engine.materialize_and_evaluate(request.period)
        } else {
            engine.evaluate_period(request.period)
        }
    }

    #[cfg(feature = "narrative-http")]
    fn narrative_generator(&self) -> Result<Arc<dyn NarrativeGenerator>> {
        let generator =
            crate::narrative_http::HttpNarrativeGenerator::new(self.config.narrative.llm.clone())?;
        Ok(Arc::new(generator))
    }

    #[cfg(not(feature = "narrative-http"))]
    fn narrative_generator(&self) -> Result<Arc<dyn NarrativeGenerator>> {
        Err(OntoscopeError::Validation(
            "narrative generation requires the narrative-http feature".to_string(),
        ))
    }

    /// Imports a TOML or JSON schema document and drops the cached snapshot.
    pub fn import_schema_file(&self, path: &Path) -> Result<SchemaImportReport> {
        let format = DocumentFormat::from_path(path)?;
        let raw = fs::read_to_string(path)?;
        let doc = parse_schema_document(&raw, format)?;
        let report = self.state.import_schema_document(&doc)?;
        self.engine()?.invalidate_schema()?;
        Ok(report)
    }

    /// Freshly loaded schema, resolved into slugs.
    pub fn schema_summary(&self) -> Result<SchemaSummary> {
        let schema = self.engine()?.load_schema()?;
        Ok(schema.summary())
    }

    pub fn import_dataset_file(&self, path: &Path) -> Result<DatasetImportReport> {
        let doc = DatasetDocument::from_path(path)?;
        if doc.is_empty() {
            return Err(OntoscopeError::Validation(format!(
                "dataset is empty: {}",
                path.display()
            )));
        }
        self.state.import_dataset(&doc)
    }

    pub fn unread_facts(&self, query: &FactQuery) -> Result<Vec<DerivedFact>> {
        self.state.list_unread_facts(query)
    }

    pub fn facts_for_object(
        &self,
        object_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DerivedFact>> {
        self.state.list_facts_by_object(object_id, limit, offset)
    }

    pub fn count_unread_facts(&self) -> Result<u64> {
        self.state.count_unread_facts()
    }

    pub fn mark_fact_read(&self, id: i64) -> Result<()> {
        self.state.mark_as_read(id)
    }

    pub fn dismiss_fact(&self, id: i64) -> Result<()> {
        self.state.mark_as_dismissed(id)
    }

    pub fn expire_facts(&self, now: DateTime<Utc>) -> Result<usize> {
        self.state.delete_expired_facts(now)
    }

    fn engine(&self) -> Result<std::sync::MutexGuard<'_, OntologyEngine>> {
        self.engine
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("engine"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::*;
    use crate::models::PeriodType;

    fn week(raw: &str) -> Period {
        Period::new(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date"),
            PeriodType::Week,
        )
    }

    #[test]
    fn open_creates_state_file_under_root() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("workspace");
        let app = Ontoscope::open_with_config(&root, EngineConfig::default()).expect("open");
        assert!(root.join(STATE_FILE_NAME).exists());
        assert_eq!(app.root(), root.as_path());
    }

    #[test]
    fn evaluation_is_refused_while_another_owner_holds_the_lease() {
        let temp = tempdir().expect("tempdir");
        let app = Ontoscope::open_with_config(temp.path(), EngineConfig::default()).expect("open");
        let _held = app
            .state
            .lease("evaluation:week", "other-worker", chrono::Duration::minutes(5))
            .expect("lease");

        let err = app
            .evaluate(EvaluateRequest::for_period(week("2026-02-09")))
            .expect_err("lease held");
        assert_eq!(err.code(), "LEASE_HELD");
    }

    #[test]
    fn evaluation_releases_its_lease() {
        let temp = tempdir().expect("tempdir");
        let app = Ontoscope::open_with_config(temp.path(), EngineConfig::default()).expect("open");
        let report = app
            .evaluate(EvaluateRequest::for_period(week("2026-02-09")))
            .expect("empty evaluation");
        assert_eq!(report.observations, 0);
        assert!(report.facts.is_empty());
        assert!(!app.state.release_lease("evaluation:week", "anyone").expect("release"));
        app.state
            .lease("evaluation:week", "next-worker", chrono::Duration::minutes(5))
            .expect("lease is free again");
    }

    #[test]
    fn schema_and_dataset_files_are_rejected_by_extension_or_emptiness() {
        let temp = tempdir().expect("tempdir");
        let app = Ontoscope::open_with_config(temp.path(), EngineConfig::default()).expect("open");

        let yaml = temp.path().join("schema.yaml");
        fs::write(&yaml, "classes: []").expect("write");
        let err = app.import_schema_file(&yaml).expect_err("yaml");
        assert_eq!(err.code(), "VALIDATION_FAILED");

        let empty = temp.path().join("data.json");
        fs::write(&empty, "{}").expect("write");
        let err = app.import_dataset_file(&empty).expect_err("empty dataset");
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[test]
    fn schema_import_refreshes_the_summary() {
        let temp = tempdir().expect("tempdir");
        let app = Ontoscope::open_with_config(temp.path(), EngineConfig::default()).expect("open");
        assert!(app.schema_summary().expect("empty summary").classes.is_empty());

        let path = temp.path().join("schema.json");
        fs::write(
            &path,
            r#"{"classes": [
                {"slug": "organization", "name": "Organization"},
                {"slug": "brand", "name": "Brand", "parent": "organization"}
            ]}"#,
        )
        .expect("write");
        let report = app.import_schema_file(&path).expect("import");
        assert_eq!(report.classes, 2);

        let summary = app.schema_summary().expect("summary");
        let brand = summary
            .classes
            .iter()
            .find(|class| class.slug == "brand")
            .expect("brand");
        assert_eq!(brand.parent.as_deref(), Some("organization"));
    }
}
