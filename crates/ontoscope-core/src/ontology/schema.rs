use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{OntoscopeError, Result};
use crate::models::ObjectRecord;
use crate::traits::SchemaSource;

use super::model::{Cardinality, Class, ROOT_CLASS_WILDCARD, RelationTypeDef, Rule};

/// Immutable, indexed view of the class hierarchy, relation catalog and active rules.
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    classes: HashMap<i64, Class>,
    class_ids_by_slug: HashMap<String, i64>,
    lineage: HashMap<i64, Vec<String>>,
    children: HashMap<i64, Vec<i64>>,
    relation_types: HashMap<i64, RelationTypeDef>,
    relation_ids_by_slug: HashMap<String, i64>,
    rules: Vec<Rule>,
    loaded_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Reads every schema table from `source`. Any failure aborts the load.
    pub fn load(source: &dyn SchemaSource) -> Result<Self> {
        let classes = source
            .list_classes()
            .map_err(|err| OntoscopeError::SchemaLoad(format!("load classes: {err}")))?;
        let relation_types = source
            .list_relation_types()
            .map_err(|err| OntoscopeError::SchemaLoad(format!("load relation types: {err}")))?;
        let rules = source
            .list_active_rules()
            .map_err(|err| OntoscopeError::SchemaLoad(format!("load rules: {err}")))?;
        Self::compile(classes, relation_types, rules)
    }

    pub fn compile(
        classes: Vec<Class>,
        relation_types: Vec<RelationTypeDef>,
        rules: Vec<Rule>,
    ) -> Result<Self> {
        let mut class_map = HashMap::with_capacity(classes.len());
        let mut class_ids_by_slug = HashMap::with_capacity(classes.len());
        for class in classes {
            if class_ids_by_slug.insert(class.slug.clone(), class.id).is_some() {
                return Err(OntoscopeError::SchemaLoad(format!(
                    "duplicate class slug: {}",
                    class.slug
                )));
            }
            if let Some(previous) = class_map.insert(class.id, class) {
                return Err(OntoscopeError::SchemaLoad(format!(
                    "duplicate class id: {}",
                    previous.id
                )));
            }
        }

        let mut children = HashMap::<i64, Vec<i64>>::new();
        for class in class_map.values() {
            if let Some(parent_id) = class.parent_id {
                if !class_map.contains_key(&parent_id) {
                    return Err(OntoscopeError::SchemaLoad(format!(
                        "class '{}' references missing parent id {parent_id}",
                        class.slug
                    )));
                }
                children.entry(parent_id).or_default().push(class.id);
            }
        }
        for ids in children.values_mut() {
            ids.sort_unstable();
        }

        let mut lineage = HashMap::with_capacity(class_map.len());
        for class in class_map.values() {
            lineage.insert(class.id, compute_lineage(&class_map, class)?);
        }

        let mut relation_map = HashMap::with_capacity(relation_types.len());
        let mut relation_ids_by_slug = HashMap::with_capacity(relation_types.len());
        for relation in relation_types {
            for (label, class_id) in [
                ("source", relation.source_class_id),
                ("target", relation.target_class_id),
            ] {
                if !class_map.contains_key(&class_id) {
                    return Err(OntoscopeError::SchemaLoad(format!(
                        "relation type '{}' references missing {label} class id {class_id}",
                        relation.slug
                    )));
                }
            }
            if relation_ids_by_slug
                .insert(relation.slug.clone(), relation.id)
                .is_some()
            {
                return Err(OntoscopeError::SchemaLoad(format!(
                    "duplicate relation type slug: {}",
                    relation.slug
                )));
            }
            relation_map.insert(relation.id, relation);
        }
        for relation in relation_map.values() {
            if let Some(inverse_id) = relation.inverse_id
                && !relation_map.contains_key(&inverse_id)
            {
                return Err(OntoscopeError::SchemaLoad(format!(
                    "relation type '{}' references missing inverse id {inverse_id}",
                    relation.slug
                )));
            }
        }

        let mut rules = rules
            .into_iter()
            .filter(|rule| rule.is_active)
            .collect::<Vec<_>>();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        Ok(Self {
            classes: class_map,
            class_ids_by_slug,
            lineage,
            children,
            relation_types: relation_map,
            relation_ids_by_slug,
            rules,
            loaded_at: Utc::now(),
        })
    }

    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
            class_ids_by_slug: HashMap::new(),
            lineage: HashMap::new(),
            children: HashMap::new(),
            relation_types: HashMap::new(),
            relation_ids_by_slug: HashMap::new(),
            rules: Vec::new(),
            loaded_at: Utc::now(),
        }
    }

    /// True when `target_slug` is the wildcard, the class itself, or one of its ancestors.
    pub fn is_a(&self, class_slug: &str, target_slug: &str) -> bool {
        if target_slug.is_empty() || target_slug == ROOT_CLASS_WILDCARD {
            return true;
        }
        if class_slug == target_slug {
            return true;
        }
        self.class_ids_by_slug
            .get(class_slug)
            .and_then(|id| self.lineage.get(id))
            .is_some_and(|slugs| slugs.iter().any(|slug| slug == target_slug))
    }

    /// Class slug of an object: its class id when known, else the default for its type.
    pub fn resolve_class_slug(&self, object: &ObjectRecord) -> String {
        object
            .class_id
            .and_then(|id| self.classes.get(&id))
            .map_or_else(
                || object.object_type.default_class_slug().to_string(),
                |class| class.slug.clone(),
            )
    }

    pub fn class_by_slug(&self, slug: &str) -> Option<&Class> {
        self.class_ids_by_slug
            .get(slug)
            .and_then(|id| self.classes.get(id))
    }

    pub fn parent_of(&self, class: &Class) -> Option<&Class> {
        class.parent_id.and_then(|id| self.classes.get(&id))
    }

    pub fn children_of(&self, class: &Class) -> Vec<&Class> {
        self.children
            .get(&class.id)
            .map(|ids| ids.iter().filter_map(|id| self.classes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Slugs from the class itself up to the root.
    pub fn lineage_of(&self, class: &Class) -> &[String] {
        self.lineage
            .get(&class.id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn relation_type(&self, slug: &str) -> Option<&RelationTypeDef> {
        self.relation_ids_by_slug
            .get(slug)
            .and_then(|id| self.relation_types.get(id))
    }

    pub fn source_class(&self, relation: &RelationTypeDef) -> Option<&Class> {
        self.classes.get(&relation.source_class_id)
    }

    pub fn target_class(&self, relation: &RelationTypeDef) -> Option<&Class> {
        self.classes.get(&relation.target_class_id)
    }

    pub fn inverse_of(&self, relation: &RelationTypeDef) -> Option<&RelationTypeDef> {
        relation
            .inverse_id
            .and_then(|id| self.relation_types.get(&id))
    }

    /// Active rules, highest priority first.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn summary(&self) -> SchemaSummary {
        let mut classes = self.classes.values().collect::<Vec<_>>();
        classes.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.id.cmp(&b.id)));
        let classes = classes
            .into_iter()
            .map(|class| ClassSummary {
                slug: class.slug.clone(),
                name: class.name.clone(),
                parent: self.parent_of(class).map(|parent| parent.slug.clone()),
                lineage: self.lineage_of(class).to_vec(),
            })
            .collect();

        let mut relations = self.relation_types.values().collect::<Vec<_>>();
        relations.sort_by_key(|relation| relation.id);
        let relation_types = relations
            .into_iter()
            .map(|relation| RelationTypeSummary {
                slug: relation.slug.clone(),
                name: relation.name.clone(),
                source_class: self
                    .source_class(relation)
                    .map(|class| class.slug.clone())
                    .unwrap_or_default(),
                target_class: self
                    .target_class(relation)
                    .map(|class| class.slug.clone())
                    .unwrap_or_default(),
                cardinality: relation.cardinality,
                inverse: self
                    .inverse_of(relation)
                    .map(|inverse| inverse.slug.clone()),
            })
            .collect();

        SchemaSummary {
            loaded_at: self.loaded_at,
            classes,
            relation_types,
            rules: self.rules.clone(),
        }
    }
}

fn compute_lineage(classes: &HashMap<i64, Class>, class: &Class) -> Result<Vec<String>> {
    let mut lineage = vec![class.slug.clone()];
    let mut seen = HashSet::from([class.id]);
    let mut cursor = class.parent_id;
    while let Some(parent_id) = cursor {
        if !seen.insert(parent_id) {
            return Err(OntoscopeError::SchemaLoad(format!(
                "class hierarchy cycle through '{}'",
                class.slug
            )));
        }
        let Some(parent) = classes.get(&parent_id) else {
            break;
        };
        lineage.push(parent.slug.clone());
        cursor = parent.parent_id;
    }
    Ok(lineage)
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaSummary {
    pub loaded_at: DateTime<Utc>,
    pub classes: Vec<ClassSummary>,
    pub relation_types: Vec<RelationTypeSummary>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub slug: String,
    pub name: String,
    pub parent: Option<String>,
    pub lineage: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationTypeSummary {
    pub slug: String,
    pub name: String,
    pub source_class: String,
    pub target_class: String,
    pub cardinality: Cardinality,
    pub inverse: Option<String>,
}

/// Shared slot for the loaded snapshot; populated on first use, replaced on reload.
#[derive(Debug, Default)]
pub struct SchemaCache {
    slot: RwLock<Option<Arc<SchemaSnapshot>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Result<Option<Arc<SchemaSnapshot>>> {
        let guard = self
            .slot
            .read()
            .map_err(|_| OntoscopeError::mutex_poisoned("schema cache"))?;
        Ok(guard.clone())
    }

    pub fn get_or_load(&self, source: &dyn SchemaSource) -> Result<Arc<SchemaSnapshot>> {
        if let Some(snapshot) = self.current()? {
            return Ok(snapshot);
        }
        self.reload(source)
    }

    pub fn reload(&self, source: &dyn SchemaSource) -> Result<Arc<SchemaSnapshot>> {
        let snapshot = Arc::new(SchemaSnapshot::load(source)?);
        let mut guard = self
            .slot
            .write()
            .map_err(|_| OntoscopeError::mutex_poisoned("schema cache"))?;
        *guard = Some(Arc::clone(&snapshot));
        tracing::debug!(
            classes = snapshot.classes.len(),
            relation_types = snapshot.relation_types.len(),
            rules = snapshot.rules.len(),
            "schema snapshot loaded"
        );
        Ok(snapshot)
    }

    pub fn invalidate(&self) -> Result<()> {
        let mut guard = self
            .slot
            .write()
            .map_err(|_| OntoscopeError::mutex_poisoned("schema cache"))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObjectType;

    fn class(id: i64, slug: &str, parent_id: Option<i64>) -> Class {
        Class {
            id,
            slug: slug.to_string(),
            name: slug.to_string(),
            parent_id,
            description: String::new(),
            sort_order: 0,
        }
    }

    fn chain() -> SchemaSnapshot {
        // a -> b -> c (root)
        SchemaSnapshot::compile(
            vec![class(3, "c", None), class(2, "b", Some(3)), class(1, "a", Some(2))],
            Vec::new(),
            Vec::new(),
        )
        .expect("compile")
    }

    #[test]
    fn is_a_walks_ancestors() {
        let schema = chain();
        assert!(schema.is_a("a", "b"));
        assert!(schema.is_a("a", "c"));
        assert!(schema.is_a("a", "a"));
        assert!(!schema.is_a("c", "a"));
        assert!(schema.is_a("c", "entity"));
        assert!(schema.is_a("unknown", ""));
        assert!(!schema.is_a("unknown", "c"));
    }

    #[test]
    fn children_and_lineage_are_indexed() {
        let schema = chain();
        let c = schema.class_by_slug("c").expect("c");
        let kids = schema.children_of(c);
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].slug, "b");
        let a = schema.class_by_slug("a").expect("a");
        assert_eq!(schema.lineage_of(a), ["a", "b", "c"]);
    }

    #[test]
    fn compile_rejects_cycles_and_dangling_parents() {
        let err = SchemaSnapshot::compile(
            vec![class(1, "a", Some(2)), class(2, "b", Some(1))],
            Vec::new(),
            Vec::new(),
        )
        .expect_err("cycle");
        assert!(matches!(err, OntoscopeError::SchemaLoad(_)));

        let err = SchemaSnapshot::compile(vec![class(1, "a", Some(9))], Vec::new(), Vec::new())
            .expect_err("dangling");
        assert!(matches!(err, OntoscopeError::SchemaLoad(_)));
    }

    #[test]
    fn relation_types_resolve_classes_and_inverse() {
        let relations = vec![
            RelationTypeDef {
                id: 10,
                slug: "belongs_to".to_string(),
                name: "BELONGS_TO".to_string(),
                source_class_id: 1,
                target_class_id: 3,
                cardinality: Cardinality::ManyToOne,
                inverse_id: Some(11),
                description: String::new(),
            },
            RelationTypeDef {
                id: 11,
                slug: "owns".to_string(),
                name: "OWNS".to_string(),
                source_class_id: 3,
                target_class_id: 1,
                cardinality: Cardinality::OneToMany,
                inverse_id: Some(10),
                description: String::new(),
            },
        ];
        let schema = SchemaSnapshot::compile(
            vec![class(3, "c", None), class(2, "b", Some(3)), class(1, "a", Some(2))],
            relations,
            Vec::new(),
        )
        .expect("compile");
        let belongs_to = schema.relation_type("belongs_to").expect("relation");
        assert_eq!(schema.source_class(belongs_to).map(|c| c.slug.as_str()), Some("a"));
        assert_eq!(schema.target_class(belongs_to).map(|c| c.slug.as_str()), Some("c"));
        assert_eq!(
            schema.inverse_of(belongs_to).map(|r| r.slug.as_str()),
            Some("owns")
        );
    }

    #[test]
    fn class_slug_resolution_prefers_class_id() {
        let schema = chain();
        let mut object = ObjectRecord::new("w1", ObjectType::Work, "Novel");
        assert_eq!(schema.resolve_class_slug(&object), "creative_work");
        object.class_id = Some(2);
        assert_eq!(schema.resolve_class_slug(&object), "b");
        object.class_id = Some(99);
        assert_eq!(schema.resolve_class_slug(&object), "creative_work");
    }
}
