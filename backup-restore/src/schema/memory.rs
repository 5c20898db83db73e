use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use postgres::schema::SchemaObjectKind;
use tokio::sync::Mutex;

use crate::error::BrResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{SCHEMA_SWAP__AFTER_TABLES, br_fail_point};
use crate::schema::base::{SchemaSwapper, validate_swap};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CatalogObject {
    name: String,
    owner: String,
}

#[derive(Debug, Clone, Default)]
struct SchemaContents {
    tables: BTreeSet<CatalogObject>,
    views: BTreeSet<CatalogObject>,
    enum_types: BTreeSet<CatalogObject>,
}

impl SchemaContents {
    fn objects(&self, kind: SchemaObjectKind) -> &BTreeSet<CatalogObject> {
        match kind {
            SchemaObjectKind::Table => &self.tables,
            SchemaObjectKind::View => &self.views,
            SchemaObjectKind::EnumType => &self.enum_types,
        }
    }

    fn objects_mut(&mut self, kind: SchemaObjectKind) -> &mut BTreeSet<CatalogObject> {
        match kind {
            SchemaObjectKind::Table => &mut self.tables,
            SchemaObjectKind::View => &mut self.views,
            SchemaObjectKind::EnumType => &mut self.enum_types,
        }
    }
}

/// In-memory database catalog implementing [`SchemaSwapper`].
///
/// A swap works on a copy of the catalog that replaces the shared one only when every
/// step succeeded, giving the same all-or-nothing outcome as a database transaction.
/// Dependent objects are not modeled, so `cascade` only drops the same-named object.
#[derive(Debug, Clone)]
pub struct MemorySchemaCatalog {
    owner: String,
    schemas: Arc<Mutex<BTreeMap<String, SchemaContents>>>,
}

impl MemorySchemaCatalog {
    /// Creates a catalog with an empty `public` schema whose swaps move `owner`'s objects.
    pub fn new(owner: impl Into<String>) -> Self {
        let mut schemas = BTreeMap::new();
        schemas.insert("public".to_string(), SchemaContents::default());

        Self {
            owner: owner.into(),
            schemas: Arc::new(Mutex::new(schemas)),
        }
    }

    /// Creates an object in `schema`, creating the schema when missing.
    pub async fn create_object(
        &self,
        kind: SchemaObjectKind,
        schema: &str,
        name: &str,
        owner: &str,
    ) {
        let mut schemas = self.schemas.lock().await;
        schemas
            .entry(schema.to_owned())
            .or_default()
            .objects_mut(kind)
            .insert(CatalogObject {
                name: name.to_owned(),
                owner: owner.to_owned(),
            });
    }

    /// Creates an object owned by the application role.
    pub async fn create_owned(&self, kind: SchemaObjectKind, schema: &str, name: &str) {
        self.create_object(kind, schema, name, &self.owner).await;
    }

    /// Returns the names of the objects of `kind` in `schema`, sorted.
    pub async fn object_names(&self, kind: SchemaObjectKind, schema: &str) -> Vec<String> {
        let schemas = self.schemas.lock().await;

        schemas
            .get(schema)
            .map(|contents| {
                contents
                    .objects(kind)
                    .iter()
                    .map(|object| object.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn schema_exists(&self, schema: &str) -> bool {
        self.schemas.lock().await.contains_key(schema)
    }
}

impl SchemaSwapper for MemorySchemaCatalog {
    async fn swap(&self, source: &str, destination: &str) -> BrResult<()> {
        validate_swap(source, destination)?;

        let mut schemas = self.schemas.lock().await;
        let mut working = schemas.clone();
        let source_contents = working.get(source).cloned().unwrap_or_default();
        working.entry(destination.to_owned()).or_default();

        for kind in SchemaObjectKind::SWAP_ORDER {
            let owned: Vec<CatalogObject> = source_contents
                .objects(kind)
                .iter()
                .filter(|object| object.owner == self.owner)
                .cloned()
                .collect();

            for object in owned {
                if let Some(contents) = working.get_mut(destination) {
                    contents
                        .objects_mut(kind)
                        .retain(|existing| existing.name != object.name);
                    contents.objects_mut(kind).insert(object.clone());
                }
                if let Some(contents) = working.get_mut(source) {
                    contents.objects_mut(kind).remove(&object);
                }
            }

            #[cfg(feature = "failpoints")]
            if kind == SchemaObjectKind::Table {
                br_fail_point(SCHEMA_SWAP__AFTER_TABLES)?;
            }
        }

        *schemas = working;

        Ok(())
    }

    async fn count_tables(&self, schema: &str) -> BrResult<u64> {
        let schemas = self.schemas.lock().await;

        Ok(schemas
            .get(schema)
            .map(|contents| contents.tables.len() as u64)
            .unwrap_or(0))
    }
}
