//! Feature schema: the frozen, ordered column contract between training and inference
//!
//! A schema is derived once from the training table. Numeric attributes pass
//! through under their own name; every categorical attribute contributes one
//! dummy column `"<attribute>_<category>"` per observed category except its
//! reference category, which is the lexicographically smallest one.

use crate::error::{ChurnError, Result};
use crate::record::{CategoryValue, RawRecord, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::warn;

/// Version of the persisted schema layout
pub const SCHEMA_VERSION: u32 = 1;

/// What a schema column holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// Numeric attribute copied as-is
    Numeric,
    /// 0/1 indicator for one category of a categorical attribute
    Dummy { attribute: String, category: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Categories observed for one attribute at training time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalAttribute {
    /// Category without a dummy column
    pub reference: String,
    /// All observed categories, sorted, reference included
    pub categories: Vec<String>,
}

/// Persisted layout. `columns` alone fixes the encoding order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaFile {
    version: u32,
    columns: Vec<String>,
    #[serde(default)]
    categorical: BTreeMap<String, CategoricalAttribute>,
}

/// Ordered column contract shared by training and every inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaFile", into = "SchemaFile")]
pub struct FeatureSchema {
    version: u32,
    columns: Vec<SchemaColumn>,
    categorical: BTreeMap<String, CategoricalAttribute>,
    positions: HashMap<String, usize>,
}

/// Name of the dummy column for one category
pub fn dummy_name(attribute: &str, category: &str) -> String {
    format!("{}_{}", attribute, category)
}

impl FeatureSchema {
    /// Build a schema from ordered column names and the categorical attribute table.
    ///
    /// Columns matching `"<attribute>_<category>"` for a known non-reference
    /// category become dummies; everything else is numeric.
    pub fn new(
        column_names: Vec<String>,
        categorical: BTreeMap<String, CategoricalAttribute>,
    ) -> Result<Self> {
        let mut dummies: HashMap<String, (String, String)> = HashMap::new();
        for (attribute, entry) in &categorical {
            validate_categories(attribute, entry)?;
            for category in entry.categories.iter().filter(|c| **c != entry.reference) {
                dummies.insert(
                    dummy_name(attribute, category),
                    (attribute.clone(), category.clone()),
                );
            }
        }

        let mut columns = Vec::with_capacity(column_names.len());
        let mut positions = HashMap::with_capacity(column_names.len());
        for (idx, name) in column_names.into_iter().enumerate() {
            if positions.insert(name.clone(), idx).is_some() {
                return Err(ChurnError::Schema(format!("duplicate column '{}'", name)));
            }
            let kind = match dummies.remove(&name) {
                Some((attribute, category)) => ColumnKind::Dummy {
                    attribute,
                    category,
                },
                None if categorical.contains_key(&name) => {
                    return Err(ChurnError::Schema(format!(
                        "column '{}' is declared categorical but listed as numeric",
                        name
                    )));
                }
                None => ColumnKind::Numeric,
            };
            columns.push(SchemaColumn { name, kind });
        }

        if let Some(name) = dummies.keys().next() {
            return Err(ChurnError::Schema(format!(
                "dummy column '{}' is missing from the column list",
                name
            )));
        }

        Ok(Self {
            version: SCHEMA_VERSION,
            columns,
            categorical,
            positions,
        })
    }

    /// Derive the schema from a training table.
    ///
    /// Numeric attributes come first in `attribute_order`, followed by the
    /// dummies of each categorical attribute in the same order with their
    /// categories sorted. Attributes with no values at all are skipped.
    pub fn derive(attribute_order: &[String], records: &[RawRecord]) -> Result<Self> {
        let mut numeric = Vec::new();
        let mut categorical: Vec<(String, BTreeSet<String>)> = Vec::new();

        for attribute in attribute_order {
            let mut saw_number = false;
            let mut categories = BTreeSet::new();
            for record in records {
                match record.get(attribute) {
                    Some(Value::Number(_)) => saw_number = true,
                    Some(Value::Category(c)) => {
                        categories.insert(c.clone());
                    }
                    None => {}
                }
            }

            match (saw_number, categories.is_empty()) {
                (true, false) => {
                    return Err(ChurnError::Schema(format!(
                        "attribute '{}' mixes numeric and categorical values",
                        attribute
                    )));
                }
                (true, true) => numeric.push(attribute.clone()),
                (false, false) => categorical.push((attribute.clone(), categories)),
                (false, true) => warn!(attribute = %attribute, "attribute has no values, skipping"),
            }
        }

        let mut column_names = numeric;
        let mut table = BTreeMap::new();
        for (attribute, categories) in categorical {
            let categories: Vec<String> = categories.into_iter().collect();
            // BTreeSet iteration is sorted, so the first entry is the reference
            let reference = categories[0].clone();
            column_names.extend(
                categories
                    .iter()
                    .skip(1)
                    .map(|category| dummy_name(&attribute, category)),
            );
            table.insert(
                attribute,
                CategoricalAttribute {
                    reference,
                    categories,
                },
            );
        }

        Self::new(column_names, table)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Index of a column by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Index of the dummy column for `(attribute, category)`, if the schema has one
    pub fn dummy_position(&self, attribute: &str, category: &str) -> Option<usize> {
        let idx = self.position(&dummy_name(attribute, category))?;
        match &self.columns[idx].kind {
            ColumnKind::Dummy {
                attribute: a,
                category: c,
            } if a == attribute && c == category => Some(idx),
            _ => None,
        }
    }

    pub fn categorical(&self, attribute: &str) -> Option<&CategoricalAttribute> {
        self.categorical.get(attribute)
    }

    pub fn categorical_attributes(&self) -> impl Iterator<Item = (&str, &CategoricalAttribute)> {
        self.categorical.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of the numeric pass-through columns, in schema order
    pub fn numeric_attributes(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Numeric)
            .map(|c| c.name.as_str())
    }

    /// Whether the attribute is known to the schema at all
    pub fn knows_attribute(&self, attribute: &str) -> bool {
        self.categorical.contains_key(attribute)
            || matches!(
                self.position(attribute).map(|i| &self.columns[i].kind),
                Some(ColumnKind::Numeric)
            )
    }

    /// Whether `category` was observed for `attribute` at training time
    pub fn knows_category(&self, attribute: &str, category: &str) -> bool {
        self.categorical
            .get(attribute)
            .map(|entry| entry.categories.iter().any(|c| c == category))
            .unwrap_or(false)
    }

    /// Variants of a closed category enum that the schema has never seen.
    ///
    /// Such variants always encode as the all-zero baseline.
    pub fn unknown_variants<C: CategoryValue>(&self) -> Vec<C> {
        C::all()
            .iter()
            .copied()
            .filter(|v| !self.knows_category(C::ATTRIBUTE, v.category()))
            .collect()
    }
}

fn validate_categories(attribute: &str, entry: &CategoricalAttribute) -> Result<()> {
    let unique: HashSet<&String> = entry.categories.iter().collect();
    if unique.len() != entry.categories.len() {
        return Err(ChurnError::Schema(format!(
            "attribute '{}' lists a category twice",
            attribute
        )));
    }
    if !entry.categories.contains(&entry.reference) {
        return Err(ChurnError::Schema(format!(
            "reference category '{}' of '{}' is not among its categories",
            entry.reference, attribute
        )));
    }
    Ok(())
}

impl TryFrom<SchemaFile> for FeatureSchema {
    type Error = ChurnError;

    fn try_from(file: SchemaFile) -> Result<Self> {
        if file.version != SCHEMA_VERSION {
            return Err(ChurnError::Schema(format!(
                "unsupported schema version {} (expected {})",
                file.version, SCHEMA_VERSION
            )));
        }
        Self::new(file.columns, file.categorical)
    }
}

impl From<FeatureSchema> for SchemaFile {
    fn from(schema: FeatureSchema) -> Self {
        Self {
            version: schema.version,
            columns: schema.columns.into_iter().map(|c| c.name).collect(),
            categorical: schema.categorical,
        }
    }
}
