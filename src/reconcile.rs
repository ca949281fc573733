//! Schema reconciliation: raw records to schema-aligned numeric rows
//!
//! Every record is encoded independently against the schema. Each
//! categorical value names a candidate dummy column; candidates the schema
//! has are set to 1, candidates it lacks (reference or unseen categories)
//! are dropped, and every schema column not hit stays 0. The output always
//! has exactly `schema.len()` columns in schema order.

use crate::error::{ChurnError, Result};
use crate::record::{RawRecord, Value};
use crate::schema::{ColumnKind, FeatureSchema};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Input values the schema could not place, kept for data-quality monitoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Records processed
    pub rows: usize,
    /// `(attribute, category)` pairs with no dummy column and not the reference
    pub unseen_categories: BTreeMap<(String, String), usize>,
    /// Attributes the schema does not mention at all
    pub unknown_attributes: BTreeMap<String, usize>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.unseen_categories.is_empty() && self.unknown_attributes.is_empty()
    }

    /// Emit one warning per dropped category or attribute
    pub fn log(&self) {
        for ((attribute, category), count) in &self.unseen_categories {
            warn!(
                attribute = %attribute,
                category = %category,
                count,
                "category unseen at training time, encoded as baseline"
            );
        }
        for (attribute, count) in &self.unknown_attributes {
            warn!(attribute = %attribute, count, "attribute not in schema, ignored");
        }
    }
}

/// Table of encoded rows plus the mismatch report
#[derive(Debug, Clone)]
pub struct Encoded {
    /// One row per input record, one column per schema column
    pub matrix: Array2<f64>,
    pub report: ReconcileReport,
}

/// Per-record outcome of a batch encode
#[derive(Debug)]
pub struct EncodedBatch {
    pub rows: Vec<Result<Array1<f64>>>,
    pub report: ReconcileReport,
}

impl EncodedBatch {
    pub fn failures(&self) -> usize {
        self.rows.iter().filter(|r| r.is_err()).count()
    }
}

/// Encodes records against one fixed schema
#[derive(Debug, Clone, Copy)]
pub struct SchemaReconciler<'a> {
    schema: &'a FeatureSchema,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(schema: &'a FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.schema
    }

    /// Encode all records into one table; the first invalid record aborts the call
    pub fn encode(&self, records: &[RawRecord]) -> Result<Encoded> {
        let mut report = ReconcileReport::default();
        let mut matrix = Array2::zeros((records.len(), self.schema.len()));

        for (row, record) in records.iter().enumerate() {
            let encoded = self.encode_row(row, record, &mut report)?;
            matrix.row_mut(row).assign(&encoded);
        }

        report.log();
        Ok(Encoded { matrix, report })
    }

    /// Encode each record on its own; invalid records fail without affecting the rest
    pub fn encode_each(&self, records: &[RawRecord]) -> EncodedBatch {
        let mut report = ReconcileReport::default();
        let rows = records
            .iter()
            .enumerate()
            .map(|(row, record)| self.encode_row(row, record, &mut report))
            .collect();

        report.log();
        EncodedBatch { rows, report }
    }

    /// Encode a single record
    pub fn encode_record(&self, record: &RawRecord) -> Result<Array1<f64>> {
        let mut report = ReconcileReport::default();
        let encoded = self.encode_row(0, record, &mut report)?;
        report.log();
        Ok(encoded)
    }

    fn encode_row(
        &self,
        row: usize,
        record: &RawRecord,
        report: &mut ReconcileReport,
    ) -> Result<Array1<f64>> {
        report.rows += 1;
        let mut values = Array1::zeros(self.schema.len());

        // Numeric columns are never synthesized
        for (idx, column) in self.schema.columns().iter().enumerate() {
            if column.kind != ColumnKind::Numeric {
                continue;
            }
            values[idx] = match record.get(&column.name) {
                Some(Value::Number(n)) => *n,
                Some(Value::Category(_)) => {
                    return Err(ChurnError::AttributeType {
                        row,
                        attribute: column.name.clone(),
                        expected: "numeric",
                    });
                }
                None => {
                    return Err(ChurnError::MissingAttribute {
                        row,
                        attribute: column.name.clone(),
                    });
                }
            };
        }

        for (attribute, value) in record.iter() {
            let Some(entry) = self.schema.categorical(attribute) else {
                if !self.schema.knows_attribute(attribute) {
                    *report
                        .unknown_attributes
                        .entry(attribute.to_string())
                        .or_default() += 1;
                }
                continue;
            };

            let category = match value {
                Value::Category(c) => c.as_str(),
                Value::Number(_) => {
                    return Err(ChurnError::AttributeType {
                        row,
                        attribute: attribute.to_string(),
                        expected: "categorical",
                    });
                }
            };

            match self.schema.dummy_position(attribute, category) {
                Some(idx) => values[idx] = 1.0,
                None if category == entry.reference => {}
                None => {
                    debug!(row, attribute, category, "dropping unseen category");
                    *report
                        .unseen_categories
                        .entry((attribute.to_string(), category.to_string()))
                        .or_default() += 1;
                }
            }
        }

        Ok(values)
    }
}

/// Encode `records` against `schema`, one row per record
pub fn encode(records: &[RawRecord], schema: &FeatureSchema) -> Result<Array2<f64>> {
    SchemaReconciler::new(schema)
        .encode(records)
        .map(|encoded| encoded.matrix)
}
