/// Join & enrichment layer
///
/// Attaches a computed metric to the base records it was grouped by.
use crate::store::{document_id, Document};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A base record paired with one computed metric
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched<M> {
    pub record: Document,
    pub metric: M,
}

impl<M: Serialize> Enriched<M> {
    /// Render as the base record plus `field: metric`
    pub fn into_document(self, field: &str) -> Document {
        let mut record = self.record;
        // Metrics are plain numbers; serializing them cannot fail
        let value = serde_json::to_value(&self.metric).unwrap_or(Value::Null);
        record.insert(field.to_string(), value);
        record
    }
}

/// Join records with their metric.
///
/// Records keep their incoming order. Records without a metric are left
/// out, so are metrics whose record does not exist.
pub fn join_metric<M: Copy>(records: Vec<Document>, metrics: &BTreeMap<i64, M>) -> Vec<Enriched<M>> {
    records
        .into_iter()
        .filter_map(|record| {
            let metric = *metrics.get(&document_id(&record)?)?;
            Some(Enriched { record, metric })
        })
        .collect()
}

/// Render a ranked list with the metric under `field`
pub fn render<M: Serialize>(items: Vec<Enriched<M>>, field: &str) -> Vec<Document> {
    items
        .into_iter()
        .map(|item| item.into_document(field))
        .collect()
}
