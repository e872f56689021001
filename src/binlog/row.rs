//! Row change payloads carried by DML events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of row mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowChangeKind {
    Insert,
    Update,
    Delete,
}

/// Decoded DML payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub kind: RowChangeKind,
    /// Column names, positionally matching `values`
    pub columns: Vec<String>,
    /// Post-image for insert/update, pre-image for delete
    pub values: Vec<Value>,
    /// Pre-image for update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_values: Option<Vec<Value>>,
}

impl RowChange {
    /// Create an insert row change
    pub fn insert(columns: &[&str], values: Vec<Value>) -> Self {
        Self {
            kind: RowChangeKind::Insert,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values,
            old_values: None,
        }
    }

    /// Encode to the JSON wire payload
    pub fn encode(&self) -> Vec<u8> {
        // Serializing plain data with string keys cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode from a DML payload and check its shape.
    pub fn decode(payload: &[u8]) -> Result<Self, String> {
        let row: RowChange =
            serde_json::from_slice(payload).map_err(|e| format!("Invalid row payload: {}", e))?;

        if row.columns.len() != row.values.len() {
            return Err(format!(
                "Row payload has {} columns but {} values",
                row.columns.len(),
                row.values.len()
            ));
        }

        match (&row.kind, &row.old_values) {
            (RowChangeKind::Update, Some(old)) if old.len() != row.columns.len() => {
                Err(format!(
                    "Update pre-image has {} values for {} columns",
                    old.len(),
                    row.columns.len()
                ))
            }
            (RowChangeKind::Update, None) => Err("Update row is missing its pre-image".into()),
            _ => Ok(row),
        }
    }
}
