use crate::{Error, Result};

/// Management command which lists the storage resources backing ingestion.
pub const GET_INGESTION_RESOURCES: &str = ".get ingestion resources";
/// Management command which returns the token authorizing ingest messages.
pub const GET_IDENTITY_TOKEN: &str = ".get kusto identity token";
/// Management command which reports the role of the addressed endpoint.
pub const SHOW_VERSION: &str = ".show version";

/// ControlPlane issues management commands to the service endpoint that
/// vends ingestion resources and identity tokens.
///
/// Implementations map transport and service failures into the crate's
/// error classes: peer-attributable conditions as [`Error::Service`],
/// caller-attributable ones as a client-class variant, and the service's
/// distinguished throttle signal as [`Error::Throttled`] so the retry
/// policy can absorb it.
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    /// Execute a management command and return its primary rowset.
    async fn execute(&self, command: &str) -> Result<RowSet>;
}

/// RowSet is the tabular result of a management command: named columns
/// over rows of JSON cells.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowSet {
    /// Resolve the index of a named column.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MalformedResponse(format!("{name} column is missing")))
    }

    /// Read a cell which must hold a string.
    pub fn str_cell(&self, row: usize, column: usize) -> Result<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::MalformedResponse(format!("expected a string cell at row {row}"))
            })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rowset_column_lookup_and_cells() {
        let rows = RowSet {
            columns: vec!["ResourceTypeName".to_string(), "StorageRoot".to_string()],
            rows: vec![vec![
                serde_json::json!("TempStorage"),
                serde_json::json!("https://a.blob.example.net/t1?sas=1"),
            ]],
        };

        assert_eq!(rows.column("StorageRoot").unwrap(), 1);
        assert_eq!(rows.str_cell(0, 0).unwrap(), "TempStorage");

        let err = rows.column("Nope").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)), "{err}");
        assert!(rows.str_cell(1, 0).is_err());
        assert!(rows.str_cell(0, 2).is_err());
    }
}
