use serde::{Deserialize, Serialize};

/// Summary of a statement (or batch) that does not return rows.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub changes: usize,
    pub last_insert_rowid: i64,
}
