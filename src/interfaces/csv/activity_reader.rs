use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

/// One row of a bulk activity import: `athlete,date,km,note`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ActivityRecord {
    pub athlete: u64,
    pub date: String,
    pub km: f64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Reads activity rows from a CSV source.
///
/// Whitespace is trimmed and the trailing `note` column may be omitted.
pub struct ActivityReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ActivityReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows; a malformed row yields an error without
    /// ending the stream.
    pub fn records(self) -> impl Iterator<Item = Result<ActivityRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
