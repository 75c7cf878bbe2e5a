use crate::error::{GymError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Schedule,
    Book,
    Cancel,
    Join,
    Pay,
    Callback,
    Confirm,
    Reject,
}

/// One row of the operations file.
///
/// Columns are `op, member, session, arg`. `member` doubles as the
/// instructor name for `schedule` rows; `arg` carries the capacity for
/// `schedule`, the amount for `pay`, the status keyword for `callback`
/// (default PAID), and the reason for `cancel`/`reject`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OpRecord {
    pub op: OpKind,
    pub member: String,
    pub session: String,
    pub arg: Option<String>,
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<OpRecord>`,
/// with whitespace trimming and flexible record lengths, so large replay
/// files stream without loading into memory.
pub struct OpsReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OpsReader<R> {
    /// Creates a new `OpsReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations.
    pub fn records(self) -> impl Iterator<Item = Result<OpRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(GymError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, member, session, arg\n\
                    schedule, dina, yoga, 10\n\
                    book, alice, yoga,\n\
                    pay, alice, , 250.0";
        let reader = OpsReader::new(data.as_bytes());
        let records: Vec<Result<OpRecord>> = reader.records().collect();

        assert_eq!(records.len(), 3);
        let schedule = records[0].as_ref().unwrap();
        assert_eq!(schedule.op, OpKind::Schedule);
        assert_eq!(schedule.session, "yoga");
        assert_eq!(schedule.arg.as_deref(), Some("10"));

        let book = records[1].as_ref().unwrap();
        assert_eq!(book.op, OpKind::Book);
        assert_eq!(book.arg, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op, member, session, arg\nteleport, alice, yoga,";
        let reader = OpsReader::new(data.as_bytes());
        let records: Vec<Result<OpRecord>> = reader.records().collect();

        assert!(records[0].is_err());
    }
}
