//! The stream driver boundary (spec §2, §6): pulling records from
//! upstream, pushing them into the engine, and forwarding released tuples
//! to a sink. Concrete CSV/CLI/file-I/O drivers are external collaborators
//! and out of scope here — this module only defines the interface contract
//! and a small row-to-`RawRecord` adapter so a real driver has something
//! uniform to target.

use std::collections::HashMap;

use crate::engine::Castle;
use crate::error::RecordError;
use crate::item::RawRecord;

/// One upstream field value, before it is known to be a quasi-identifier,
/// the pid, or the sensitive attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum RowValue {
    Number(f64),
    Text(String),
}

/// Any non-quasi columns an upstream row carries, to be passed through
/// untouched to the sink.
pub type Payload = HashMap<String, RowValue>;

/// Validates and reshapes a raw attribute-value row into a [`RawRecord`].
/// `pid_key` and `sensitive_key` are looked up as `Text` values; every
/// entry in `headers` must be present and `Number`. Anything else in the
/// row becomes the record's payload.
pub fn extract_record(
    mut row: HashMap<String, RowValue>,
    headers: &[String],
    pid_key: &str,
    sensitive_key: &str,
) -> Result<RawRecord<String, String, Payload>, RecordError> {
    let pid = match row.remove(pid_key) {
        Some(RowValue::Text(s)) => s,
        Some(RowValue::Number(n)) => n.to_string(),
        None => return Err(RecordError::MissingField(pid_key.to_string())),
    };

    let sensitive = match row.remove(sensitive_key) {
        Some(RowValue::Text(s)) => s,
        Some(RowValue::Number(n)) => n.to_string(),
        None => return Err(RecordError::MissingField(sensitive_key.to_string())),
    };

    let mut quasi = HashMap::with_capacity(headers.len());
    for header in headers {
        match row.remove(header) {
            Some(RowValue::Number(n)) => {
                quasi.insert(header.clone(), n);
            }
            Some(RowValue::Text(_)) => {
                return Err(RecordError::NonNumericQuasi(header.clone()));
            }
            None => return Err(RecordError::MissingField(header.clone())),
        }
    }

    Ok(RawRecord::new(pid, sensitive, quasi, row))
}

/// An upstream source of raw records. Implemented by external collaborators
/// (CSV readers, synthetic generators, message-bus consumers, ...); this
/// crate only needs the trait to exist so `run_to_completion` can be
/// generic over it.
pub trait StreamSource<P, Sv, Payload> {
    /// Returns the next record, or `None` once the stream is exhausted.
    fn next_record(&mut self) -> Option<RawRecord<P, Sv, Payload>>;
}

impl<P, Sv, Payload> StreamSource<P, Sv, Payload> for std::vec::IntoIter<RawRecord<P, Sv, Payload>> {
    fn next_record(&mut self) -> Option<RawRecord<P, Sv, Payload>> {
        self.next()
    }
}

/// Pumps every record out of `source` through `castle`, forwarding each
/// generalized release to `sink` via `castle`'s own callback. Per spec §5,
/// calls into `castle.insert` must already be serialized by the caller if
/// `source` is fed from another thread — this function itself does no
/// synchronization.
pub fn run_to_completion<P, Sv, Payload, R, S>(
    castle: &mut Castle<P, Sv, Payload, R>,
    source: &mut S,
) -> Result<usize, RecordError>
where
    P: Clone + Eq + std::hash::Hash + std::fmt::Debug,
    Sv: Clone + Eq + std::hash::Hash + std::fmt::Debug,
    R: rand::Rng,
    S: StreamSource<P, Sv, Payload>,
{
    let mut admitted = 0;
    while let Some(record) = source.next_record() {
        castle.insert(record)?;
        admitted += 1;
    }
    Ok(admitted)
}
