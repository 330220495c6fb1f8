use log::debug;

use crate::error::{RowError, RowResult};
use crate::rows::RowSource;
use crate::rows::value::RowData;

/// An in-memory result set holding encoded rows.
///
/// Each `advance` decodes the next payload. A payload that fails to decode
/// ends iteration with a `RowError::Decode`. Failures can also be injected
/// with `fail_after` and `fail_release`.
#[derive(Debug, Default)]
pub struct VecRows {
    encoded: Vec<Vec<u8>>,
    next: usize,
    current: Option<RowData>,
    err: Option<RowError>,
    fail_after: Option<(usize, RowError)>,
    release_err: Option<RowError>,
    released: bool,
}

impl VecRows {
    /// Fails if any row is too large to encode.
    pub fn new(rows: impl IntoIterator<Item = RowData>) -> RowResult<Self> {
        let encoded = rows.into_iter().map(|r| r.serialize()).collect::<RowResult<Vec<_>>>()?;
        Ok(Self::from_encoded(encoded))
    }

    pub fn from_encoded(encoded: Vec<Vec<u8>>) -> Self {
        VecRows { encoded, ..Default::default() }
    }

    /// Stop with `err` once `rows` rows have been produced.
    pub fn fail_after(mut self, rows: usize, err: RowError) -> Self {
        self.fail_after = Some((rows, err));
        self
    }

    pub fn fail_release(mut self, err: RowError) -> Self {
        self.release_err = Some(err);
        self
    }

    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

impl RowSource for VecRows {
    type Row = RowData;
    type Error = RowError;

    fn advance(&mut self) -> bool {
        self.current = None;
        if self.released || self.err.is_some() {
            return false;
        }
        if matches!(&self.fail_after, Some((n, _)) if self.next >= *n) {
            self.err = self.fail_after.take().map(|(_, e)| e);
            return false;
        }
        let Some(bytes) = self.encoded.get(self.next) else {
            return false;
        };
        match RowData::deserialize(bytes) {
            Ok(row) => {
                self.next += 1;
                self.current = Some(row);
                true
            }
            Err(e) => {
                debug!("row {} failed to decode: {}", self.next, e);
                self.err = Some(e);
                false
            }
        }
    }

    fn current(&mut self) -> RowData {
        self.current.take().unwrap_or_default()
    }

    fn last_error(&mut self) -> Option<RowError> {
        self.err.clone()
    }

    fn release(&mut self) -> Result<(), RowError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.encoded.clear();
        self.current = None;
        debug!("in-memory rows released after {} rows", self.next);
        match self.release_err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
