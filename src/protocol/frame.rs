use crate::{
    protocol::{wire, DbValue},
    RelayResult,
};
use serde::{Deserialize, Serialize};

/// A bounded page of result rows.
///
/// The cursor a frame belongs to is not named on the wire; it lives on the
/// server side, keyed by the statement handle the frame was fetched through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Row index of the first row in this frame, zero-based.
    pub offset: u64,
    /// True iff no further rows remain behind this frame.
    pub done: bool,
    /// Each row is aligned to the signature's column list.
    pub rows: Vec<Vec<DbValue>>,
}

impl Frame {
    /// A rowless frame, used for update results and zero-size first frames.
    pub fn empty(offset: u64, done: bool) -> Frame {
        Frame {
            offset,
            done,
            rows: Vec::new(),
        }
    }

    /// Number of rows in this frame.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if this frame carries no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        wire::emit_u64(self.offset, w)?;
        wire::emit_bool(self.done, w)?;
        wire::emit_len(self.rows.len(), w)?;
        for row in &self.rows {
            wire::emit_len(row.len(), w)?;
            for value in row {
                value.emit(w)?;
            }
        }
        Ok(())
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<Frame> {
        let offset = wire::parse_u64(rdr)?;
        let done = wire::parse_bool(rdr)?;
        let row_count = wire::parse_len(rdr)?;
        let mut rows = Vec::with_capacity(row_count.min(1024));
        for _ in 0..row_count {
            let value_count = wire::parse_len(rdr)?;
            let mut row = Vec::with_capacity(value_count.min(1024));
            for _ in 0..value_count {
                row.push(DbValue::parse(rdr)?);
            }
            rows.push(row);
        }
        Ok(Frame { offset, done, rows })
    }
}
