use std::fmt;
use crate::error::{RowError, RowResult};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Integer(i32),
    Text(String),
    Boolean(bool),
    Null,
}

impl ColumnValue {
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            ColumnValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Integer(i) => write!(f, "{}", i),
            ColumnValue::Text(s) => write!(f, "{}", s),
            ColumnValue::Boolean(b) => write!(f, "{}", b),
            ColumnValue::Null => write!(f, "NULL"),
        }
    }
}

/// One decoded row.
///
/// Encoded form:
///   [2B column count]
///   for each column: [1B tag][value]
///     0x01 Integer  [4B i32 LE]
///     0x02 Text     [4B len LE][len bytes UTF-8]
///     0x03 Boolean  [1B]
///     0x04 Null
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowData(pub Vec<ColumnValue>);

impl RowData {
    pub fn get(&self, column: usize) -> Option<&ColumnValue> {
        self.0.get(column)
    }

    /// Rows wider than `u16::MAX` columns, or text longer than `u32::MAX`
    /// bytes, cannot be encoded.
    pub fn serialize(&self) -> RowResult<Vec<u8>> {
        let mut buf = Vec::new();
        let num_cols = u16::try_from(self.0.len())
            .map_err(|_| RowError::Encode(format!("{} columns exceeds {}", self.0.len(), u16::MAX)))?;
        buf.extend(&num_cols.to_le_bytes());
        for col in &self.0 {
            match col {
                ColumnValue::Integer(i) => {
                    buf.push(0x01);
                    buf.extend(&i.to_le_bytes());
                }
                ColumnValue::Text(s) => {
                    buf.push(0x02);
                    let len = u32::try_from(s.len())
                        .map_err(|_| RowError::Encode(format!("text of {} bytes is too long", s.len())))?;
                    buf.extend(&len.to_le_bytes());
                    buf.extend(s.as_bytes());
                }
                ColumnValue::Boolean(b) => {
                    buf.push(0x03);
                    buf.push(if *b { 1 } else { 0 });
                }
                ColumnValue::Null => buf.push(0x04),
            }
        }
        Ok(buf)
    }

    pub fn deserialize(bytes: &[u8]) -> RowResult<RowData> {
        let mut offset = 0;
        let num_cols = u16::from_le_bytes(take::<2>(bytes, &mut offset)?) as usize;
        let mut cols = Vec::with_capacity(num_cols);
        for _ in 0..num_cols {
            let [tag] = take::<1>(bytes, &mut offset)?;
            match tag {
                0x01 => cols.push(ColumnValue::Integer(i32::from_le_bytes(take::<4>(bytes, &mut offset)?))),
                0x02 => {
                    let len = u32::from_le_bytes(take::<4>(bytes, &mut offset)?) as usize;
                    if offset + len > bytes.len() {
                        return Err(RowError::Decode("text runs past end of row".into()));
                    }
                    let s = std::str::from_utf8(&bytes[offset..offset + len])
                        .map_err(|e| RowError::Decode(e.to_string()))?;
                    offset += len;
                    cols.push(ColumnValue::Text(s.to_string()));
                }
                0x03 => {
                    let [b] = take::<1>(bytes, &mut offset)?;
                    cols.push(ColumnValue::Boolean(b != 0));
                }
                0x04 => cols.push(ColumnValue::Null),
                other => return Err(RowError::Decode(format!("unknown type tag {:#04x}", other))),
            }
        }
        Ok(RowData(cols))
    }
}

fn take<const N: usize>(bytes: &[u8], offset: &mut usize) -> RowResult<[u8; N]> {
    let end = *offset + N;
    let slice = bytes
        .get(*offset..end)
        .ok_or_else(|| RowError::Decode("unexpected end of row".into()))?;
    *offset = end;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

impl From<Vec<ColumnValue>> for RowData {
    fn from(cols: Vec<ColumnValue>) -> Self {
        RowData(cols)
    }
}
