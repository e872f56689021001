//! Binlog record types and framing
//!
//! Each record on disk contains:
//! - Record Length (u32 LE), total length including this field
//! - Event Type (u8): DML / DDL
//! - Start TS (i64 LE)
//! - Commit TS (i64 LE)
//! - Database name (u32 LE length + UTF-8)
//! - Table name (u32 LE length + UTF-8)
//! - Payload (u32 LE length + bytes)
//! - Checksum (u32 LE), CRC32 over everything before it
//!
//! DML payloads are JSON encoded [`RowChange`](super::RowChange) values.
//! DDL payloads are the UTF-8 statement text.

use std::io::{self, Read, Write};

use super::checksum::compute_checksum;

/// Fixed overhead of a record: len + type + start_ts + commit_ts + 3 length prefixes + checksum
pub const MIN_RECORD_SIZE: usize = 4 + 1 + 8 + 8 + 4 + 4 + 4 + 4;

/// Event types carried by a binlog shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    /// Row change on a table
    Dml = 0,
    /// Schema change statement
    Ddl = 1,
}

impl EventType {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EventType::Dml),
            1 => Some(EventType::Ddl),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A single binlog event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogEvent {
    /// DML or DDL
    pub event_type: EventType,
    /// Transaction start timestamp
    pub start_ts: i64,
    /// Commit timestamp (TSO), the global ordering key
    pub commit_ts: i64,
    /// Database the event belongs to (may be empty for some DDL)
    pub db: String,
    /// Table the event belongs to (empty for database-level DDL)
    pub table: String,
    /// Event body
    pub payload: Vec<u8>,
}

impl BinlogEvent {
    /// Create a DML event
    pub fn dml(
        start_ts: i64,
        commit_ts: i64,
        db: impl Into<String>,
        table: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            event_type: EventType::Dml,
            start_ts,
            commit_ts,
            db: db.into(),
            table: table.into(),
            payload,
        }
    }

    /// Create a DDL event carrying the statement text
    pub fn ddl(
        start_ts: i64,
        commit_ts: i64,
        db: impl Into<String>,
        table: impl Into<String>,
        statement: &str,
    ) -> Self {
        Self {
            event_type: EventType::Ddl,
            start_ts,
            commit_ts,
            db: db.into(),
            table: table.into(),
            payload: statement.as_bytes().to_vec(),
        }
    }

    /// Returns true for schema change events
    pub fn is_ddl(&self) -> bool {
        self.event_type == EventType::Ddl
    }

    /// Returns the DDL statement text.
    pub fn ddl_statement(&self) -> io::Result<&str> {
        std::str::from_utf8(&self.payload).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8 DDL: {}", e))
        })
    }

    /// Serialize the record body (everything except length prefix and checksum)
    fn serialize_body(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            1 + 8 + 8 + 12 + self.db.len() + self.table.len() + self.payload.len(),
        );

        buf.push(self.event_type.as_u8());
        buf.extend_from_slice(&self.start_ts.to_le_bytes());
        buf.extend_from_slice(&self.commit_ts.to_le_bytes());

        buf.extend_from_slice(&(self.db.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.db.as_bytes());

        buf.extend_from_slice(&(self.table.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.table.as_bytes());

        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        buf
    }

    /// Serialize the complete record to bytes
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.serialize_body();
        let record_length = (4 + body.len() + 4) as u32;

        let mut record = Vec::with_capacity(record_length as usize);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.extend_from_slice(&body);

        let checksum = compute_checksum(&record);
        record.extend_from_slice(&checksum.to_le_bytes());

        record
    }

    /// Write the framed record to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<usize> {
        let bytes = self.serialize();
        writer.write_all(&bytes)?;
        Ok(bytes.len())
    }

    /// Deserialize a record from bytes, verifying checksum
    ///
    /// Returns the event and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Record too short",
            ));
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if record_length < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid record length: {}", record_length),
            ));
        }

        if data.len() < record_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Record truncated: expected {} bytes, got {}",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = record_length - 4;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        let computed_checksum = compute_checksum(&data[0..checksum_offset]);

        if computed_checksum != stored_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    computed_checksum, stored_checksum
                ),
            ));
        }

        let event_type = EventType::from_u8(data[4]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid event type: {}", data[4]),
            )
        })?;

        let mut cursor = io::Cursor::new(&data[5..checksum_offset]);
        let start_ts = read_i64(&mut cursor)?;
        let commit_ts = read_i64(&mut cursor)?;
        let db = read_string(&mut cursor)?;
        let table = read_string(&mut cursor)?;
        let payload = read_bytes(&mut cursor)?;

        if cursor.position() as usize != checksum_offset - 5 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Trailing bytes in record body",
            ));
        }

        Ok((
            BinlogEvent {
                event_type,
                start_ts,
                commit_ts,
                db,
                table,
                payload,
            },
            record_length,
        ))
    }
}

fn read_i64<R: Read>(reader: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_bytes<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let buf = read_bytes(reader)?;
    String::from_utf8(buf).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e))
    })
}
