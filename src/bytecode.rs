use super::chunk::Chunk;
use super::object::Heap;
use super::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

/// Leading bytes of a compiled file; `run` sniffs these to tell compiled
/// chunks from plain source.
pub const MAGIC: &[u8; 7] = b"POWON\0\0";

const TAG_NONE: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_INFINITY: u8 = 4;
const TAG_NAN: u8 = 5;
const TAG_STRING: u8 = 6;

#[derive(Debug)]
pub enum BytecodeError {
    Io(io::Error),
    Malformed(&'static str),
}

impl fmt::Display for BytecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Malformed(what) => write!(f, "{what}"),
        }
    }
}

impl From<io::Error> for BytecodeError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Layout after the magic, all integers big-endian: `u32` line count,
/// `u32` constant count, `u32` string-table size, the string table
/// (`u32` length + UTF-8 bytes each), the constants (tag byte plus a
/// value-dependent payload), the lines (`u64` each), then the raw code
/// bytes to end of file.
pub fn write_chunk(chunk: &Chunk, heap: &Heap, out: &mut dyn Write) -> io::Result<()> {
    out.write_all(MAGIC)?;
    out.write_all(&(chunk.lines().len() as u32).to_be_bytes())?;
    out.write_all(&(chunk.constants().len() as u32).to_be_bytes())?;

    // first pass: collect every distinct string the constants reference
    let mut table: Vec<&str> = Vec::new();
    let mut table_indices = HashMap::new();
    for constant in chunk.constants() {
        if let Value::Str(handle) = constant {
            table_indices.entry(*handle).or_insert_with(|| {
                table.push(heap.get_str(*handle));
                (table.len() - 1) as u32
            });
        }
    }

    out.write_all(&(table.len() as u32).to_be_bytes())?;
    for content in &table {
        out.write_all(&(content.len() as u32).to_be_bytes())?;
        out.write_all(content.as_bytes())?;
    }

    for constant in chunk.constants() {
        match constant {
            Value::None => out.write_all(&[TAG_NONE])?,
            Value::Bool(b) => out.write_all(&[TAG_BOOL, *b as u8])?,
            Value::Int(x) => {
                out.write_all(&[TAG_INT])?;
                out.write_all(&x.to_be_bytes())?;
            }
            Value::Double(x) => {
                out.write_all(&[TAG_DOUBLE])?;
                out.write_all(&x.to_be_bytes())?;
            }
            Value::Infinity(positive) => out.write_all(&[TAG_INFINITY, *positive as u8])?,
            Value::NaN(positive) => out.write_all(&[TAG_NAN, *positive as u8])?,
            Value::Str(handle) => {
                out.write_all(&[TAG_STRING])?;
                out.write_all(&table_indices[handle].to_be_bytes())?;
            }
        }
    }

    for line in chunk.lines() {
        out.write_all(&(*line as u64).to_be_bytes())?;
    }

    out.write_all(chunk.code())?;
    Ok(())
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u8], BytecodeError> {
        if self.at + count > self.bytes.len() {
            return Err(BytecodeError::Malformed("Unexpected end of compiled file."));
        }
        let slice = &self.bytes[self.at..self.at + count];
        self.at += count;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, BytecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, BytecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, BytecodeError> {
        let bytes = self.take(8)?;
        let mut buffer = [0u8; 8];
        buffer.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buffer))
    }

    fn rest(self) -> Vec<u8> {
        self.bytes[self.at..].to_vec()
    }
}

/// Rebuilds a chunk from a compiled file, re-interning every string into
/// the live heap so handle identity holds again.
pub fn read_chunk(bytes: &[u8], heap: &mut Heap) -> Result<Chunk, BytecodeError> {
    if !bytes.starts_with(MAGIC) {
        return Err(BytecodeError::Malformed("Missing PythOwOn magic bytes."));
    }
    let mut cursor = Cursor {
        bytes,
        at: MAGIC.len(),
    };

    let line_count = cursor.read_u32()? as usize;
    let constant_count = cursor.read_u32()? as usize;
    let string_count = cursor.read_u32()? as usize;

    let mut table = Vec::with_capacity(string_count);
    for _ in 0..string_count {
        let length = cursor.read_u32()? as usize;
        let content = std::str::from_utf8(cursor.take(length)?)
            .map_err(|_| BytecodeError::Malformed("String table entry is not UTF-8."))?;
        table.push(heap.intern(content));
    }

    let mut constants = Vec::with_capacity(constant_count);
    for _ in 0..constant_count {
        let value = match cursor.read_u8()? {
            TAG_NONE => Value::None,
            TAG_BOOL => Value::Bool(cursor.read_u8()? != 0),
            TAG_INT => {
                let bytes = cursor.take(8)?;
                let mut buffer = [0u8; 8];
                buffer.copy_from_slice(bytes);
                Value::Int(i64::from_be_bytes(buffer))
            }
            TAG_DOUBLE => {
                let bytes = cursor.take(8)?;
                let mut buffer = [0u8; 8];
                buffer.copy_from_slice(bytes);
                Value::Double(f64::from_be_bytes(buffer))
            }
            TAG_INFINITY => Value::Infinity(cursor.read_u8()? != 0),
            TAG_NAN => Value::NaN(cursor.read_u8()? != 0),
            TAG_STRING => {
                let index = cursor.read_u32()? as usize;
                match table.get(index) {
                    Some(handle) => Value::Str(*handle),
                    None => {
                        return Err(BytecodeError::Malformed(
                            "String constant index out of range.",
                        ))
                    }
                }
            }
            _ => return Err(BytecodeError::Malformed("Unknown constant tag.")),
        };
        constants.push(value);
    }

    let mut lines = Vec::with_capacity(line_count);
    for _ in 0..line_count {
        lines.push(cursor.read_u64()? as usize);
    }

    let code = cursor.rest();
    if code.len() != line_count {
        return Err(BytecodeError::Malformed(
            "Line table does not match the code length.",
        ));
    }

    Ok(Chunk::from_parts(code, lines, constants))
}
