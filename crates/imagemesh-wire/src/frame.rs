//! Primitive field readers and writers.
//!
//! Stream sockets deliver bytes in arbitrary fragments, so every read loops
//! until the exact field length has been accumulated. No single read call asks
//! for more than [`READ_CHUNK_BYTES`].

use std::io::{self, Read, Write};

use crate::WireError;

/// Upper bound on the buffer handed to one `read` call.
pub const READ_CHUNK_BYTES: usize = 4096;

/// Width of every integer field on the wire.
pub const INTEGER_FIELD_BYTES: usize = 8;

/// Fills `buffer` completely, reading at most [`READ_CHUNK_BYTES`] at a time.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] when the peer closes the stream early and
/// [`WireError::Io`] when the socket fails.
pub fn fill<R: Read>(
    reader: &mut R,
    buffer: &mut [u8],
    field: &'static str,
) -> Result<(), WireError> {
    let expected = buffer.len();
    let mut received = 0;
    while received < expected {
        let end = expected.min(received.saturating_add(READ_CHUNK_BYTES));
        let window = buffer
            .get_mut(received..end)
            .ok_or(WireError::Truncated {
                field,
                expected,
                received,
            })?;
        match reader.read(window) {
            Ok(0) => {
                return Err(WireError::Truncated {
                    field,
                    expected,
                    received,
                });
            }
            Ok(read) => received += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(WireError::Io(error)),
        }
    }
    Ok(())
}

/// Reads exactly `len` bytes into a fresh buffer.
///
/// # Errors
///
/// See [`fill`].
pub fn read_bytes<R: Read>(
    reader: &mut R,
    len: usize,
    field: &'static str,
) -> Result<Vec<u8>, WireError> {
    let mut buffer = vec![0_u8; len];
    fill(reader, &mut buffer, field)?;
    Ok(buffer)
}

/// Reads an 8-byte big-endian unsigned integer.
///
/// # Errors
///
/// See [`fill`].
pub fn read_u64<R: Read>(reader: &mut R, field: &'static str) -> Result<u64, WireError> {
    let mut buffer = [0_u8; INTEGER_FIELD_BYTES];
    fill(reader, &mut buffer, field)?;
    Ok(u64::from_be_bytes(buffer))
}

/// Reads a single byte.
///
/// # Errors
///
/// See [`fill`].
pub fn read_u8<R: Read>(reader: &mut R, field: &'static str) -> Result<u8, WireError> {
    let mut buffer = [0_u8; 1];
    fill(reader, &mut buffer, field)?;
    let [byte] = buffer;
    Ok(byte)
}

/// Writes an 8-byte big-endian unsigned integer.
///
/// # Errors
///
/// Returns [`WireError::Io`] when the socket fails.
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<(), WireError> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// Writes a length-prefixed byte string.
///
/// # Errors
///
/// Returns [`WireError::Io`] when the socket fails.
pub fn write_prefixed<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<(), WireError> {
    write_u64(writer, len_to_u64(bytes.len()))?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Reads a length-prefixed byte string of at most `max` bytes.
///
/// Over-long prefixes are reported through `too_long` so callers can choose
/// the error that fits the field.
///
/// # Errors
///
/// Propagates transport failures and the error built by `too_long`.
pub fn read_prefixed<R: Read>(
    reader: &mut R,
    max: u64,
    field: &'static str,
    too_long: impl FnOnce(u64) -> WireError,
) -> Result<Vec<u8>, WireError> {
    let announced = read_u64(reader, field)?;
    if announced > max {
        return Err(too_long(announced));
    }
    let len = usize::try_from(announced).map_err(|_| too_long(announced))?;
    read_bytes(reader, len, field)
}

/// Widens a buffer length to the wire integer type.
#[must_use]
pub fn len_to_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Reader that hands out at most `step` bytes per call and records the
    /// largest buffer it was offered.
    struct Trickle {
        data: Vec<u8>,
        position: usize,
        step: usize,
        largest_request: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.largest_request = self.largest_request.max(buf.len());
            let remaining = self.data.len() - self.position;
            let count = remaining.min(self.step).min(buf.len());
            buf[..count].copy_from_slice(&self.data[self.position..self.position + count]);
            self.position += count;
            Ok(count)
        }
    }

    #[test]
    fn fill_accumulates_fragmented_reads() {
        let data: Vec<u8> = (0..10_000_u32)
            .map(|value| u8::try_from(value & 0xff).unwrap_or_default())
            .collect();
        let mut reader = Trickle {
            data: data.clone(),
            position: 0,
            step: 777,
            largest_request: 0,
        };
        let read = read_bytes(&mut reader, data.len(), "pixels").expect("read all");
        assert_eq!(read, data);
        assert!(reader.largest_request <= READ_CHUNK_BYTES);
    }

    #[test]
    fn short_stream_reports_truncation() {
        let mut reader = Cursor::new(vec![0_u8; 5]);
        let error = read_u64(&mut reader, "image count").expect_err("too short");
        assert!(matches!(
            error,
            WireError::Truncated {
                field: "image count",
                expected: 8,
                received: 5
            }
        ));
        assert!(error.is_transport());
    }

    #[test]
    fn integers_are_big_endian() {
        let mut output = Vec::new();
        write_u64(&mut output, 0x0102).expect("write");
        assert_eq!(output, vec![0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn prefixed_reads_respect_the_cap() {
        let mut output = Vec::new();
        write_prefixed(&mut output, b"hello").expect("write");
        let error = read_prefixed(&mut Cursor::new(output), 4, "message", |len| {
            WireError::invalid_message(format!("{len} bytes"))
        })
        .expect_err("cap exceeded");
        assert!(matches!(error, WireError::InvalidMessage(_)));
    }
}
