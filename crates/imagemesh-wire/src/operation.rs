//! Fixed-width operation selector.

use std::fmt;
use std::io::{Read, Write};

use crate::WireError;
use crate::frame::fill;

/// Width of the operation field. Both directions of every link use it.
pub const OPERATION_FIELD_BYTES: usize = 32;

/// Name of the transform a request asks for.
///
/// On the wire the name occupies exactly [`OPERATION_FIELD_BYTES`] bytes of
/// UTF-8, right-padded with NUL bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationName(String);

impl OperationName {
    /// Validates and wraps an operation name.
    ///
    /// # Errors
    ///
    /// Rejects names that are blank, contain NUL, or do not fit the field.
    pub fn new(name: impl Into<String>) -> Result<Self, WireError> {
        let text: String = name.into();
        if text.trim().is_empty() {
            return Err(WireError::EmptyOperation);
        }
        if text.contains('\0') {
            return Err(WireError::InvalidOperation);
        }
        if text.len() > OPERATION_FIELD_BYTES {
            return Err(WireError::OperationTooLong {
                length: text.len(),
                max: OPERATION_FIELD_BYTES,
            });
        }
        Ok(Self(text))
    }

    /// The name as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encodes the padded field.
    #[must_use]
    pub fn to_field(&self) -> [u8; OPERATION_FIELD_BYTES] {
        let mut field = [0_u8; OPERATION_FIELD_BYTES];
        for (slot, byte) in field.iter_mut().zip(self.0.as_bytes()) {
            *slot = *byte;
        }
        field
    }

    /// Decodes a padded field.
    ///
    /// # Errors
    ///
    /// Rejects non-UTF-8 content, interior NULs and blank names.
    pub fn from_field(field: &[u8; OPERATION_FIELD_BYTES]) -> Result<Self, WireError> {
        let end = field
            .iter()
            .rposition(|byte| *byte != 0)
            .map_or(0, |position| position + 1);
        let text = field.get(..end).unwrap_or_default();
        let name = std::str::from_utf8(text).map_err(|_| WireError::InvalidOperation)?;
        Self::new(name.trim_end())
    }

    /// Reads the field from a stream.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and field validation errors.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, WireError> {
        let mut field = [0_u8; OPERATION_FIELD_BYTES];
        fill(reader, &mut field, "operation")?;
        Self::from_field(&field)
    }

    /// Writes the field to a stream.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] when the socket fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WireError> {
        writer.write_all(&self.to_field())?;
        Ok(())
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
