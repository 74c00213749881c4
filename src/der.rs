//! DER → JOSE conversion for ECDSA P-256 signatures.
//!
//! Generic ECDSA APIs emit an ASN.1 `SEQUENCE { INTEGER r, INTEGER s }`.
//! ES256 in a JWS wants the raw 64-byte `r ‖ s`, each half left-padded to
//! 32 bytes. DER integers are minimal-length and carry a leading `0x00`
//! when the high bit is set, so either half can arrive as anything from a
//! handful of bytes up to 33.

use crate::error::{PushError, Result};

/// Length of one P-256 signature component.
const COMPONENT_LEN: usize = 32;

/// Length of a JOSE ES256 signature.
pub const JOSE_SIGNATURE_LEN: usize = COMPONENT_LEN * 2;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

/// Convert a DER-encoded ECDSA signature to the 64-byte JOSE form.
pub fn der_to_jose(der: &[u8]) -> Result<[u8; JOSE_SIGNATURE_LEN]> {
    let mut reader = DerReader { buf: der, pos: 0 };

    reader.expect_tag(TAG_SEQUENCE)?;
    reader.read_length()?;

    let r = reader.read_integer()?;
    let s = reader.read_integer()?;

    let mut out = [0u8; JOSE_SIGNATURE_LEN];
    copy_component(r, &mut out[..COMPONENT_LEN]);
    copy_component(s, &mut out[COMPONENT_LEN..]);
    Ok(out)
}

/// Right-align `value` in `dest`, dropping excess leading bytes.
fn copy_component(value: &[u8], dest: &mut [u8]) {
    if value.len() >= dest.len() {
        dest.copy_from_slice(&value[value.len() - dest.len()..]);
    } else {
        let offset = dest.len() - value.len();
        dest[offset..].copy_from_slice(value);
    }
}

struct DerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    fn next_byte(&mut self) -> Result<u8> {
        let byte = self.buf.get(self.pos).copied().ok_or_else(|| {
            PushError::InvalidSignatureFormat(format!("truncated at offset {}", self.pos))
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect_tag(&mut self, tag: u8) -> Result<()> {
        let offset = self.pos;
        let found = self.next_byte()?;
        if found != tag {
            return Err(PushError::InvalidSignatureFormat(format!(
                "expected tag 0x{tag:02x} at offset {offset}, found 0x{found:02x}"
            )));
        }
        Ok(())
    }

    /// Short form, or long form with a single length byte (`0x81 nn`).
    fn read_length(&mut self) -> Result<usize> {
        let first = self.next_byte()?;
        match first {
            0x00..=0x7f => Ok(usize::from(first)),
            0x81 => Ok(usize::from(self.next_byte()?)),
            _ => Err(PushError::InvalidSignatureFormat(format!(
                "unsupported length encoding 0x{first:02x}"
            ))),
        }
    }

    fn read_integer(&mut self) -> Result<&'a [u8]> {
        self.expect_tag(TAG_INTEGER)?;
        let len = self.read_length()?;
        if len == 0 {
            return Err(PushError::InvalidSignatureFormat(
                "empty INTEGER".to_string(),
            ));
        }
        let end = self.pos + len;
        let value = self.buf.get(self.pos..end).ok_or_else(|| {
            PushError::InvalidSignatureFormat(format!(
                "INTEGER of length {len} overruns {}-byte signature",
                self.buf.len()
            ))
        })?;
        self.pos = end;
        Ok(value)
    }
}
