// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Record line codec.
//!
//! ## On-Disk Record Format
//!
//! One record per line in a page file, all fields decimal ASCII or text:
//!
//! ```text
//! ┌──────────┬────┬──────────────┬────┬─────────────────┬────┐
//! │  serial  │ \t │ crc32 (dec)  │ \t │ payload (text)  │ \n │
//! └──────────┴────┴──────────────┴────┴─────────────────┴────┘
//! ```
//!
//! The payload may not contain `\n`, `\r` or NUL. The checksum is taken over
//! the payload after reserved bytes have been substituted, so what is read back
//! verifies against exactly what was written.

use std::borrow::Cow;

use snafu::ensure;

use crate::{
    Result,
    config::ReservedBytePolicy,
    crc::payload_checksum,
    error::{ChecksumMismatchSnafu, DecodeSnafu, MalformedPayloadSnafu, RecordError},
    serial::Serial,
};

const FIELD_SEPARATOR: char = '\t';

/// `\n`, `\r` and NUL delimit lines and records.
#[inline]
pub(crate) const fn is_reserved(byte: u8) -> bool {
    matches!(byte, b'\n' | b'\r' | 0)
}

/// Applies `policy` to `payload`, borrowing when nothing needs to change.
pub(crate) fn sanitize(payload: &str, policy: ReservedBytePolicy) -> Result<Cow<'_, str>> {
    let Some(offset) = payload.bytes().position(is_reserved) else {
        return Ok(Cow::Borrowed(payload));
    };

    match policy {
        ReservedBytePolicy::Reject => MalformedPayloadSnafu {
            byte: payload.as_bytes()[offset],
            offset,
        }
        .fail(),
        ReservedBytePolicy::Substitute(substitute) => Ok(Cow::Owned(
            payload
                .chars()
                .map(|c| if c.is_ascii() && is_reserved(c as u8) { substitute } else { c })
                .collect(),
        )),
    }
}

/// Encodes one record as a complete line, trailing newline included.
pub(crate) fn pack(serial: Serial, payload: &str, policy: ReservedBytePolicy) -> Result<String> {
    let payload = sanitize(payload, policy)?;
    let checksum = payload_checksum(payload.as_bytes());
    Ok(format!(
        "{serial}{FIELD_SEPARATOR}{checksum}{FIELD_SEPARATOR}{payload}\n"
    ))
}

/// Splits the serial off a line, returning it with the rest of the line.
pub(crate) fn unpack_serial(line: &str) -> Result<(Serial, &str), RecordError> {
    let Some((serial, rest)) = line.split_once(FIELD_SEPARATOR) else {
        return DecodeSnafu {
            reason: "missing serial separator",
        }
        .fail();
    };
    let serial = serial.parse::<Serial>().map_err(|e| {
        DecodeSnafu {
            reason: format!("bad serial field: {e}"),
        }
        .build()
    })?;
    Ok((serial, rest))
}

/// Verifies the checksum of the remainder of a line and returns the payload.
pub(crate) fn unpack_checksum_and_payload(
    serial: Serial,
    rest: &str,
) -> Result<&str, RecordError> {
    let Some((checksum, payload)) = rest.split_once(FIELD_SEPARATOR) else {
        return DecodeSnafu {
            reason: format!("record {serial} is missing the checksum separator"),
        }
        .fail();
    };
    let stored = checksum.parse::<u32>().map_err(|e| {
        DecodeSnafu {
            reason: format!("record {serial} has a bad checksum field: {e}"),
        }
        .build()
    })?;

    let payload = payload.trim_end_matches(|c: char| c.is_ascii() && is_reserved(c as u8));
    let computed = payload_checksum(payload.as_bytes());
    ensure!(
        stored == computed,
        ChecksumMismatchSnafu {
            serial,
            stored,
            computed,
        }
    );
    Ok(payload)
}

/// Decodes one raw line read from a page file.
pub(crate) fn decode_line(line: &[u8]) -> Result<(Serial, &str), RecordError> {
    let line = std::str::from_utf8(line).map_err(|e| {
        DecodeSnafu {
            reason: format!("line is not valid UTF-8: {e}"),
        }
        .build()
    })?;
    let (serial, rest) = unpack_serial(line)?;
    let payload = unpack_checksum_and_payload(serial, rest)?;
    Ok((serial, payload))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::QueueError;

    const SPACE: ReservedBytePolicy = ReservedBytePolicy::Substitute(' ');

    #[test]
    fn test_pack_layout() {
        let line = pack(Serial::new(7), "hello", SPACE).unwrap();
        let crc = payload_checksum(b"hello");
        assert_eq!(line, format!("7\t{crc}\thello\n"));
    }

    #[test]
    fn test_decode_packed_line() {
        let line = pack(Serial::new(42), "alpha\tbeta", SPACE).unwrap();
        let (serial, payload) = decode_line(line.as_bytes()).unwrap();
        assert_eq!(serial, Serial::new(42));
        assert_eq!(payload, "alpha\tbeta");
    }

    #[test]
    fn test_substitution_still_verifies() {
        let line = pack(Serial::new(1), "a\nb\rc\0d", ReservedBytePolicy::Substitute('_')).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        let (_, payload) = decode_line(line.as_bytes()).unwrap();
        assert_eq!(payload, "a_b_c_d");
    }

    #[test]
    fn test_reject_reports_offset() {
        let err = pack(Serial::new(1), "ab\rc", ReservedBytePolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            QueueError::MalformedPayload {
                byte: b'\r',
                offset: 2
            }
        ));
    }

    #[test]
    fn test_sanitize_borrows_clean_payload() {
        assert!(matches!(sanitize("clean", SPACE).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_trailing_crlf_is_stripped() {
        let crc = payload_checksum(b"data");
        let line = format!("3\t{crc}\tdata\r\n");
        assert_eq!(decode_line(line.as_bytes()).unwrap().1, "data");
    }

    #[test]
    fn test_checksum_mismatch() {
        let crc = payload_checksum(b"data");
        let line = format!("3\t{}\tdata\n", crc.wrapping_add(1));
        assert!(matches!(
            decode_line(line.as_bytes()),
            Err(RecordError::ChecksumMismatch { serial, .. }) if serial == Serial::new(3)
        ));
    }

    #[test_case(b"no separators" ; "no tabs")]
    #[test_case(b"abc\t1\tx" ; "non numeric serial")]
    #[test_case(b"99999999\t1\tx" ; "serial out of range")]
    #[test_case(b"5\tdata" ; "missing checksum separator")]
    #[test_case(b"5\tzz\tdata" ; "non numeric checksum")]
    #[test_case(b"5\t1\t\xff\xfe" ; "invalid utf8")]
    fn test_decode_errors(line: &[u8]) {
        assert!(matches!(decode_line(line), Err(RecordError::Decode { .. })));
    }
}
