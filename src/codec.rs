//! Binary encoding of speed record partitions.
//!
//! A partition is a length-prefixed array of positional 4-tuples
//! `(timestamp_ms, route_tag, speed_kmh, vehicle_count)` in bincode's
//! standard (varint) configuration.

use bincode::config::{self, Configuration, Limit, LittleEndian, Varint};

use crate::error::CodecError;
use crate::types::SpeedRecord;

/// Upper bound on bytes a single decode may allocate.
const DECODE_LIMIT: usize = 512 * 1024 * 1024;

type RecordConfig = Configuration<LittleEndian, Varint, Limit<DECODE_LIMIT>>;

fn record_config() -> RecordConfig {
    config::standard().with_limit::<DECODE_LIMIT>()
}

/// Encodes a batch of records into partition bytes.
pub fn encode(records: &[SpeedRecord]) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serde::encode_to_vec(records, record_config())?)
}

/// Decodes partition bytes back into records.
///
/// # Errors
///
/// Fails on truncated or corrupt input, and on trailing bytes after the
/// record array. An empty byte slice is not a valid partition.
pub fn decode(bytes: &[u8]) -> Result<Vec<SpeedRecord>, CodecError> {
    let (records, read): (Vec<SpeedRecord>, usize) =
        bincode::serde::decode_from_slice(bytes, record_config())?;

    if read != bytes.len() {
        return Err(CodecError::Trailing(bytes.len() - read));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: i64, route: &str, speed: f64, count: u32) -> SpeedRecord {
        SpeedRecord {
            timestamp_ms: ts,
            route_tag: route.to_string(),
            speed_kmh: speed,
            vehicle_count: count,
        }
    }

    #[test]
    fn test_empty_sequence_round_trips() {
        let bytes = encode(&[]).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(decode(&bytes).unwrap(), Vec::<SpeedRecord>::new());
    }

    #[test]
    fn test_single_record_round_trips() {
        let records = vec![record(1_769_039_999_999, "505", 14.3, 6)];
        assert_eq!(decode(&encode(&records).unwrap()).unwrap(), records);
    }

    #[test]
    fn test_large_batch_with_repeated_routes() {
        let records: Vec<SpeedRecord> = (0..1000)
            .map(|i| {
                record(
                    1_769_000_000_000 + (i / 50) * 60_000,
                    &format!("{}", 500 + i % 50),
                    (i % 317) as f64 / 10.0,
                    (i % 9 + 1) as u32,
                )
            })
            .collect();

        let decoded = decode(&encode(&records).unwrap()).unwrap();
        assert_eq!(decoded.len(), 1000);
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_empty_bytes_is_an_error() {
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_truncated_bytes_is_an_error() {
        let records = vec![record(1, "7", 9.0, 2), record(1, "8", 3.5, 1)];
        let bytes = encode(&records).unwrap();

        for cut in 1..bytes.len() {
            assert!(decode(&bytes[..cut]).is_err(), "cut at {cut} decoded");
        }
    }

    #[test]
    fn test_trailing_bytes_is_an_error() {
        let mut bytes = encode(&[record(1, "7", 9.0, 2)]).unwrap();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(CodecError::Trailing(1))));
    }
}
