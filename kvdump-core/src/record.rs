//! Record codec
//!
//! A [`Record`] is etcd's `mvccpb.KeyValue` message. Records are stored in
//! snapshots in exactly the protobuf form the store sends them, so the
//! revision counters and lease survive a dump/restore cycle untouched.

use prost::Message;

/// One key-value entry plus the store's revision metadata
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Record {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    /// Revision of the last creation of this key
    #[prost(int64, tag = "2")]
    pub create_revision: i64,
    /// Revision of the last modification of this key
    #[prost(int64, tag = "3")]
    pub mod_revision: i64,
    /// Number of modifications since creation
    #[prost(int64, tag = "4")]
    pub version: i64,
    #[prost(bytes = "vec", tag = "5")]
    pub value: Vec<u8>,
    /// Attached lease ID, 0 when none
    #[prost(int64, tag = "6")]
    pub lease: i64,
}

impl Record {
    /// Build a record with no metadata
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Key as text, lossy for non-UTF-8 keys
    pub fn key_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.key)
    }
}

/// Serialize a record to its protobuf wire form
pub fn encode(record: &Record) -> Vec<u8> {
    record.encode_to_vec()
}

/// Parse a record from its protobuf wire form
pub fn decode(bytes: &[u8]) -> Result<Record, prost::DecodeError> {
    Record::decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            key: b"a".to_vec(),
            create_revision: 1,
            mod_revision: 2,
            version: 1,
            value: b"b".to_vec(),
            lease: 0,
        }
    }

    #[test]
    fn test_encode_matches_wire_layout() {
        // tag/len pairs in field order, zero lease omitted
        let expected = vec![
            0x0a, 0x01, b'a', // key
            0x10, 0x01, // create_revision
            0x18, 0x02, // mod_revision
            0x20, 0x01, // version
            0x2a, 0x01, b'b', // value
        ];
        assert_eq!(encode(&sample()), expected);
    }

    #[test]
    fn test_round_trip_is_bit_identical() {
        let record = Record {
            lease: 7587_8623_1234,
            ..sample()
        };
        let bytes = encode(&record);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_empty_value_round_trip() {
        let record = Record::new("config/flag", Vec::new());
        let decoded = decode(&encode(&record)).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.value.is_empty());
    }

    #[test]
    fn test_decode_truncated_fails() {
        let bytes = encode(&sample());
        for len in [1, 2, 4, 10] {
            assert!(decode(&bytes[..len]).is_err(), "prefix of {len} bytes");
        }
    }

    #[test]
    fn test_decode_bad_length_prefix_fails() {
        // key field claims 100 bytes but only 1 follows
        assert!(decode(&[0x0a, 0x64, b'a']).is_err());
    }

    #[test]
    fn test_key_str() {
        assert_eq!(Record::new("k/1", "v").key_str(), "k/1");
    }
}
