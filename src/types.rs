use crate::error::Error;

pub type SequenceNumber = u64;
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    Deletion = 0,
    Value = 1,
}

impl TryFrom<u8> for ValueType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0u8 => Ok(ValueType::Deletion),
            1u8 => Ok(ValueType::Value),
            _ => Err(Error::Corruption("wrong tag type".into())),
        }
    }
}

/// Packs a sequence number and value type into the 8-byte entry tag.
pub fn pack_tag(seq: SequenceNumber, t: ValueType) -> u64 {
    assert!(seq <= MAX_SEQUENCE_NUMBER, "sequence number overflow");
    (seq << 8) | t as u64
}
