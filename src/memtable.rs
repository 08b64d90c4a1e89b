use std::{cmp::Ordering, slice::from_raw_parts_mut, sync::Arc};

use integer_encoding::VarInt;
use rand::rngs::StdRng;

use crate::{
    cmp::{BitWiseComparator, Comparator},
    codec::{read_length_prefixed_slice, NumberReader},
    error::{Error, Result},
    options::Options,
    skiplist::{Iter, SkipList},
    slice::UnsafeSlice,
    types::{pack_tag, SequenceNumber, ValueType},
};

const TAG_SIZE: usize = 8;

pub type UserComparator = Arc<dyn Comparator + Send + Sync>;

/// Splits an encoded entry into its user key and tag.
fn split_internal_key(entry: &[u8]) -> Option<(&[u8], u64)> {
    let (len, n) = u32::decode_var(entry)?;
    let internal = entry.get(n..n + len as usize)?;
    if internal.len() < TAG_SIZE {
        return None;
    }
    let (user_key, tag) = internal.split_at(internal.len() - TAG_SIZE);
    let tag = u64::from_le_bytes(tag.try_into().ok()?);
    Some((user_key, tag))
}

/// Orders memtable entries by user key, then by sequence number
/// descending, so the newest version of a key comes first.
#[derive(Clone)]
pub struct MemTableKeyComparator {
    user: UserComparator,
}

impl MemTableKeyComparator {
    pub fn new(user: UserComparator) -> Self {
        MemTableKeyComparator { user }
    }
}

impl Comparator<UnsafeSlice> for MemTableKeyComparator {
    fn compare(&self, left: &UnsafeSlice, right: &UnsafeSlice) -> Ordering {
        let (a, b) = unsafe { (left.as_ref(), right.as_ref()) };
        match (split_internal_key(a), split_internal_key(b)) {
            (Some((a_key, a_tag)), Some((b_key, b_tag))) => self
                .user
                .compare(a_key, b_key)
                .then_with(|| b_tag.cmp(&a_tag)),
            // Entries are built by `MemTable::add`, so this only sees
            // malformed input from a misbehaving caller.
            _ => a.cmp(b),
        }
    }

    fn name(&self) -> &'static str {
        "rmemtable.MemTableKeyComparator"
    }
}

/// A decoded memtable entry.
#[derive(Debug, PartialEq, Eq)]
pub struct Entry<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
    pub value: &'a [u8],
}

fn decode_entry(mut data: &[u8]) -> Result<Entry<'_>> {
    let internal = read_length_prefixed_slice(&mut data)?;
    if internal.len() < TAG_SIZE {
        return Err(Error::Corruption("internal key too short".into()));
    }
    let (user_key, mut tag) = internal.split_at(internal.len() - TAG_SIZE);
    let tag = tag.read_u64_le()?;
    let value_type = ValueType::try_from((tag & 0xff) as u8)?;
    let value = read_length_prefixed_slice(&mut data)?;
    Ok(Entry {
        user_key,
        sequence: tag >> 8,
        value_type,
        value,
    })
}

/// Length of the internal key (user key plus tag) as stored in its varint32
/// prefix.
fn internal_key_size(user_key_len: usize) -> u32 {
    match user_key_len.checked_add(TAG_SIZE) {
        Some(n) if n <= u32::MAX as usize => n as u32,
        _ => panic!("key too large: {} bytes", user_key_len),
    }
}

// Format of an entry is concatenation of:
//  key_size     : varint32 of internal_key.size()
//  key bytes    : char[internal_key.size()]
//  tag          : uint64((sequence << 8) | type)
//  value_size   : varint32 of value.size()
//  value bytes  : char[value.size()]
fn encoded_len(key: &[u8], value: &[u8]) -> usize {
    let key_size = internal_key_size(key.len());
    assert!(value.len() <= u32::MAX as usize, "value too large");
    let value_size = value.len() as u32;
    key_size.required_space() + key_size as usize + value_size.required_space() + value.len()
}

/// Writes an entry into `buf`, which must be exactly `encoded_len` bytes.
fn encode_entry_into(buf: &mut [u8], seq: SequenceNumber, t: ValueType, key: &[u8], value: &[u8]) {
    let key_size = internal_key_size(key.len());
    let mut offset = key_size.encode_var(buf);
    buf[offset..offset + key.len()].copy_from_slice(key);
    offset += key.len();
    buf[offset..offset + TAG_SIZE].copy_from_slice(&pack_tag(seq, t).to_le_bytes());
    offset += TAG_SIZE;
    offset += (value.len() as u32).encode_var(&mut buf[offset..]);
    buf[offset..].copy_from_slice(value);
}

pub struct LookupKey {
    key: Vec<u8>,
    key_offset: usize,
}

impl LookupKey {
    /// Key matching the newest version of `user_key` visible at `seq`.
    pub fn new(user_key: impl AsRef<[u8]>, seq: SequenceNumber) -> Self {
        let user_key = user_key.as_ref();
        let key_size = internal_key_size(user_key.len());
        let key_offset = key_size.required_space();

        let mut key = vec![0u8; key_offset + key_size as usize];
        key_size.encode_var(&mut key);
        key[key_offset..key_offset + user_key.len()].copy_from_slice(user_key);
        key[key_offset + user_key.len()..]
            .copy_from_slice(&pack_tag(seq, ValueType::Value).to_le_bytes());

        LookupKey { key, key_offset }
    }

    pub fn memtable_key(&self) -> &[u8] {
        self.key.as_slice()
    }

    pub fn internal_key(&self) -> &[u8] {
        &self.key[self.key_offset..]
    }

    pub fn user_key(&self) -> &[u8] {
        &self.key[self.key_offset..self.key.len() - TAG_SIZE]
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum LookupResult {
    Found(Vec<u8>),
    /// The newest visible version is a deletion.
    Deleted,
    Missing,
}

/// In-memory write buffer. Entries are encoded into the skiplist's arena
/// and stay there until the memtable is dropped.
///
/// `add` follows the skiplist's single writer rule; `get` and iteration
/// are lock-free and may run concurrently with it.
pub struct MemTable {
    table: SkipList<UnsafeSlice, MemTableKeyComparator>,
    user: UserComparator,
}

impl Default for MemTable {
    fn default() -> Self {
        MemTable::new(Arc::new(BitWiseComparator {}))
    }
}

impl MemTable {
    pub fn new(comparator: UserComparator) -> MemTable {
        MemTable {
            table: SkipList::new(MemTableKeyComparator::new(comparator.clone())),
            user: comparator,
        }
    }

    pub fn with_options(comparator: UserComparator, options: Options) -> Result<MemTable> {
        let table = SkipList::with_options(MemTableKeyComparator::new(comparator.clone()), options)?;
        Ok(MemTable {
            table,
            user: comparator,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn approximate_memory_usage(&self) -> usize {
        self.table.memory_usage()
    }

    pub fn add(&self, seq: SequenceNumber, t: ValueType, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        let (key, value) = (key.as_ref(), value.as_ref());
        let size = encoded_len(key, value);
        self.table.insert_with(|arena| {
            let dst = arena.allocate(size);
            // The range is fresh arena memory owned by this entry alone.
            let buf = unsafe { from_raw_parts_mut(dst, size) };
            encode_entry_into(buf, seq, t, key, value);
            UnsafeSlice::new(dst, size)
        });
    }

    pub fn get(&self, key: &LookupKey) -> Result<LookupResult> {
        let mut iter = self.table.iter();
        iter.seek(&UnsafeSlice::from(key.memtable_key()));
        if !iter.valid() {
            return Ok(LookupResult::Missing);
        }

        let entry = decode_entry(unsafe { iter.key().as_ref() })?;
        if self.user.compare(entry.user_key, key.user_key()) != Ordering::Equal {
            return Ok(LookupResult::Missing);
        }
        match entry.value_type {
            ValueType::Value => Ok(LookupResult::Found(entry.value.to_vec())),
            ValueType::Deletion => Ok(LookupResult::Deleted),
        }
    }

    pub fn iter(&self) -> MemTableIter<'_> {
        MemTableIter {
            iter: self.table.iter(),
        }
    }
}

pub struct MemTableIter<'a> {
    iter: Iter<'a, UnsafeSlice, MemTableKeyComparator, StdRng>,
}

impl<'a> MemTableIter<'a> {
    pub fn valid(&self) -> bool {
        self.iter.valid()
    }

    pub fn seek_to_first(&mut self) {
        self.iter.seek_to_first()
    }

    pub fn seek_to_last(&mut self) {
        self.iter.seek_to_last()
    }

    pub fn seek(&mut self, key: &LookupKey) {
        self.iter.seek(&UnsafeSlice::from(key.memtable_key()))
    }

    pub fn next(&mut self) {
        self.iter.next()
    }

    pub fn prev(&mut self) {
        self.iter.prev()
    }

    pub fn entry(&self) -> Result<Entry<'a>> {
        // Entry bytes live in the arena for as long as the memtable.
        decode_entry(unsafe { self.iter.key().as_ref() })
    }
}
