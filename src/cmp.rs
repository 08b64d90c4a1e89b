use std::cmp::Ordering;

/// Total order over keys of type `K`.
///
/// Implementations must be consistent across calls for the whole lifetime
/// of the structure they are handed to.
pub trait Comparator<K: ?Sized = [u8]> {
    fn compare(&self, left: &K, right: &K) -> Ordering;

    fn name(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BitWiseComparator {}

impl<K: AsRef<[u8]> + ?Sized> Comparator<K> for BitWiseComparator {
    fn compare(&self, left: &K, right: &K) -> Ordering {
        left.as_ref().cmp(right.as_ref())
    }

    fn name(&self) -> &'static str {
        "rmemtable.BitwiseComparator"
    }
}
