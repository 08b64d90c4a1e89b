use std::{fmt, ptr, slice::from_raw_parts};

/// Borrowed byte range with no lifetime attached.
///
/// Used as the key type of the memtable's skiplist: the bytes live in the
/// list's arena, which outlives every node that refers to them.
#[derive(Clone, Copy)]
pub struct UnsafeSlice {
    data: *const u8,
    size: usize,
}

// The pointee is never written after the slice is created.
unsafe impl Send for UnsafeSlice {}
unsafe impl Sync for UnsafeSlice {}

impl UnsafeSlice {
    pub fn new(data: *const u8, size: usize) -> Self {
        UnsafeSlice { data, size }
    }

    #[inline]
    pub fn data(&self) -> *const u8 {
        self.data
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null() || self.size == 0
    }

    /// # Safety
    ///
    /// The memory behind the slice must still be alive and unmodified.
    #[inline]
    pub unsafe fn as_ref<'a>(&self) -> &'a [u8] {
        if self.data.is_null() {
            return &[];
        }
        from_raw_parts(self.data, self.size)
    }
}

impl Default for UnsafeSlice {
    fn default() -> Self {
        Self {
            data: ptr::null(),
            size: 0,
        }
    }
}

impl From<&[u8]> for UnsafeSlice {
    fn from(v: &[u8]) -> Self {
        UnsafeSlice::new(v.as_ptr(), v.len())
    }
}

/// Renders the referenced bytes, escaping anything that is not printable
/// ASCII. Holders of an `UnsafeSlice` keep its memory alive, as `as_ref`
/// requires.
impl fmt::Debug for UnsafeSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = unsafe { self.as_ref() };
        write!(f, "UnsafeSlice(\"{}\")", bytes.escape_ascii())
    }
}
