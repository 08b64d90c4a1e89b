use std::{
    cell::UnsafeCell,
    cmp::Ordering as KeyOrdering,
    fmt,
    mem::{self, MaybeUninit},
    ptr,
    sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering},
};

use rand::{rngs::StdRng, RngCore, SeedableRng};
use tracing::{trace, warn};

use crate::{
    cmp::Comparator,
    error::Result,
    options::{Options, MAX_HEIGHT_LIMIT},
    utils::{
        arena::{Arena, ALIGN},
        release::DropRelease,
    },
};

mod iter;

pub use iter::{Iter, Keys};

/// A node lives in arena memory. `next` is the first slot of its tower,
/// the remaining `height - 1` slots follow it directly.
///
/// Successor slots are written by the single writer and read by any
/// thread. A slot is published with a release store; readers load it with
/// acquire, which makes the key and the lower slots of the node visible.
#[repr(C)]
struct Node<K> {
    key: MaybeUninit<K>,
    next: [AtomicPtr<Node<K>>; 1],
}

impl<K> Node<K> {
    fn size_for(height: usize) -> usize {
        mem::size_of::<Self>() + (height - 1) * mem::size_of::<AtomicPtr<Self>>()
    }

    /// Allocates a node with `height` null successors. The key is left
    /// uninitialized.
    fn alloc(arena: &Arena, height: usize) -> *mut Self {
        let node = arena.allocate_aligned(Self::size_for(height)) as *mut Self;
        unsafe {
            let tower = ptr::addr_of_mut!((*node).next).cast::<AtomicPtr<Self>>();
            for level in 0..height {
                tower.add(level).write(AtomicPtr::new(ptr::null_mut()));
            }
        }
        node
    }

    /// # Safety
    ///
    /// `node` must have been allocated with a height above `level`.
    #[inline]
    unsafe fn slot<'a>(node: *mut Self, level: usize) -> &'a AtomicPtr<Self> {
        &*ptr::addr_of_mut!((*node).next)
            .cast::<AtomicPtr<Self>>()
            .add(level)
    }

    #[inline]
    unsafe fn next(node: *mut Self, level: usize) -> *mut Self {
        Self::slot(node, level).load(Ordering::Acquire)
    }

    #[inline]
    unsafe fn set_next(node: *mut Self, level: usize, x: *mut Self) {
        Self::slot(node, level).store(x, Ordering::Release)
    }

    #[inline]
    unsafe fn no_barrier_next(node: *mut Self, level: usize) -> *mut Self {
        Self::slot(node, level).load(Ordering::Relaxed)
    }

    #[inline]
    unsafe fn no_barrier_set_next(node: *mut Self, level: usize, x: *mut Self) {
        Self::slot(node, level).store(x, Ordering::Relaxed)
    }

    /// # Safety
    ///
    /// `node` must not be the head.
    #[inline]
    unsafe fn key<'a>(node: *mut Self) -> &'a K {
        (*node).key.assume_init_ref()
    }
}

/// Draws a tower height: grows one level with probability
/// `1 / branching`, starting at 1 and capped at `max_height`.
pub fn random_height<R: RngCore + ?Sized>(rng: &mut R, max_height: usize, branching: u32) -> usize {
    let mut height = 1;
    while height < max_height && rng.next_u32() % branching == 0 {
        height += 1;
    }
    height
}

/// Concurrent skiplist with one writer and any number of lock-free
/// readers.
///
/// Keys are copied into arena-owned nodes and never dropped, hence the
/// `Copy` bound. Nodes are never removed; every node is freed at once when
/// the list (and its arena) is dropped.
pub struct SkipList<K, C, R = StdRng> {
    head: *mut Node<K>,
    max_height: AtomicUsize,
    len: AtomicUsize,
    writing: AtomicBool,
    comparator: C,
    rng: UnsafeCell<R>,
    options: Options,
    arena: Arena,
}

// Readers only follow acquire-loaded pointers to fully built nodes. The
// arena and the rng are touched by whoever holds the writer latch.
unsafe impl<K: Send + Sync, C: Send + Sync, R: Send> Send for SkipList<K, C, R> {}
unsafe impl<K: Send + Sync, C: Send + Sync, R: Send> Sync for SkipList<K, C, R> {}

impl<K: Copy, C: Comparator<K>> SkipList<K, C, StdRng> {
    pub fn new(comparator: C) -> Self {
        Self::build(comparator, Options::default(), StdRng::from_entropy())
    }

    pub fn with_options(comparator: C, options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(comparator, options, StdRng::from_entropy()))
    }
}

impl<K: Copy, C: Comparator<K>, R: RngCore> SkipList<K, C, R> {
    pub fn with_rng(comparator: C, options: Options, rng: R) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(comparator, options, rng))
    }

    fn build(comparator: C, options: Options, rng: R) -> Self {
        assert!(
            mem::align_of::<Node<K>>() <= ALIGN,
            "key alignment exceeds arena alignment"
        );
        let arena = Arena::with_block_size(options.block_size);
        let head = Node::alloc(&arena, options.max_height);
        SkipList {
            head,
            max_height: AtomicUsize::new(1),
            len: AtomicUsize::new(0),
            writing: AtomicBool::new(false),
            comparator,
            rng: UnsafeCell::new(rng),
            options,
            arena,
        }
    }
}

impl<K, C, R> SkipList<K, C, R>
where
    K: Copy + fmt::Debug,
    C: Comparator<K>,
    R: RngCore,
{
    /// Inserts `key`. Only one thread may insert at a time; a concurrent
    /// second writer panics.
    ///
    /// A key comparing equal to one already present is logged and
    /// ignored.
    pub fn insert(&self, key: K) {
        self.insert_with(|_| key)
    }

    /// Like `insert`, but builds the key while holding the writer latch,
    /// with access to the list's arena so key bytes can live there.
    pub fn insert_with<F>(&self, make_key: F)
    where
        F: FnOnce(&Arena) -> K,
    {
        let _writer = self.lock_writer();
        let key = make_key(&self.arena);

        let mut prev = [ptr::null_mut(); MAX_HEIGHT_LIMIT];
        let found = self.find_greater_or_equal(&key, Some(&mut prev));
        if !found.is_null() && self.equal(&key, unsafe { Node::key(found) }) {
            warn!(key = ?key, "key already exists in skiplist, insert ignored");
            return;
        }

        // Only the latch holder touches the rng.
        let rng = unsafe { &mut *self.rng.get() };
        let height = random_height(rng, self.options.max_height, self.options.branching);
        let max_height = self.max_height();
        if height > max_height {
            for p in prev.iter_mut().take(height).skip(max_height) {
                *p = self.head;
            }
            trace!(from = max_height, to = height, "skiplist height grows");
            // Readers seeing the old height just skip the new levels, and
            // readers seeing the new one find null head slots there.
            self.max_height.store(height, Ordering::Relaxed);
        }

        let node = Node::alloc(&self.arena, height);
        unsafe {
            ptr::addr_of_mut!((*node).key).write(MaybeUninit::new(key));
            for (level, &p) in prev.iter().enumerate().take(height) {
                // The node is unreachable until `set_next` publishes it.
                Node::no_barrier_set_next(node, level, Node::no_barrier_next(p, level));
                Node::set_next(p, level, node);
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    fn lock_writer(&self) -> DropRelease<impl FnMut() + '_> {
        if self.writing.swap(true, Ordering::Acquire) {
            panic!("skiplist allows a single writer, concurrent insert detected");
        }
        DropRelease::new(move || self.writing.store(false, Ordering::Release))
    }
}

impl<K, C, R> SkipList<K, C, R>
where
    C: Comparator<K>,
{
    /// Lock-free; callable concurrently with `insert`.
    pub fn contains(&self, key: &K) -> bool {
        let x = self.find_greater_or_equal(key, None);
        !x.is_null() && self.equal(key, unsafe { Node::key(x) })
    }

    pub fn iter(&self) -> Iter<'_, K, C, R> {
        Iter::new(self)
    }

    /// Keys in order, from the first node.
    pub fn keys(&self) -> Keys<'_, K, C, R> {
        Keys::new(self)
    }

    /// Number of nodes linked so far.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels currently in use, in `1..=options.max_height`.
    pub fn max_height(&self) -> usize {
        self.max_height.load(Ordering::Relaxed)
    }

    pub fn memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn equal(&self, a: &K, b: &K) -> bool {
        self.comparator.compare(a, b) == KeyOrdering::Equal
    }

    fn key_is_after_node(&self, key: &K, n: *mut Node<K>) -> bool {
        !n.is_null() && self.comparator.compare(unsafe { Node::key(n) }, key) == KeyOrdering::Less
    }

    /// First node whose key is not less than `key`, or null. Fills `prev`
    /// with the last node before it on every active level.
    fn find_greater_or_equal(
        &self,
        key: &K,
        mut prev: Option<&mut [*mut Node<K>; MAX_HEIGHT_LIMIT]>,
    ) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            let next = unsafe { Node::next(x, level) };
            if self.key_is_after_node(key, next) {
                x = next;
            } else {
                if let Some(prev) = prev.as_mut() {
                    prev[level] = x;
                }
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    /// Last node whose key is less than `key`, or the head.
    fn find_less_than(&self, key: &K) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            let next = unsafe { Node::next(x, level) };
            if next.is_null()
                || self.comparator.compare(unsafe { Node::key(next) }, key) != KeyOrdering::Less
            {
                if level == 0 {
                    return x;
                }
                level -= 1;
            } else {
                x = next;
            }
        }
    }

    /// Last node of the list, or the head when empty.
    fn find_last(&self) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            let next = unsafe { Node::next(x, level) };
            if next.is_null() {
                if level == 0 {
                    return x;
                }
                level -= 1;
            } else {
                x = next;
            }
        }
    }
}

impl<K, C: Comparator<K>, R> fmt::Debug for SkipList<K, C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipList")
            .field("comparator", &self.comparator.name())
            .field("len", &self.len())
            .field("max_height", &self.max_height())
            .field("memory_usage", &self.memory_usage())
            .finish()
    }
}
