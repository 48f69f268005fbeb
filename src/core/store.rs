// Shared backing storage for sequence views: allocation, growth, identity.
use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::core::error::{Error, ErrorKind};

/// Upper bound on element counts accepted by allocation requests. Keeps a
/// wild length from reaching the allocator as a multi-gigabyte `Vec`.
pub const MAX_ALLOC: usize = 1 << 32;

/// Reference-counted contiguous block of `T`. The inner `Vec`'s length is the
/// allocated length; slots past a view's visible length hold zero-valued
/// elements and count as capacity. Freed when the last view drops its handle.
#[derive(Debug)]
pub(crate) struct Store<T> {
    cells: Rc<RefCell<Vec<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            cells: Rc::clone(&self.cells),
        }
    }
}

impl<T: Clone + Default> Store<T> {
    pub(crate) fn with_len(len: usize) -> Result<Self, Error> {
        if len > MAX_ALLOC {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("allocation exceeds maximum element count")
                .with_length(len));
        }
        Ok(Self {
            cells: Rc::new(RefCell::new(vec![T::default(); len])),
        })
    }

    pub(crate) fn from_vec(values: Vec<T>) -> Self {
        Self {
            cells: Rc::new(RefCell::new(values)),
        }
    }

    /// Fresh private backing sized `new_alloc`, seeded with `length` elements
    /// copied from `self` starting at `offset`; the rest is zero-valued.
    pub(crate) fn grow_copy(&self, offset: usize, length: usize, new_alloc: usize) -> Self {
        debug!(
            old_alloc = self.allocated_len(),
            new_alloc, copied = length, "reallocating backing store"
        );
        let mut cells = vec![T::default(); new_alloc];
        let source = self.cells.borrow();
        cells[..length].clone_from_slice(&source[offset..offset + length]);
        Self {
            cells: Rc::new(RefCell::new(cells)),
        }
    }
}

impl<T: Clone> Store<T> {
    pub(crate) fn get(&self, slot: usize) -> T {
        self.cells.borrow()[slot].clone()
    }
}

impl<T> Store<T> {
    pub(crate) fn allocated_len(&self) -> usize {
        self.cells.borrow().len()
    }

    pub(crate) fn set(&self, slot: usize, value: T) {
        self.cells.borrow_mut()[slot] = value;
    }

    pub(crate) fn swap(&self, a: usize, b: usize) {
        self.cells.borrow_mut().swap(a, b);
    }

    pub(crate) fn sort_range<F>(&self, offset: usize, length: usize, cmp: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.cells.borrow_mut()[offset..offset + length].sort_by(cmp);
    }

    pub(crate) fn same_backing(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cells, &other.cells)
    }
}

/// Growth policy for capacity-exceeding writes: double until `needed` fits,
/// starting from at least one slot.
pub(crate) fn grow_plan(current: usize, needed: usize) -> usize {
    let mut next = current.max(1);
    while next < needed {
        next *= 2;
    }
    next
}
