// Sequence views over shared backing stores: aliasing, capacity, growth.
use std::cmp::Ordering;
use std::fmt;

use crate::core::error::{Error, ErrorKind};
use crate::core::store::{grow_plan, Store, MAX_ALLOC};

/// A view over a contiguous, growable backing store: an offset into the
/// store, a visible length, and the remaining capacity. Sub-views share the
/// parent's backing without copying, so a write through one view is visible
/// through every other view aliasing the same slot.
///
/// A capacity-exceeding `append` moves the view onto fresh private backing
/// and decouples it from prior aliases. Only backing element values are
/// shared between views; each view's offset and length are its own.
pub struct SeqView<T> {
    store: Option<Store<T>>,
    offset: usize,
    length: usize,
}

impl<T> Clone for SeqView<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            offset: self.offset,
            length: self.length,
        }
    }
}

impl<T> Default for SeqView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SeqView<T> {
    /// Never-allocated view: no backing, length 0, capacity 0.
    pub fn new() -> Self {
        Self {
            store: None,
            offset: 0,
            length: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    /// Elements available before a write must reallocate:
    /// `backing.allocated_len - offset`, or 0 without backing.
    pub fn capacity(&self) -> usize {
        match &self.store {
            Some(store) => store.allocated_len() - self.offset,
            None => 0,
        }
    }

    /// True when the view has never been allocated or its length is 0.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Distinguishes "never allocated" from "allocated empty".
    pub fn has_backing(&self) -> bool {
        self.store.is_some()
    }

    /// Backing-identity check: true iff both views reference the same
    /// allocation. Never-allocated views share nothing.
    pub fn shares_backing(&self, other: &SeqView<T>) -> bool {
        match (&self.store, &other.store) {
            (Some(a), Some(b)) => a.same_backing(b),
            _ => false,
        }
    }

    /// Sub-view from `start` to the end. Shares this view's backing with no
    /// copy; `start == len()` is valid and yields an empty view that keeps
    /// whatever capacity remains past the end.
    pub fn subrange(&self, start: usize) -> Result<SeqView<T>, Error> {
        if start > self.length {
            return Err(Error::new(ErrorKind::IndexOutOfRange)
                .with_message("subrange start out of range")
                .with_index(start)
                .with_length(self.length));
        }
        Ok(Self {
            store: self.store.clone(),
            offset: self.offset + start,
            length: self.length - start,
        })
    }

    /// Bounded sub-view of `len` elements starting at `start`.
    pub fn slice(&self, start: usize, len: usize) -> Result<SeqView<T>, Error> {
        if start.checked_add(len).is_none_or(|end| end > self.length) {
            return Err(Error::new(ErrorKind::IndexOutOfRange)
                .with_message("slice bounds out of range")
                .with_index(start)
                .with_length(self.length));
        }
        Ok(Self {
            store: self.store.clone(),
            offset: self.offset + start,
            length: len,
        })
    }
}

impl<T: Clone + Default> SeqView<T> {
    /// Allocates a view with `len == capacity == n` and zero-valued
    /// (`T::default()`) elements. Fails with `InvalidArgument` past
    /// `MAX_ALLOC`.
    pub fn with_len(n: usize) -> Result<Self, Error> {
        Ok(Self {
            store: Some(Store::with_len(n)?),
            offset: 0,
            length: n,
        })
    }

    /// Takes ownership of existing elements as fresh backing.
    pub fn from_vec(values: Vec<T>) -> Self {
        let length = values.len();
        Self {
            store: Some(Store::from_vec(values)),
            offset: 0,
            length,
        }
    }

    /// Appends one element. Within capacity this writes the next backing
    /// slot in place (aliases keep observing the same allocation); at
    /// capacity it reallocates (double, minimum one slot), copies the
    /// visible elements, and decouples this view from prior aliases.
    pub fn append(&mut self, value: T) -> Result<(), Error> {
        let new_len = self.grown_length(1)?;
        match &self.store {
            Some(store) if new_len <= self.capacity() => {
                store.set(self.offset + self.length, value);
            }
            Some(store) => {
                let fresh =
                    store.grow_copy(self.offset, self.length, grow_plan(self.capacity(), new_len));
                fresh.set(self.length, value);
                self.store = Some(fresh);
                self.offset = 0;
            }
            None => {
                let fresh = Store::with_len(1)?;
                fresh.set(0, value);
                self.store = Some(fresh);
            }
        }
        self.length = new_len;
        Ok(())
    }

    /// Extends the view by `additional` slots without writing them, growing
    /// (and possibly decoupling) like `append`. Slots already inside
    /// capacity are exposed as-is: on shared backing they may carry values
    /// written through sibling views.
    pub fn reserve(&mut self, additional: usize) -> Result<(), Error> {
        let new_len = self.grown_length(additional)?;
        if new_len > self.capacity() {
            let fresh = match &self.store {
                Some(store) => {
                    store.grow_copy(self.offset, self.length, grow_plan(self.capacity(), new_len))
                }
                None => Store::with_len(grow_plan(0, new_len))?,
            };
            self.store = Some(fresh);
            self.offset = 0;
        }
        self.length = new_len;
        Ok(())
    }

    fn grown_length(&self, additional: usize) -> Result<usize, Error> {
        self.length
            .checked_add(additional)
            .filter(|new_len| *new_len <= MAX_ALLOC)
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidArgument)
                    .with_message("sequence exceeds maximum element count")
                    .with_length(self.length)
            })
    }

    /// Appends every visible element of `other`. The source is snapshotted
    /// first, so extending a view with itself (or an alias) is well-defined.
    pub fn extend(&mut self, other: &SeqView<T>) -> Result<(), Error> {
        for value in other.to_vec() {
            self.append(value)?;
        }
        Ok(())
    }

    /// Inserts at `i`, shifting the tail right through the backing (aliases
    /// observe the shift). `i == len()` behaves like `append`.
    pub fn insert(&mut self, i: usize, value: T) -> Result<(), Error> {
        if i > self.length {
            return Err(index_error(i, self.length).with_message("insert index out of range"));
        }
        self.append(T::default())?;
        let mut slot = self.length - 1;
        while slot > i {
            let shifted = self.get(slot - 1)?;
            self.set(slot, shifted)?;
            slot -= 1;
        }
        self.set(i, value)
    }

    /// Removes and returns the element at `i`, shifting the tail left
    /// through the backing. The vacated end slot keeps its previous value.
    pub fn remove(&mut self, i: usize) -> Result<T, Error> {
        if i >= self.length {
            return Err(index_error(i, self.length).with_message("remove index out of range"));
        }
        let removed = self.get(i)?;
        for slot in i..self.length - 1 {
            let shifted = self.get(slot + 1)?;
            self.set(slot, shifted)?;
        }
        self.length -= 1;
        Ok(removed)
    }

    /// Zeroes the visible elements, then sets length to 0. The zeroing is
    /// observable through aliases.
    pub fn clear(&mut self) {
        if let Some(store) = &self.store {
            for slot in 0..self.length {
                store.set(self.offset + slot, T::default());
            }
        }
        self.length = 0;
    }
}

impl<T: Clone> SeqView<T> {
    pub fn get(&self, i: usize) -> Result<T, Error> {
        let store = self.slot_store(i)?;
        Ok(store.get(self.offset + i))
    }

    /// Writes `backing[offset + i]` in place. Never reallocates; the write
    /// is visible through every view aliasing that slot.
    pub fn set(&self, i: usize, value: T) -> Result<(), Error> {
        let store = self.slot_store(i)?;
        store.set(self.offset + i, value);
        Ok(())
    }

    /// Swaps two visible elements in place through the backing.
    pub fn swap(&self, i: usize, j: usize) -> Result<(), Error> {
        self.slot_store(i)?;
        let store = self.slot_store(j)?;
        store.swap(self.offset + i, self.offset + j);
        Ok(())
    }

    /// Reverses the visible elements in place through the backing.
    pub fn reverse(&self) {
        if let Some(store) = &self.store {
            let mut front = 0;
            let mut back = self.length.saturating_sub(1);
            while front < back {
                store.swap(self.offset + front, self.offset + back);
                front += 1;
                back -= 1;
            }
        }
    }

    /// Sorts the visible elements in place through the backing, so aliasing
    /// views observe the reordering.
    pub fn sort_by<F>(&self, cmp: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        if let Some(store) = &self.store {
            store.sort_range(self.offset, self.length, cmp);
        }
    }

    pub fn first(&self) -> Option<T> {
        self.get(0).ok()
    }

    pub fn last(&self) -> Option<T> {
        self.length.checked_sub(1).and_then(|i| self.get(i).ok())
    }

    /// Cloned snapshot of the visible elements.
    pub fn to_vec(&self) -> Vec<T> {
        match &self.store {
            Some(store) => (0..self.length)
                .map(|slot| store.get(self.offset + slot))
                .collect(),
            None => Vec::new(),
        }
    }

    fn slot_store(&self, i: usize) -> Result<&Store<T>, Error> {
        if i >= self.length {
            return Err(index_error(i, self.length).with_message("index out of range"));
        }
        self.store.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::Internal).with_message("non-empty view without backing")
        })
    }
}

impl<T: Clone + PartialEq> SeqView<T> {
    /// Index of the first visible element equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        let store = self.store.as_ref()?;
        (0..self.length).find(|slot| store.get(self.offset + slot) == *value)
    }

    /// Index of the last visible element equal to `value`.
    pub fn last_index_of(&self, value: &T) -> Option<usize> {
        let store = self.store.as_ref()?;
        (0..self.length)
            .rev()
            .find(|slot| store.get(self.offset + slot) == *value)
    }
}

impl<T: Clone + PartialEq> PartialEq for SeqView<T> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.to_vec() == other.to_vec()
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for SeqView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeqView")
            .field("len", &self.length)
            .field("capacity", &self.capacity())
            .field("elems", &self.to_vec())
            .finish()
    }
}

fn index_error(index: usize, length: usize) -> Error {
    Error::new(ErrorKind::IndexOutOfRange)
        .with_index(index)
        .with_length(length)
}
