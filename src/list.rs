use std::ops::Index;
use std::slice::Iter;

use tracing::error;

use crate::error::{CacheError, Result};

/// A growable array whose capacity doubles (starting from 1) whenever it is full.
///
/// Owning lists (`List<Frontable>`, `List<Group>`) drop their records on
/// [`deep_clear`](List::deep_clear). Reference lists, such as the current fronters, hold
/// plain handles and only ever need [`clear`](List::clear).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        List::new()
    }
}

impl<T> List<T> {
    /// an empty list with no backing allocation
    pub fn new() -> Self {
        List {
            items: Vec::new(),
            capacity: 0,
        }
    }

    /// appends `item`, doubling the capacity first if the list is full
    ///
    /// # Errors
    /// returns [`CacheError::OutOfMemory`] if the larger backing array could not be allocated,
    /// the list is left unchanged
    pub fn add(&mut self, item: T) -> Result<()> {
        if self.items.len() >= self.capacity {
            let new_capacity = if self.capacity == 0 { 1 } else { self.capacity * 2 };
            let additional = new_capacity - self.items.len();
            if self.items.try_reserve_exact(additional).is_err() {
                error!(new_capacity, "list grow failed");
                return Err(CacheError::OutOfMemory {
                    requested: new_capacity,
                });
            }
            self.capacity = new_capacity;
        }
        self.items.push(item);
        Ok(())
    }

    /// Empties the list and frees the backing array. Count and capacity become zero.
    pub fn clear(&mut self) {
        self.items = Vec::new();
        self.capacity = 0;
    }

    /// number of stored items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// true if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// current logical capacity (0, 1, 2, 4, ...)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// the zeroth item, if any
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// item at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// mutable item at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// iterates the items in insertion order
    pub fn iter(&self) -> Iter<'_, T> {
        self.items.iter()
    }

    /// mutable iteration in insertion order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// the stored items as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Removes the first item matching `pred`, keeping the order of the rest
    pub fn remove_first(&mut self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let pos = self.items.iter().position(pred)?;
        Some(self.items.remove(pos))
    }
}

impl<T: PartialEq> List<T> {
    /// linear scan for an equal item
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }
}

/// Lists that own their records. Deep clearing drops every record, then clears.
pub trait DeepClear {
    /// drops every contained record and clears the list, returning how many were dropped
    fn deep_clear(&mut self) -> usize;
}

impl<T: Owned> DeepClear for List<T> {
    fn deep_clear(&mut self) -> usize {
        let dropped = self.items.drain(..).count();
        self.clear();
        dropped
    }
}

/// marker for record types an owning list is responsible for
pub trait Owned {}

impl<T> Index<usize> for List<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Rec(u32);
    impl Owned for Rec {}

    #[test]
    fn capacity_doubles_from_one() {
        let mut list = List::new();
        assert_eq!(list.capacity(), 0);
        let mut seen = Vec::new();
        for i in 0..5 {
            list.add(i).unwrap();
            seen.push(list.capacity());
        }
        assert_eq!(seen, vec![1, 2, 4, 4, 8]);
        assert!(list.contains(&3));
        assert!(!list.contains(&9));

        list.clear();
        assert_eq!((list.len(), list.capacity()), (0, 0));
    }

    #[test]
    fn deep_clear_drops_records() {
        let mut list = List::new();
        list.add(Rec(1)).unwrap();
        list.add(Rec(2)).unwrap();
        assert_eq!(list.deep_clear(), 2);
        assert!(list.is_empty());
        assert_eq!(list.capacity(), 0);
    }
}
