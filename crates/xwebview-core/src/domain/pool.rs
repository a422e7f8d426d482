//! Fixed-capacity connection pool used for broadcast fan-out.
//!
//! # How the pool is laid out (for beginners)
//!
//! The pool is an *arena*: every connection lives in a numbered slot, and a
//! separate dense list (`live`) records which slots are in use, in storage
//! order.  Broadcasting walks `live` from front to back.
//!
//! ```text
//! slots:  [0: viewer A, gen 3] [1: free, gen 1] [2: viewer B, gen 0]
//! live:   [2, 0]                  ← iteration order
//! ```
//!
//! Removing by position swaps the last entry of `live` into the hole, so it is
//! O(1) but may reorder iteration.  That is fine: every viewer receives the
//! same bytes, the order they receive them in carries no meaning.
//!
//! # Generation-tagged handles
//!
//! A [`ConnectionHandle`] is `(slot, generation)`.  When a slot is released its
//! generation is bumped, so a handle kept by a session task after its
//! connection was dropped (for example because a send failed during a
//! broadcast) can never match whatever connection reuses that slot later.
//!
//! # Capacity
//!
//! The capacity is fixed at construction.  Inserting into a full pool is
//! rejected with [`PoolError::Full`]; the caller logs it and closes the new
//! connection.  Existing viewers are never evicted to make room.

use std::fmt;

use thiserror::Error;

/// Errors returned by [`ConnectionPool`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The pool already holds `capacity` connections.
    #[error("connection pool is full ({capacity} connections)")]
    Full { capacity: usize },
}

/// Opaque identifier for one open client channel.
///
/// Handles are only ever created by [`ConnectionPool::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    slot: u32,
    generation: u32,
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}.{}", self.slot, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    /// Index into `live` while occupied.
    position: usize,
    value: Option<T>,
}

/// A bounded, ordered collection of live connections.
///
/// `T` is whatever the owner needs to reach the connection (in the server it
/// is the sender half of the connection's outbound queue).
#[derive(Debug)]
pub struct ConnectionPool<T> {
    capacity: usize,
    slots: Vec<Slot<T>>,
    live: Vec<u32>,
    free: Vec<u32>,
}

impl<T> ConnectionPool<T> {
    /// Creates an empty pool that holds at most `capacity` connections.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            live: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Maximum number of connections.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// `true` if no connection is registered.  O(1).
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Registers a connection and returns its fresh handle.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Full`] when the pool is at capacity.  The value is
    /// dropped in that case.
    pub fn insert(&mut self, value: T) -> Result<ConnectionHandle, PoolError> {
        if self.live.len() >= self.capacity {
            return Err(PoolError::Full {
                capacity: self.capacity,
            });
        }

        let position = self.live.len();
        let slot_index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.position = position;
                slot.value = Some(value);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    position,
                    value: Some(value),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.live.push(slot_index);

        Ok(ConnectionHandle {
            slot: slot_index,
            generation: self.slots[slot_index as usize].generation,
        })
    }

    /// Returns the current position of `handle`, or `None` if it was never
    /// inserted, has already been removed, or is stale.
    pub fn find(&self, handle: ConnectionHandle) -> Option<usize> {
        let slot = self.slots.get(handle.slot as usize)?;
        if slot.generation == handle.generation && slot.value.is_some() {
            Some(slot.position)
        } else {
            None
        }
    }

    /// Removes the connection at `position` by swapping the last one into its
    /// place.
    ///
    /// Returns the removed handle and value, or `None` if `position` is out of
    /// range.
    pub fn remove_at(&mut self, position: usize) -> Option<(ConnectionHandle, T)> {
        if position >= self.live.len() {
            return None;
        }

        let slot_index = self.live.swap_remove(position);
        if let Some(&moved) = self.live.get(position) {
            self.slots[moved as usize].position = position;
        }

        let slot = &mut self.slots[slot_index as usize];
        let handle = ConnectionHandle {
            slot: slot_index,
            generation: slot.generation,
        };
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(slot_index);

        Some((handle, value))
    }

    /// Removes the connection identified by `handle`, if it is still live.
    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<T> {
        let position = self.find(handle)?;
        self.remove_at(position).map(|(_, value)| value)
    }

    /// Returns the value registered under `handle`.
    pub fn get(&self, handle: ConnectionHandle) -> Option<&T> {
        self.find(handle)?;
        self.slots[handle.slot as usize].value.as_ref()
    }

    /// Mutable access to the value registered under `handle`.
    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut T> {
        self.find(handle)?;
        self.slots[handle.slot as usize].value.as_mut()
    }

    /// Iterates live connections in current storage order.
    ///
    /// The order is not stable across removals.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionHandle, &T)> + '_ {
        self.live.iter().filter_map(move |&index| {
            let slot = &self.slots[index as usize];
            slot.value.as_ref().map(|value| {
                (
                    ConnectionHandle {
                        slot: index,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Live handles in current storage order.
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Removes every connection, returning them in storage order.
    pub fn drain(&mut self) -> Vec<(ConnectionHandle, T)> {
        let mut drained = Vec::with_capacity(self.live.len());
        while !self.live.is_empty() {
            if let Some(entry) = self.remove_at(0) {
                drained.push(entry);
            }
        }
        drained
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pool_is_empty() {
        let pool: ConnectionPool<&str> = ConnectionPool::with_capacity(4);
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn test_insert_then_find_returns_valid_position() {
        // Arrange
        let mut pool = ConnectionPool::with_capacity(4);

        // Act
        let a = pool.insert("a").unwrap();
        let b = pool.insert("b").unwrap();

        // Assert
        assert_eq!(pool.find(a), Some(0));
        assert_eq!(pool.find(b), Some(1));
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_insert_at_capacity_is_rejected() {
        // Arrange
        let mut pool = ConnectionPool::with_capacity(2);
        pool.insert(1).unwrap();
        pool.insert(2).unwrap();

        // Act
        let result = pool.insert(3);

        // Assert: rejected, existing entries untouched
        assert_eq!(result, Err(PoolError::Full { capacity: 2 }));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_remove_at_removes_exactly_one() {
        let mut pool = ConnectionPool::with_capacity(4);
        let a = pool.insert("a").unwrap();
        let b = pool.insert("b").unwrap();
        let c = pool.insert("c").unwrap();

        let (removed, value) = pool.remove_at(0).unwrap();

        assert_eq!(removed, a);
        assert_eq!(value, "a");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.find(a), None);
        assert!(pool.find(b).is_some());
        assert!(pool.find(c).is_some());
    }

    #[test]
    fn test_remove_at_swaps_last_into_hole() {
        let mut pool = ConnectionPool::with_capacity(4);
        pool.insert("a").unwrap();
        pool.insert("b").unwrap();
        let c = pool.insert("c").unwrap();

        pool.remove_at(0);

        // "c" moved into position 0; iteration order changed.
        assert_eq!(pool.find(c), Some(0));
        let order: Vec<&str> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(order, vec!["c", "b"]);
    }

    #[test]
    fn test_remove_at_out_of_range_returns_none() {
        let mut pool: ConnectionPool<u8> = ConnectionPool::with_capacity(2);
        assert!(pool.remove_at(0).is_none());
        pool.insert(7).unwrap();
        assert!(pool.remove_at(1).is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_removed_handle_is_never_returned() {
        // Arrange
        let mut pool = ConnectionPool::with_capacity(4);
        let a = pool.insert("a").unwrap();
        pool.insert("b").unwrap();

        // Act
        pool.remove(a);

        // Assert: neither find nor iteration yields the removed handle
        assert_eq!(pool.find(a), None);
        assert!(pool.iter().all(|(h, _)| h != a));
    }

    #[test]
    fn test_stale_handle_does_not_match_reused_slot() {
        // Arrange: free a slot and let a new connection take it over
        let mut pool = ConnectionPool::with_capacity(1);
        let old = pool.insert("old").unwrap();
        pool.remove(old);
        let new = pool.insert("new").unwrap();

        // Assert: same slot, different generation
        assert_ne!(old, new);
        assert_eq!(pool.find(old), None);
        assert_eq!(pool.find(new), Some(0));
        assert_eq!(pool.get(old), None);
        assert_eq!(pool.get(new), Some(&"new"));
    }

    #[test]
    fn test_handle_from_other_pool_is_not_found() {
        let mut other = ConnectionPool::with_capacity(8);
        for i in 0..5 {
            other.insert(i).unwrap();
        }
        let foreign = other.handles()[4];

        let pool: ConnectionPool<i32> = ConnectionPool::with_capacity(8);
        assert_eq!(pool.find(foreign), None);
    }

    #[test]
    fn test_remove_twice_is_idempotent() {
        let mut pool = ConnectionPool::with_capacity(2);
        let a = pool.insert("a").unwrap();

        assert_eq!(pool.remove(a), Some("a"));
        assert_eq!(pool.remove(a), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_drain_empties_pool() {
        let mut pool = ConnectionPool::with_capacity(3);
        let handles: Vec<_> = (0..3).map(|i| pool.insert(i).unwrap()).collect();

        let drained = pool.drain();

        assert_eq!(drained.len(), 3);
        assert!(pool.is_empty());
        for h in handles {
            assert_eq!(pool.find(h), None);
        }
    }

    #[test]
    fn test_capacity_is_reusable_after_removal() {
        let mut pool = ConnectionPool::with_capacity(1);
        let a = pool.insert(1).unwrap();
        assert!(pool.insert(2).is_err());

        pool.remove(a);

        assert!(pool.insert(3).is_ok());
    }

    #[test]
    fn test_get_mut_ignores_stale_handle() {
        // Arrange
        let mut pool = ConnectionPool::with_capacity(1);
        let old = pool.insert(1).unwrap();
        pool.remove(old);
        let new = pool.insert(2).unwrap();

        // Act
        if let Some(value) = pool.get_mut(new) {
            *value += 10;
        }

        // Assert
        assert!(pool.get_mut(old).is_none());
        assert_eq!(pool.get(new), Some(&12));
    }

    #[test]
    fn test_handle_display_format() {
        let mut pool = ConnectionPool::with_capacity(1);
        let a = pool.insert(()).unwrap();
        assert_eq!(a.to_string(), "conn#0.0");
    }
}
