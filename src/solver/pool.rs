//! Owner-scoped object pools.
//!
//! A [`Pool`] hands out generation-checked [`Handle`]s to reusable slots.
//! Every live slot is tagged with the [`OwnerId`] that created it, so an owner
//! can release everything it made in one call without touching objects that
//! belong to anyone else. Released slots go to a reserve and are handed out
//! again, already allocated, on the next acquire.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::{Result, VoltaicError};

/// Objects that can be returned to a pool and reused.
pub trait Recycle {
    /// Reset to a blank state, keeping any heap capacity.
    fn recycle(&mut self);
}

/// Identifies the consumer that created a pooled object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u32);

impl OwnerId {
    /// Raw id value.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Mints owner ids. One allocator can serve several pools, so a single owner
/// may hold objects of different types.
#[derive(Debug, Default)]
pub struct OwnerAllocator {
    next: u32,
}

impl OwnerAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh owner id.
    pub fn allocate(&mut self) -> OwnerId {
        let id = OwnerId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// A typed reference into a [`Pool`].
///
/// A handle goes stale once its slot is destroyed; the slot's generation is
/// bumped on release so a stale handle never aliases the slot's next tenant.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot had when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// Manual impls: derives would require `T: Clone` etc.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: T,
    generation: u32,
    /// `None` while the slot sits in the reserve
    owner: Option<OwnerId>,
}

/// A pool of reusable `T` with per-owner bookkeeping.
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    reserve: Vec<u32>,
    owned: HashMap<OwnerId, usize>,
}

impl<T: Recycle + Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Recycle + Default> Pool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            reserve: Vec::new(),
            owned: HashMap::new(),
        }
    }

    /// Create a pool with `capacity` pre-allocated reserve slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut pool = Self::new();
        pool.slots.reserve(capacity);
        for i in 0..capacity {
            pool.slots.push(Slot {
                value: T::default(),
                generation: 0,
                owner: None,
            });
            pool.reserve.push(i as u32);
        }
        pool
    }

    /// Take a blank object for `owner`, reusing a reserve slot when one exists.
    pub fn acquire(&mut self, owner: OwnerId) -> Handle<T> {
        let index = match self.reserve.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    value: T::default(),
                    generation: 0,
                    owner: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.owner = Some(owner);
        *self.owned.entry(owner).or_insert(0) += 1;

        Handle::new(index, slot.generation)
    }

    /// Like [`Pool::acquire`], also lending the blank object.
    pub fn acquire_mut(&mut self, owner: OwnerId) -> (Handle<T>, &mut T) {
        let handle = self.acquire(owner);
        (handle, &mut self.slots[handle.index as usize].value)
    }

    /// Store `value` in a pooled slot owned by `owner`.
    pub fn create(&mut self, owner: OwnerId, value: T) -> Handle<T> {
        let handle = self.acquire(owner);
        self.slots[handle.index as usize].value = value;
        handle
    }

    fn live_slot(&self, handle: Handle<T>) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.owner.is_some() && s.generation == handle.generation)
    }

    fn live_slot_mut(&mut self, handle: Handle<T>) -> Result<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.owner.is_some() && s.generation == handle.generation)
            .ok_or(VoltaicError::StaleHandle {
                index: handle.index,
                generation: handle.generation,
            })
    }

    /// Borrow a live object.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.live_slot(handle).map(|s| &s.value)
    }

    /// Mutably borrow a live object.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.live_slot_mut(handle).ok().map(|s| &mut s.value)
    }

    /// Owner of a live object.
    pub fn owner_of(&self, handle: Handle<T>) -> Option<OwnerId> {
        self.live_slot(handle).and_then(|s| s.owner)
    }

    /// Whether `handle` still refers to a live object.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.live_slot(handle).is_some()
    }

    fn release(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        let Some(owner) = slot.owner.take() else {
            return;
        };
        slot.value.recycle();
        slot.generation = slot.generation.wrapping_add(1);
        self.reserve.push(index);

        if let Some(count) = self.owned.get_mut(&owner) {
            *count -= 1;
            if *count == 0 {
                self.owned.remove(&owner);
            }
        }
    }

    /// Return one object to the reserve.
    pub fn destroy(&mut self, handle: Handle<T>) -> Result<()> {
        self.live_slot_mut(handle)?;
        self.release(handle.index);
        Ok(())
    }

    /// Hand a live object over to another owner.
    pub fn transfer(&mut self, handle: Handle<T>, to: OwnerId) -> Result<()> {
        let slot = self.live_slot_mut(handle)?;
        let from = slot.owner.replace(to);
        if let Some(from) = from {
            if let Some(count) = self.owned.get_mut(&from) {
                *count -= 1;
                if *count == 0 {
                    self.owned.remove(&from);
                }
            }
        }
        *self.owned.entry(to).or_insert(0) += 1;
        Ok(())
    }

    /// Return every object held by `owner` to the reserve.
    ///
    /// Returns how many objects were released.
    pub fn destroy_all_owned_by(&mut self, owner: OwnerId) -> usize {
        if self.owned_count(owner) == 0 {
            return 0;
        }
        let mut released = 0;
        for index in 0..self.slots.len() {
            if self.slots[index].owner == Some(owner) {
                self.release(index as u32);
                released += 1;
            }
        }
        released
    }

    /// Number of live objects held by `owner`.
    pub fn owned_count(&self, owner: OwnerId) -> usize {
        self.owned.get(&owner).copied().unwrap_or(0)
    }

    /// Number of released slots waiting for reuse.
    pub fn reserve_count(&self) -> usize {
        self.reserve.len()
    }

    /// Number of live objects across all owners.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.reserve.len()
    }

    /// Total slots ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether the per-owner counts agree with the slots.
    pub fn check_balance(&self) -> bool {
        let tagged = self.slots.iter().filter(|s| s.owner.is_some()).count();
        let counted: usize = self.owned.values().sum();
        tagged == counted && tagged == self.live_count()
    }

    /// Confirm `owner` holds nothing in this pool.
    pub fn retire_owner(&self, owner: OwnerId) -> Result<()> {
        match self.owned_count(owner) {
            0 => Ok(()),
            outstanding => Err(VoltaicError::PoolImbalance { owner, outstanding }),
        }
    }

    /// Live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.owner
                .map(|_| (Handle::new(i as u32, s.generation), &s.value))
        })
    }

    /// Live objects held by `owner`, in slot order.
    pub fn iter_owned_by(&self, owner: OwnerId) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(move |(i, s)| {
            (s.owner == Some(owner)).then(|| (Handle::new(i as u32, s.generation), &s.value))
        })
    }

    /// Release every live object regardless of owner.
    pub fn reset(&mut self) {
        for index in 0..self.slots.len() {
            self.release(index as u32);
        }
        self.owned.clear();
    }
}
