use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// the keepers use ordered maps so that "all items" comes out in id order
use std::collections::BTreeMap;
// the reverse index uses HashMap with a fast hasher
use core::hash::BuildHasherDefault;
use std::collections::HashMap;
use seahash::SeaHasher;

// items are compared in an "equality-style" manner
use std::cmp::Ordering;
use std::fmt;

use roaring::RoaringTreemap;
use tracing::warn;

// our own stuff that we need
use crate::datatype::FieldValue;
use crate::error::{MinesetError, Result};

// ------------- Uid -------------
/// Identity of an item.
pub type Uid = u64;
/// Identity of a container (list).
pub type Lid = u64;

pub type UidHasher = BuildHasherDefault<SeaHasher>;

pub const GENESIS: Uid = 0;

#[derive(Debug, Clone, Copy)]
struct Counter {
    next: Uid,
    step: u64,
}

#[derive(Debug)]
enum CounterSlot {
    Owned(Counter),
    Shared(Arc<Mutex<Counter>>),
}

fn lock(shared: &Mutex<Counter>) -> MutexGuard<'_, Counter> {
    // a poisoned counter is still a valid integer
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Issues unique, increasing identifiers.
///
/// A generator is owned by whoever allocates ids (a collection owns one for
/// items and one for containers). When locked, the counter lives behind a
/// mutex and [`UidGenerator::share`] hands out further handles on it, so that
/// several workers can allocate from the same sequence without collisions.
#[derive(Debug)]
pub struct UidGenerator {
    slot: CounterSlot,
}

impl UidGenerator {
    pub fn new() -> Self {
        Self {
            slot: CounterSlot::Owned(Counter { next: GENESIS, step: 1 }),
        }
    }
    pub fn starting_at(start: Uid, step: u64) -> Result<Self> {
        let mut generator = Self::new();
        generator.reconfigure(Some(start), Some(step), false)?;
        Ok(generator)
    }
    fn counter(&self) -> Counter {
        match &self.slot {
            CounterSlot::Owned(counter) => *counter,
            CounterSlot::Shared(shared) => *lock(shared),
        }
    }
    pub fn generate(&mut self) -> Uid {
        match &mut self.slot {
            CounterSlot::Owned(counter) => {
                let uid = counter.next;
                counter.next += counter.step;
                uid
            }
            CounterSlot::Shared(shared) => {
                let mut counter = lock(shared);
                let uid = counter.next;
                counter.next += counter.step;
                uid
            }
        }
    }
    /// The id the next call to `generate` would return.
    pub fn peek(&self) -> Uid {
        self.counter().next
    }
    pub fn step(&self) -> u64 {
        self.counter().step
    }
    pub fn is_locked(&self) -> bool {
        matches!(self.slot, CounterSlot::Shared(_))
    }
    /// Changes start value, step and locking. `None` keeps the current value.
    /// Switching `locked` off detaches this handle from any shared counter.
    pub fn reconfigure(&mut self, start: Option<Uid>, step: Option<u64>, locked: bool) -> Result<()> {
        if step == Some(0) {
            return Err(MinesetError::Config("identifier step must be positive".into()));
        }
        let mut counter = self.counter();
        if let Some(start) = start {
            if start < counter.next {
                warn!(start, next = counter.next, "identifier generator moved back, earlier ids may be reissued");
            }
            counter.next = start;
        }
        if let Some(step) = step {
            counter.step = step;
        }
        if !locked {
            self.slot = CounterSlot::Owned(counter);
        } else if let CounterSlot::Shared(shared) = &self.slot {
            *lock(shared) = counter;
        } else {
            self.slot = CounterSlot::Shared(Arc::new(Mutex::new(counter)));
        }
        Ok(())
    }
    /// Another handle on the same locked counter.
    pub fn share(&self) -> Option<UidGenerator> {
        match &self.slot {
            CounterSlot::Shared(shared) => Some(UidGenerator {
                slot: CounterSlot::Shared(Arc::clone(shared)),
            }),
            CounterSlot::Owned(_) => None,
        }
    }
    // Ids may be handed in from outside (items created elsewhere). Moving past
    // them keeps the residue of the counter, so stepped partitions stay apart.
    pub fn retain(&mut self, uid: Uid) {
        let bump = |counter: &mut Counter| {
            if uid >= counter.next {
                counter.next += ((uid - counter.next) / counter.step + 1) * counter.step;
            }
        };
        match &mut self.slot {
            CounterSlot::Owned(counter) => bump(counter),
            CounterSlot::Shared(shared) => bump(&mut *lock(shared)),
        }
    }
}

impl Default for UidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Item -------------
/// Options passed along when resolving a named field.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    /// Set when the value is wanted as a sort key.
    pub for_sort: bool,
    /// Substituted when the field resolves to nothing.
    pub replace_none: Option<FieldValue>,
}

impl FieldOptions {
    pub fn sorting() -> Self {
        Self {
            for_sort: true,
            replace_none: None,
        }
    }
}

/// The contract items have to fulfil to be kept in a collection.
pub trait Item: Clone + fmt::Debug {
    fn uid(&self) -> Uid;
    fn set_uid(&mut self, uid: Uid);
    /// `Ordering::Equal` means the two items carry the same content.
    fn compare(&self, other: &Self) -> Ordering;
    fn field(&self, name: &str, options: &FieldOptions) -> Result<Option<FieldValue>>;
    fn short_id(&self) -> String {
        format!("#{}", self.uid())
    }
}

/// Resolves a named field for an id.
pub trait FieldResolver {
    fn resolve_field(&self, uid: Uid, field: &str, options: &FieldOptions) -> Result<Option<FieldValue>>;
}

// ------------- Keepers -------------
#[derive(Debug, Clone)]
pub struct ItemKeeper<I> {
    kept: BTreeMap<Uid, I>,
}
impl<I: Item> ItemKeeper<I> {
    pub fn new() -> Self {
        Self { kept: BTreeMap::new() }
    }
    /// Keeps the item under its own uid, returning whatever was kept there before.
    pub fn keep(&mut self, item: I) -> Option<I> {
        self.kept.insert(item.uid(), item)
    }
    pub fn get(&self, uid: Uid) -> Option<&I> {
        self.kept.get(&uid)
    }
    pub fn remove(&mut self, uid: Uid) -> Option<I> {
        self.kept.remove(&uid)
    }
    pub fn contains(&self, uid: Uid) -> bool {
        self.kept.contains_key(&uid)
    }
    pub fn uids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.kept.keys().copied()
    }
    pub fn items(&self) -> impl Iterator<Item = &I> + '_ {
        self.kept.values()
    }
    pub fn uid_set(&self) -> RoaringTreemap {
        self.kept.keys().copied().collect()
    }
    pub fn clear(&mut self) {
        self.kept.clear();
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
impl<I: Item> Default for ItemKeeper<I> {
    fn default() -> Self {
        Self::new()
    }
}
impl<I: Item> FieldResolver for ItemKeeper<I> {
    fn resolve_field(&self, uid: Uid, field: &str, options: &FieldOptions) -> Result<Option<FieldValue>> {
        if field == "uid" {
            return Ok(Some(FieldValue::from(uid)));
        }
        let value = match self.get(uid) {
            Some(item) => item.field(field, options)?,
            None => None,
        };
        Ok(value.or_else(|| options.replace_none.clone()))
    }
}

// ------------- Lookups -------------
/// Reverse index: item id -> container id -> position of the item in that container.
#[derive(Debug, Clone, Default)]
pub struct PositionLookup {
    index: HashMap<Uid, HashMap<Lid, usize, UidHasher>, UidHasher>,
}
impl PositionLookup {
    pub fn new() -> Self {
        Self {
            index: HashMap::default(),
        }
    }
    pub fn get(&self, uid: Uid, lid: Lid) -> Option<usize> {
        self.index.get(&uid).and_then(|positions| positions.get(&lid).copied())
    }
    pub fn set(&mut self, uid: Uid, lid: Lid, pos: usize) {
        self.index.entry(uid).or_default().insert(lid, pos);
    }
    pub fn remove(&mut self, uid: Uid, lid: Lid) -> Option<usize> {
        self.index.get_mut(&uid).and_then(|positions| positions.remove(&lid))
    }
    pub fn remove_item(&mut self, uid: Uid) -> Vec<(Lid, usize)> {
        let mut memberships: Vec<(Lid, usize)> = self
            .index
            .remove(&uid)
            .map(|positions| positions.into_iter().collect())
            .unwrap_or_default();
        memberships.sort_unstable();
        memberships
    }
    /// Container id and position for every container holding `uid`, ordered by container id.
    pub fn memberships(&self, uid: Uid) -> Vec<(Lid, usize)> {
        let mut memberships: Vec<(Lid, usize)> = self
            .index
            .get(&uid)
            .map(|positions| positions.iter().map(|(l, p)| (*l, *p)).collect())
            .unwrap_or_default();
        memberships.sort_unstable();
        memberships
    }
    pub fn shift(&mut self, uid: Uid, lid: Lid, up: bool) {
        if let Some(pos) = self.index.get_mut(&uid).and_then(|positions| positions.get_mut(&lid)) {
            if up {
                *pos += 1;
            } else {
                *pos -= 1;
            }
        }
    }
    /// True when the item is referenced by at least one container.
    pub fn is_placed(&self, uid: Uid) -> bool {
        self.index.get(&uid).is_some_and(|positions| !positions.is_empty())
    }
    pub fn prune(&mut self) -> usize {
        let before = self.index.len();
        self.index.retain(|_, positions| !positions.is_empty());
        before - self.index.len()
    }
    pub fn count_for(&self, lid: Lid) -> usize {
        self.index.values().filter(|positions| positions.contains_key(&lid)).count()
    }
    pub fn entries(&self) -> impl Iterator<Item = (Uid, Lid, usize)> + '_ {
        self.index
            .iter()
            .flat_map(|(uid, positions)| positions.iter().map(move |(lid, pos)| (*uid, *lid, *pos)))
    }
    pub fn clear(&mut self) {
        self.index.clear();
    }
}
