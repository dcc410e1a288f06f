use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use roaring::RoaringTreemap;
use tracing::{debug, warn};

use crate::construct::{FieldOptions, FieldResolver, Item, ItemKeeper, Lid, PositionLookup, Uid, UidGenerator};
use crate::container::{Container, Direction};
use crate::datatype::FieldValue;
use crate::error::{MinesetError, Result};

/// Where a container goes in the display ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Kept, but not displayed.
    Hidden,
    Last,
    At(usize),
}

/// Locates one id inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locate {
    At(usize),
    Last,
    Iid(Uid),
}

/// Locates several ids inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    Positions(Vec<usize>),
    Iids(Vec<Uid>),
}

// ------------- ContentCollection -------------
/// Owns items, containers of item ids, the display ordering of containers
/// and the reverse index from item ids to their positions in containers.
///
/// Every mutating method keeps the reverse index in step with the containers:
/// inserting at a position shifts the recorded position of every later id of
/// that container up by one, removing shifts them down by one.
#[derive(Debug)]
pub struct ContentCollection<I> {
    items: ItemKeeper<I>,
    containers: BTreeMap<Lid, Container>,
    display: Vec<Lid>,
    positions: PositionLookup,
    protected: BTreeSet<Lid>,
    // new containers are displayed in front of this one while it is last
    trailing: Option<Lid>,
    item_uids: UidGenerator,
    list_uids: UidGenerator,
}

impl<I: Item> ContentCollection<I> {
    pub fn new() -> Self {
        Self::with_generators(UidGenerator::new(), UidGenerator::new())
    }
    pub fn with_generators(item_uids: UidGenerator, list_uids: UidGenerator) -> Self {
        Self {
            items: ItemKeeper::new(),
            containers: BTreeMap::new(),
            display: Vec::new(),
            positions: PositionLookup::new(),
            protected: BTreeSet::new(),
            trailing: None,
            item_uids,
            list_uids,
        }
    }
    /// Replaces all content by the given items, none of them placed in a container.
    pub fn init_items(&mut self, items: impl IntoIterator<Item = I>) {
        self.clear();
        for item in items {
            self.item_uids.retain(item.uid());
            self.items.keep(item);
        }
    }

    // ------------- generators -------------
    /// Issues an id for an item about to be created by the caller.
    pub fn next_item_uid(&mut self) -> Uid {
        self.item_uids.generate()
    }
    pub fn item_generator(&mut self) -> &mut UidGenerator {
        &mut self.item_uids
    }
    pub fn list_generator(&mut self) -> &mut UidGenerator {
        &mut self.list_uids
    }

    // ------------- protection -------------
    pub fn protect(&mut self, lid: Lid) {
        self.protected.insert(lid);
    }
    pub fn unprotect(&mut self, lid: Lid) -> bool {
        self.protected.remove(&lid)
    }
    pub fn is_protected(&self, lid: Lid) -> bool {
        self.protected.contains(&lid)
    }
    pub fn set_trailing(&mut self, lid: Option<Lid>) {
        self.trailing = lid;
    }

    // ------------- clearing -------------
    /// Drops every item and every unprotected container. Protected containers
    /// stay, emptied.
    pub fn clear(&mut self) {
        self.items.clear();
        self.positions.clear();
        let protected = &self.protected;
        self.containers.retain(|lid, _| protected.contains(lid));
        for container in self.containers.values_mut() {
            container.clear();
        }
        self.display.retain(|lid| protected.contains(lid));
        debug!(kept = self.containers.len(), "collection cleared");
    }

    /// Drops items no container refers to, and empty unprotected containers.
    /// Returns the number of items and containers dropped.
    pub fn prune(&mut self) -> (usize, usize) {
        self.positions.prune();
        let orphans: Vec<Uid> = self.items.uids().filter(|&uid| !self.positions.is_placed(uid)).collect();
        for uid in &orphans {
            self.items.remove(*uid);
        }
        let empty: Vec<Lid> = self
            .containers
            .iter()
            .filter(|(lid, container)| container.is_empty() && !self.protected.contains(*lid))
            .map(|(lid, _)| *lid)
            .collect();
        for lid in &empty {
            self.containers.remove(lid);
        }
        self.display.retain(|lid| !empty.contains(lid));
        if !orphans.is_empty() || !empty.is_empty() {
            debug!(items = orphans.len(), lists = empty.len(), "pruned");
        }
        (orphans.len(), empty.len())
    }

    // ------------- items -------------
    pub fn item(&self, uid: Uid) -> Option<&I> {
        self.items.get(uid)
    }
    pub fn items(&self) -> impl Iterator<Item = &I> + '_ {
        self.items.items()
    }
    pub fn item_keeper(&self) -> &ItemKeeper<I> {
        &self.items
    }
    pub fn has_iid(&self, uid: Uid) -> bool {
        self.items.contains(uid)
    }
    /// Every item id, in id order.
    pub fn iids(&self) -> Vec<Uid> {
        self.items.uids().collect()
    }
    pub fn nb_items(&self) -> usize {
        self.items.len()
    }
    /// Ids of kept items not among `ids`, in id order.
    pub fn complement_iids(&self, ids: &[Uid]) -> Vec<Uid> {
        let excluded: RoaringTreemap = ids.iter().copied().collect();
        (self.items.uid_set() - excluded).iter().collect()
    }
    /// Ids of kept items that are also among `ids`, in id order.
    pub fn intersect_iids(&self, ids: &[Uid]) -> Vec<Uid> {
        let wanted: RoaringTreemap = ids.iter().copied().collect();
        (self.items.uid_set() & wanted).iter().collect()
    }

    /// Keeps the item (replacing content already kept under its id) and
    /// places it in `lid` at `pos`, or at the end when `pos` is `None` or
    /// out of range. Returns the position in the container, if placed.
    pub fn add_item(&mut self, item: I, lid: Option<Lid>, pos: Option<usize>) -> Option<usize> {
        let uid = item.uid();
        self.item_uids.retain(uid);
        self.items.keep(item);
        lid.and_then(|lid| self.insert_iid(uid, lid, pos))
    }
    /// Places an id, without touching the kept items.
    pub fn add_iid(&mut self, uid: Uid, lid: Lid, pos: Option<usize>) -> Option<usize> {
        self.insert_iid(uid, lid, pos)
    }

    /// Removes the id from every container holding it, then the item itself.
    pub fn delete_item(&mut self, uid: Uid) -> Option<I> {
        for (lid, pos) in self.positions.remove_item(uid) {
            if let Some(container) = self.containers.get_mut(&lid) {
                for &follower in &container.iids()[pos + 1..] {
                    self.positions.shift(follower, lid, false);
                }
                container.remove(pos);
            }
        }
        let removed = self.items.remove(uid);
        if removed.is_some() {
            debug!(uid, "item deleted");
        }
        removed
    }

    /// Swaps in new content for `uid` when it differs from the kept one. The
    /// replaced item is handed back under a fresh id; containers holding
    /// `uid` are marked as changed.
    pub fn substitute_item(&mut self, uid: Uid, mut item: I) -> Option<I> {
        let old = self.items.get(uid)?;
        if old.compare(&item) == Ordering::Equal {
            return None;
        }
        item.set_uid(uid);
        let mut old = self.items.keep(item)?;
        old.set_uid(self.item_uids.generate());
        for (lid, _) in self.positions.memberships(uid) {
            if let Some(container) = self.containers.get_mut(&lid) {
                container.set_changed(true);
            }
        }
        debug!(uid, replaced = old.uid(), "item substituted");
        Some(old)
    }

    // ------------- positions -------------
    fn locate(&self, lid: Lid, locate: Locate) -> Option<usize> {
        let container = self.containers.get(&lid)?;
        match locate {
            Locate::At(pos) if pos < container.len() => Some(pos),
            Locate::At(_) => None,
            Locate::Last => container.len().checked_sub(1),
            Locate::Iid(uid) => self.positions.get(uid, lid),
        }
    }
    fn pick(&self, lid: Lid, pick: &Pick) -> Vec<usize> {
        let len = self.list_len(lid);
        let mut positions: Vec<usize> = match pick {
            Pick::Positions(positions) => positions.iter().copied().filter(|&p| p < len).collect(),
            Pick::Iids(uids) => uids.iter().filter_map(|&uid| self.positions.get(uid, lid)).collect(),
        };
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    /// The id at `pos` in `lid`, the last one when `pos` is `None`.
    pub fn iid_at(&self, lid: Lid, pos: Option<usize>) -> Option<Uid> {
        let pos = self.locate(lid, pos.map_or(Locate::Last, Locate::At))?;
        self.containers.get(&lid)?.get(pos)
    }
    pub fn position(&self, lid: Lid, uid: Uid) -> Option<usize> {
        self.positions.get(uid, lid)
    }
    /// Every (container id, position) holding `uid`.
    pub fn memberships(&self, uid: Uid) -> Vec<(Lid, usize)> {
        self.positions.memberships(uid)
    }

    /// Takes the id at `pos` (the last one when `None`) out of `lid`.
    pub fn pop_iid(&mut self, lid: Lid, pos: Option<usize>) -> Option<Uid> {
        let pos = self.locate(lid, pos.map_or(Locate::Last, Locate::At))?;
        let container = self.containers.get_mut(&lid)?;
        for &follower in &container.iids()[pos + 1..] {
            self.positions.shift(follower, lid, false);
        }
        let uid = container.remove(pos)?;
        self.positions.remove(uid, lid);
        Some(uid)
    }

    /// Places `uid` in `lid` at `pos` (appending when `None` or out of
    /// range). An id already in the container keeps its current position.
    pub fn insert_iid(&mut self, uid: Uid, lid: Lid, pos: Option<usize>) -> Option<usize> {
        if let Some(existing) = self.positions.get(uid, lid) {
            return Some(existing);
        }
        let container = self.containers.get_mut(&lid)?;
        let len = container.len();
        let pos = pos.filter(|&p| p < len).unwrap_or(len);
        for &follower in &container.iids()[pos..] {
            self.positions.shift(follower, lid, true);
        }
        container.insert(pos, uid);
        self.positions.set(uid, lid, pos);
        Some(pos)
    }

    /// Replaces the ids of `lid`. Repeated ids are kept once, at their first occurrence.
    pub fn set_iids(&mut self, lid: Lid, iids: Vec<Uid>) {
        let Some(container) = self.containers.get_mut(&lid) else { return };
        for &uid in container.iids() {
            self.positions.remove(uid, lid);
        }
        let mut seen = RoaringTreemap::new();
        let iids: Vec<Uid> = iids.into_iter().filter(|&uid| seen.insert(uid)).collect();
        for (pos, &uid) in iids.iter().enumerate() {
            self.positions.set(uid, lid, pos);
        }
        container.set_iids(iids);
    }

    pub fn copy_iid(&mut self, src_lid: Lid, locate: Locate, trg_lid: Lid, trg_pos: Option<usize>) -> Option<usize> {
        if !self.has_lid(trg_lid) {
            return None;
        }
        let pos = self.locate(src_lid, locate)?;
        let uid = self.containers.get(&src_lid)?.get(pos)?;
        let mut copy = self.items.get(uid)?.clone();
        copy.set_uid(self.item_uids.generate());
        self.add_item(copy, Some(trg_lid), trg_pos)
    }

    pub fn move_iid(&mut self, src_lid: Lid, locate: Locate, trg_lid: Lid, trg_pos: Option<usize>) -> Option<usize> {
        if !self.has_lid(trg_lid) {
            return None;
        }
        let pos = self.locate(src_lid, locate)?;
        let uid = self.pop_iid(src_lid, Some(pos))?;
        debug!(uid, src_lid, trg_lid, "moving item");
        self.insert_iid(uid, trg_lid, trg_pos)
    }

    /// Copies the picked ids, in their current relative order, to `trg_lid`
    /// starting at `trg_pos` (the end when `None`).
    pub fn copy_iids(&mut self, src_lid: Lid, pick: &Pick, trg_lid: Lid, trg_pos: Option<usize>) -> Vec<usize> {
        if !self.has_lid(trg_lid) {
            return Vec::new();
        }
        let uids: Vec<Uid> = self
            .pick(src_lid, pick)
            .into_iter()
            .filter_map(|pos| self.containers.get(&src_lid).and_then(|c| c.get(pos)))
            .collect();
        let base = trg_pos.unwrap_or_else(|| self.list_len(trg_lid)).min(self.list_len(trg_lid));
        let mut inserted = Vec::new();
        for uid in uids {
            let Some(item) = self.items.get(uid) else { continue };
            let mut copy = item.clone();
            copy.set_uid(self.item_uids.generate());
            if let Some(pos) = self.add_item(copy, Some(trg_lid), Some(base + inserted.len())) {
                inserted.push(pos);
            }
        }
        inserted
    }

    /// Moves the picked ids, in their current relative order, to `trg_lid`
    /// starting at `trg_pos` (the end when `None`).
    pub fn move_iids(&mut self, src_lid: Lid, pick: &Pick, trg_lid: Lid, trg_pos: Option<usize>) -> Vec<usize> {
        if !self.has_lid(trg_lid) {
            return Vec::new();
        }
        let mut popped: Vec<Uid> = self
            .pick(src_lid, pick)
            .into_iter()
            .rev()
            .filter_map(|pos| self.pop_iid(src_lid, Some(pos)))
            .collect();
        popped.reverse();
        let base = trg_pos.unwrap_or_else(|| self.list_len(trg_lid)).min(self.list_len(trg_lid));
        let mut inserted = Vec::new();
        for uid in popped {
            if let Some(pos) = self.insert_iid(uid, trg_lid, Some(base + inserted.len())) {
                inserted.push(pos);
            }
        }
        debug!(src_lid, trg_lid, moved = inserted.len(), "moved items");
        inserted
    }

    // ------------- containers -------------
    pub fn container(&self, lid: Lid) -> Option<&Container> {
        self.containers.get(&lid)
    }
    pub(crate) fn container_mut(&mut self, lid: Lid) -> Option<&mut Container> {
        self.containers.get_mut(&lid)
    }
    pub fn containers(&self) -> impl Iterator<Item = &Container> + '_ {
        self.containers.values()
    }
    pub fn has_lid(&self, lid: Lid) -> bool {
        self.containers.contains_key(&lid)
    }
    pub fn lids(&self) -> Vec<Lid> {
        self.containers.keys().copied().collect()
    }
    pub fn nb_lists(&self) -> usize {
        self.containers.len()
    }
    pub fn list_len(&self, lid: Lid) -> usize {
        self.containers.get(&lid).map_or(0, Container::len)
    }
    pub fn iids_of(&self, lid: Lid) -> Vec<Uid> {
        self.containers.get(&lid).map(|c| c.iids().to_vec()).unwrap_or_default()
    }
    pub fn items_of(&self, lid: Lid) -> Vec<&I> {
        self.containers
            .get(&lid)
            .map(|c| c.iids().iter().filter_map(|&uid| self.items.get(uid)).collect())
            .unwrap_or_default()
    }
    /// Ids of `lid` strictly before `uid` (all of them when `uid` is absent).
    pub fn iids_above(&self, lid: Lid, uid: Uid) -> Vec<Uid> {
        self.iids_of(lid).into_iter().take_while(|&i| i != uid).collect()
    }
    /// Ids of `lid` from `uid` onwards.
    pub fn iids_below(&self, lid: Lid, uid: Uid) -> Vec<Uid> {
        self.iids_of(lid).into_iter().skip_while(|&i| i != uid).collect()
    }

    pub fn new_list(&mut self, name: Option<String>) -> Lid {
        let lid = self.list_uids.generate();
        self.add_list(Container::new(lid, name), Placement::Last)
    }
    /// Registers a container, indexing the ids it already holds.
    pub fn add_list(&mut self, container: Container, placement: Placement) -> Lid {
        let lid = container.lid();
        self.list_uids.retain(lid);
        if self.has_lid(lid) {
            self.clear_list(lid);
        }
        self.containers.insert(lid, container);
        self.add_from_list(lid);
        self.insert_display(lid, placement);
        debug!(lid, "list added");
        lid
    }
    /// Removes a container and its index entries. Protected containers stay.
    pub fn delete_list(&mut self, lid: Lid) -> Option<Container> {
        if self.protected.contains(&lid) {
            warn!(lid, "refusing to delete a protected list");
            return None;
        }
        let container = self.containers.remove(&lid)?;
        for &uid in container.iids() {
            self.positions.remove(uid, lid);
        }
        self.display.retain(|&l| l != lid);
        debug!(lid, "list deleted");
        Some(container)
    }
    /// Records the positions of every id held by `lid` in the reverse index.
    pub fn add_from_list(&mut self, lid: Lid) {
        if let Some(container) = self.containers.get(&lid) {
            for (pos, &uid) in container.iids().iter().enumerate() {
                self.positions.set(uid, lid, pos);
            }
        }
    }
    /// Empties `lid`, dropping its index entries.
    pub fn clear_list(&mut self, lid: Lid) {
        if let Some(container) = self.containers.get_mut(&lid) {
            for &uid in container.iids() {
                self.positions.remove(uid, lid);
            }
            container.clear();
        }
    }
    pub fn rename_list(&mut self, lid: Lid, name: impl Into<String>) {
        if let Some(container) = self.containers.get_mut(&lid) {
            container.set_name(name);
        }
    }

    pub fn set_sort(&mut self, lid: Lid, field: Option<&str>, direction: Option<Direction>) -> bool {
        self.containers
            .get_mut(&lid)
            .is_some_and(|container| container.set_sort(field, direction))
    }
    /// Re-sorts `lid` by its sort state and rewrites the positions of its ids.
    pub fn update_sort(&mut self, lid: Lid) {
        let Some(container) = self.containers.get_mut(&lid) else { return };
        container.resort(&self.items);
        for (pos, &uid) in container.iids().iter().enumerate() {
            self.positions.set(uid, lid, pos);
        }
    }

    // ------------- display -------------
    pub fn displayed_lids(&self) -> &[Lid] {
        &self.display
    }
    pub fn nb_displayed(&self) -> usize {
        self.display.len()
    }
    pub fn is_displayed(&self, lid: Lid) -> bool {
        self.display.contains(&lid)
    }
    pub fn display_position(&self, lid: Lid) -> Option<usize> {
        self.display.iter().position(|&l| l == lid)
    }
    /// The displayed container at `pos`, the last one when `None`.
    pub fn lid_at(&self, pos: Option<usize>) -> Option<Lid> {
        match pos {
            Some(pos) => self.display.get(pos).copied(),
            None => self.display.last().copied(),
        }
    }
    fn insert_display(&mut self, lid: Lid, placement: Placement) -> Option<usize> {
        if let Some(pos) = self.display_position(lid) {
            return Some(pos);
        }
        let pos = match placement {
            Placement::Hidden => return None,
            Placement::At(pos) if pos <= self.display.len() => pos,
            Placement::At(_) | Placement::Last => match (self.trailing, self.display.last()) {
                (Some(trailing), Some(&last)) if trailing == last && lid != trailing => self.display.len() - 1,
                _ => self.display.len(),
            },
        };
        self.display.insert(pos, lid);
        Some(pos)
    }
    /// Displays a kept container.
    pub fn show_list(&mut self, lid: Lid, placement: Placement) -> Option<usize> {
        if !self.has_lid(lid) {
            return None;
        }
        self.insert_display(lid, placement)
    }
    /// Stops displaying a container, keeping it.
    pub fn hide_list(&mut self, lid: Lid) -> bool {
        let before = self.display.len();
        self.display.retain(|&l| l != lid);
        before != self.display.len()
    }

    /// Verifies that containers, reverse index and display ordering agree.
    pub fn check_consistency(&self) -> Result<()> {
        for (lid, container) in &self.containers {
            for (pos, &uid) in container.iids().iter().enumerate() {
                if self.positions.get(uid, *lid) != Some(pos) {
                    return Err(MinesetError::Invariant(format!(
                        "item {} sits at {} in list {} but is indexed at {:?}",
                        uid,
                        pos,
                        lid,
                        self.positions.get(uid, *lid)
                    )));
                }
            }
            if self.positions.count_for(*lid) != container.len() {
                return Err(MinesetError::Invariant(format!(
                    "list {} holds {} ids but is indexed {} times",
                    lid,
                    container.len(),
                    self.positions.count_for(*lid)
                )));
            }
        }
        for (uid, lid, pos) in self.positions.entries() {
            if self.containers.get(&lid).and_then(|c| c.get(pos)) != Some(uid) {
                return Err(MinesetError::Invariant(format!(
                    "index places item {} at {} in list {}",
                    uid, pos, lid
                )));
            }
        }
        let mut seen = BTreeSet::new();
        if !self.display.iter().all(|lid| seen.insert(*lid)) {
            return Err(MinesetError::Invariant("display ordering repeats a list".into()));
        }
        Ok(())
    }
}

impl<I: Item> Default for ContentCollection<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Item> FieldResolver for ContentCollection<I> {
    fn resolve_field(&self, uid: Uid, field: &str, options: &FieldOptions) -> Result<Option<FieldValue>> {
        self.items.resolve_field(uid, field, options)
    }
}

impl<I: Item> fmt::Display for ContentCollection<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Content collection: {} items in {}/{} lists",
            self.nb_items(),
            self.nb_displayed(),
            self.nb_lists()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn record(uid: Uid, score: i64) -> Record {
        Record::new(uid).with("score", score)
    }

    fn three_in_one() -> (ContentCollection<Record>, Lid) {
        let mut content = ContentCollection::new();
        let lid = content.new_list(None);
        for uid in 0..3 {
            content.add_item(record(uid, uid as i64), Some(lid), None);
        }
        (content, lid)
    }

    #[test]
    fn insert_shifts_followers_in_that_list_only() {
        let (mut content, lid) = three_in_one();
        let other = content.new_list(None);
        content.add_iid(1, other, None);
        content.add_item(record(9, 9), Some(lid), Some(1));
        assert_eq!(content.iids_of(lid), vec![0, 9, 1, 2]);
        assert_eq!(content.position(lid, 1), Some(2));
        assert_eq!(content.position(other, 1), Some(0));
        // already present keeps its position
        assert_eq!(content.add_iid(9, lid, Some(0)), Some(1));
        content.check_consistency().unwrap();
    }

    #[test]
    fn pop_and_locate() {
        let (mut content, lid) = three_in_one();
        assert_eq!(content.iid_at(lid, None), Some(2));
        assert_eq!(content.iid_at(lid, Some(7)), None);
        assert_eq!(content.pop_iid(lid, Some(0)), Some(0));
        assert_eq!(content.position(lid, 2), Some(1));
        assert_eq!(content.pop_iid(lid, Some(5)), None);
        content.check_consistency().unwrap();
    }

    #[test]
    fn substitute_only_when_content_differs() {
        let (mut content, lid) = three_in_one();
        assert!(content.substitute_item(1, record(1, 1)).is_none());
        let old = content.substitute_item(1, record(77, 100)).unwrap();
        assert_ne!(old.uid(), 1);
        assert_eq!(content.item(1).unwrap().get("score"), Some(&FieldValue::from(100)));
        assert!(content.container(lid).unwrap().is_changed());
        assert!(content.substitute_item(42, record(42, 0)).is_none());
    }

    #[test]
    fn bulk_moves_keep_relative_order() {
        let (mut content, lid) = three_in_one();
        content.add_item(record(3, 3), Some(lid), None);
        let other = content.new_list(None);
        content.add_item(record(10, 10), Some(other), None);
        let moved = content.move_iids(lid, &Pick::Positions(vec![3, 0, 2]), other, Some(0));
        assert_eq!(moved, vec![0, 1, 2]);
        assert_eq!(content.iids_of(other), vec![0, 2, 3, 10]);
        assert_eq!(content.iids_of(lid), vec![1]);
        let copied = content.copy_iids(other, &Pick::Iids(vec![3, 0]), lid, None);
        assert_eq!(copied, vec![1, 2]);
        let copies = content.iids_of(lid);
        assert_eq!(content.item(copies[1]).unwrap().get("score"), Some(&FieldValue::from(0)));
        assert_eq!(content.item(copies[2]).unwrap().get("score"), Some(&FieldValue::from(3)));
        content.check_consistency().unwrap();
    }

    #[test]
    fn move_to_missing_list_pops_nothing() {
        let (mut content, lid) = three_in_one();
        assert_eq!(content.move_iid(lid, Locate::At(0), 99, None), None);
        assert!(content.move_iids(lid, &Pick::Positions(vec![0, 1]), 99, None).is_empty());
        assert_eq!(content.list_len(lid), 3);
    }

    #[test]
    fn copy_gets_fresh_id() {
        let (mut content, lid) = three_in_one();
        let pos = content.copy_iid(lid, Locate::Iid(2), lid, Some(0)).unwrap();
        let copy = content.iid_at(lid, Some(pos)).unwrap();
        assert!(copy > 2);
        assert_eq!(content.nb_items(), 4);
        content.check_consistency().unwrap();
    }

    #[test]
    fn update_sort_rewrites_positions() {
        let (mut content, lid) = three_in_one();
        assert!(content.set_sort(lid, Some("score"), Some(Direction::Descending)));
        content.update_sort(lid);
        assert_eq!(content.iids_of(lid), vec![2, 1, 0]);
        assert_eq!(content.position(lid, 0), Some(2));
        content.check_consistency().unwrap();
    }

    #[test]
    fn set_iids_and_neighbours() {
        let (mut content, lid) = three_in_one();
        content.set_iids(lid, vec![2, 0, 2, 1]);
        assert_eq!(content.iids_of(lid), vec![2, 0, 1]);
        assert_eq!(content.iids_above(lid, 1), vec![2, 0]);
        assert_eq!(content.iids_below(lid, 0), vec![0, 1]);
        content.check_consistency().unwrap();
    }

    #[test]
    fn delete_list_and_clear_respect_protection() {
        let (mut content, lid) = three_in_one();
        let keep = content.new_list(Some("keep".into()));
        content.add_iid(0, keep, None);
        content.protect(keep);
        assert!(content.delete_list(keep).is_none());
        let removed = content.delete_list(lid).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(content.memberships(0), vec![(keep, 0)]);
        content.clear();
        assert_eq!(content.nb_items(), 0);
        assert_eq!(content.lids(), vec![keep]);
        assert!(content.container(keep).unwrap().is_empty());
        content.check_consistency().unwrap();
    }

    #[test]
    fn trailing_list_stays_last() {
        let mut content: ContentCollection<Record> = ContentCollection::new();
        let first = content.new_list(None);
        let tail = content.new_list(None);
        content.set_trailing(Some(tail));
        let third = content.new_list(None);
        assert_eq!(content.displayed_lids(), &[first, third, tail]);
        content.hide_list(first);
        assert_eq!(content.show_list(first, Placement::At(0)), Some(0));
        assert_eq!(content.show_list(first, Placement::Last), Some(0));
        assert_eq!(content.lid_at(None), Some(tail));
    }

    #[test]
    fn complement_and_intersection() {
        let (content, _) = three_in_one();
        assert_eq!(content.complement_iids(&[1, 5]), vec![0, 2]);
        assert_eq!(content.intersect_iids(&[1, 5]), vec![1]);
    }
}
