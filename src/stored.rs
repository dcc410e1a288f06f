//! A batch collection whose containers are tied to their sources, with a
//! hidden buffer for cut and paste and a history list of replaced items.
use std::fmt;
use std::ops::{Deref, DerefMut};

use bimap::BiMap;
use tracing::{debug, info};

use crate::batch::Batch;
use crate::construct::{Item, Lid, Uid, UidGenerator};
use crate::container::{Container, Source, SourceKind, PACKAGE_LOCATOR};
use crate::content::{Locate, Pick, Placement};
use crate::track::TrackedContentCollection;

// Manual lists are many and interchangeable, so they are not keyed by source.
fn keyed(source: &Source) -> bool {
    source.kind() != SourceKind::Manual
}

/// Keeps containers opened from sources, the buffer and the history.
///
/// The buffer is never displayed. The history stays the last displayed
/// container: lists added later go in front of it. Neither can be deleted.
/// Each cut or copy to the buffer leaves a mark holding the ids it buffered,
/// so that pastes give back the most recent batch first. Ids that left the
/// buffer some other way are skipped when pasting.
#[derive(Debug)]
pub struct StoredContentCollection<I> {
    tracked: TrackedContentCollection<I>,
    sources: BiMap<Source, Lid>,
    buffer: Lid,
    history: Lid,
    buffer_marks: Vec<Vec<Uid>>,
}

impl<I: Item> StoredContentCollection<I> {
    pub fn new() -> Self {
        Self::with_generators(UidGenerator::new(), UidGenerator::new())
    }
    pub fn with_generators(item_uids: UidGenerator, list_uids: UidGenerator) -> Self {
        let mut tracked = TrackedContentCollection::with_generators(item_uids, list_uids);
        let mut sources = BiMap::new();
        let buffer = tracked.list_generator().generate();
        tracked.add_list(Container::with_source(buffer, Source::buffer(), None), Placement::Hidden);
        sources.insert(Source::buffer(), buffer);
        let history = tracked.list_generator().generate();
        tracked.add_list(Container::with_source(history, Source::history(), None), Placement::Last);
        sources.insert(Source::history(), history);
        tracked.protect(buffer);
        tracked.protect(history);
        tracked.set_trailing(Some(history));
        Self { tracked, sources, buffer, history, buffer_marks: Vec::new() }
    }

    pub fn buffer_lid(&self) -> Lid {
        self.buffer
    }
    pub fn history_lid(&self) -> Lid {
        self.history
    }

    // ------------- sources -------------
    pub fn source_lid(&self, source: &Source) -> Option<Lid> {
        self.sources.get_by_left(source).copied().filter(|&lid| self.tracked.has_lid(lid))
    }
    pub fn source_of(&self, lid: Lid) -> Option<&Source> {
        self.tracked.container(lid).and_then(Container::source)
    }
    /// Opens a container for `source`. A source that already has a container
    /// gets that one back.
    pub fn new_list(&mut self, source: Option<Source>, name: Option<String>) -> Lid {
        let source = source.unwrap_or_default();
        if let Some(lid) = self.source_lid(&source) {
            debug!(lid, "source already open");
            return lid;
        }
        self.sources.remove_by_left(&source);
        let lid = self.tracked.list_generator().generate();
        self.tracked.add_list(Container::with_source(lid, source.clone(), name), Placement::Last);
        if keyed(&source) {
            self.sources.insert(source, lid);
        }
        lid
    }
    /// Places the item at the end of the container of `source`, opening one
    /// when needed.
    pub fn append_item_to_source(&mut self, item: I, source: Source) -> Option<usize> {
        let lid = self.new_list(Some(source), None);
        self.tracked.add_item(item, Some(lid), None)
    }
    pub fn update_source(&mut self, from: &Source, to: Source) -> bool {
        match self.source_lid(from) {
            Some(lid) => self.retarget(lid, to),
            None => false,
        }
    }
    fn retarget(&mut self, lid: Lid, to: Source) -> bool {
        let Some(container) = self.tracked.container_mut(lid) else {
            return false;
        };
        container.update_source(to.clone());
        self.sources.remove_by_right(&lid);
        if keyed(&to) {
            self.sources.insert(to, lid);
        }
        true
    }
    pub fn is_archived(&self, lid: Lid) -> bool {
        self.tracked.container(lid).is_some_and(Container::in_pack)
    }
    /// Moves a file list into the package, or back out of it. A list leaving
    /// the package goes back to its file when it has one, and becomes a
    /// manual list otherwise. Returns the new source.
    pub fn toggle_archived(&mut self, lid: Lid) -> Option<Source> {
        if self.tracked.is_protected(lid) {
            return None;
        }
        let container = self.tracked.container(lid)?;
        let source = container.source().cloned().unwrap_or_default();
        let toggled = if source.in_pack() {
            match source.locator() {
                Some(path) if path != PACKAGE_LOCATOR => Source::file(path),
                _ => Source::manual(),
            }
        } else {
            let locator = match source.path() {
                Some(path) => path.to_owned(),
                None => format!("{}.csv", container.name()),
            };
            Source::new(SourceKind::File, Some(locator), true)
        };
        self.retarget(lid, toggled.clone());
        info!(lid, archived = toggled.in_pack(), "archive state toggled");
        Some(toggled)
    }

    // ------------- buffer -------------
    fn mark(&mut self, positions: &[usize]) {
        let uids: Vec<Uid> = positions
            .iter()
            .filter_map(|&pos| self.tracked.iid_at(self.buffer, Some(pos)))
            .collect();
        if !uids.is_empty() {
            self.buffer_marks.push(uids);
        }
    }
    fn is_buffered(&self, uid: Uid) -> bool {
        self.tracked.position(self.buffer, uid).is_some()
    }
    pub fn cut(&mut self, lid: Lid, locate: Locate) -> Option<usize> {
        let pos = self.tracked.move_iid(lid, locate, self.buffer, None)?;
        self.mark(&[pos]);
        Some(pos)
    }
    pub fn cut_many(&mut self, lid: Lid, pick: &Pick) -> Vec<usize> {
        let positions = self.tracked.move_iids(lid, pick, self.buffer, None);
        self.mark(&positions);
        positions
    }
    pub fn copy_to_buffer(&mut self, lid: Lid, locate: Locate) -> Option<usize> {
        let pos = self.tracked.copy_iid(lid, locate, self.buffer, None)?;
        self.mark(&[pos]);
        Some(pos)
    }
    pub fn copy_to_buffer_many(&mut self, lid: Lid, pick: &Pick) -> Vec<usize> {
        let positions = self.tracked.copy_iids(lid, pick, self.buffer, None);
        self.mark(&positions);
        positions
    }
    /// Moves the last buffered id of the most recent mark into `lid`.
    pub fn paste(&mut self, lid: Lid, pos: Option<usize>) -> Option<usize> {
        if lid == self.buffer || !self.tracked.has_lid(lid) {
            return None;
        }
        while let Some(mark) = self.buffer_marks.last_mut() {
            let uid = mark.pop();
            if mark.is_empty() {
                self.buffer_marks.pop();
            }
            match uid {
                Some(uid) if self.is_buffered(uid) => {
                    return self.tracked.move_iid(self.buffer, Locate::Iid(uid), lid, pos);
                }
                Some(uid) => debug!(uid, "buffered id gone, skipped"),
                None => {}
            }
        }
        None
    }
    /// Moves every id of the most recent mark into `lid`, keeping their order.
    pub fn paste_many(&mut self, lid: Lid, pos: Option<usize>) -> Vec<usize> {
        if lid == self.buffer || !self.tracked.has_lid(lid) {
            return Vec::new();
        }
        while let Some(mark) = self.buffer_marks.pop() {
            let uids: Vec<Uid> = mark.into_iter().filter(|&uid| self.is_buffered(uid)).collect();
            if !uids.is_empty() {
                return self.tracked.move_iids(self.buffer, &Pick::Iids(uids), lid, pos);
            }
        }
        Vec::new()
    }
    pub fn buffer_len(&self) -> usize {
        self.tracked.list_len(self.buffer)
    }
    pub fn clear_buffer(&mut self) {
        self.buffer_marks.clear();
        self.tracked.clear_list(self.buffer);
    }

    // ------------- history -------------
    pub fn add_to_history(&mut self, item: I) -> Option<usize> {
        self.tracked.add_item(item, Some(self.history), None)
    }
    pub fn copy_to_history(&mut self, lid: Lid, locate: Locate) -> Option<usize> {
        if lid == self.history {
            return None;
        }
        self.tracked.copy_iid(lid, locate, self.history, None)
    }
    pub fn history_len(&self) -> usize {
        self.tracked.list_len(self.history)
    }
    pub fn clear_history(&mut self) {
        self.tracked.clear_list(self.history);
    }
    /// Substitutes the content of `uid`; the replaced content can be kept in
    /// the history.
    pub fn substitute_item(&mut self, uid: Uid, item: I, with_history: bool) -> Option<I> {
        let old = self.tracked.substitute_item(uid, item)?;
        if with_history {
            self.add_to_history(old.clone());
        }
        Some(old)
    }

    // ------------- maintenance -------------
    pub fn delete_list(&mut self, lid: Lid) -> Option<Container> {
        let container = self.tracked.delete_list(lid)?;
        self.sources.remove_by_right(&lid);
        Some(container)
    }
    /// Clears the content, keeping the buffer and the history, emptied.
    pub fn clear(&mut self) {
        self.tracked.clear();
        self.buffer_marks.clear();
        self.forget_vanished_sources();
    }
    /// Prunes the content and forgets the sources of the dropped containers.
    pub fn prune(&mut self) -> (usize, usize) {
        let pruned = self.tracked.prune();
        self.forget_vanished_sources();
        pruned
    }
    fn forget_vanished_sources(&mut self) {
        let gone: Vec<Lid> = self
            .sources
            .right_values()
            .copied()
            .filter(|&lid| !self.tracked.has_lid(lid))
            .collect();
        for lid in gone {
            self.sources.remove_by_right(&lid);
        }
    }
    /// Containers holding ids, optionally only changed ones. The history
    /// and the buffer are left out unless asked for.
    pub fn non_empty_lids(&self, changed_only: bool, with_history: bool, with_buffer: bool) -> Vec<Lid> {
        self.tracked
            .containers()
            .filter(|c| !c.is_empty())
            .filter(|c| !changed_only || c.is_changed())
            .filter(|c| with_history || c.lid() != self.history)
            .filter(|c| with_buffer || c.lid() != self.buffer)
            .map(Container::lid)
            .collect()
    }
}

impl<I: Item> Default for StoredContentCollection<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Item> Batch<I> for StoredContentCollection<I> {
    fn tracked(&self) -> &TrackedContentCollection<I> {
        &self.tracked
    }
    fn tracked_mut(&mut self) -> &mut TrackedContentCollection<I> {
        &mut self.tracked
    }
}

impl<I> Deref for StoredContentCollection<I> {
    type Target = TrackedContentCollection<I>;
    fn deref(&self) -> &Self::Target {
        &self.tracked
    }
}

impl<I> DerefMut for StoredContentCollection<I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tracked
    }
}

impl<I: Item> fmt::Display for StoredContentCollection<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Stored content collection: {}, {} sources, {} buffered",
            self.tracked,
            self.sources.len(),
            self.buffer_len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn stored() -> (StoredContentCollection<Record>, Lid) {
        let mut stored = StoredContentCollection::new();
        let lid = stored.new_list(None, Some("work".into()));
        for uid in 0..3 {
            stored.add_item(Record::new(uid).with("n", uid), Some(lid), None);
        }
        (stored, lid)
    }

    #[test]
    fn reserved_lists() {
        let (mut stored, lid) = stored();
        assert!(!stored.is_displayed(stored.buffer_lid()));
        assert_eq!(stored.displayed_lids().last(), Some(&stored.history_lid()));
        assert_eq!(stored.displayed_lids()[0], lid);
        assert!(stored.delete_list(stored.history_lid()).is_none());
        stored.clear();
        assert!(stored.has_lid(stored.buffer_lid()));
        assert!(stored.has_lid(stored.history_lid()));
        assert!(!stored.has_lid(lid));
    }

    #[test]
    fn cut_then_paste() {
        let (mut stored, lid) = stored();
        assert_eq!(stored.cut(lid, Locate::At(1)), Some(0));
        assert_eq!(stored.iids_of(lid), vec![0, 2]);
        assert_eq!(stored.buffer_len(), 1);
        assert_eq!(stored.paste(lid, Some(0)), Some(0));
        assert_eq!(stored.iids_of(lid), vec![1, 0, 2]);
        assert_eq!(stored.buffer_len(), 0);
        assert_eq!(stored.paste(lid, None), None);
        stored.check_consistency().unwrap();
    }

    #[test]
    fn failed_cut_leaves_no_mark() {
        let (mut stored, lid) = stored();
        assert_eq!(stored.cut(lid, Locate::At(9)), None);
        assert!(stored.cut_many(lid, &Pick::Positions(vec![7, 8])).is_empty());
        assert_eq!(stored.paste(lid, None), None);
    }

    #[test]
    fn sources_are_reused() {
        let mut stored: StoredContentCollection<Record> = StoredContentCollection::new();
        let source = Source::file("/data/runs.csv");
        stored.append_item_to_source(Record::new(0), source.clone());
        stored.append_item_to_source(Record::new(1), source.clone());
        let lid = stored.source_lid(&source).unwrap();
        assert_eq!(stored.iids_of(lid), vec![0, 1]);
        assert_eq!(stored.container(lid).unwrap().name(), "//runs.csv");
        assert_ne!(stored.new_list(None, None), stored.new_list(None, None));
    }

    #[test]
    fn pruned_source_reopens_live_list() {
        let mut stored: StoredContentCollection<Record> = StoredContentCollection::new();
        let source = Source::file("/data/a.csv");
        let lid = stored.new_list(Some(source.clone()), None);
        assert_eq!(stored.prune(), (0, 1));
        assert!(!stored.has_lid(lid));
        assert_eq!(stored.source_lid(&source), None);
        assert_eq!(stored.append_item_to_source(Record::new(5), source.clone()), Some(0));
        let reopened = stored.source_lid(&source).unwrap();
        assert_ne!(reopened, lid);
        assert_eq!(stored.iids_of(reopened), vec![5]);
    }

    #[test]
    fn stale_source_entry_is_not_reused() {
        let mut stored: StoredContentCollection<Record> = StoredContentCollection::new();
        let source = Source::file("/data/b.csv");
        let lid = stored.new_list(Some(source.clone()), None);
        // pruning the inner collection bypasses the source map
        stored.tracked.prune();
        let reopened = stored.new_list(Some(source.clone()), None);
        assert_ne!(reopened, lid);
        assert!(stored.has_lid(reopened));
        assert_eq!(stored.source_lid(&source), Some(reopened));
    }

    #[test]
    fn deleted_buffered_item_is_skipped() {
        let (mut stored, lid) = stored();
        stored.cut(lid, Locate::At(0)).unwrap();
        stored.cut(lid, Locate::At(0)).unwrap();
        stored.delete_item(0);
        assert_eq!(stored.paste(lid, Some(0)), Some(0));
        assert_eq!(stored.iids_of(lid), vec![1, 2]);
        assert_eq!(stored.buffer_len(), 0);
        assert_eq!(stored.paste(lid, None), None);
        stored.check_consistency().unwrap();
    }

    #[test]
    fn recut_buffered_id_pastes_once() {
        let (mut stored, lid) = stored();
        let other = stored.new_list(None, None);
        stored.add_iid(1, other, None);
        stored.cut(lid, Locate::Iid(1)).unwrap();
        stored.cut(other, Locate::Iid(1)).unwrap();
        assert_eq!(stored.buffer_len(), 1);
        assert_eq!(stored.paste(lid, None), Some(2));
        assert_eq!(stored.paste(lid, None), None);
        assert_eq!(stored.iids_of(lid), vec![0, 2, 1]);
    }

    #[test]
    fn paste_many_skips_exhausted_marks() {
        let (mut stored, lid) = stored();
        stored.cut_many(lid, &Pick::Positions(vec![0]));
        stored.cut_many(lid, &Pick::Positions(vec![0, 1]));
        stored.delete_item(1);
        stored.delete_item(2);
        assert_eq!(stored.paste_many(lid, None), vec![0]);
        assert_eq!(stored.iids_of(lid), vec![0]);
        assert!(stored.paste_many(lid, None).is_empty());
    }

    #[test]
    fn archive_round_trip() {
        let mut stored: StoredContentCollection<Record> = StoredContentCollection::new();
        let source = Source::file("/data/runs.csv");
        let lid = stored.new_list(Some(source.clone()), None);
        let packed = stored.toggle_archived(lid).unwrap();
        assert!(stored.is_archived(lid));
        assert_eq!(stored.container(lid).unwrap().name(), "::runs.csv");
        assert_eq!(stored.source_lid(&packed), Some(lid));
        assert_eq!(stored.source_lid(&source), None);
        assert_eq!(stored.toggle_archived(lid), Some(source));
        assert!(!stored.is_archived(lid));
        assert!(stored.toggle_archived(stored.history_lid()).is_none());
    }

    #[test]
    fn substitute_with_history() {
        let (mut stored, lid) = stored();
        let old = stored.substitute_item(1, Record::new(1).with("n", 10), true).unwrap();
        assert_eq!(stored.iids_of(stored.history_lid()), vec![old.uid()]);
        assert!(stored.container(lid).unwrap().is_changed());
        assert_eq!(stored.non_empty_lids(true, false, false), vec![lid]);
        assert_eq!(stored.non_empty_lids(false, true, false).len(), 2);
    }
}
