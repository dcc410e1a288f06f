//! The action engine. Ids flow through a pipeline of actions; each action
//! keeps, drops, reorders or derives ids and leaves tracks explaining why.
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use roaring::RoaringTreemap;
use serde_json::Value;
use tracing::{debug, info};

use crate::action::{Action, ActionKind};
use crate::construct::{Item, Lid, Uid, UidGenerator};
use crate::datatype::FieldValue;
use crate::error::Result;
use crate::track::{Outcome, Rationale, Track, TrackOp, TrackedContentCollection};

/// Where the ids a pipeline starts from come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdSource {
    /// Every kept item, in id order.
    #[default]
    All,
    /// The given ids that are kept, in the given order.
    Ids(Vec<Uid>),
    /// The ids of a container, in container order.
    List(Lid),
}

/// Options of a selection run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub source: IdSource,
    /// Ids appended to the source ids and flagged as new.
    pub new_ids: Option<IdSource>,
    /// Return the ids that did not make it through instead.
    pub complement: bool,
    /// Container that receives the selected ids.
    pub target: Option<Lid>,
    /// Keep only selected ids that were flagged as new.
    pub new_only: bool,
    /// Overrides the data of every action.
    pub data: Option<Value>,
}

type SortKey = Option<Vec<Option<FieldValue>>>;

/// Runs actions over the content of a tracked collection.
///
/// Implementors only hand out their tracked collection; the engine itself
/// comes with the trait.
pub trait Batch<I: Item> {
    fn tracked(&self) -> &TrackedContentCollection<I>;
    fn tracked_mut(&mut self) -> &mut TrackedContentCollection<I>;

    /// Resolves an id source, dropping ids that are not kept.
    fn prepare_iids(&self, source: &IdSource) -> Vec<Uid> {
        let content = self.tracked();
        match source {
            IdSource::All => content.iids(),
            IdSource::Ids(uids) => uids.iter().copied().filter(|&uid| content.has_iid(uid)).collect(),
            IdSource::List(lid) => content.iids_of(*lid),
        }
    }

    /// Tests the blocks of `action` in order on `uid`, seen against `other`
    /// or against itself. Stops at the first block that does not hold and
    /// reports only that block. An id without item passes.
    fn satisfy_with_rationale(&self, action: &Action<I>, uid: Uid, other: Option<Uid>) -> Result<(bool, Vec<Rationale>)> {
        let content = self.tracked();
        let item = content.item(uid);
        let other_item = match other {
            Some(other) => content.item(other),
            None => item,
        };
        let mut rationales = Vec::new();
        if let (Some(item), Some(other_item)) = (item, other_item) {
            for (index, block) in action.blocks().iter().enumerate() {
                let (holds, text) = block.check(item, other_item)?;
                if !holds {
                    return Ok((action.is_reversed(), vec![Rationale::new(index, text)]));
                }
                rationales.push(Rationale::new(index, text));
            }
        }
        Ok((!action.is_reversed(), rationales))
    }

    /// Like [`Batch::satisfy_with_rationale`], logging a track unless the
    /// outcome differs from `restrict`.
    fn satisfy(&mut self, action: &Action<I>, uid: Uid, other: Option<Uid>, restrict: Option<bool>) -> Result<bool> {
        let (outcome, rationales) = self.satisfy_with_rationale(action, uid, other)?;
        if restrict.is_none_or(|wanted| wanted == outcome) {
            let track = Track::new(TrackOp::Satisfy, action.name(), Outcome::Passed(outcome))
                .sources(other.into_iter().collect())
                .targets(vec![uid])
                .rationales(rationales);
            self.tracked_mut().add_track(track);
        }
        Ok(outcome)
    }

    /// Runs the function of `action` on `uid`. `data` takes precedence over
    /// the data of the action.
    fn apply_function(&self, action: &Action<I>, uid: Uid, data: Option<&Value>) -> Result<Option<I>> {
        let (Some(transform), Some(item)) = (action.transform(), self.tracked().item(uid)) else {
            return Ok(None);
        };
        transform.apply(item, data.or(action.default_data()))
    }

    /// Keeps the ids passing the blocks, or all of them when there are none
    /// (their complement when reversed), then runs the function over them.
    /// Derived items are registered under fresh ids when the action says so,
    /// otherwise they replace the item they were derived from.
    fn apply(&mut self, ids: Vec<Uid>, action: &Action<I>, data: Option<&Value>) -> Result<Vec<Uid>> {
        let kept = if action.blocks().is_empty() {
            if action.is_reversed() {
                self.tracked().complement_iids(&ids)
            } else {
                ids
            }
        } else {
            let mut kept = Vec::with_capacity(ids.len());
            for uid in ids {
                if self.satisfy(action, uid, None, None)? {
                    kept.push(uid);
                }
            }
            kept
        };
        let mut out = Vec::with_capacity(kept.len());
        for uid in kept {
            out.push(uid);
            let Some(mut derived) = self.apply_function(action, uid, data)? else {
                continue;
            };
            let tracked = self.tracked_mut();
            let target = if action.registers_new() {
                if tracked.has_iid(derived.uid()) {
                    let fresh = tracked.next_item_uid();
                    derived.set_uid(fresh);
                }
                let fresh = derived.uid();
                tracked.add_item(derived, None, None);
                out.push(fresh);
                fresh
            } else {
                if tracked.substitute_item(uid, derived).is_none() {
                    continue;
                }
                uid
            };
            let track = Track::new(TrackOp::Apply, action.name(), Outcome::Passed(true))
                .sources(vec![uid])
                .targets(vec![target]);
            tracked.add_track(track);
        }
        Ok(out)
    }

    /// Sorts by the values of the blocks, or just reverses without blocks.
    /// Ids without item sort first.
    fn sort_ids(&self, mut ids: Vec<Uid>, action: &Action<I>) -> Result<Vec<Uid>> {
        if action.blocks().is_empty() {
            if action.is_reversed() {
                ids.reverse();
            }
            return Ok(ids);
        }
        let content = self.tracked();
        let mut keys: HashMap<Uid, SortKey> = HashMap::with_capacity(ids.len());
        for &uid in &ids {
            let key = match content.item(uid) {
                Some(item) => Some(
                    action
                        .blocks()
                        .iter()
                        .map(|block| block.evaluate(item, item))
                        .collect::<Result<Vec<_>>>()?,
                ),
                None => None,
            };
            keys.insert(uid, key);
        }
        ids.sort_by(|a, b| {
            let ordering = keys[a].cmp(&keys[b]);
            if action.is_reversed() { ordering.reverse() } else { ordering }
        });
        Ok(ids)
    }

    /// Drops the ids failing the single item test. Ids flagged as new are
    /// kept without testing.
    fn filter_single(&mut self, ids: Vec<Uid>, action: &Action<I>, new_ids: Option<&RoaringTreemap>) -> Result<Vec<Uid>> {
        let mut kept = Vec::with_capacity(ids.len());
        for uid in ids {
            if new_ids.is_some_and(|new| new.contains(uid)) || self.satisfy(action, uid, None, Some(false))? {
                kept.push(uid);
            }
        }
        Ok(kept)
    }

    /// Tests the last id against each of its predecessors, from the first
    /// one on. Returns whether more than `max` of them matched, in which case
    /// a filter track names every match.
    fn filter_last(&mut self, ids: &[Uid], action: &Action<I>) -> Result<bool> {
        let max = usize::try_from(action.max_count()).unwrap_or(0);
        if action.blocks().is_empty() || ids.len() < max.saturating_add(2) {
            return Ok(false);
        }
        let last = ids.len() - 1;
        let mut matched = Vec::new();
        let mut rationales = Vec::new();
        let mut pos = 0;
        while matched.len() <= max && pos < last {
            let (holds, texts) = self.satisfy_with_rationale(action, ids[last], Some(ids[pos]))?;
            if holds {
                matched.push(ids[pos]);
                rationales.extend(texts);
            }
            pos += 1;
        }
        if matched.len() <= max {
            return Ok(false);
        }
        let track = Track::new(TrackOp::Filter, action.name(), Outcome::Passed(true))
            .sources(matched)
            .targets(vec![ids[last]])
            .rationales(rationales);
        self.tracked_mut().add_track(track);
        Ok(true)
    }

    /// Keeps the first id and those of the rest the pair test rejects against
    /// it; the others are tracked as filtered.
    fn filter_to_first(&mut self, ids: Vec<Uid>, action: &Action<I>) -> Result<Vec<Uid>> {
        let Some(&first) = ids.first() else {
            return Ok(ids);
        };
        let mut kept = vec![first];
        for &uid in &ids[1..] {
            let (holds, rationales) = self.satisfy_with_rationale(action, uid, Some(first))?;
            if holds {
                let track = Track::new(TrackOp::Filter, action.name(), Outcome::Passed(true))
                    .sources(vec![first])
                    .targets(vec![uid])
                    .rationales(rationales);
                self.tracked_mut().add_track(track);
            } else {
                kept.push(uid);
            }
        }
        Ok(kept)
    }

    /// Slides a window over the ids and drops each id that matches more
    /// than `max` of those before it. Once an id has survived, or when there
    /// are no new ids, every later id is tested; before that only new ids are.
    fn filter_pairs(&mut self, mut ids: Vec<Uid>, action: &Action<I>, new_ids: Option<&RoaringTreemap>) -> Result<Vec<Uid>> {
        let max = usize::try_from(action.max_count()).unwrap_or(0);
        if action.blocks().is_empty() || ids.len() < max.saturating_add(2) {
            return Ok(ids);
        }
        let is_new = |uid: Uid| new_ids.is_none_or(|new| new.contains(uid));
        let mut kept_new = is_new(ids[0]);
        let mut pos = max + 1;
        while pos < ids.len() {
            if kept_new || is_new(ids[pos]) {
                if self.filter_last(&ids[..=pos], action)? {
                    ids.remove(pos);
                } else {
                    kept_new = true;
                    pos += 1;
                }
            } else {
                pos += 1;
            }
        }
        Ok(ids)
    }

    /// Keeps the first `max` ids, or the last `-max` ones when negative. With
    /// blocks and a direction, the boundary then walks by `direction` while
    /// the ids on both sides of it pass the pair test.
    fn cut_ids(&mut self, ids: Vec<Uid>, action: &Action<I>) -> Result<Vec<Uid>> {
        let keep = action.max_count().unsigned_abs();
        if keep >= ids.len() as u64 {
            return Ok(ids);
        }
        let (len, keep) = (ids.len() as i64, keep as i64);
        let from_end = action.max_count() < 0;
        let original = if from_end { len - keep } else { keep };
        let mut boundary = original;
        let mut rationales = Vec::new();
        let step = action.step();
        if !action.blocks().is_empty() && step != 0 {
            while boundary > 0 && boundary < len {
                let (holds, texts) = self.satisfy_with_rationale(
                    action,
                    ids[(boundary - 1) as usize],
                    Some(ids[boundary as usize]),
                )?;
                rationales.extend(texts);
                if !holds {
                    break;
                }
                boundary = boundary.saturating_add(step);
            }
            boundary = boundary.clamp(0, len);
        }
        let (b, o) = (boundary as usize, original as usize);
        let walked = ids[b.min(o)..b.max(o)].to_vec();
        let (kept, removed) = if from_end {
            (ids[b..].to_vec(), ids[..b].to_vec())
        } else {
            (ids[..b].to_vec(), ids[b..].to_vec())
        };
        let track = Track::new(TrackOp::Cut, action.name(), Outcome::Boundary { original: o, last: b })
            .sources(walked)
            .targets(removed)
            .rationales(rationales);
        self.tracked_mut().add_track(track);
        Ok(kept)
    }

    /// Runs one action. A flagged `filterLast` drops the last id.
    fn do_action(
        &mut self,
        action: &Action<I>,
        ids: Vec<Uid>,
        new_ids: Option<&RoaringTreemap>,
        data: Option<&Value>,
    ) -> Result<Vec<Uid>> {
        if ids.is_empty() {
            return Ok(ids);
        }
        let before = ids.len();
        let ids = match action.kind() {
            ActionKind::Apply => self.apply(ids, action, data)?,
            ActionKind::Sort => self.sort_ids(ids, action)?,
            ActionKind::FilterSingle => self.filter_single(ids, action, new_ids)?,
            ActionKind::FilterLast => {
                let mut ids = ids;
                if self.filter_last(&ids, action)? {
                    ids.pop();
                }
                ids
            }
            ActionKind::FilterToFirst => self.filter_to_first(ids, action)?,
            ActionKind::FilterPairs => self.filter_pairs(ids, action, new_ids)?,
            ActionKind::Cut => self.cut_ids(ids, action)?,
        };
        debug!(action = action.name(), kind = %action.kind(), before, after = ids.len(), "action done");
        Ok(ids)
    }

    /// Runs a pipeline. New ids are appended to the source ids. With
    /// `complement`, the ids of the start that did not make it through are
    /// returned instead, in their starting order.
    fn do_actions(
        &mut self,
        actions: &[Action<I>],
        source: &IdSource,
        new_ids: Option<&IdSource>,
        complement: bool,
        data: Option<&Value>,
    ) -> Result<Vec<Uid>> {
        let mut ids = self.prepare_iids(source);
        let new_set = match new_ids {
            Some(new_ids) => {
                let new: Vec<Uid> = self.prepare_iids(new_ids);
                let present: RoaringTreemap = ids.iter().copied().collect();
                ids.extend(new.iter().copied().filter(|uid| !present.contains(*uid)));
                Some(new.into_iter().collect::<RoaringTreemap>())
            }
            None => None,
        };
        let start = ids.clone();
        for action in actions {
            ids = self.do_action(action, ids, new_set.as_ref(), data)?;
        }
        if complement {
            let selected: RoaringTreemap = ids.iter().copied().collect();
            ids = start.into_iter().filter(|uid| !selected.contains(*uid)).collect();
        }
        Ok(ids)
    }

    /// Runs a pipeline and optionally stores the outcome in a container.
    /// When the target is also the source container, it is emptied first.
    fn selected(&mut self, actions: &[Action<I>], selection: &Selection) -> Result<Vec<Uid>> {
        let mut ids = self.do_actions(
            actions,
            &selection.source,
            selection.new_ids.as_ref(),
            selection.complement,
            selection.data.as_ref(),
        )?;
        if selection.new_only {
            if let Some(new_ids) = &selection.new_ids {
                let new: RoaringTreemap = self.prepare_iids(new_ids).into_iter().collect();
                ids.retain(|uid| new.contains(*uid));
            }
        }
        if let Some(target) = selection.target {
            let tracked = self.tracked_mut();
            if tracked.has_lid(target) {
                if selection.source == IdSource::List(target) {
                    tracked.clear_list(target);
                }
                for &uid in &ids {
                    tracked.add_iid(uid, target, None);
                }
            }
        }
        info!(selected = ids.len(), actions = actions.len(), "selection done");
        Ok(ids)
    }

    fn selected_items(&mut self, actions: &[Action<I>], selection: &Selection) -> Result<Vec<I>> {
        let ids = self.selected(actions, selection)?;
        let tracked = self.tracked();
        Ok(ids.into_iter().filter_map(|uid| tracked.item(uid).cloned()).collect())
    }
}

// ------------- BatchCollection -------------
/// A tracked collection running actions, without any stored lists.
#[derive(Debug)]
pub struct BatchCollection<I> {
    tracked: TrackedContentCollection<I>,
}

impl<I: Item> BatchCollection<I> {
    pub fn new() -> Self {
        Self { tracked: TrackedContentCollection::new() }
    }
    pub fn with_generators(item_uids: UidGenerator, list_uids: UidGenerator) -> Self {
        Self { tracked: TrackedContentCollection::with_generators(item_uids, list_uids) }
    }
}

impl<I: Item> Default for BatchCollection<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Item> Batch<I> for BatchCollection<I> {
    fn tracked(&self) -> &TrackedContentCollection<I> {
        &self.tracked
    }
    fn tracked_mut(&mut self) -> &mut TrackedContentCollection<I> {
        &mut self.tracked
    }
}

impl<I> Deref for BatchCollection<I> {
    type Target = TrackedContentCollection<I>;
    fn deref(&self) -> &Self::Target {
        &self.tracked
    }
}

impl<I> DerefMut for BatchCollection<I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tracked
    }
}

impl<I: Item> fmt::Display for BatchCollection<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Batch collection: {}", self.tracked)
    }
}
