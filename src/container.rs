//! Containers: named, ordered sequences of item ids.
//!
//! A [`Container`] only holds ids. Whatever it needs to know about the items
//! themselves (sort keys) is asked from a [`FieldResolver`], normally the item
//! keeper of the owning collection. Containers kept by a stored collection
//! also carry a provenance [`Source`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::construct::{FieldOptions, FieldResolver, Lid, Uid, UidHasher};
use crate::datatype::FieldValue;
use crate::error::Result;

// ------------- Sorting -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: Direction,
}

// Nulls go last when ascending. A null keeps its raw id as value so that
// nulls among themselves stay in id order.
type SortKey = (bool, FieldValue);

// ------------- Provenance -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Run,
    Manual,
    History,
    Buffer,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Run => "run",
            SourceKind::Manual => "manual",
            SourceKind::History => "history",
            SourceKind::Buffer => "buffer",
        }
    }
}

/// Where the content of a container came from.
///
/// Two containers opened from equivalent sources share one source key, which
/// lets a stored collection hand back the existing container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Source {
    kind: SourceKind,
    locator: Option<String>,
    archived: bool,
}

pub const PACKAGE_LOCATOR: &str = "package";

impl Source {
    pub fn new(kind: SourceKind, locator: Option<String>, archived: bool) -> Self {
        Self { kind, locator, archived }
    }
    pub fn manual() -> Self {
        Self::new(SourceKind::Manual, None, false)
    }
    pub fn history() -> Self {
        Self::new(SourceKind::History, None, false)
    }
    pub fn buffer() -> Self {
        Self::new(SourceKind::Buffer, None, false)
    }
    pub fn packaged() -> Self {
        Self::new(SourceKind::File, Some(PACKAGE_LOCATOR.to_owned()), true)
    }
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(SourceKind::File, Some(path.into()), false)
    }
    pub fn run(label: impl Into<String>) -> Self {
        Self::new(SourceKind::Run, Some(label.into()), false)
    }
    pub fn kind(&self) -> SourceKind {
        self.kind
    }
    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }
    /// Whether the content is kept inside the package rather than on its own.
    pub fn archived(&self) -> bool {
        self.archived
    }
    pub fn is_history(&self) -> bool {
        self.kind == SourceKind::History
    }
    pub fn is_buffer(&self) -> bool {
        self.kind == SourceKind::Buffer
    }
    pub fn in_pack(&self) -> bool {
        self.kind == SourceKind::File && self.archived
    }
    pub fn path(&self) -> Option<&str> {
        match self.kind {
            SourceKind::File => self.locator(),
            _ => None,
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::manual()
    }
}

/// Selects containers by name pattern and source kind.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilter {
    pub name_in: Option<Regex>,
    pub name_out: Option<Regex>,
    pub kinds_in: Option<Vec<SourceKind>>,
    pub kinds_out: Option<Vec<SourceKind>>,
}

impl ContainerFilter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn name_in(mut self, pattern: &str) -> Result<Self> {
        self.name_in = Some(Regex::new(pattern)?);
        Ok(self)
    }
    pub fn name_out(mut self, pattern: &str) -> Result<Self> {
        self.name_out = Some(Regex::new(pattern)?);
        Ok(self)
    }
    pub fn kinds_in(mut self, kinds: Vec<SourceKind>) -> Self {
        self.kinds_in = Some(kinds);
        self
    }
    pub fn kinds_out(mut self, kinds: Vec<SourceKind>) -> Self {
        self.kinds_out = Some(kinds);
        self
    }
}

fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

// ------------- Container -------------
#[derive(Debug, Clone)]
pub struct Container {
    lid: Lid,
    name: String,
    iids: Vec<Uid>,
    changed: bool,
    sort: Option<SortSpec>,
    source: Option<Source>,
}

impl Container {
    pub fn new(lid: Lid, name: Option<String>) -> Self {
        let mut container = Self {
            lid,
            name: String::new(),
            iids: Vec::new(),
            changed: false,
            sort: None,
            source: None,
        };
        match name {
            Some(name) => container.name = name,
            None => container.make_name(),
        }
        container
    }
    pub fn with_source(lid: Lid, source: Source, name: Option<String>) -> Self {
        let mut container = Self::new(lid, None);
        container.source = Some(source);
        match name {
            Some(name) => container.name = name,
            None => container.make_name(),
        }
        container
    }
    pub fn with_iids(mut self, iids: Vec<Uid>) -> Self {
        self.iids = iids;
        self
    }

    fn make_name(&mut self) {
        self.name = format!("L#{}", self.lid);
        let Some(source) = &self.source else { return };
        match source.kind {
            SourceKind::Run => {
                self.name = source.locator().map(title).unwrap_or_else(|| "Run".to_owned());
            }
            SourceKind::History | SourceKind::Buffer => {
                self.name = source.kind.name().to_owned();
            }
            SourceKind::File => {
                let mut name = String::from(if source.archived { "::" } else { "//" });
                if let Some(locator) = source.locator() {
                    let base = Path::new(locator)
                        .file_name()
                        .and_then(|f| f.to_str())
                        .unwrap_or(locator);
                    name.push_str(base);
                }
                self.name = name;
            }
            SourceKind::Manual => (),
        }
    }

    pub fn lid(&self) -> Lid {
        self.lid
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }
    /// Replaces the source and derives a fresh name from it.
    pub fn update_source(&mut self, source: Source) {
        self.source = Some(source);
        self.make_name();
    }
    pub fn is_history(&self) -> bool {
        self.source.as_ref().is_some_and(Source::is_history)
    }
    pub fn is_buffer(&self) -> bool {
        self.source.as_ref().is_some_and(Source::is_buffer)
    }
    pub fn in_pack(&self) -> bool {
        self.source.as_ref().is_some_and(Source::in_pack)
    }

    pub fn matches(&self, filter: &ContainerFilter) -> bool {
        let kind = self.source.as_ref().map(Source::kind).unwrap_or(SourceKind::Manual);
        filter.name_in.as_ref().is_none_or(|re| re.is_match(&self.name))
            && filter.name_out.as_ref().is_none_or(|re| !re.is_match(&self.name))
            && filter.kinds_in.as_ref().is_none_or(|kinds| kinds.contains(&kind))
            && filter.kinds_out.as_ref().is_none_or(|kinds| !kinds.contains(&kind))
    }

    // ------------- ids -------------
    pub fn iids(&self) -> &[Uid] {
        &self.iids
    }
    pub fn len(&self) -> usize {
        self.iids.len()
    }
    pub fn is_empty(&self) -> bool {
        self.iids.is_empty()
    }
    pub fn get(&self, pos: usize) -> Option<Uid> {
        self.iids.get(pos).copied()
    }
    pub fn last(&self) -> Option<Uid> {
        self.iids.last().copied()
    }
    pub fn position(&self, uid: Uid) -> Option<usize> {
        self.iids.iter().position(|&i| i == uid)
    }
    pub fn contains(&self, uid: Uid) -> bool {
        self.iids.contains(&uid)
    }
    pub fn append(&mut self, uid: Uid) -> usize {
        self.iids.push(uid);
        self.changed = true;
        self.iids.len() - 1
    }
    /// Inserts at `pos`, appending when `pos` is past the end.
    pub fn insert(&mut self, pos: usize, uid: Uid) -> usize {
        if pos >= self.iids.len() {
            return self.append(uid);
        }
        self.iids.insert(pos, uid);
        self.changed = true;
        pos
    }
    pub fn remove(&mut self, pos: usize) -> Option<Uid> {
        if pos >= self.iids.len() {
            return None;
        }
        self.changed = true;
        Some(self.iids.remove(pos))
    }
    pub fn pop(&mut self) -> Option<Uid> {
        let uid = self.iids.pop();
        if uid.is_some() {
            self.changed = true;
        }
        uid
    }
    pub fn set_iids(&mut self, iids: Vec<Uid>) {
        self.iids = iids;
        self.changed = true;
    }
    /// Empties the container and forgets its sort state.
    pub fn clear(&mut self) {
        self.reset_sort();
        self.iids.clear();
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }
    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    // ------------- sorting -------------
    pub fn sort_info(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }
    pub fn reset_sort(&mut self) {
        self.sort = None;
    }
    /// Sets the sort state. With an explicit direction the field is taken as
    /// is. Without one, asking again for the current field walks ascending,
    /// descending, unsorted; another field starts ascending. Returns true when
    /// the state changed and some field is active.
    pub fn set_sort(&mut self, field: Option<&str>, direction: Option<Direction>) -> bool {
        let before = self.sort.clone();
        self.sort = match (field, direction) {
            (None, _) => None,
            (Some(field), Some(direction)) => Some(SortSpec {
                field: field.to_owned(),
                direction,
            }),
            (Some(field), None) => match &self.sort {
                Some(current) if current.field == field => match current.direction {
                    Direction::Ascending => Some(SortSpec {
                        field: field.to_owned(),
                        direction: Direction::Descending,
                    }),
                    Direction::Descending => None,
                },
                _ => Some(SortSpec {
                    field: field.to_owned(),
                    direction: Direction::Ascending,
                }),
            },
        };
        self.sort != before && self.sort.is_some()
    }

    /// Re-orders the ids according to the current sort state.
    pub fn resort(&mut self, resolver: &dyn FieldResolver) {
        let Some(spec) = self.sort.clone() else { return };
        let options = FieldOptions::sorting();
        let mut keys: HashMap<Uid, SortKey, UidHasher> = HashMap::default();
        for &uid in &self.iids {
            match resolver.resolve_field(uid, &spec.field, &options) {
                Ok(Some(value)) => {
                    keys.insert(uid, (false, value.lowercased()));
                }
                Ok(None) => {
                    keys.insert(uid, (true, FieldValue::from(uid)));
                }
                Err(e) => {
                    warn!(lid = self.lid, field = %spec.field, error = %e, "sort field did not resolve, ordering by id");
                    keys = self.iids.iter().map(|&u| (u, (false, FieldValue::from(u)))).collect();
                    break;
                }
            }
        }
        let cmp = |a: &Uid, b: &Uid| -> Ordering { keys[a].cmp(&keys[b]) };
        match spec.direction {
            Direction::Ascending => self.iids.sort_by(cmp),
            Direction::Descending => self.iids.sort_by(|a, b| cmp(b, a)),
        }
    }

    pub fn short_str(&self) -> String {
        format!("({}{}) {}", self.len(), if self.changed { "*" } else { "" }, self.name)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.len())
    }
}
