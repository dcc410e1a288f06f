//! Tracks record why ids were kept, dropped or derived while actions run.
use std::fmt;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::construct::{Item, Uid, UidGenerator};
use crate::content::ContentCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOp {
    Satisfy,
    Filter,
    Cut,
    Apply,
}

impl fmt::Display for TrackOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TrackOp::Satisfy => "satisfy",
            TrackOp::Filter => "filter",
            TrackOp::Cut => "cut",
            TrackOp::Apply => "apply",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed(bool),
    /// Where a cut was first placed and where it ended up.
    Boundary { original: usize, last: usize },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Passed(passed) => write!(f, "{}", passed),
            Outcome::Boundary { original, last } => write!(f, "{}->{}", original, last),
        }
    }
}

/// The justification one block gave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rationale {
    pub block: usize,
    pub text: String,
}

impl Rationale {
    pub fn new(block: usize, text: impl Into<String>) -> Self {
        Self { block, text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub op: TrackOp,
    pub sources: Vec<Uid>,
    pub targets: Vec<Uid>,
    pub outcome: Outcome,
    pub rationales: Vec<Rationale>,
    pub action: String,
    /// Set on tracks imported from another collection.
    pub origin: Option<String>,
    pub at: DateTime<Utc>,
}

impl Track {
    pub fn new(op: TrackOp, action: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            op,
            sources: Vec::new(),
            targets: Vec::new(),
            outcome,
            rationales: Vec::new(),
            action: action.into(),
            origin: None,
            at: Utc::now(),
        }
    }
    pub fn sources(mut self, sources: Vec<Uid>) -> Self {
        self.sources = sources;
        self
    }
    pub fn targets(mut self, targets: Vec<Uid>) -> Self {
        self.targets = targets;
        self
    }
    pub fn rationales(mut self, rationales: Vec<Rationale>) -> Self {
        self.rationales = rationales;
        self
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} --- {}[{}] {} ---> {:?}", self.sources, self.op, self.action, self.outcome, self.targets)?;
        for rationale in &self.rationales {
            write!(f, "\n\t{}: {}", rationale.block, rationale.text)?;
        }
        if let Some(origin) = &self.origin {
            write!(f, "\n\tfrom {}", origin)?;
        }
        Ok(())
    }
}

/// An append-only log of tracks. Reading the latest tracks moves a cursor,
/// so that each track is handed out as "latest" only once.
#[derive(Debug, Clone)]
pub struct TrackLog {
    tracks: Vec<Track>,
    drained: usize,
    enabled: bool,
}

impl TrackLog {
    pub fn new() -> Self {
        Self { tracks: Vec::new(), drained: 0, enabled: true }
    }
    pub fn enable(&mut self) {
        self.enabled = true;
    }
    pub fn disable(&mut self) {
        self.enabled = false;
    }
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    /// Returns whether the track was logged.
    pub fn push(&mut self, track: Track) -> bool {
        if !self.enabled {
            return false;
        }
        trace!(op = %track.op, action = %track.action, "track");
        self.tracks.push(track);
        true
    }
    /// Appends tracks whether or not logging is enabled.
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.tracks.extend(tracks);
    }
    /// Takes in tracks from another collection, tagged with `origin`.
    /// Tracks that already carry an origin are skipped.
    pub fn import(&mut self, tracks: impl IntoIterator<Item = Track>, origin: &str) -> usize {
        let before = self.tracks.len();
        for mut track in tracks {
            if let Some(previous) = &track.origin {
                warn!(previous = %previous, origin, "skipping track imported before");
                continue;
            }
            track.origin = Some(origin.to_owned());
            self.tracks.push(track);
        }
        self.tracks.len() - before
    }
    pub fn latest(&mut self) -> &[Track] {
        let from = self.drained;
        self.drained = self.tracks.len();
        &self.tracks[from..]
    }
    pub fn all(&self) -> &[Track] {
        &self.tracks
    }
    pub fn len(&self) -> usize {
        self.tracks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.drained = 0;
    }
}

impl Default for TrackLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackLog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "---- TRACKS:")?;
        for track in &self.tracks {
            writeln!(f, "{}", track)?;
        }
        Ok(())
    }
}

// ------------- TrackedContentCollection -------------
/// A content collection that keeps a track log next to its content.
/// Clearing the content leaves the tracks alone.
#[derive(Debug)]
pub struct TrackedContentCollection<I> {
    content: ContentCollection<I>,
    tracks: TrackLog,
}

impl<I: Item> TrackedContentCollection<I> {
    pub fn new() -> Self {
        Self::from_content(ContentCollection::new())
    }
    pub fn with_generators(item_uids: UidGenerator, list_uids: UidGenerator) -> Self {
        Self::from_content(ContentCollection::with_generators(item_uids, list_uids))
    }
    pub fn from_content(content: ContentCollection<I>) -> Self {
        Self { content, tracks: TrackLog::new() }
    }
    pub fn content(&self) -> &ContentCollection<I> {
        &self.content
    }
    pub fn tracks(&self) -> &TrackLog {
        &self.tracks
    }
    pub fn tracks_mut(&mut self) -> &mut TrackLog {
        &mut self.tracks
    }
    /// The only way tracks leave the collection; `clear` keeps them.
    pub fn clear_tracks(&mut self) {
        self.tracks.clear();
    }
    pub fn add_track(&mut self, track: Track) -> bool {
        self.tracks.push(track)
    }
    pub fn latest_tracks(&mut self) -> Vec<Track> {
        self.tracks.latest().to_vec()
    }
}

impl<I: Item> Default for TrackedContentCollection<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Deref for TrackedContentCollection<I> {
    type Target = ContentCollection<I>;
    fn deref(&self) -> &Self::Target {
        &self.content
    }
}

impl<I> DerefMut for TrackedContentCollection<I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.content
    }
}

impl<I: Item> fmt::Display for TrackedContentCollection<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}, {} tracks", self.content, self.tracks.len())
    }
}
