//! Actions are the steps of a selection pipeline. A declarative
//! [`ActionSpec`] names its blocks and function; the [`ActionRegistry`]
//! resolves those names once, so that running a pipeline never looks up a
//! name again.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::construct::Item;
use crate::datatype::FieldValue;
use crate::error::{MinesetError, Result};

// ------------- Collaborators -------------
/// A test or a key computed over an item, possibly in view of another one.
///
/// Single-item tests are called with the item itself as `other`.
pub trait Predicate<I> {
    /// The value of the block, used as a sort key component.
    fn evaluate(&self, item: &I, other: &I) -> Result<Option<FieldValue>>;
    /// Whether the block holds, along with a readable justification.
    fn check(&self, item: &I, other: &I) -> Result<(bool, String)>;
}

/// Derives an item from another one. `None` means nothing was derived.
pub trait Transform<I> {
    fn apply(&self, item: &I, data: Option<&Value>) -> Result<Option<I>>;
}

/// A named predicate, as referenced by an action.
pub struct Block<I> {
    name: String,
    predicate: Arc<dyn Predicate<I>>,
}

impl<I> Block<I> {
    pub fn new(name: impl Into<String>, predicate: Arc<dyn Predicate<I>>) -> Self {
        Self { name: name.into(), predicate }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn evaluate(&self, item: &I, other: &I) -> Result<Option<FieldValue>> {
        self.predicate.evaluate(item, other)
    }
    pub fn check(&self, item: &I, other: &I) -> Result<(bool, String)> {
        self.predicate.check(item, other)
    }
}

impl<I> Clone for Block<I> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), predicate: Arc::clone(&self.predicate) }
    }
}

impl<I> fmt::Debug for Block<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Block({})", self.name)
    }
}

// ------------- Actions -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Apply,
    Sort,
    FilterSingle,
    FilterLast,
    FilterToFirst,
    FilterPairs,
    Cut,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Apply => "apply",
            ActionKind::Sort => "sort",
            ActionKind::FilterSingle => "filterSingle",
            ActionKind::FilterLast => "filterLast",
            ActionKind::FilterToFirst => "filterToFirst",
            ActionKind::FilterPairs => "filterPairs",
            ActionKind::Cut => "cut",
        }
    }
    /// Parses an action name. `applyBulk` is an apply that registers what it
    /// derives, hence the second member of the pair.
    pub fn parse(name: &str) -> Result<(Self, bool)> {
        let parsed = match name {
            "apply" => (ActionKind::Apply, false),
            "applyBulk" => (ActionKind::Apply, true),
            "sort" => (ActionKind::Sort, false),
            "filterSingle" => (ActionKind::FilterSingle, false),
            "filterLast" => (ActionKind::FilterLast, false),
            "filterToFirst" => (ActionKind::FilterToFirst, false),
            "filterPairs" => (ActionKind::FilterPairs, false),
            "cut" => (ActionKind::Cut, false),
            other => return Err(MinesetError::UnknownAction(other.to_owned())),
        };
        Ok(parsed)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One resolved step of a pipeline.
pub struct Action<I> {
    kind: ActionKind,
    label: String,
    blocks: Vec<Block<I>>,
    reverse: bool,
    max: i64,
    direction: i64,
    function: Option<(String, Arc<dyn Transform<I>>)>,
    data: Option<Value>,
    register_new: bool,
}

impl<I> Action<I> {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            label: kind.name().to_owned(),
            blocks: Vec::new(),
            reverse: false,
            max: 0,
            direction: 0,
            function: None,
            data: None,
            register_new: false,
        }
    }
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
    pub fn block(mut self, name: impl Into<String>, predicate: Arc<dyn Predicate<I>>) -> Self {
        self.blocks.push(Block::new(name, predicate));
        self
    }
    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
    pub fn max(mut self, max: i64) -> Self {
        self.max = max;
        self
    }
    pub fn direction(mut self, direction: i64) -> Self {
        self.direction = direction;
        self
    }
    pub fn function(mut self, name: impl Into<String>, transform: Arc<dyn Transform<I>>) -> Self {
        self.function = Some((name.into(), transform));
        self
    }
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
    pub fn registering(mut self, register_new: bool) -> Self {
        self.register_new = register_new;
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }
    pub fn name(&self) -> &str {
        &self.label
    }
    pub fn blocks(&self) -> &[Block<I>] {
        &self.blocks
    }
    pub fn is_reversed(&self) -> bool {
        self.reverse
    }
    pub fn max_count(&self) -> i64 {
        self.max
    }
    pub fn step(&self) -> i64 {
        self.direction
    }
    pub fn transform(&self) -> Option<&dyn Transform<I>> {
        self.function.as_ref().map(|(_, t)| t.as_ref())
    }
    pub fn default_data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
    pub fn registers_new(&self) -> bool {
        self.register_new
    }
}

impl<I> Clone for Action<I> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            label: self.label.clone(),
            blocks: self.blocks.clone(),
            reverse: self.reverse,
            max: self.max,
            direction: self.direction,
            function: self.function.as_ref().map(|(n, t)| (n.clone(), Arc::clone(t))),
            data: self.data.clone(),
            register_new: self.register_new,
        }
    }
}

impl<I> fmt::Debug for Action<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("blocks", &self.blocks)
            .field("reverse", &self.reverse)
            .field("max", &self.max)
            .field("direction", &self.direction)
            .field("function", &self.function.as_ref().map(|(n, _)| n))
            .field("register_new", &self.register_new)
            .finish()
    }
}

/// The declarative form of an action, as found in batch descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub action: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub max: i64,
    #[serde(default)]
    pub direction: i64,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ActionSpec {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            label: None,
            blocks: Vec::new(),
            reverse: false,
            max: 0,
            direction: 0,
            function: None,
            data: None,
        }
    }
}

// ------------- Registry -------------
/// Named predicates and transforms that action specs may refer to.
pub struct ActionRegistry<I> {
    predicates: HashMap<String, Arc<dyn Predicate<I>>>,
    transforms: HashMap<String, Arc<dyn Transform<I>>>,
}

impl<I: Item> ActionRegistry<I> {
    pub fn new() -> Self {
        Self { predicates: HashMap::new(), transforms: HashMap::new() }
    }
    pub fn register_predicate(&mut self, name: impl Into<String>, predicate: Arc<dyn Predicate<I>>) {
        self.predicates.insert(name.into(), predicate);
    }
    pub fn register_transform(&mut self, name: impl Into<String>, transform: Arc<dyn Transform<I>>) {
        self.transforms.insert(name.into(), transform);
    }
    pub fn has_predicate(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }
    pub fn has_transform(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn compile(&self, spec: &ActionSpec) -> Result<Action<I>> {
        let (kind, register_new) = ActionKind::parse(&spec.action)?;
        let label = spec.label.clone().unwrap_or_else(|| spec.action.clone());
        let mut action = Action::new(kind)
            .label(label.clone())
            .reversed(spec.reverse)
            .max(spec.max)
            .direction(spec.direction)
            .registering(register_new);
        for name in &spec.blocks {
            let predicate = self.predicates.get(name).ok_or_else(|| MinesetError::UnknownBlock {
                action: label.clone(),
                block: name.clone(),
            })?;
            action = action.block(name.clone(), Arc::clone(predicate));
        }
        if let Some(name) = &spec.function {
            let transform = self.transforms.get(name).ok_or_else(|| MinesetError::UnknownFunction {
                action: label.clone(),
                function: name.clone(),
            })?;
            action = action.function(name.clone(), Arc::clone(transform));
        }
        if let Some(data) = &spec.data {
            action = action.data(data.clone());
        }
        debug!(action = %label, kind = %kind, blocks = spec.blocks.len(), "action compiled");
        Ok(action)
    }

    pub fn compile_all(&self, specs: &[ActionSpec]) -> Result<Vec<Action<I>>> {
        specs.iter().map(|spec| self.compile(spec)).collect()
    }
}

impl<I: Item> Default for ActionRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Comparison, FieldTest, Record};

    fn registry() -> ActionRegistry<Record> {
        let mut registry: ActionRegistry<Record> = ActionRegistry::new();
        registry.register_predicate("high", Arc::new(FieldTest::against_value("score", Comparison::Ge, 5)));
        registry
    }

    #[test]
    fn compile_resolves_blocks() {
        let mut spec = ActionSpec::new("filterSingle");
        spec.blocks.push("high".into());
        spec.reverse = true;
        let action = registry().compile(&spec).unwrap();
        assert_eq!(action.kind(), ActionKind::FilterSingle);
        assert_eq!(action.blocks().len(), 1);
        assert_eq!(action.blocks()[0].name(), "high");
        assert!(action.is_reversed());
        assert_eq!(action.name(), "filterSingle");
    }

    #[test]
    fn apply_bulk_registers() {
        let action = registry().compile(&ActionSpec::new("applyBulk")).unwrap();
        assert_eq!(action.kind(), ActionKind::Apply);
        assert!(action.registers_new());
    }

    #[test]
    fn unknown_names_are_errors() {
        assert!(matches!(
            registry().compile(&ActionSpec::new("explode")),
            Err(MinesetError::UnknownAction(name)) if name == "explode"
        ));
        let mut spec = ActionSpec::new("sort");
        spec.blocks.push("missing".into());
        assert!(matches!(registry().compile(&spec), Err(MinesetError::UnknownBlock { .. })));
        let mut spec = ActionSpec::new("apply");
        spec.function = Some("nope".into());
        assert!(matches!(registry().compile(&spec), Err(MinesetError::UnknownFunction { .. })));
    }

    #[test]
    fn spec_from_json_defaults() {
        let spec: ActionSpec = serde_json::from_str(r#"{"action": "cut", "max": 3}"#).unwrap();
        assert_eq!(spec.max, 3);
        assert_eq!(spec.direction, 0);
        assert!(spec.blocks.is_empty());
    }
}
