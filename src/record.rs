//! A general purpose item made of named field values, together with the
//! predicates and transforms batch descriptions build their actions from.
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{Predicate, Transform};
use crate::construct::{FieldOptions, Item, Uid};
use crate::datatype::FieldValue;
use crate::error::{MinesetError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    uid: Uid,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(uid: Uid) -> Self {
        Self { uid, fields: BTreeMap::new() }
    }
    pub fn from_fields(uid: Uid, fields: BTreeMap<String, FieldValue>) -> Self {
        Self { uid, fields }
    }
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.into(), value)
    }
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }
}

impl Item for Record {
    fn uid(&self) -> Uid {
        self.uid
    }
    fn set_uid(&mut self, uid: Uid) {
        self.uid = uid;
    }
    // identity is not content
    fn compare(&self, other: &Self) -> Ordering {
        self.fields.cmp(&other.fields)
    }
    fn field(&self, name: &str, options: &FieldOptions) -> Result<Option<FieldValue>> {
        let value = self.fields.get(name).cloned();
        Ok(match value {
            Some(value) if options.for_sort => Some(value.lowercased()),
            other => other,
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {{", self.uid)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: {}", name, value)?;
        }
        write!(f, " }}")
    }
}

// ------------- Predicates -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl Comparison {
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Ge => ordering != Ordering::Less,
        }
    }
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// The right hand side of a field test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Value(FieldValue),
    /// A field of the other item of a pair.
    OtherField(String),
}

/// Compares a field of an item with a constant or with a field of the other
/// item. A missing field on either side fails the test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTest {
    pub field: String,
    #[serde(rename = "cmp")]
    pub comparison: Comparison,
    #[serde(flatten)]
    pub operand: Operand,
}

impl FieldTest {
    pub fn against_value(field: impl Into<String>, comparison: Comparison, value: impl Into<FieldValue>) -> Self {
        Self { field: field.into(), comparison, operand: Operand::Value(value.into()) }
    }
    pub fn against_other(field: impl Into<String>, comparison: Comparison, other_field: impl Into<String>) -> Self {
        Self { field: field.into(), comparison, operand: Operand::OtherField(other_field.into()) }
    }
}

impl<I: Item> Predicate<I> for FieldTest {
    fn evaluate(&self, item: &I, other: &I) -> Result<Option<FieldValue>> {
        let (holds, _) = self.check(item, other)?;
        Ok(Some(FieldValue::Bool(holds)))
    }
    fn check(&self, item: &I, other: &I) -> Result<(bool, String)> {
        let options = FieldOptions::default();
        let Some(lhs) = item.field(&self.field, &options)? else {
            return Ok((false, format!("{} has no {}", item.short_id(), self.field)));
        };
        let rhs = match &self.operand {
            Operand::Value(value) => Some(value.clone()),
            Operand::OtherField(name) => other.field(name, &options)?,
        };
        let Some(rhs) = rhs else {
            return Ok((false, format!("{} has nothing to compare {} with", other.short_id(), self.field)));
        };
        let holds = self.comparison.holds(lhs.cmp(&rhs));
        Ok((holds, format!("{} {} {} {}", self.field, lhs, self.comparison.symbol(), rhs)))
    }
}

/// Evaluates to a field of the item, usable as a sort key. Holds when the
/// field is present and truthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldKey {
    pub key: String,
}

impl FieldKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl<I: Item> Predicate<I> for FieldKey {
    fn evaluate(&self, item: &I, _other: &I) -> Result<Option<FieldValue>> {
        item.field(&self.key, &FieldOptions::sorting())
    }
    fn check(&self, item: &I, _other: &I) -> Result<(bool, String)> {
        Ok(match item.field(&self.key, &FieldOptions::default())? {
            Some(value) => (value.is_truthy(), format!("{}={}", self.key, value)),
            None => (false, format!("{} missing", self.key)),
        })
    }
}

/// How a batch description spells a named block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockSpec {
    Test(FieldTest),
    Key(FieldKey),
}

impl BlockSpec {
    pub fn into_predicate<I: Item>(self) -> Arc<dyn Predicate<I>> {
        match self {
            BlockSpec::Test(test) => Arc::new(test),
            BlockSpec::Key(key) => Arc::new(key),
        }
    }
}

// ------------- Transforms -------------
/// Derives a record with one field set, either to a fixed value or to the
/// data handed to the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetField {
    pub field: String,
    #[serde(default)]
    pub value: Option<FieldValue>,
}

impl SetField {
    pub fn new(field: impl Into<String>, value: Option<FieldValue>) -> Self {
        Self { field: field.into(), value }
    }
}

impl Transform<Record> for SetField {
    fn apply(&self, item: &Record, data: Option<&Value>) -> Result<Option<Record>> {
        let value = match (&self.value, data) {
            (Some(value), _) => value.clone(),
            (None, Some(data)) => serde_json::from_value(data.clone())
                .map_err(|e| MinesetError::Collaborator(format!("{} cannot take {}: {}", self.field, data, e)))?,
            (None, None) => return Ok(None),
        };
        if item.get(&self.field) == Some(&value) {
            return Ok(None);
        }
        Ok(Some(item.clone().with(self.field.clone(), value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_ignores_uid() {
        let a = Record::new(1).with("x", 1);
        let b = Record::new(2).with("x", 1);
        assert_eq!(a.compare(&b), Ordering::Equal);
        assert_eq!(a.compare(&b.clone().with("x", 2)), Ordering::Less);
    }

    #[test]
    fn field_test_against_other() {
        let test = FieldTest::against_other("group", Comparison::Eq, "group");
        let a = Record::new(1).with("group", "x");
        let b = Record::new(2).with("group", "x");
        let c = Record::new(3);
        let (holds, why) = Predicate::<Record>::check(&test, &a, &b).unwrap();
        assert!(holds);
        assert_eq!(why, "group x == x");
        assert!(!Predicate::<Record>::check(&test, &a, &c).unwrap().0);
        assert!(!Predicate::<Record>::check(&test, &c, &a).unwrap().0);
    }

    #[test]
    fn block_specs_from_json() {
        let test: BlockSpec = serde_json::from_str(r#"{"field": "score", "cmp": ">=", "value": 5}"#).unwrap();
        assert_eq!(test, BlockSpec::Test(FieldTest::against_value("score", Comparison::Ge, 5)));
        let key: BlockSpec = serde_json::from_str(r#"{"key": "name"}"#).unwrap();
        assert_eq!(key, BlockSpec::Key(FieldKey::new("name")));
        let pair: BlockSpec = serde_json::from_str(r#"{"field": "g", "cmp": "==", "other_field": "g"}"#).unwrap();
        assert_eq!(pair, BlockSpec::Test(FieldTest::against_other("g", Comparison::Eq, "g")));
    }

    #[test]
    fn set_field_from_data() {
        let set = SetField::new("tag", None);
        let record = Record::new(4).with("tag", "old");
        let data = serde_json::json!("new");
        let derived = set.apply(&record, Some(&data)).unwrap().unwrap();
        assert_eq!(derived.get("tag"), Some(&FieldValue::from("new")));
        assert_eq!(derived.uid(), 4);
        assert!(set.apply(&derived, Some(&data)).unwrap().is_none());
        assert!(set.apply(&record, None).unwrap().is_none());
    }
}
