// used to print out readable forms of a field value
use std::fmt;
// field values need a total order to act as sort keys
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A value resolved from a named item field.
///
/// Values of different kinds still compare: booleans sort before numbers, and
/// numbers sort before text. Numbers of any kind compare exactly by value,
/// floats use their IEEE total order with both zeros equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn data_type(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "Bool",
            FieldValue::Int(_) => "Int",
            FieldValue::Uint(_) => "Uint",
            FieldValue::Float(_) => "Float",
            FieldValue::Text(_) => "Text",
        }
    }
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Bool(_) => 0,
            FieldValue::Int(_) | FieldValue::Uint(_) | FieldValue::Float(_) => 1,
            FieldValue::Text(_) => 2,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Uint(u) => Some(*u as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
    /// Truthiness in the usual sense: zero, empty text and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Int(i) => *i != 0,
            FieldValue::Uint(u) => *u != 0,
            FieldValue::Float(f) => *f != 0.0,
            FieldValue::Text(s) => !s.is_empty(),
        }
    }
    fn as_integer(&self) -> Option<i128> {
        match self {
            FieldValue::Int(i) => Some(i128::from(*i)),
            FieldValue::Uint(u) => Some(i128::from(*u)),
            _ => None,
        }
    }
    /// Case-folded copy used when building sort keys.
    pub fn lowercased(&self) -> FieldValue {
        match self {
            FieldValue::Text(s) => FieldValue::Text(s.to_lowercase()),
            other => other.clone(),
        }
    }
}

// -0.0 and 0.0 are one value, as they both equal the integer zero
fn cmp_floats(a: f64, b: f64) -> Ordering {
    if a == b { Ordering::Equal } else { a.total_cmp(&b) }
}

// exact, without going through a lossy cast of the integer
fn cmp_integer_float(i: i128, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() { Ordering::Greater } else { Ordering::Less };
    }
    if f.is_infinite() {
        return if f > 0.0 { Ordering::Less } else { Ordering::Greater };
    }
    let whole = f.trunc();
    // saturates far outside the range of any integer variant
    match i.cmp(&(whole as i128)) {
        Ordering::Equal => cmp_floats(0.0, f - whole),
        unequal => unequal,
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Float(a), FieldValue::Float(b)) => cmp_floats(*a, *b),
            (FieldValue::Float(f), n) => match n.as_integer() {
                Some(i) => cmp_integer_float(i, *f).reverse(),
                None => self.rank().cmp(&n.rank()),
            },
            (n, FieldValue::Float(f)) => match n.as_integer() {
                Some(i) => cmp_integer_float(i, *f),
                None => n.rank().cmp(&other.rank()),
            },
            (a, b) => match (a.as_integer(), b.as_integer()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }
}
impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for FieldValue {}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Uint(u) => write!(f, "{}", u),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}
impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}
impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}
impl From<u64> for FieldValue {
    fn from(u: u64) -> Self {
        FieldValue::Uint(u)
    }
}
impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}
impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_owned())
    }
}
impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_order_bool_number_text() {
        let mut values = vec![
            FieldValue::from("b"),
            FieldValue::from(2.5),
            FieldValue::from(true),
            FieldValue::from(2),
            FieldValue::from("A"),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                FieldValue::from(true),
                FieldValue::from(2),
                FieldValue::from(2.5),
                FieldValue::from("A"),
                FieldValue::from("b"),
            ]
        );
    }

    #[test]
    fn mixed_numbers_compare_numerically() {
        assert_eq!(FieldValue::Int(3), FieldValue::Float(3.0));
        assert!(FieldValue::Int(3) < FieldValue::Float(3.5));
    }

    #[test]
    fn large_numbers_stay_ordered() {
        let big = 1i64 << 53;
        let mut values = vec![
            FieldValue::Int(big + 1),
            FieldValue::Float(big as f64),
            FieldValue::Int(big),
        ];
        assert_ne!(values[0], values[1]);
        assert_eq!(values[1], values[2]);
        values.sort();
        assert_eq!(values[2], FieldValue::Int(big + 1));
        assert!(FieldValue::Int(big + 1) > FieldValue::Float(big as f64));
        assert!(FieldValue::Float(0.5) > FieldValue::Int(0));
        assert!(FieldValue::Float(-0.5) < FieldValue::Int(0));
        assert_eq!(FieldValue::Float(-0.0), FieldValue::Int(0));
        assert_eq!(FieldValue::Float(-0.0), FieldValue::Float(0.0));
        assert!(FieldValue::Float(f64::INFINITY) > FieldValue::Uint(u64::MAX));
        assert!(FieldValue::Float(f64::NEG_INFINITY) < FieldValue::Int(i64::MIN));
        assert!(FieldValue::Float(f64::NAN) > FieldValue::Uint(u64::MAX));
    }

    #[test]
    fn ids_above_signed_range() {
        let top = FieldValue::from(u64::MAX);
        assert_eq!(top.data_type(), "Uint");
        assert!(top > FieldValue::from(1u64));
        assert!(top > FieldValue::Int(i64::MAX));
        assert_eq!(FieldValue::from(7u64), FieldValue::Int(7));
        assert!(FieldValue::from(0u64) > FieldValue::Int(-1));
        let v: FieldValue = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(v, top);
    }

    #[test]
    fn untagged_json() {
        let v: Vec<FieldValue> = serde_json::from_str(r#"[1, 1.5, "x", false]"#).unwrap();
        assert_eq!(v[0].data_type(), "Int");
        assert_eq!(v[1].data_type(), "Float");
        assert_eq!(v[2].data_type(), "Text");
        assert_eq!(v[3].data_type(), "Bool");
        assert_eq!(FieldValue::from("MiXed").lowercased(), FieldValue::from("mixed"));
    }
}
