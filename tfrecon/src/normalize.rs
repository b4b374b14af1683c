//! Semantic equality and normalization of attribute values
//!
//! Remote APIs rarely echo values back byte-for-byte: numbers come back as
//! `1.0` when `1` was sent, weights arrive as the string `"0.5"`, empty
//! collections come back as null. Every comparison the reconciler makes goes
//! through this module so resources never special-case representations.

use crate::schema::AttributeType;
use crate::types::Dynamic;

/// Formats a number the way it would be written in configuration:
/// integral values without a fraction, everything else in shortest form.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Reads a number from either a numeric or a numeric-string value
pub fn lenient_number(value: &Dynamic) -> Option<f64> {
    match value {
        Dynamic::Number(n) => Some(*n),
        Dynamic::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Reads a bool from either a bool or a `"true"`/`"false"` string
pub fn lenient_bool(value: &Dynamic) -> Option<bool> {
    match value {
        Dynamic::Bool(b) => Some(*b),
        Dynamic::String(s) => s.trim().parse::<bool>().ok(),
        _ => None,
    }
}

fn numbers_equal(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= f64::EPSILON * scale
}

fn is_empty_collection(value: &Dynamic) -> bool {
    match value {
        Dynamic::Null => true,
        Dynamic::List(l) => l.is_empty(),
        Dynamic::Map(m) => m.values().all(Dynamic::is_null),
        _ => false,
    }
}

/// Converts a value to the canonical representation for its declared type.
/// Values that cannot be converted are returned unchanged.
pub fn normalize(ty: &AttributeType, value: &Dynamic) -> Dynamic {
    match (ty, value) {
        (_, Dynamic::Null) | (_, Dynamic::Unknown) => value.clone(),
        (AttributeType::Number, v) => lenient_number(v)
            .map(Dynamic::Number)
            .unwrap_or_else(|| v.clone()),
        (AttributeType::Bool, v) => lenient_bool(v)
            .map(Dynamic::Bool)
            .unwrap_or_else(|| v.clone()),
        (AttributeType::String, Dynamic::Number(n)) => Dynamic::String(format_number(*n)),
        (AttributeType::String, Dynamic::Bool(b)) => Dynamic::String(b.to_string()),
        (AttributeType::List(elem), Dynamic::List(items))
        | (AttributeType::Set(elem), Dynamic::List(items)) => {
            Dynamic::List(items.iter().map(|i| normalize(elem, i)).collect())
        }
        (AttributeType::Map(elem), Dynamic::Map(m)) => Dynamic::Map(
            m.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), normalize(elem, v)))
                .collect(),
        ),
        (AttributeType::Object(fields), Dynamic::Map(m)) => Dynamic::Map(
            m.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    let v = match fields.get(k) {
                        Some(field_ty) => normalize(field_ty, v),
                        None => v.clone(),
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Type-aware semantic equality.
///
/// Lists compare in order, sets ignore order, null equals an empty
/// collection, numbers compare numerically regardless of representation.
pub fn values_equal(ty: &AttributeType, a: &Dynamic, b: &Dynamic) -> bool {
    match ty {
        AttributeType::List(_) | AttributeType::Set(_) | AttributeType::Map(_)
            if is_empty_collection(a) && is_empty_collection(b) =>
        {
            true
        }
        AttributeType::Number => match (lenient_number(a), lenient_number(b)) {
            (Some(x), Some(y)) => numbers_equal(x, y),
            _ => a == b,
        },
        AttributeType::Bool => match (lenient_bool(a), lenient_bool(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        AttributeType::String => normalize(ty, a) == normalize(ty, b),
        AttributeType::List(elem) => match (a, b) {
            (Dynamic::List(x), Dynamic::List(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(elem, p, q))
            }
            _ => a == b,
        },
        AttributeType::Set(elem) => match (a, b) {
            (Dynamic::List(x), Dynamic::List(y)) => {
                unordered_equal(x, y, |p, q| values_equal(elem, p, q))
            }
            _ => a == b,
        },
        AttributeType::Map(elem) => match (a, b) {
            (Dynamic::Map(x), Dynamic::Map(y)) => {
                let x_keys = x.iter().filter(|(_, v)| !v.is_null()).count();
                let y_keys = y.iter().filter(|(_, v)| !v.is_null()).count();
                x_keys == y_keys
                    && x.iter().filter(|(_, v)| !v.is_null()).all(|(k, v)| {
                        y.get(k).is_some_and(|w| values_equal(elem, v, w))
                    })
            }
            _ => a == b,
        },
        AttributeType::Object(fields) => match (a, b) {
            (Dynamic::Map(x), Dynamic::Map(y)) => {
                let null = Dynamic::Null;
                x.keys().chain(y.keys()).all(|k| {
                    let p = x.get(k).unwrap_or(&null);
                    let q = y.get(k).unwrap_or(&null);
                    match fields.get(k) {
                        Some(field_ty) => values_equal(field_ty, p, q),
                        None => dynamic_equal(p, q),
                    }
                })
            }
            _ => a == b,
        },
    }
}

/// Equality without a declared type, used where only raw values are known
pub fn dynamic_equal(a: &Dynamic, b: &Dynamic) -> bool {
    if is_empty_collection(a) && is_empty_collection(b) {
        return true;
    }
    match (a, b) {
        (Dynamic::Number(_), _) | (_, Dynamic::Number(_)) => {
            match (lenient_number(a), lenient_number(b)) {
                (Some(x), Some(y)) => numbers_equal(x, y),
                _ => false,
            }
        }
        (Dynamic::List(x), Dynamic::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| dynamic_equal(p, q))
        }
        (Dynamic::Map(x), Dynamic::Map(y)) => {
            let null = Dynamic::Null;
            x.keys().chain(y.keys()).all(|k| {
                dynamic_equal(x.get(k).unwrap_or(&null), y.get(k).unwrap_or(&null))
            })
        }
        _ => a == b,
    }
}

/// Multiset comparison: every element of `a` pairs with a distinct element of `b`
pub fn unordered_equal<T, F>(a: &[T], b: &[T], eq: F) -> bool
where
    F: Fn(&T, &T) -> bool,
{
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        match b
            .iter()
            .enumerate()
            .position(|(i, y)| !used[i] && eq(x, y))
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}
