//! Per-dialog variable store.
//!
//! [`Vars`] is the key/value bag that templates read (`{{vars.name}}`) and
//! handlers write (`ctx.set_var(...)`). Values are stored as given; no
//! coercion happens on write.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Variable bag scoped to one dialog frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars(Map<String, Value>);

impl Vars {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Stores `value` under `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Removes and returns the value stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Returns `true` if `name` has a value.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Resolves a dotted path such as `"address.city"`.
    ///
    /// Each segment indexes into an object, or into an array when the segment
    /// is a number.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Copies every entry of `other` into `self`, overwriting on collision.
    pub fn merge(&mut self, other: &Vars) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of stored variables.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no variable is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the store into a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Vars {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Vars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Builds a [`Vars`] from `name => value` pairs.
///
/// ```rust,ignore
/// let vars = vars! { "name" => "Ann", "count" => 3 };
/// ```
#[macro_export]
macro_rules! vars {
    () => { $crate::Vars::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut vars = $crate::Vars::new();
        $( vars.set($name, $crate::__json!($value)); )+
        vars
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_stores_values_as_given() {
        let mut vars = Vars::new();
        vars.set("count", 3);
        vars.set("tags", json!(["a", "b"]));
        assert_eq!(vars.get("count"), Some(&json!(3)));
        assert_eq!(vars.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(vars.get("missing"), None);
    }

    #[test]
    fn test_lookup_walks_objects_and_arrays() {
        let mut vars = Vars::new();
        vars.set("user", json!({"address": {"city": "Oslo"}, "pets": ["cat"]}));
        assert_eq!(vars.lookup("user.address.city"), Some(&json!("Oslo")));
        assert_eq!(vars.lookup("user.pets.0"), Some(&json!("cat")));
        assert_eq!(vars.lookup("user.pets.7"), None);
        assert_eq!(vars.lookup("user.address.city.zip"), None);
    }

    #[test]
    fn test_merge_overwrites() {
        let mut a = crate::vars! { "x" => 1, "y" => 2 };
        let b = crate::vars! { "y" => 20, "z" => 30 };
        a.merge(&b);
        assert_eq!(a.get("y"), Some(&json!(20)));
        assert_eq!(a.len(), 3);
    }
}
