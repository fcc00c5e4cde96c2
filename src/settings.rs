//! Nested settings bag addressed by dotted paths.
//!
//! Every rendered item carries one of these (the `blazies` bag) for derived
//! state that downstream stages read back: `is.unstyled`, `use.loader`,
//! `dimensions`, `ratios`, `item.padding_bottom`, and so on.
//!
//! ```text
//! set("is.external", true)      {"is": {"external": true}}
//! get("is.external")            Some(true)
//! get_or("is.amp", &false)      false
//! ```
//!
//! Paths are split on `.` and each segment is trimmed. A numeric segment
//! indexes into a list. Missing paths are never an error; readers fall back
//! to a default.
//!
//! Merging is deep: maps merge key by key, lists merge index by index (an
//! index in the overlay replaces the same index in the base instead of being
//! appended), scalars in the overlay win.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The root is always a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Value")]
pub struct Settings {
    root: Value,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            root: Value::Object(map),
        }
    }
}

impl From<Settings> for Value {
    fn from(settings: Settings) -> Self {
        settings.root
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from a JSON object. Non-object values yield an empty bag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into(),
            _ => Self::default(),
        }
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// Value at `path`, or `None` when any segment is missing.
    ///
    /// An empty path returns the whole bag.
    pub fn get(&self, path: &str) -> Option<&Value> {
        split_path(path).try_fold(&self.root, child)
    }

    /// Value at `path`, or `default` when missing.
    pub fn get_or<'a>(&'a self, path: &str, default: &'a Value) -> &'a Value {
        self.get(path).unwrap_or(default)
    }

    /// Loose truthiness: missing, `null`, `false`, `0`, `""` and empty
    /// containers are all false.
    pub fn get_bool(&self, path: &str) -> bool {
        self.get(path).is_some_and(is_truthy)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        match self.get(path)? {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        match self.get(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Set `value` at `path`, creating intermediate maps as needed.
    ///
    /// A scalar sitting where an intermediate map is needed is replaced.
    /// An empty path is ignored.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        let segments: Vec<&str> = split_path(path).collect();
        let Some((last, parents)) = segments.split_last() else {
            return self;
        };

        let mut current = &mut self.root;
        for segment in parents {
            current = child_mut(current, segment);
        }
        *child_mut(current, last) = value.into();
        self
    }

    /// Remove the value at `path`, returning it.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let segments: Vec<&str> = split_path(path).collect();
        let (last, parents) = segments.split_last()?;
        let mut current = &mut self.root;
        for segment in parents {
            current = match current {
                Value::Object(map) => map.get_mut(*segment)?,
                Value::Array(list) => list.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        match current {
            Value::Object(map) => map.remove(*last),
            Value::Array(list) => {
                let index = last.parse::<usize>().ok()?;
                (index < list.len()).then(|| std::mem::replace(&mut list[index], Value::Null))
            }
            _ => None,
        }
    }

    /// Deep-merge `other` on top of this bag.
    pub fn merge(&mut self, other: &Settings) -> &mut Self {
        let base = std::mem::take(&mut self.root);
        self.root = merge_value(base, other.root.clone());
        self
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.root.as_object().map_or(0, Map::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Objects are merged key by key.
/// - Arrays are merged index by index; the overlay never appends past an
///   index it names, and base elements beyond the overlay are kept.
/// - Anything else in the overlay replaces the base value.
pub fn merge_value(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_value(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (Value::Array(base_list), Value::Array(overlay_list)) => {
            let mut merged = Vec::with_capacity(base_list.len().max(overlay_list.len()));
            let mut base_iter = base_list.into_iter();
            for overlay_val in overlay_list {
                merged.push(match base_iter.next() {
                    Some(base_val) => merge_value(base_val, overlay_val),
                    None => overlay_val,
                });
            }
            merged.extend(base_iter);
            Value::Array(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Loose truthiness for JSON-like values.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(list) => !list.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').map(str::trim).filter(|s| !s.is_empty())
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(list) => list.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> &'a mut Value {
    let list_index = match value {
        Value::Array(_) => segment.parse::<usize>().ok(),
        _ => None,
    };
    if list_index.is_none() && !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match (value, list_index) {
        (Value::Array(list), Some(index)) => {
            if list.len() <= index {
                list.resize(index + 1, Value::Null);
            }
            &mut list[index]
        }
        (Value::Object(map), _) => map.entry(segment.to_string()).or_insert(Value::Null),
        _ => unreachable!("non-container values are replaced by an object above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Settings {
        Settings::from_value(value)
    }

    // =========================================================================
    // get / get_or
    // =========================================================================

    #[test]
    fn get_nested_path() {
        let s = bag(json!({"is": {"amp": true}, "ui": {"placeholder": "x.png"}}));
        assert_eq!(s.get("is.amp"), Some(&json!(true)));
        assert_eq!(s.get_str("ui.placeholder"), Some("x.png"));
    }

    #[test]
    fn get_missing_path_returns_none() {
        let s = bag(json!({"is": {"amp": true}}));
        assert_eq!(s.get("is.preview"), None);
        assert_eq!(s.get("nope.deeper.still"), None);
    }

    #[test]
    fn get_empty_path_returns_whole_bag() {
        let s = bag(json!({"a": 1, "is": {"amp": true}}));
        assert_eq!(s.get(""), Some(&json!({"a": 1, "is": {"amp": true}})));
        assert_eq!(s.get(" . "), s.get(""));
        assert_eq!(Settings::new().get(""), Some(&json!({})));
    }

    #[test]
    fn get_or_falls_back_to_default() {
        let s = Settings::new();
        let default = json!("lazy");
        assert_eq!(s.get_or("loading", &default), &json!("lazy"));
    }

    #[test]
    fn get_through_scalar_is_none() {
        let s = bag(json!({"a": 1}));
        assert_eq!(s.get("a.b"), None);
    }

    #[test]
    fn get_segments_are_trimmed() {
        let s = bag(json!({"item": {"padding_bottom": 56.25}}));
        assert_eq!(s.get_f64(" item . padding_bottom "), Some(56.25));
    }

    #[test]
    fn get_indexes_into_lists() {
        let s = bag(json!({"dimensions": [{"width": 100}, {"width": 200}]}));
        assert_eq!(s.get_u64("dimensions.1.width"), Some(200));
        assert_eq!(s.get("dimensions.5"), None);
    }

    #[test]
    fn get_bool_is_loose() {
        let s = bag(json!({"a": 1, "b": "", "c": "0", "d": [], "e": "yes", "f": null}));
        assert!(s.get_bool("a"));
        assert!(!s.get_bool("b"));
        assert!(!s.get_bool("c"));
        assert!(!s.get_bool("d"));
        assert!(s.get_bool("e"));
        assert!(!s.get_bool("f"));
        assert!(!s.get_bool("missing"));
    }

    #[test]
    fn get_u64_parses_numeric_strings() {
        let s = bag(json!({"width": "640", "height": 360.0}));
        assert_eq!(s.get_u64("width"), Some(640));
        assert_eq!(s.get_u64("height"), Some(360));
    }

    // =========================================================================
    // set / remove
    // =========================================================================

    #[test]
    fn set_creates_intermediate_maps() {
        let mut s = Settings::new();
        s.set("is.unstyled", true).set("use.loader", false);
        assert_eq!(s.into_value(), json!({"is": {"unstyled": true}, "use": {"loader": false}}));
    }

    #[test]
    fn set_replaces_scalar_intermediate() {
        let mut s = bag(json!({"box": "large"}));
        s.set("box.style", "wide");
        assert_eq!(s.get_str("box.style"), Some("wide"));
    }

    #[test]
    fn set_numeric_segment_pads_list() {
        let mut s = bag(json!({"list": ["a"]}));
        s.set("list.2", "c");
        assert_eq!(s.get("list"), Some(&json!(["a", null, "c"])));
    }

    #[test]
    fn set_empty_path_is_ignored() {
        let mut s = Settings::new();
        s.set(" . ", 1);
        assert!(s.is_empty());
    }

    #[test]
    fn remove_nested_value() {
        let mut s = bag(json!({"image": {"style": "large", "keep": 1}}));
        assert_eq!(s.remove("image.style"), Some(json!("large")));
        assert_eq!(s.get("image"), Some(&json!({"keep": 1})));
        assert_eq!(s.remove("image.missing"), None);
    }

    // =========================================================================
    // merge
    // =========================================================================

    #[test]
    fn merge_overlay_scalar_wins() {
        let mut base = bag(json!({"loading": "lazy", "ratio": "fluid"}));
        base.merge(&bag(json!({"loading": "eager"})));
        assert_eq!(base.get_str("loading"), Some("eager"));
        assert_eq!(base.get_str("ratio"), Some("fluid"));
    }

    #[test]
    fn merge_is_deep() {
        let mut base = bag(json!({"is": {"amp": false, "preview": false}}));
        base.merge(&bag(json!({"is": {"amp": true}, "use": {"loader": true}})));
        assert_eq!(
            base.into_value(),
            json!({"is": {"amp": true, "preview": false}, "use": {"loader": true}})
        );
    }

    #[test]
    fn merge_lists_preserve_indexes() {
        let mut base = bag(json!({"list": ["a", "b", "c"]}));
        base.merge(&bag(json!({"list": ["x"]})));
        assert_eq!(base.get("list"), Some(&json!(["x", "b", "c"])));
    }

    #[test]
    fn merge_list_of_maps_merges_elements() {
        let mut base = bag(json!({"dims": [{"width": 1, "height": 2}]}));
        base.merge(&bag(json!({"dims": [{"height": 3}, {"width": 9}]})));
        assert_eq!(
            base.get("dims"),
            Some(&json!([{"width": 1, "height": 3}, {"width": 9}]))
        );
    }

    #[test]
    fn len_counts_top_level_keys() {
        let s = bag(json!({"a": {"b": 1, "c": 2}, "d": 3}));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn from_non_object_is_empty() {
        assert!(Settings::from_value(json!([1, 2])).is_empty());
    }
}
