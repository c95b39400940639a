//! JSON tree helpers
//!
//! Hierarchical stores do not keep nulls or empty objects: writing either is
//! the same as deleting, and a parent whose last child is removed disappears.

use serde_json::{Map, Value};

use crate::path::StorePath;

/// Strip nulls and empty objects; `None` if nothing is left
pub fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        Value::Array(items) => {
            let cleaned: Vec<Value> = items.into_iter().filter_map(normalize).collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Array(cleaned))
            }
        }
        other => Some(other),
    }
}

/// Value at `path`, if any
pub fn get<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for key in path.segments() {
        node = node.as_object()?.get(key)?;
    }
    Some(node)
}

/// Replace the value at `path`, creating parents as needed
///
/// A non-object found on the way is replaced by an object. Writing a value
/// that normalizes to nothing deletes instead.
pub fn set(root: &mut Value, path: &StorePath, value: Value) {
    let Some(value) = normalize(value) else {
        remove(root, path);
        return;
    };

    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for key in parents {
        node = ensure_object(node)
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(last.clone(), value);
}

/// Remove the value at `path` and prune parents left empty
pub fn remove(root: &mut Value, path: &StorePath) {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = Value::Object(Map::new());
        return;
    };

    if let Some(Value::Object(map)) = get_mut(root, parents) {
        map.remove(last);
    }

    // Walk back up removing ancestors that became empty
    for depth in (0..parents.len()).rev() {
        let is_empty = matches!(
            get_mut(root, &parents[..=depth]),
            Some(Value::Object(map)) if map.is_empty()
        );
        if !is_empty {
            break;
        }
        if let Some(Value::Object(map)) = get_mut(root, &parents[..depth]) {
            map.remove(&parents[depth]);
        }
    }
}

fn get_mut<'a>(root: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut node = root;
    for key in segments {
        node = node.as_object_mut()?.get_mut(key)?;
    }
    Some(node)
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> StorePath {
        StorePath::parse(s).unwrap()
    }

    #[test]
    fn test_set_creates_parents() {
        let mut root = json!({});
        set(&mut root, &path("people/Leo"), json!({"name": "Leo", "age": 30.0}));
        assert_eq!(root, json!({"people": {"Leo": {"name": "Leo", "age": 30.0}}}));
    }

    #[test]
    fn test_set_overwrites_whole_record() {
        let mut root = json!({"people": {"Leo": {"name": "Leo", "age": 30.0, "extra": true}}});
        set(&mut root, &path("people/Leo"), json!({"name": "Leo", "age": 31.0}));
        assert_eq!(
            get(&root, &path("people/Leo")),
            Some(&json!({"name": "Leo", "age": 31.0}))
        );
    }

    #[test]
    fn test_set_null_deletes() {
        let mut root = json!({"people": {"Leo": {"name": "Leo"}, "Ana": {"name": "Ana"}}});
        set(&mut root, &path("people/Leo"), Value::Null);
        assert_eq!(root, json!({"people": {"Ana": {"name": "Ana"}}}));
    }

    #[test]
    fn test_remove_prunes_empty_parents() {
        let mut root = json!({"people": {"Leo": {"name": "Leo"}}, "other": 1});
        remove(&mut root, &path("people/Leo"));
        assert_eq!(root, json!({"other": 1}));
        assert!(get(&root, &path("people")).is_none());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut root = json!({"people": {"Ana": {"name": "Ana"}}});
        remove(&mut root, &path("people/Unknown"));
        remove(&mut root, &path("nothing/here/at/all"));
        assert_eq!(root, json!({"people": {"Ana": {"name": "Ana"}}}));
    }

    #[test]
    fn test_set_through_scalar_replaces_it() {
        let mut root = json!({"people": 5});
        set(&mut root, &path("people/Leo"), json!({"name": "Leo"}));
        assert_eq!(root, json!({"people": {"Leo": {"name": "Leo"}}}));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(json!(null)), None);
        assert_eq!(normalize(json!({"a": null, "b": {}})), None);
        assert_eq!(
            normalize(json!({"name": "Leo", "age": null})),
            Some(json!({"name": "Leo"}))
        );
    }
}
