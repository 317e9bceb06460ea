use serde_json::Value;

use crate::tree;

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a mapping for the same key, merge them key by key.
/// Otherwise, `overlay`'s value wins.
///
/// Uses an explicit work list instead of recursion, so arbitrarily deep trees
/// merge without growing the call stack.
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    let mut pending: Vec<(Vec<String>, Value)> = vec![(Vec::new(), overlay)];

    while let Some((path, overlay)) = pending.pop() {
        let Some(target) = tree::get_path_mut(&mut base, path.as_slice()) else {
            continue;
        };
        match (target, overlay) {
            (Value::Object(base_map), Value::Object(overlay_map)) => {
                for (key, overlay_val) in overlay_map {
                    let both_maps =
                        overlay_val.is_object() && base_map.get(&key).is_some_and(Value::is_object);
                    if both_maps {
                        let mut child = path.clone();
                        child.push(key);
                        pending.push((child, overlay_val));
                    } else {
                        base_map.insert(key, overlay_val);
                    }
                }
            }
            (target, overlay_val) => *target = overlay_val,
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disjoint_keys_merge() {
        let merged = deep_merge(json!({"host": "localhost"}), json!({"port": 3000}));
        assert_eq!(merged, json!({"host": "localhost", "port": 3000}));
    }

    #[test]
    fn same_scalar_key_overlay_wins() {
        let merged = deep_merge(json!({"port": 8080}), json!({"port": 3000}));
        assert_eq!(merged["port"], 3000);
    }

    #[test]
    fn nested_maps_merge() {
        let base = json!({"database": {"url": "postgres://old", "pool_size": 5}});
        let overlay = json!({"database": {"pool_size": 20}});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["database"]["url"], "postgres://old");
        assert_eq!(merged["database"]["pool_size"], 20);
    }

    #[test]
    fn overlay_scalar_replaces_map() {
        let merged = deep_merge(json!({"database": {"url": "x"}}), json!({"database": "flat"}));
        assert_eq!(merged["database"], "flat");
    }

    #[test]
    fn overlay_array_replaces_array() {
        let merged = deep_merge(json!({"hosts": [1, 2, 3]}), json!({"hosts": [9]}));
        assert_eq!(merged["hosts"], json!([9]));
    }

    #[test]
    fn empty_overlay_returns_base() {
        let base = json!({"port": 8080});
        assert_eq!(deep_merge(base.clone(), json!({})), base);
    }

    #[test]
    fn empty_base_returns_overlay() {
        let overlay = json!({"port": 3000});
        assert_eq!(deep_merge(json!({}), overlay.clone()), overlay);
    }

    #[test]
    fn non_map_base_replaced() {
        assert_eq!(deep_merge(json!(1), json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn deeply_nested_three_levels() {
        let base = json!({"a": {"b": {"c": {"val": 1, "other": "keep"}}}});
        let overlay = json!({"a": {"b": {"c": {"val": 99}}}});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["a"]["b"]["c"], json!({"val": 99, "other": "keep"}));
    }

    #[test]
    fn base_key_order_preserved() {
        let merged = deep_merge(json!({"b": 1, "a": 2}), json!({"c": 3, "b": 4}));
        let keys: Vec<&str> = merged.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn multiple_sequential_merges() {
        let merged = deep_merge(
            deep_merge(json!({"host": "a"}), json!({"port": 1000})),
            json!({"host": "c"}),
        );
        assert_eq!(merged, json!({"host": "c", "port": 1000}));
    }
}
