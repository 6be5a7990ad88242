//! Checks caller data before it is copied into the sandbox.
//!
//! Keys such as `__proto__` would rewrite object prototypes when the value is
//! materialized inside V8, so any object carrying one is rejected outright.
//! Nesting is capped so a hostile data object can't exhaust the stack during
//! serialization or freezing.

use serde_json::Value;

/// Maximum nesting depth of objects and arrays.
pub const MAX_DEPTH: usize = 32;

const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsafeData {
    #[error("`{path}` uses the reserved key '{key}'")]
    ForbiddenKey { path: String, key: String },

    #[error("`{path}` is nested more than {MAX_DEPTH} levels deep")]
    TooDeep { path: String },
}

/// Walks `value`, naming the offending location relative to `root` on
/// failure (`selection.ocf[1].meta`).
pub fn check(value: &Value, root: &str) -> Result<(), UnsafeData> {
    let mut path = root.to_string();
    walk(value, &mut path, 0)
}

fn walk(value: &Value, path: &mut String, depth: usize) -> Result<(), UnsafeData> {
    if depth > MAX_DEPTH {
        return Err(UnsafeData::TooDeep { path: path.clone() });
    }

    let len = path.len();
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if FORBIDDEN_KEYS.contains(&key.as_str()) {
                    return Err(UnsafeData::ForbiddenKey {
                        path: path.clone(),
                        key: key.clone(),
                    });
                }
                path.push('.');
                path.push_str(key);
                walk(child, path, depth + 1)?;
                path.truncate(len);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push_str(&format!("[{index}]"));
                walk(child, path, depth + 1)?;
                path.truncate(len);
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_ordinary_logs() {
        let log = json!({
            "id": "A001",
            "ocf": [{"clip": "A001C001", "size": 1024, "copies": [{"volume": "RAID-1"}]}],
            "notes": null
        });
        assert_eq!(check(&log, "selection"), Ok(()));
    }

    #[test]
    fn test_names_the_forbidden_key_and_its_location() {
        let log = json!({
            "ocf": [
                {"clip": "A001C001"},
                {"meta": {"__proto__": {"polluted": true}}}
            ]
        });
        assert_eq!(
            check(&log, "selection"),
            Err(UnsafeData::ForbiddenKey {
                path: "selection.ocf[1].meta".into(),
                key: "__proto__".into(),
            })
        );

        let err = check(&json!({"constructor": {}}), "project").unwrap_err();
        assert_eq!(err.to_string(), "`project` uses the reserved key 'constructor'");
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let mut value = json!({"leaf": true});
        for _ in 0..35 {
            value = json!([value]);
        }
        let err = check(&value, "all").unwrap_err();
        assert!(matches!(err, UnsafeData::TooDeep { .. }));
        assert!(err.to_string().contains("more than 32 levels"));
    }
}
