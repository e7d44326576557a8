//! JSONPath-like ignore-path expressions (§4.6): dot-separated field names
//! with `[key]` bracket syntax for map keys that themselves contain dots,
//! e.g. `metadata.annotations[kubectl.kubernetes.io/last-applied-configuration]`.

use serde_json::Value as JsonValue;

/// Parse an ignore-path expression into its segments.
pub fn parse(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;

    for ch in path.chars() {
        match ch {
            '[' if !in_brackets => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                in_brackets = true;
            }
            ']' if in_brackets => {
                segments.push(std::mem::take(&mut current));
                in_brackets = false;
            }
            '.' if !in_brackets => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Remove the value at `path` from `value`, if present.
pub fn remove(value: &mut JsonValue, path: &str) {
    let segments = parse(path);
    remove_recursive(value, &segments);
}

fn remove_recursive(value: &mut JsonValue, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        obj.remove(head);
        return;
    }
    if let Some(child) = obj.get_mut(head) {
        remove_recursive(child, rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_dotted_path() {
        assert_eq!(parse("metadata.resourceVersion"), vec!["metadata", "resourceVersion"]);
    }

    #[test]
    fn parses_bracketed_key_with_embedded_dots() {
        let segments = parse("metadata.annotations[kubectl.kubernetes.io/last-applied-configuration]");
        assert_eq!(
            segments,
            vec!["metadata", "annotations", "kubectl.kubernetes.io/last-applied-configuration"]
        );
    }

    #[test]
    fn removes_nested_bracketed_key() {
        let mut value = json!({
            "metadata": {
                "annotations": {
                    "kubectl.kubernetes.io/last-applied-configuration": "{}",
                    "keep-me": "yes",
                }
            }
        });
        remove(&mut value, "metadata.annotations[kubectl.kubernetes.io/last-applied-configuration]");
        assert!(value["metadata"]["annotations"].get("kubectl.kubernetes.io/last-applied-configuration").is_none());
        assert_eq!(value["metadata"]["annotations"]["keep-me"], json!("yes"));
    }

    #[test]
    fn removes_plain_path() {
        let mut value = json!({ "metadata": { "resourceVersion": "123", "name": "x" } });
        remove(&mut value, "metadata.resourceVersion");
        assert!(value["metadata"].get("resourceVersion").is_none());
        assert_eq!(value["metadata"]["name"], json!("x"));
    }
}
