//! Reading JSON or YAML documents given on the command line.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Read a document from `path`, or from stdin when `path` is `-`.
///
/// Files ending in `.yaml` or `.yml` are parsed as YAML; everything else,
/// stdin included, is tried as JSON first and then as YAML.
pub fn read_document(path: &Path) -> Result<Value> {
    let (contents, source) = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read document from stdin")?;
        (buf, "stdin".to_string())
    } else {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        (contents, path.display().to_string())
    };

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    parse_document(&contents, is_yaml).with_context(|| format!("failed to parse {source}"))
}

/// Parse document text as YAML or JSON.
pub fn parse_document(contents: &str, yaml: bool) -> Result<Value> {
    if yaml {
        return serde_yaml::from_str(contents).context("invalid YAML");
    }
    match serde_json::from_str(contents) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str(contents)
            .map_err(|_| json_err)
            .context("invalid JSON"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_json_and_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("flow.json");
        std::fs::write(&json_path, r#"{"data_flows": [{"source": "A", "destination": "B"}]}"#).unwrap();
        let yaml_path = dir.path().join("flow.yaml");
        std::fs::write(&yaml_path, "data_flows:\n  - source: A\n    destination: B\n").unwrap();

        let expected = json!({"data_flows": [{"source": "A", "destination": "B"}]});
        assert_eq!(read_document(&json_path).unwrap(), expected);
        assert_eq!(read_document(&yaml_path).unwrap(), expected);
    }

    #[test]
    fn test_unknown_extension_falls_back_to_yaml() {
        let value = parse_document("components: []", false).unwrap();
        assert_eq!(value, json!({"components": []}));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = read_document(Path::new("/nonexistent/flow.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
