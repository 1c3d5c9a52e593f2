//! Manifest loading
//!
//! Reads multi-document YAML manifests, substitutes template values and
//! splits them into dynamic objects ready for the API server.

use crate::error::{Error, Result};
use kube::core::{DynamicObject, GroupVersionKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Substitute `{{ key }}` and `{{ .key }}` placeholders
///
/// Unknown keys are an error so a half-rendered manifest never reaches the
/// cluster.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| "unterminated placeholder".to_string())?;
        let key = after[..end].trim().trim_start_matches('.');
        let value = vars
            .get(key)
            .ok_or_else(|| format!("no value for placeholder `{}`", key))?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Parse rendered YAML into its non-empty documents
pub fn parse_documents(rendered: &str) -> Result<Vec<DynamicObject>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(rendered) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        objects.push(serde_yaml::from_value(value)?);
    }
    Ok(objects)
}

/// Read, render and parse a manifest file
pub fn load(path: &Path, vars: &BTreeMap<String, String>) -> Result<Vec<DynamicObject>> {
    let raw = std::fs::read_to_string(path)?;
    let rendered = render(&raw, vars).map_err(|reason| Error::Manifest {
        path: path.display().to_string(),
        reason,
    })?;
    let objects = parse_documents(&rendered)?;
    if objects.is_empty() {
        return Err(Error::Manifest {
            path: path.display().to_string(),
            reason: "no resources defined".into(),
        });
    }
    Ok(objects)
}

/// Group/version/kind of a dynamic object
pub fn gvk_of(obj: &DynamicObject) -> Result<GroupVersionKind> {
    let types = obj.types.as_ref().ok_or_else(|| Error::Manifest {
        path: obj.metadata.name.clone().unwrap_or_default(),
        reason: "missing apiVersion/kind".into(),
    })?;
    let (group, version) = match types.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", types.api_version.as_str()),
    };
    Ok(GroupVersionKind::gvk(group, version, &types.kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_both_placeholder_styles() {
        let rendered = render(
            "monitors: [{{.mon0}}, {{ mon1 }}]",
            &vars(&[("mon0", "10.0.0.1"), ("mon1", "10.0.0.2")]),
        )
        .unwrap();
        assert_eq!(rendered, "monitors: [10.0.0.1, 10.0.0.2]");
    }

    #[test]
    fn test_render_rejects_unknown_key() {
        let err = render("ip: {{ mon9 }}", &vars(&[("mon0", "x")])).unwrap_err();
        assert!(err.contains("mon9"));
        assert!(render("ip: {{ mon0", &vars(&[("mon0", "x")])).is_err());
    }

    #[test]
    fn test_parse_documents_skips_empty() {
        let objects = parse_documents(
            "---\napiVersion: v1\nkind: Pod\nmetadata:\n  name: block-test\n---\n---\napiVersion: storage.k8s.io/v1\nkind: StorageClass\nmetadata:\n  name: rook-block\n",
        )
        .unwrap();
        assert_eq!(objects.len(), 2);

        let pod = gvk_of(&objects[0]).unwrap();
        assert_eq!((pod.group.as_str(), pod.version.as_str(), pod.kind.as_str()), ("", "v1", "Pod"));

        let sc = gvk_of(&objects[1]).unwrap();
        assert_eq!(sc.group, "storage.k8s.io");
        assert_eq!(sc.kind, "StorageClass");
    }

    #[test]
    fn test_load_empty_manifest_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here").unwrap();
        assert!(matches!(
            load(file.path(), &BTreeMap::new()),
            Err(Error::Manifest { .. })
        ));
    }
}
