//! Request spec files
//!
//! A spec can be kept on disk as TOML or JSON so a test configuration can be
//! replayed. The file extension picks the format; anything other than
//! `.json` is read as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::RequestSpec;

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Load a spec file and re-apply the protocol rules
pub fn load_spec(path: &Path) -> Result<RequestSpec> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec file: {}", path.display()))?;

    let spec: RequestSpec = if is_json(path) {
        serde_json::from_str(&contents).with_context(|| "Failed to parse JSON spec file")?
    } else {
        toml::from_str(&contents).with_context(|| "Failed to parse TOML spec file")?
    };

    tracing::debug!(path = %path.display(), "Loaded request spec");
    Ok(spec.normalized())
}

/// Write a spec file, creating parent directories
pub fn save_spec(spec: &RequestSpec, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let contents = if is_json(path) {
        serde_json::to_string_pretty(spec)?
    } else {
        toml::to_string_pretty(spec)?
    };

    fs::write(path, contents)
        .with_context(|| format!("Failed to write spec file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ApiType, AuthMethod, HttpMethod, ProbeId};
    use tempfile::tempdir;

    fn sample() -> RequestSpec {
        RequestSpec::new()
            .set_api_type(ApiType::Soap)
            .set_url("https://x/soap")
            .set_method(HttpMethod::Post)
            .set_body("<Envelope/>")
            .set_auth_method(AuthMethod::ApiKey)
            .set_auth_token("key")
            .toggle_test(ProbeId::Xxe)
    }

    #[test]
    fn test_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("specs").join("soap.toml");

        save_spec(&sample(), &path).unwrap();
        assert!(path.exists());
        assert_eq!(load_spec(&path).unwrap(), sample());
    }

    #[test]
    fn test_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("soap.json");

        save_spec(&sample(), &path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"api_type\": \"SOAP\""));
        assert_eq!(load_spec(&path).unwrap(), sample());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gql.toml");
        fs::write(
            &path,
            "api_type = \"GraphQL\"\nurl = \"https://x/graphql\"\ngraphql_query = \"{ me { id } }\"\n",
        )
        .unwrap();

        let spec = load_spec(&path).unwrap();
        assert_eq!(spec.method(), HttpMethod::Post);
        assert_eq!(spec.graphql_variables(), "{}");
        assert!(spec.selected_tests().contains(&ProbeId::Sql));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(load_spec(&dir.path().join("nope.toml")).is_err());
    }
}
