use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::paths::AppPaths;
use super::settings::AppConfig;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

/// Environment variables layered over the YAML files, as (var, section, key).
const ENV_OVERRIDES: [(&str, &str, &str); 9] = [
    ("GOOGLE_API_KEY", "embedding", "api_key"),
    ("GOOGLE_API_KEY", "answer", "api_key"),
    ("API_KEY", "batch", "api_key"),
    ("PINECONE_API_KEY", "vector_index", "api_key"),
    ("PINECONE_INDEX", "vector_index", "index_name"),
    ("PINECONE_HOST", "vector_index", "host"),
    ("PINECONE_CLOUD", "vector_index", "cloud"),
    ("PINECONE_REGION", "vector_index", "region"),
    ("PORT", "server", "port"),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn shared_paths(&self) -> Arc<AppPaths> {
        self.paths.clone()
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("DOCQA_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public file deep-merged with secrets and the process environment.
    pub fn load_raw(&self) -> Value {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |name| env::var(name).ok());
        merged
    }

    pub fn load_config(&self) -> Result<AppConfig, ApiError> {
        parse_config(&self.load_raw())
    }
}

pub fn parse_config(raw: &Value) -> Result<AppConfig, ApiError> {
    validate_config(raw)?;
    serde_json::from_value(raw.clone())
        .map_err(|err| ApiError::BadRequest(format!("Invalid config: {}", err)))
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unparsable config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if !config.is_object() {
        *config = Value::Object(Map::new());
    }

    for (var, section, key) in ENV_OVERRIDES {
        let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let value = if key == "port" {
            match raw.trim().parse::<u16>() {
                Ok(port) => json!(port),
                Err(_) => {
                    tracing::warn!("Ignoring {}={}: not a valid port", var, raw);
                    continue;
                }
            }
        } else {
            Value::String(raw.trim().to_string())
        };

        if let Some(root) = config.as_object_mut() {
            let entry = root
                .entry(section.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Some(section_map) = entry.as_object_mut() {
                section_map.insert(key.to_string(), value);
            }
        }
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

/// Copy of `value` with every sensitive key masked, recursively.
pub fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "retrieval": { "dimension": 768, "default_top_k": 5 },
            "server": { "port": 8000 }
        });
        let secrets = json!({
            "retrieval": { "default_top_k": 10 },
            "vector_index": { "api_key": "pc-key" }
        });

        let merged = deep_merge(&base, &secrets);

        assert_eq!(
            merged,
            json!({
                "retrieval": { "dimension": 768, "default_top_k": 10 },
                "server": { "port": 8000 },
                "vector_index": { "api_key": "pc-key" }
            })
        );
    }

    #[test]
    fn env_overrides_win_and_bad_ports_are_ignored() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PINECONE_API_KEY", "from-env"),
            ("PINECONE_INDEX", "docs"),
            ("PORT", "not-a-port"),
        ]);
        let mut config = json!({
            "vector_index": { "api_key": "from-file", "region": "eu-west-1" },
            "server": { "port": 9000 }
        });

        apply_env_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config["vector_index"]["api_key"], "from-env");
        assert_eq!(config["vector_index"]["index_name"], "docs");
        assert_eq!(config["vector_index"]["region"], "eu-west-1");
        assert_eq!(config["server"]["port"], 9000);
    }

    #[test]
    fn one_google_key_feeds_embedding_and_answers() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("GOOGLE_API_KEY", "g-key"), ("API_KEY", "batch-token")]);
        let mut config = json!({});

        apply_env_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config["embedding"]["api_key"], "g-key");
        assert_eq!(config["answer"]["api_key"], "g-key");
        assert_eq!(config["batch"]["api_key"], "batch-token");
    }

    #[test]
    fn redact_replaces_credentials_only() {
        let input = json!({
            "embedding": { "api_key": "g-key", "model": "embedding-001" },
            "vector_index": { "api_key": null, "index_name": "docs" }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "embedding": { "api_key": "****", "model": "embedding-001" },
                "vector_index": { "api_key": null, "index_name": "docs" }
            })
        );
    }

    #[test]
    fn load_config_reads_yaml_and_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_dirs(dir.path().to_path_buf(), dir.path().to_path_buf());
        fs::write(
            dir.path().join("config.yml"),
            "retrieval:\n  dimension: 4\n  default_top_k: 3\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("secrets.yaml"),
            "embedding:\n  api_key: secret-key\n",
        )
        .unwrap();

        let service = ConfigService::new(Arc::new(paths));
        let raw = load_yaml_file(&service.paths().user_data_dir.join("config.yml"));
        let secrets = load_yaml_file(&service.secrets_path());
        let config = parse_config(&deep_merge(&raw, &secrets)).unwrap();

        assert_eq!(config.retrieval.dimension, 4);
        assert_eq!(config.retrieval.default_top_k, 3);
        assert_eq!(config.embedding.api_key(), Some("secret-key"));
    }
}
