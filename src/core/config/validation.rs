use serde_json::{Map, Value};

use super::settings::COSINE_METRIC;
use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.dimension", "dimension", 1, 65_536)?;
        validate_u64_field(
            retrieval,
            "retrieval.default_top_k",
            "default_top_k",
            1,
            10_000,
        )?;
        validate_u64_field(retrieval, "retrieval.max_top_k", "max_top_k", 1, 10_000)?;
        validate_u64_field(
            retrieval,
            "retrieval.delete_scan_limit",
            "delete_scan_limit",
            1,
            1_000_000,
        )?;
        validate_non_empty_string_field(
            retrieval,
            "retrieval.default_user_id",
            "default_user_id",
        )?;
        if let Some(metric) = retrieval.get("metric") {
            if metric.as_str() != Some(COSINE_METRIC) {
                return Err(ApiError::BadRequest(format!(
                    "Invalid config at 'retrieval.metric': only '{}' is supported",
                    COSINE_METRIC
                )));
            }
        }
        if let (Some(default_top_k), Some(max_top_k)) = (
            retrieval.get("default_top_k").and_then(Value::as_u64),
            retrieval.get("max_top_k").and_then(Value::as_u64),
        ) {
            if default_top_k > max_top_k {
                return Err(ApiError::BadRequest(
                    "Invalid config at 'retrieval.default_top_k': exceeds max_top_k".to_string(),
                ));
            }
        }
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(embedding, "embedding.api_key", "api_key")?;
        validate_non_empty_string_field(embedding, "embedding.model", "model")?;
        validate_url_field(embedding, "embedding.endpoint", "endpoint")?;
        validate_u64_field(embedding, "embedding.timeout_ms", "timeout_ms", 1, 600_000)?;
        validate_u64_field(embedding, "embedding.batch_size", "batch_size", 1, 1_000)?;
        validate_bool_field(embedding, "embedding.strict", "strict")?;
        if let Some(value) = embedding.get("fallback_value") {
            match value.as_f64() {
                Some(number) if number.is_finite() && number != 0.0 => {}
                Some(_) => {
                    return Err(ApiError::BadRequest(
                        "Invalid config at 'embedding.fallback_value': must be finite and non-zero"
                            .to_string(),
                    ))
                }
                None => return Err(config_type_error("embedding.fallback_value", "number")),
            }
        }
    }

    if let Some(index) = expect_optional_object(root, "vector_index")? {
        validate_optional_string_field(index, "vector_index.api_key", "api_key")?;
        validate_non_empty_string_field(index, "vector_index.index_name", "index_name")?;
        validate_optional_string_field(index, "vector_index.host", "host")?;
        validate_url_field(index, "vector_index.control_plane_url", "control_plane_url")?;
        validate_non_empty_string_field(index, "vector_index.cloud", "cloud")?;
        validate_non_empty_string_field(index, "vector_index.region", "region")?;
        validate_optional_string_field(index, "vector_index.namespace", "namespace")?;
        validate_u64_field(index, "vector_index.timeout_ms", "timeout_ms", 1, 600_000)?;
        validate_u64_field(
            index,
            "vector_index.upsert_batch_size",
            "upsert_batch_size",
            1,
            1_000,
        )?;
    }

    if let Some(pipeline) = expect_optional_object(root, "pipeline")? {
        validate_u64_field(pipeline, "pipeline.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_u64_field(
            pipeline,
            "pipeline.chunk_overlap",
            "chunk_overlap",
            0,
            1_000_000,
        )?;
        validate_u64_field(
            pipeline,
            "pipeline.max_upload_bytes",
            "max_upload_bytes",
            1,
            1 << 30,
        )?;
        if let (Some(size), Some(overlap)) = (
            pipeline.get("chunk_size").and_then(Value::as_u64),
            pipeline.get("chunk_overlap").and_then(Value::as_u64),
        ) {
            if overlap >= size {
                return Err(ApiError::BadRequest(
                    "Invalid config at 'pipeline.chunk_overlap': must be smaller than chunk_size"
                        .to_string(),
                ));
            }
        }
    }

    if let Some(answer) = expect_optional_object(root, "answer")? {
        validate_optional_string_field(answer, "answer.api_key", "api_key")?;
        validate_non_empty_string_field(answer, "answer.model", "model")?;
        validate_url_field(answer, "answer.endpoint", "endpoint")?;
        validate_u64_field(answer, "answer.timeout_ms", "timeout_ms", 1, 600_000)?;
        validate_u64_field(answer, "answer.context_top_k", "context_top_k", 1, 10_000)?;
        validate_u64_field(answer, "answer.max_clauses", "max_clauses", 0, 100)?;
        validate_bool_field(answer, "answer.weigh_questions", "weigh_questions")?;
    }

    if let Some(batch) = expect_optional_object(root, "batch")? {
        validate_optional_string_field(batch, "batch.api_key", "api_key")?;
        validate_u64_field(
            batch,
            "batch.download_timeout_ms",
            "download_timeout_ms",
            1,
            600_000,
        )?;
        validate_u64_field(batch, "batch.top_k", "top_k", 1, 10_000)?;
        validate_non_empty_string_field(batch, "batch.user_id", "user_id")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_non_empty_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    match section.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(config_type_error(path, "string")),
    }
}

fn validate_url_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    validate_non_empty_string_field(section, path, key)?;
    let Some(text) = section.get(key).and_then(Value::as_str) else {
        return Ok(());
    };
    if text.starts_with("http://") || text.starts_with("https://") {
        return Ok(());
    }
    Err(ApiError::BadRequest(format!(
        "Invalid config at '{}': must be an http(s) URL",
        path
    )))
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
