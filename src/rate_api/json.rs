//! JSON parsing utilities for the pricing API client.

use anyhow::Result;

/// Attempt to parse JSON and, on failure, report the serde path to the
/// offending field along with the line and column, so protocol errors in
/// logs point at the exact part of the upstream payload that broke.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    match serde_path_to_error::deserialize(jd) {
        Ok(value) => Ok(value),
        Err(err) => {
            let inner = err.inner();
            let (line, column) = (inner.line(), inner.column());
            let path = err.path().to_string();

            let mut message = String::new();
            if !path.is_empty() && path != "." {
                message.push_str(&format!("at path '{path}': "));
            }
            message.push_str(&format!("{inner} (line {line} col {column})"));

            Err(anyhow::anyhow!(message))
        }
    }
}
