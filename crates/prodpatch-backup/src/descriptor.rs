use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};

/// A parsed `product.json`. Key order is preserved across read and write.
pub type Descriptor = Map<String, Value>;

pub fn read_descriptor(path: &Path) -> Result<Descriptor> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read JSON from {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse JSON from {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!(
            "expected a JSON object at the top level of {}",
            path.display()
        )),
    }
}

/// Rewrites the whole file with 2-space indentation.
pub fn write_descriptor(path: &Path, descriptor: &Descriptor) -> Result<()> {
    let content = serde_json::to_string_pretty(descriptor)
        .with_context(|| format!("failed to serialize JSON for {}", path.display()))?;
    fs::write(path, content)
        .with_context(|| format!("failed to write JSON to {}", path.display()))
}
