//! Persistence boundary: flat, versioned document records.
//!
//! Documents serialize to a single JSON record suitable for a storage row.
//! Loading runs an additive migration chain over the raw `serde_json::Value`
//! before deserializing, so older documents gain newer fields with their
//! defaults filled in — migrations never remove or rewrite existing data.
//!
//! Version history:
//! - v1: initial format
//! - v2: palette roles gained the `variant` flag
//! - v3: patterns gained the optional `borders` config

use crate::model::Block;
use crate::pattern::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Newest record version this build reads and writes.
pub const FORMAT_VERSION: u32 = 3;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported format version {0}, newest understood is {FORMAT_VERSION}")]
    UnsupportedVersion(u32),
    #[error("document is not a JSON object")]
    NotAnObject,
}

/// Flat storage record for a block document.
#[derive(Debug, Serialize, Deserialize)]
pub struct BlockRecord {
    pub version: u32,
    #[serde(flatten)]
    pub block: Block,
}

/// Flat storage record for a pattern document.
#[derive(Debug, Serialize, Deserialize)]
pub struct PatternRecord {
    pub version: u32,
    #[serde(flatten)]
    pub pattern: Pattern,
}

pub fn save_block(block: &Block) -> Result<String, PersistError> {
    let record = BlockRecord {
        version: FORMAT_VERSION,
        block: block.clone(),
    };
    Ok(serde_json::to_string(&record)?)
}

pub fn load_block(raw: &str) -> Result<Block, PersistError> {
    let mut value: Value = serde_json::from_str(raw)?;
    migrate(&mut value, false)?;
    let record: BlockRecord = serde_json::from_value(value)?;
    Ok(record.block)
}

pub fn save_pattern(pattern: &Pattern) -> Result<String, PersistError> {
    let record = PatternRecord {
        version: FORMAT_VERSION,
        pattern: pattern.clone(),
    };
    Ok(serde_json::to_string(&record)?)
}

pub fn load_pattern(raw: &str) -> Result<Pattern, PersistError> {
    let mut value: Value = serde_json::from_str(raw)?;
    migrate(&mut value, true)?;
    let record: PatternRecord = serde_json::from_value(value)?;
    Ok(record.pattern)
}

// ─── Migration chain ─────────────────────────────────────────────────────

/// Bring a raw record up to [`FORMAT_VERSION`], filling defaults only.
fn migrate(value: &mut Value, is_pattern: bool) -> Result<(), PersistError> {
    let obj = value.as_object_mut().ok_or(PersistError::NotAnObject)?;
    let version = obj
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;
    if version > FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(version));
    }

    if version < 2 {
        fill_role_variant_flags(obj);
    }
    if version < 3 && is_pattern {
        obj.entry("borders").or_insert(Value::Null);
    }
    obj.insert("version".into(), FORMAT_VERSION.into());
    Ok(())
}

/// v1 → v2: every palette role gains `variant: false`.
fn fill_role_variant_flags(obj: &mut serde_json::Map<String, Value>) {
    let Some(roles) = obj
        .get_mut("palette")
        .and_then(|p| p.get_mut("roles"))
        .and_then(Value::as_array_mut)
    else {
        return;
    };
    for role in roles {
        if let Some(role) = role.as_object_mut() {
            role.entry("variant").or_insert(Value::Bool(false));
        }
    }
}
