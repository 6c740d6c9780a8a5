//! JSON-lines batch input
//!
//! Each non-blank line is either a check request
//! (`{"text": "...", "text_type": "キャッチコピー", "category": "化粧品"}`) or a
//! control line (`{"invalidate": "data"}`). Lines starting with `#` are
//! comments.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use yakki_core::{CheckRequest, Partition};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchLine {
    Check(CheckRequest),
    Invalidate(Partition),
    Skip,
}

pub fn parse_line(line: &str) -> Result<BatchLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(BatchLine::Skip);
    }

    let value: Value = serde_json::from_str(trimmed).context("Batch line is not valid JSON")?;

    if let Some(partition) = value.get("invalidate") {
        let name = partition
            .as_str()
            .ok_or_else(|| anyhow!("invalidate expects a partition name"))?;
        let partition = name.parse::<Partition>().map_err(|e| anyhow!(e))?;
        return Ok(BatchLine::Invalidate(partition));
    }

    let request: CheckRequest =
        serde_json::from_value(value).context("Batch line is not a check request")?;
    if request.text.trim().is_empty() {
        anyhow::bail!("Check request has empty text");
    }
    Ok(BatchLine::Check(request))
}
