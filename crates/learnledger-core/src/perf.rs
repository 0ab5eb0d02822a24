use std::collections::BTreeMap;

use crate::error::{LedgerError, Result};

/// Parses a single performance figure. Blank input is the zero value.
pub fn parse_perf(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0.0);
    }
    let value: f64 = raw
        .parse()
        .map_err(|e| LedgerError::invalid(format!("performance {raw:?}: {e}")))?;
    if !value.is_finite() {
        return Err(LedgerError::invalid(format!("performance {raw:?} is not finite")));
    }
    Ok(value)
}

/// Parses `"<data key> <perf>, <data key> <perf>, ..."` into a map. Blank
/// input is an empty map.
pub fn parse_perf_map(raw: &str) -> Result<BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    if raw.trim().is_empty() {
        return Ok(out);
    }
    for entry in raw.split(',') {
        let mut parts = entry.split_whitespace();
        let (key, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => (key, value),
            _ => {
                return Err(LedgerError::invalid(format!(
                    "performance entry {:?}: expected `<data key> <perf>`",
                    entry.trim()
                )))
            }
        };
        let perf = parse_perf(value)?;
        if out.insert(key.to_string(), perf).is_some() {
            return Err(LedgerError::invalid(format!("duplicate performance entry for {key:?}")));
        }
    }
    Ok(out)
}
