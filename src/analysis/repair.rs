//! Response parsing with a bounded repair fallback.
//!
//! Oversized multi-page submissions sometimes come back truncated mid-JSON.
//! `parse_analysis_response` tries the response as-is, then exactly one
//! repair pass for that single failure shape (unterminated string / open
//! brackets / trailing partial element). Anything else is a parse failure;
//! this is not a general-purpose lenient parser.

use super::AnalysisError;
use crate::models::AnalysisResult;

/// Parse the provider response into an [`AnalysisResult`], tolerating a
/// markdown code fence and attempting one truncation repair.
pub fn parse_analysis_response(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    let body = strip_code_fence(raw);

    match serde_json::from_str::<AnalysisResult>(body) {
        Ok(result) => Ok(result),
        Err(first_err) => {
            for candidate in repair_candidates(body) {
                if let Ok(result) = serde_json::from_str::<AnalysisResult>(&candidate) {
                    tracing::warn!("analysis response repaired after apparent truncation");
                    return Ok(result);
                }
            }
            Err(AnalysisError::Parse(first_err.to_string()))
        }
    }
}

/// Models often wrap the JSON in a ```json fence; take the inside. A
/// truncated response may lack the closing fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        match after.find("```") {
            Some(end) => after[..end].trim(),
            None => after.trim(),
        }
    } else {
        trimmed
    }
}

/// Candidate repairs for a truncated JSON document, in preference order:
///  A. close an unterminated string, then balance all open brackets;
///  B. cut at a trailing comma (dropping the partial element after it) and
///     balance, trying the latest cut first so the least content is lost.
/// Returns nothing when the input is already balanced (then the problem is
/// not truncation and repair must not be attempted).
fn repair_candidates(raw: &str) -> Vec<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // Last comma seen at each nesting depth, with the open brackets at that
    // point. One cut candidate per depth keeps this bounded.
    let mut cuts: std::collections::BTreeMap<usize, (usize, Vec<char>)> =
        std::collections::BTreeMap::new();

    for (i, c) in raw.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            ',' => {
                cuts.insert(stack.len(), (i, stack.clone()));
            }
            _ => {}
        }
    }

    if stack.is_empty() && !in_string {
        return Vec::new();
    }

    let mut candidates = Vec::new();

    let mut closed = raw.to_string();
    if in_string {
        closed.push('"');
    }
    for closer in stack.iter().rev() {
        closed.push(*closer);
    }
    candidates.push(closed);

    let mut cut_points: Vec<(usize, Vec<char>)> = cuts.into_values().collect();
    cut_points.sort_by(|a, b| b.0.cmp(&a.0));
    for (idx, stack_at_cut) in cut_points {
        let mut cut = raw[..idx].to_string();
        for closer in stack_at_cut.iter().rev() {
            cut.push(*closer);
        }
        candidates.push(cut);
    }

    candidates
}
