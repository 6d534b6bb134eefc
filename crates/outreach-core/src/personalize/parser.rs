//! `SUBJECT:` / `BODY:` response parsing

use super::{GeneratedEmail, GenerationError};

/// Used when the model omits a subject line
pub const DEFAULT_SUBJECT: &str = "Quick question";

/// Strip a case-insensitive `marker` (e.g. `subject:`) from the start of a
/// line, tolerating markdown emphasis and headings around it
fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let cleaned = line.trim().trim_start_matches(['*', '#', '_']).trim_start();
    let head = cleaned.get(..marker.len())?;
    if !head.eq_ignore_ascii_case(marker) {
        return None;
    }
    Some(
        cleaned[marker.len()..]
            .trim_start_matches(['*', '_'])
            .trim(),
    )
}

fn clean_subject(subject: &str) -> String {
    subject
        .trim()
        .trim_matches(['"', '\'', '*', '_'])
        .trim()
        .to_string()
}

/// Parse a raw completion into a subject and body
pub fn parse_completion(raw: &str) -> Result<GeneratedEmail, GenerationError> {
    let lines: Vec<&str> = raw.trim().lines().collect();

    let subject_at = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| strip_marker(line, "subject:").map(|s| (i, clean_subject(s))));
    let body_at = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| strip_marker(line, "body:").map(|rest| (i, rest)));

    let body_lines: Vec<&str> = match (body_at, &subject_at) {
        (Some((i, rest)), _) => std::iter::once(rest)
            .filter(|r| !r.is_empty())
            .chain(lines[i + 1..].iter().copied())
            .collect(),
        (None, Some((i, _))) => lines[i + 1..].to_vec(),
        (None, None) => lines.clone(),
    };

    let subject = subject_at
        .map(|(_, s)| s)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

    let mut body_lines = body_lines.into_iter().skip_while(|l| l.trim().is_empty()).peekable();

    // A leading repeat of the subject is not part of the body
    if let Some(&first) = body_lines.peek() {
        let first = strip_marker(first, "subject:").unwrap_or(first);
        if clean_subject(first).eq_ignore_ascii_case(&subject) {
            body_lines.next();
        }
    }

    let body = body_lines.collect::<Vec<_>>().join("\n").trim().to_string();
    if body.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    Ok(GeneratedEmail { subject, body })
}
