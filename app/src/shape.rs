use std::fmt::Write as _;

use record::Level;

const DEFAULT_SINCE_SECS: i64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("invalid since: {0}")]
    InvalidSince(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid filter value: {0}")]
    InvalidFilterValue(String),
}

/// Parses `\d+(s|m|h|d)` into seconds. `since` is optional on every
/// endpoint that accepts it, so an absent value quietly defaults to one
/// hour; a value that is present but does not match the grammar is a
/// client error (6. EXTERNAL INTERFACES: "400 on bad since").
pub fn parse_since_secs(raw: Option<&str>) -> Result<i64, ShapeError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_SINCE_SECS);
    };
    if raw.is_empty() {
        return Ok(DEFAULT_SINCE_SECS);
    }

    // `split_at` needs a char boundary; a non-ASCII unit (e.g. a stray
    // `µ`) isn't one, so reject it up front instead of panicking.
    if !raw.is_ascii() {
        return Err(ShapeError::InvalidSince(raw.to_string()));
    }

    let (digits, unit) = raw.split_at(raw.len() - 1);
    let amount: i64 = digits
        .parse()
        .map_err(|_| ShapeError::InvalidSince(raw.to_string()))?;

    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(ShapeError::InvalidSince(raw.to_string())),
    };

    Ok(amount * multiplier)
}

/// Clamps `limit` into `[min, max]`, defaulting when absent. A value
/// present but unparsable is a client error.
pub fn parse_limit(
    raw: Option<&str>,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, ShapeError> {
    let value = match raw {
        None => default,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ShapeError::InvalidLimit(raw.to_string()))?,
    };
    Ok(value.clamp(min, max))
}

/// Escapes a filter value so a double quote inside it cannot close the
/// surrounding filter-string literal. Rejects raw control characters
/// outright rather than trying to escape them (4.G).
pub fn escape_filter_value(raw: &str) -> Result<String, ShapeError> {
    if raw.chars().any(|c| c.is_control()) {
        return Err(ShapeError::InvalidFilterValue(raw.to_string()));
    }
    Ok(raw.replace('\\', "\\\\").replace('"', "\\\""))
}

/// One AND-able equality clause, e.g. `project = "api"`.
fn eq_clause(out: &mut String, field: &str, value: &str) -> Result<(), ShapeError> {
    let escaped = escape_filter_value(value)?;
    if !out.is_empty() {
        out.push_str(" AND ");
    }
    let _ = write!(out, "{field} = \"{escaped}\"");
    Ok(())
}

#[derive(Debug, Default)]
pub struct SearchParams<'a> {
    pub project: Option<&'a str>,
    pub level: Option<&'a str>,
    pub trace_id: Option<&'a str>,
    pub environment: Option<&'a str>,
    pub since_cutoff_ms: Option<i64>,
    pub level_in: Option<&'a [Level]>,
}

/// Builds the engine filter expression for `/search`, `/trace/:id`,
/// `/errors`, `/projects` (4.G).
pub fn build_filter(params: &SearchParams) -> Result<Option<String>, ShapeError> {
    let mut clause = String::new();

    if let Some(project) = params.project {
        eq_clause(&mut clause, "project", project)?;
    }
    if let Some(level) = params.level {
        eq_clause(&mut clause, "level", level)?;
    }
    if let Some(levels) = params.level_in {
        let alternatives: Vec<String> = levels
            .iter()
            .map(|l| format!("level = \"{}\"", l.as_str()))
            .collect();
        if !alternatives.is_empty() {
            if !clause.is_empty() {
                clause.push_str(" AND ");
            }
            let _ = write!(clause, "({})", alternatives.join(" OR "));
        }
    }
    if let Some(trace_id) = params.trace_id {
        eq_clause(&mut clause, "traceId", trace_id)?;
    }
    if let Some(environment) = params.environment {
        eq_clause(&mut clause, "environment", environment)?;
    }
    if let Some(cutoff) = params.since_cutoff_ms {
        if !clause.is_empty() {
            clause.push_str(" AND ");
        }
        let _ = write!(clause, "timestampMs > {cutoff}");
    }

    if clause.is_empty() {
        Ok(None)
    } else {
        Ok(Some(clause))
    }
}
