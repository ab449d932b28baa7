//! Five-field cron expression matching.
//!
//! Grammar per field: `*`, a single value, a range `a-b`, a step `x/n`
//! (where `x` is `*`, a value or a range), or a comma-separated list of any
//! of these. Months and weekdays may be written as English names; only the
//! first three letters are significant and case is ignored, so `january`,
//! `Jan` and `jan` are equivalent. The fields are, in order: minute, hour,
//! day of month, month, day of week (Sunday = 0).

use chrono::{DateTime, Datelike, Timelike, Utc};

/// The five cron fields, in expression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl Field {
    /// Inclusive domain of valid values for this field.
    pub fn domain(self) -> (u32, u32) {
        match self {
            Field::Minute => (0, 59),
            Field::Hour => (0, 23),
            Field::DayOfMonth => (1, 31),
            Field::Month => (1, 12),
            Field::DayOfWeek => (0, 6),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Field::Minute => "minute",
            Field::Hour => "hour",
            Field::DayOfMonth => "day-of-month",
            Field::Month => "month",
            Field::DayOfWeek => "day-of-week",
        })
    }
}

/// A malformed cron expression. Every variant names the offending field so
/// configuration bugs are visible immediately.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("cron expression should have exactly 5 fields, \"{0}\" given")]
    FieldCount(String),
    #[error("invalid {field} field: expecting match/modulus, \"{expr}\" given")]
    MalformedStep { field: Field, expr: String },
    #[error("invalid {field} field: expecting numeric modulus, \"{expr}\" given")]
    NonNumericStep { field: Field, expr: String },
    #[error("invalid {field} field: expecting from-to structure, \"{expr}\" given")]
    MalformedRange { field: Field, expr: String },
    #[error("invalid {field} field: expecting numeric or named value, \"{expr}\" given")]
    UnknownToken { field: Field, expr: String },
}

/// Evaluate whether `at` satisfies the five-field expression `expr`.
///
/// Pure and deterministic; the only failure mode is a malformed expression.
pub fn matches(expr: &str, at: DateTime<Utc>) -> Result<bool, ExprError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ExprError::FieldCount(expr.to_string()));
    }

    Ok(match_field(Field::Minute, fields[0], at.minute())?
        && match_field(Field::Hour, fields[1], at.hour())?
        && match_field(Field::DayOfMonth, fields[2], at.day())?
        && match_field(Field::Month, fields[3], at.month())?
        && match_field(Field::DayOfWeek, fields[4], at.weekday().num_days_from_sunday())?)
}

/// Evaluate one field expression against a numeric value.
///
/// Precedence is comma, then slash, then dash: a list matches if any member
/// matches; a step `x/n` resolves `x` to a base range and matches every nth
/// value counted from the start of that range, so `1-6/2` matches 1, 3, 5.
pub fn match_field(field: Field, expr: &str, value: u32) -> Result<bool, ExprError> {
    if expr == "*" {
        return Ok(true);
    }

    if expr.contains(',') {
        for part in expr.split(',') {
            if match_field(field, part, value)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    let (base, modulus) = match expr.split_once('/') {
        Some((base, m)) => {
            if m.contains('/') {
                return Err(ExprError::MalformedStep {
                    field,
                    expr: expr.to_string(),
                });
            }
            let n: u32 = m.parse().map_err(|_| ExprError::NonNumericStep {
                field,
                expr: expr.to_string(),
            })?;
            if n == 0 {
                return Err(ExprError::NonNumericStep {
                    field,
                    expr: expr.to_string(),
                });
            }
            (base, n)
        }
        None => (expr, 1),
    };

    let (from, to) = if base == "*" {
        field.domain()
    } else if let Some((lo, hi)) = base.split_once('-') {
        if hi.contains('-') || lo.is_empty() || hi.is_empty() {
            return Err(ExprError::MalformedRange {
                field,
                expr: expr.to_string(),
            });
        }
        (resolve(field, lo)?, resolve(field, hi)?)
    } else {
        let v = resolve(field, base)?;
        (v, v)
    };

    Ok(value >= from && value <= to && (value - from) % modulus == 0)
}

/// Resolve a single token to its numeric value: integers pass through,
/// month and weekday names map to their calendar numbers.
fn resolve(field: Field, token: &str) -> Result<u32, ExprError> {
    if let Ok(n) = token.parse::<u32>() {
        return Ok(n);
    }

    let lower = token.to_ascii_lowercase();
    let named = lower.get(..3).and_then(|abbr| match abbr {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        "sun" => Some(0),
        "mon" => Some(1),
        "tue" => Some(2),
        "wed" => Some(3),
        "thu" => Some(4),
        "fri" => Some(5),
        "sat" => Some(6),
        _ => None,
    });

    named.ok_or_else(|| ExprError::UnknownToken {
        field,
        expr: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn minutes_matching(expr: &str) -> Vec<u32> {
        (0..60)
            .filter(|&m| match_field(Field::Minute, expr, m).unwrap())
            .collect()
    }

    #[test]
    fn star_matches_everything() {
        for m in 0..60 {
            assert!(match_field(Field::Minute, "*", m).unwrap());
        }
    }

    #[test]
    fn single_value_and_list() {
        assert_eq!(minutes_matching("7"), vec![7]);
        assert_eq!(minutes_matching("1,4,7"), vec![1, 4, 7]);
        assert_eq!(minutes_matching("1,10-12"), vec![1, 10, 11, 12]);
    }

    #[test]
    fn star_step_matches_multiples() {
        assert_eq!(
            minutes_matching("*/5"),
            (0..60).step_by(5).collect::<Vec<_>>()
        );
    }

    #[test]
    fn range_step_bounds_and_modulus() {
        assert_eq!(
            minutes_matching("10-59/5"),
            vec![10, 15, 20, 25, 30, 35, 40, 45, 50, 55]
        );
    }

    #[test]
    fn named_month_range_with_step() {
        // every 2nd month counted from January
        let matched: Vec<u32> = (1..=12)
            .filter(|&m| match_field(Field::Month, "jan-jun/2", m).unwrap())
            .collect();
        assert_eq!(matched, vec![1, 3, 5]);
    }

    #[test]
    fn full_names_and_case_are_accepted() {
        assert!(match_field(Field::Month, "January", 1).unwrap());
        assert!(match_field(Field::Month, "january-june", 3).unwrap());
        assert!(match_field(Field::DayOfWeek, "SUN", 0).unwrap());
        assert!(match_field(Field::DayOfWeek, "monday-friday", 5).unwrap());
        assert!(!match_field(Field::DayOfWeek, "monday-friday", 6).unwrap());
    }

    #[test]
    fn weekday_names_start_at_sunday() {
        assert!(match_field(Field::DayOfWeek, "sun", 0).unwrap());
        assert!(match_field(Field::DayOfWeek, "sat", 6).unwrap());
        assert!(!match_field(Field::DayOfWeek, "sat", 0).unwrap());
    }

    #[test]
    fn wrong_arity_fails_before_field_evaluation() {
        let at = Utc::now();
        assert_eq!(
            matches("* * * *", at),
            Err(ExprError::FieldCount("* * * *".to_string()))
        );
        // a malformed field in position 1 is not reached with bad arity
        assert_eq!(
            matches("bogus * * * * *", at),
            Err(ExprError::FieldCount("bogus * * * * *".to_string()))
        );
    }

    #[test]
    fn malformed_fields_are_rejected() {
        assert_eq!(
            match_field(Field::Minute, "1/2/3", 0),
            Err(ExprError::MalformedStep {
                field: Field::Minute,
                expr: "1/2/3".to_string()
            })
        );
        assert_eq!(
            match_field(Field::Minute, "*/x", 0),
            Err(ExprError::NonNumericStep {
                field: Field::Minute,
                expr: "*/x".to_string()
            })
        );
        assert_eq!(
            match_field(Field::Minute, "*/0", 0),
            Err(ExprError::NonNumericStep {
                field: Field::Minute,
                expr: "*/0".to_string()
            })
        );
        assert_eq!(
            match_field(Field::Minute, "1-2-3", 0),
            Err(ExprError::MalformedRange {
                field: Field::Minute,
                expr: "1-2-3".to_string()
            })
        );
        assert_eq!(
            match_field(Field::Month, "januember", 1),
            Err(ExprError::UnknownToken {
                field: Field::Month,
                expr: "januember".to_string()
            })
        );
    }

    #[test]
    fn full_expression_against_known_instant() {
        // 2024-03-05 10:30 UTC is a Tuesday
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap();
        assert!(matches("30 10 5 3 2", at).unwrap());
        assert!(matches("*/15 * * mar tue", at).unwrap());
        assert!(matches("* * * * *", at).unwrap());
        assert!(!matches("31 * * * *", at).unwrap());
        assert!(!matches("* * * * wed", at).unwrap());
    }

    #[test]
    fn matching_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap();
        let first = matches("0-5,10-59/5 * 2-10,15-25 january-june/2 mon-fri", at);
        for _ in 0..10 {
            assert_eq!(
                matches("0-5,10-59/5 * 2-10,15-25 january-june/2 mon-fri", at),
                first
            );
        }
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = match_field(Field::DayOfWeek, "xyz", 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid day-of-week field: expecting numeric or named value, \"xyz\" given"
        );
    }
}
