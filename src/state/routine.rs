//! Routine structure and input validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutineError};

/// Routine identifier, the creation timestamp in milliseconds
pub type RoutineId = i64;

/// A named, fixed-duration task that can be counted down repeatedly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub id: RoutineId,
    pub name: String,
    /// Duration in whole minutes
    pub duration: u32,
    #[serde(default)]
    pub is_active: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub start_time: Option<DateTime<Utc>>,
    /// Last computed remaining time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<i64>,
}

impl Routine {
    /// Create a new inactive routine
    pub fn new(id: RoutineId, name: String, duration: u32) -> Self {
        Self {
            id,
            name,
            duration,
            is_active: false,
            start_time: None,
            remaining_time: None,
        }
    }

    /// Configured duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        i64::from(self.duration) * 60_000
    }

    /// Mark the routine as counting down from `now`
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.start_time = Some(now);
        self.remaining_time = Some(self.duration_ms());
    }

    /// Clear the countdown fields
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.start_time = None;
        self.remaining_time = None;
    }

    /// Remaining milliseconds at `now`, or `None` when not counting down.
    /// The result may be zero or negative once the duration has elapsed.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        let start_time = self.start_time?;
        let elapsed = (now - start_time).num_milliseconds();
        Some(self.duration_ms() - elapsed)
    }

    /// Milliseconds to display for this routine
    pub fn display_ms(&self) -> i64 {
        if self.is_active {
            self.remaining_time.unwrap_or_else(|| self.duration_ms())
        } else {
            self.duration_ms()
        }
    }
}

/// Duration as submitted by a client: a JSON number or free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Number(f64),
    Text(String),
}

impl DurationInput {
    /// Interpret the input as whole minutes.
    ///
    /// Numbers are truncated toward zero. Text accepts leading whitespace, an
    /// optional sign and leading digits; trailing garbage is ignored.
    pub fn minutes(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            Self::Number(_) => None,
            Self::Text(text) => parse_leading_int(text),
        }
    }
}

fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let digits: &str = {
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    };
    if digits.is_empty() {
        return None;
    }

    // Saturate absurdly long inputs instead of failing
    let value = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// Validated input for the add operation
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoutine {
    pub name: String,
    pub duration: u32,
}

impl NewRoutine {
    /// Validate a raw name and duration
    pub fn parse(name: &str, duration: Option<&DurationInput>) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RoutineError::validation());
        }

        let minutes = duration
            .and_then(DurationInput::minutes)
            .filter(|m| *m > 0)
            .ok_or_else(RoutineError::validation)?;
        let duration = u32::try_from(minutes).map_err(|_| RoutineError::validation())?;

        Ok(Self {
            name: name.to_string(),
            duration,
        })
    }
}
