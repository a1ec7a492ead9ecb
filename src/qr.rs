//! Parser for the pipe-separated medication lines printed on prescription QR codes.
//!
//! Each non-blank line describes one medication:
//!
//! ```text
//! Name|Amount|Time1|Dosage1[|Time2[|Dosage2]]...
//! ```
//!
//! A line is either fully accepted or fully rejected.

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::medication::{is_valid_time, Medication, Schedule};

pub const TOKEN_SEPARATOR: char = '|';

/// Which revision of the line format to accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrGrammar {
    /// `Name|Amount|Time1|Dosage1` followed by time tokens, each with an optional dosage.
    /// Missing dosages fall back to `Dosage1`.
    #[default]
    Strict,
    /// `Name|Amount|Time` (default dosage) or `Name|Amount` followed by complete time/dosage pairs.
    Paired,
}

#[derive(Debug, Clone)]
pub struct QrOptions {
    pub grammar: QrGrammar,
    /// Only used by [`QrGrammar::Paired`] for three-token lines.
    pub default_dosage: String,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            grammar: QrGrammar::Strict,
            default_dosage: "1 tablet".into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("empty line")]
    Empty,
    #[error("expected at least {expected} fields, got {got}")]
    TooFewTokens { expected: usize, got: usize },
    #[error("empty medication name")]
    EmptyName,
    #[error("invalid amount \"{0}\"")]
    InvalidAmount(String),
    #[error("invalid time \"{0}\"")]
    InvalidTime(String),
    #[error("missing dosage for {0}")]
    EmptyDosage(String),
    #[error("time/dosage pairs are incomplete ({0} fields after name and amount)")]
    UnpairedTokens(usize),
}

// LF, VT, FF, CR, NEL, LINE SEPARATOR, PARAGRAPH SEPARATOR
const LINE_BREAKS: [char; 7] = [
    '\n', '\u{0B}', '\u{0C}', '\r', '\u{85}', '\u{2028}', '\u{2029}',
];

/// Splits raw scanned codes into their non-blank lines, in scan order.
pub fn split_lines<S: AsRef<str>>(raw_codes: &[S]) -> Vec<&str> {
    raw_codes
        .iter()
        .flat_map(|code| code.as_ref().split(LINE_BREAKS))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Parses a single line. `tube_number` becomes the synthetic `Tube N` label.
pub fn parse_line(
    line: &str,
    options: &QrOptions,
    tube_number: usize,
) -> Result<Medication, LineError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(LineError::Empty);
    }
    let tokens: Vec<&str> = line.split(TOKEN_SEPARATOR).map(str::trim).collect();

    let min_tokens = match options.grammar {
        QrGrammar::Strict => 4,
        QrGrammar::Paired => 3,
    };
    if tokens.len() < min_tokens {
        return Err(LineError::TooFewTokens {
            expected: min_tokens,
            got: tokens.len(),
        });
    }

    let name = tokens[0];
    if name.is_empty() {
        return Err(LineError::EmptyName);
    }
    let amount = tokens[1]
        .parse::<i64>()
        .map_err(|_| LineError::InvalidAmount(tokens[1].to_owned()))?;

    let schedules = match options.grammar {
        QrGrammar::Strict => strict_schedules(&tokens[2..])?,
        QrGrammar::Paired => paired_schedules(&tokens[2..], &options.default_dosage)?,
    };

    Ok(Medication::new(
        format!("Tube {tube_number}"),
        name,
        amount,
        schedules,
    ))
}

fn checked_time(token: &str) -> Result<&str, LineError> {
    if is_valid_time(token) {
        Ok(token)
    } else {
        Err(LineError::InvalidTime(token.to_owned()))
    }
}

fn strict_schedules(tokens: &[&str]) -> Result<Vec<Schedule>, LineError> {
    let first_time = checked_time(tokens[0])?;
    let first_dosage = tokens[1];
    if first_dosage.is_empty() {
        return Err(LineError::EmptyDosage(first_time.to_owned()));
    }
    let mut schedules = vec![Schedule::new(first_time, first_dosage)];

    let mut rest = tokens[2..].iter().peekable();
    while let Some(token) = rest.next() {
        let time = checked_time(token)?;
        // The next token is this time's dosage unless it is itself a time
        let dosage = match rest.next_if(|next| !is_valid_time(next)) {
            Some(dosage) if !dosage.is_empty() => *dosage,
            _ => first_dosage,
        };
        schedules.push(Schedule::new(time, dosage));
    }
    Ok(schedules)
}

fn paired_schedules(tokens: &[&str], default_dosage: &str) -> Result<Vec<Schedule>, LineError> {
    if tokens.len() == 1 {
        let time = checked_time(tokens[0])?;
        return Ok(vec![Schedule::new(time, default_dosage)]);
    }
    if tokens.len() % 2 != 0 {
        return Err(LineError::UnpairedTokens(tokens.len()));
    }
    tokens
        .chunks_exact(2)
        .map(|pair| {
            let time = checked_time(pair[0])?;
            if pair[1].is_empty() {
                return Err(LineError::EmptyDosage(time.to_owned()));
            }
            Ok(Schedule::new(time, pair[1]))
        })
        .collect()
}

/// A line that didn't make it, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line: String,
    pub reason: LineError,
}

#[derive(Debug, Default)]
pub struct QrBatch {
    pub medications: Vec<Medication>,
    pub rejected: Vec<RejectedLine>,
}

impl QrBatch {
    pub fn total_lines(&self) -> usize {
        self.medications.len() + self.rejected.len()
    }
}

/// Parses every line of every scanned code. Tube labels count up from 1
/// and only advance on lines that parse.
pub fn parse_codes<S: AsRef<str>>(raw_codes: &[S], options: &QrOptions) -> QrBatch {
    let lines = split_lines(raw_codes);
    info!(
        "Parsing {} medication lines from {} QR codes",
        lines.len(),
        raw_codes.len()
    );
    let mut batch = QrBatch::default();
    let mut tube_counter = 1;
    for (index, line) in lines.iter().enumerate() {
        match parse_line(line, options, tube_counter) {
            Ok(medication) => {
                debug!(
                    "Line {}: parsed {} into {}",
                    index + 1,
                    medication.name,
                    medication.tube
                );
                batch.medications.push(medication);
                tube_counter += 1;
            }
            Err(reason) => {
                warn!("Line {}: rejected \"{line}\": {reason}", index + 1);
                batch.rejected.push(RejectedLine {
                    line: (*line).to_owned(),
                    reason,
                });
            }
        }
    }
    info!(
        "Parsed {} valid medications out of {} lines",
        batch.medications.len(),
        lines.len()
    );
    batch
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct QrReport {
    pub valid: Vec<String>,
    pub invalid: Vec<RejectedLine>,
}

impl QrReport {
    pub fn total_lines(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}

/// Checks scanned codes without building a batch for the store.
pub fn validate<S: AsRef<str>>(raw_codes: &[S], options: &QrOptions) -> QrReport {
    let mut report = QrReport::default();
    for line in split_lines(raw_codes) {
        match parse_line(line, options, 0) {
            Ok(_) => report.valid.push(line.to_owned()),
            Err(reason) => report.invalid.push(RejectedLine {
                line: line.to_owned(),
                reason,
            }),
        }
    }
    report
}
