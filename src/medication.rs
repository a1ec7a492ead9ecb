use regex::Regex;
use serde_derive::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

lazy_static! {
    static ref TIME_OF_DAY: Regex =
        Regex::new(r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$").expect("Time regex failed to compile");
}

/// 24-hour `HH:MM` (leading zero on the hour optional).
pub fn is_valid_time(time: &str) -> bool {
    TIME_OF_DAY.is_match(time)
}

/// A single time+dosage instruction for a medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub time: String,
    pub dosage: String,
}

impl Schedule {
    pub fn new(time: impl Into<String>, dosage: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            dosage: dosage.into(),
        }
    }
}

/// One medication loaded into a dispenser tube.
///
/// `id` only lives in memory, the dispenser and the store identify
/// medications by their tube.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    #[serde(skip, default = "Uuid::new_v4")]
    pub id: Uuid,
    pub tube: String,
    #[serde(rename = "type")]
    pub name: String,
    pub amount: i64,
    #[serde(rename = "time_to_take")]
    pub schedules: Vec<Schedule>,
}

impl PartialEq for Medication {
    fn eq(&self, other: &Self) -> bool {
        self.tube == other.tube
            && self.name == other.name
            && self.amount == other.amount
            && self.schedules == other.schedules
    }
}

impl Eq for Medication {}

impl Medication {
    pub fn new(
        tube: impl Into<String>,
        name: impl Into<String>,
        amount: i64,
        schedules: Vec<Schedule>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tube: tube.into(),
            name: name.into(),
            amount,
            schedules,
        }
    }

    /// Checks a medication that didn't come through the QR parser or the manual form,
    /// e.g. one decoded from an imported file.
    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |reason: String| Err(AppError::InvalidMedication(reason));
        if self.tube.trim().is_empty() {
            return invalid(format!("\"{}\" has no tube", self.name));
        }
        if self.name.trim().is_empty() {
            return invalid(format!("{} has no medication name", self.tube));
        }
        if self.schedules.is_empty() {
            return invalid(format!("{} ({}) has no schedule", self.tube, self.name));
        }
        for schedule in &self.schedules {
            if !is_valid_time(&schedule.time) {
                return invalid(format!(
                    "{} ({}) has an invalid time \"{}\"",
                    self.tube, self.name, schedule.time
                ));
            }
            if schedule.dosage.trim().is_empty() {
                return invalid(format!(
                    "{} ({}) has no dosage at {}",
                    self.tube, self.name, schedule.time
                ));
            }
        }
        Ok(())
    }

    pub fn schedule_summary(&self) -> String {
        self.schedules
            .iter()
            .map(|s| format!("{} ({})", s.time, s.dosage))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The manual entry form, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct ManualEntry {
    pub tube: String,
    pub name: String,
    pub amount: String,
    /// `HH:MM=dosage`
    pub schedules: Vec<String>,
}

impl ManualEntry {
    pub fn build(&self) -> Result<Medication, AppError> {
        let invalid = |reason: &str| AppError::InvalidMedication(reason.to_owned());

        let tube = self.tube.trim();
        let name = self.name.trim();
        let amount = self.amount.trim();
        if tube.is_empty() || name.is_empty() || amount.is_empty() {
            return Err(invalid("Please fill in all medication details"));
        }
        if self.schedules.is_empty() {
            return Err(invalid("Please add at least one dosage schedule"));
        }
        let amount = match amount.parse::<i64>() {
            Ok(amount) if amount > 0 => amount,
            _ => return Err(invalid("Please enter a valid positive number for amount")),
        };

        let mut schedules = Vec::with_capacity(self.schedules.len());
        for entry in &self.schedules {
            let (time, dosage) = entry
                .split_once('=')
                .map(|(t, d)| (t.trim(), d.trim()))
                .unwrap_or((entry.trim(), ""));
            if time.is_empty() || dosage.is_empty() {
                return Err(invalid("Please enter both time and dosage"));
            }
            if !is_valid_time(time) {
                return Err(invalid("Please enter time in HH:MM format (24-hour)"));
            }
            schedules.push(Schedule::new(time, dosage));
        }

        Ok(Medication::new(tube, name, amount, schedules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(schedules: &[&str]) -> ManualEntry {
        ManualEntry {
            tube: "tube1".into(),
            name: "Aspirin".into(),
            amount: "30".into(),
            schedules: schedules.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn time_pattern() {
        for ok in ["0:00", "08:30", "8:30", "19:05", "23:59"] {
            assert!(is_valid_time(ok), "{ok} should be valid");
        }
        for bad in ["24:00", "8:60", "08:5", "8", "08-30", " 08:30", "123:00", ""] {
            assert!(!is_valid_time(bad), "{bad} should be invalid");
        }
    }

    #[test]
    fn wire_keys() {
        let med = Medication::new("Tube 1", "Aspirin", 30, vec![Schedule::new("08:00", "1 tablet")]);
        let json = serde_json::to_value(&med).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tube": "Tube 1",
                "type": "Aspirin",
                "amount": 30,
                "time_to_take": [{"time": "08:00", "dosage": "1 tablet"}]
            })
        );
    }

    #[test]
    fn equality_ignores_id() {
        let a = Medication::new("Tube 1", "Aspirin", 30, vec![Schedule::new("08:00", "1")]);
        let b = Medication::new("Tube 1", "Aspirin", 30, vec![Schedule::new("08:00", "1")]);
        assert_ne!(a.id, b.id);
        assert_eq!(a, b);
    }

    #[test]
    fn manual_entry_builds() {
        let med = entry(&["08:00=1 tablet", " 20:30 = half tablet "]).build().unwrap();
        assert_eq!(med.tube, "tube1");
        assert_eq!(med.amount, 30);
        assert_eq!(
            med.schedules,
            vec![
                Schedule::new("08:00", "1 tablet"),
                Schedule::new("20:30", "half tablet")
            ]
        );
    }

    #[test]
    fn manual_entry_rejections() {
        let mut bad_amount = entry(&["08:00=1"]);
        bad_amount.amount = "0".into();
        assert!(bad_amount.build().is_err());
        bad_amount.amount = "-4".into();
        assert!(bad_amount.build().is_err());

        assert!(entry(&[]).build().is_err());
        assert!(entry(&["08:00"]).build().is_err());
        assert!(entry(&["25:00=1"]).build().is_err());

        let mut no_name = entry(&["08:00=1"]);
        no_name.name = "  ".into();
        assert!(no_name.build().is_err());
    }

    #[test]
    fn validate_imported() {
        let mut med = Medication::new("Tube 2", "Ibuprofen", 10, vec![Schedule::new("7:15", "2")]);
        assert!(med.validate().is_ok());
        med.schedules.push(Schedule::new("7:75", "2"));
        assert!(med.validate().is_err());
    }
}
