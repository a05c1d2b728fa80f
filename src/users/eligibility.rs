use serde::{Deserialize, Serialize};
use time::Date;

const DAYS_PER_YEAR: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AgeError {
    #[error("date of birth {dob} is after {today}")]
    FutureDateOfBirth { dob: Date, today: Date },
}

/// Whole years between `dob` and `today`: elapsed days divided by 365,
/// rounded down. Leap days are not corrected for.
pub fn compute_age(dob: Date, today: Date) -> Result<u32, AgeError> {
    if dob > today {
        return Err(AgeError::FutureDateOfBirth { dob, today });
    }
    let days = (today - dob).whole_days();
    Ok((days / DAYS_PER_YEAR) as u32)
}

/// Inclusive age range that qualifies a user for youth programmes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YouthBand {
    pub min: u32,
    pub max: u32,
}

impl YouthBand {
    pub const DEFAULT: YouthBand = YouthBand { min: 18, max: 35 };

    pub fn new(min: u32, max: u32) -> anyhow::Result<Self> {
        anyhow::ensure!(min <= max, "invalid youth band: min age {min} exceeds max age {max}");
        Ok(Self { min, max })
    }

    pub fn contains(&self, age: u32) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

impl Default for YouthBand {
    fn default() -> Self {
        Self::DEFAULT
    }
}
