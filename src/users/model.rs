use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::eligibility::{compute_age, YouthBand};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
    strum::EnumString, strum::Display, strum::VariantNames,
)]
#[sqlx(type_name = "gender", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
    strum::EnumString, strum::Display, strum::VariantNames,
)]
#[sqlx(type_name = "education_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EducationLevel {
    None,
    Primary,
    Secondary,
    Certificate,
    Diploma,
    Bachelors,
    Masters,
    Phd,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
    strum::EnumString, strum::Display, strum::VariantNames,
)]
#[sqlx(type_name = "employment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmploymentStatus {
    Employed,
    Unemployed,
    SelfEmployed,
    Student,
}

/// Optional profile attributes. Used both as the stored profile and as a
/// partial update, where `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<Date>,
    pub gender: Option<Gender>,
    pub county: Option<String>,
    pub sub_county: Option<String>,
    pub education_level: Option<EducationLevel>,
    pub employment_status: Option<EmploymentStatus>,
}

impl Profile {
    pub const FIELD_COUNT: usize = 9;

    pub fn merge(&mut self, changes: Profile) {
        let Profile {
            first_name,
            last_name,
            phone_number,
            date_of_birth,
            gender,
            county,
            sub_county,
            education_level,
            employment_status,
        } = changes;
        if first_name.is_some() {
            self.first_name = first_name;
        }
        if last_name.is_some() {
            self.last_name = last_name;
        }
        if phone_number.is_some() {
            self.phone_number = phone_number;
        }
        if date_of_birth.is_some() {
            self.date_of_birth = date_of_birth;
        }
        if gender.is_some() {
            self.gender = gender;
        }
        if county.is_some() {
            self.county = county;
        }
        if sub_county.is_some() {
            self.sub_county = sub_county;
        }
        if education_level.is_some() {
            self.education_level = education_level;
        }
        if employment_status.is_some() {
            self.employment_status = employment_status;
        }
    }

    fn populated_fields(&self) -> usize {
        fn text(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        [
            text(&self.first_name),
            text(&self.last_name),
            text(&self.phone_number),
            self.date_of_birth.is_some(),
            self.gender.is_some(),
            text(&self.county),
            text(&self.sub_county),
            self.education_level.is_some(),
            self.employment_status.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// Share of profile fields that hold a value, 0..=100, rounded down.
    pub fn completion_percentage(&self) -> u8 {
        (self.populated_fields() * 100 / Self::FIELD_COUNT) as u8
    }
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string
    #[sqlx(flatten)]
    pub profile: Profile,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// `None` when no date of birth is on file.
    pub fn age_on(&self, today: Date) -> Option<u32> {
        let dob = self.profile.date_of_birth?;
        compute_age(dob, today).ok()
    }

    pub fn is_youth_on(&self, today: Date, band: &YouthBand) -> bool {
        self.age_on(today).is_some_and(|age| band.contains(age))
    }

    pub fn profile_completion_percentage(&self) -> u8 {
        self.profile.completion_percentage()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.profile.first_name.as_deref().unwrap_or_default(),
            self.profile.last_name.as_deref().unwrap_or_default(),
            self.username
        )
    }
}

/// Insert payload; the id is chosen by the caller so tokens can be signed
/// before anything is written.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
}

#[cfg(test)]
pub(crate) fn sample_user(username: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        username: username.into(),
        email: format!("{username}@example.com"),
        password_hash: String::new(),
        profile: Profile::default(),
        created_at: now,
        updated_at: now,
    }
}
