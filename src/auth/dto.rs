use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::auth::jwt::TokenPair;
use crate::users::{eligibility::YouthBand, EducationLevel, EmploymentStatus, Gender, User};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Profile fields as sent by clients. Enum-like values and the date stay raw
/// here so a bad value becomes a field error instead of a body rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub county: Option<String>,
    pub sub_county: Option<String>,
    pub education_level: Option<String>,
    pub employment_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(flatten)]
    pub profile: ProfileInput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    #[serde(with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub gender: Option<Gender>,
    pub county: Option<String>,
    pub sub_county: Option<String>,
    pub education_level: Option<EducationLevel>,
    pub employment_status: Option<EmploymentStatus>,
    pub age: Option<u32>,
    pub is_youth: bool,
    pub profile_completion_percentage: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ProfileResponse {
    pub fn from_user(user: User, today: Date, band: &YouthBand) -> Self {
        let age = user.age_on(today);
        let is_youth = user.is_youth_on(today, band);
        let profile_completion_percentage = user.profile_completion_percentage();
        let display_name = user.to_string();
        let profile = user.profile;
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name,
            first_name: profile.first_name,
            last_name: profile.last_name,
            phone_number: profile.phone_number,
            date_of_birth: profile.date_of_birth,
            gender: profile.gender,
            county: profile.county,
            sub_county: profile.sub_county,
            education_level: profile.education_level,
            employment_status: profile.employment_status,
            age,
            is_youth,
            profile_completion_percentage,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: ProfileResponse,
    pub tokens: TokenPair,
}
