use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use strum::VariantNames;
use time::{macros::format_description, Date};

use crate::auth::dto::{ProfileInput, RegisterRequest};
use crate::error::FieldErrors;
use crate::users::{eligibility::compute_age, EducationLevel, EmploymentStatus, Gender, Profile};

const REQUIRED: &str = "This field is required.";
const MIN_PASSWORD_LEN: usize = 8;

// Column widths in migrations/0001_create_users.sql.
const EMAIL_MAX_LEN: usize = 254;
const NAME_MAX_LEN: usize = 150;
const REGION_MAX_LEN: usize = 100;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]{3,150}$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{9,15}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Registration payload that passed every local check. Uniqueness is still
/// up to the store.
#[derive(Debug)]
pub struct ValidRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub profile: Profile,
}

pub fn validate_registration(req: RegisterRequest, today: Date) -> Result<ValidRegistration, FieldErrors> {
    let mut errors = FieldErrors::default();

    let username = req.username.trim().to_string();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else if !USERNAME_RE.is_match(&username) {
        errors.add(
            "username",
            "Enter a valid username of 3 to 150 letters, digits and @/./+/-/_ characters.",
        );
    }

    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        errors.add("email", REQUIRED);
    } else if !is_valid_email(&email) {
        errors.add("email", "Enter a valid email address.");
    } else {
        check_max_len("email", Some(&email), EMAIL_MAX_LEN, &mut errors);
    }

    if req.password.is_empty() {
        errors.add("password", REQUIRED);
    } else if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        );
    }
    if req.password_confirm.is_empty() {
        errors.add("password_confirm", REQUIRED);
    } else if req.password != req.password_confirm {
        errors.add("password_confirm", "Passwords do not match.");
    }

    let profile = validate_profile(req.profile, today, &mut errors);

    if errors.is_empty() {
        Ok(ValidRegistration {
            username,
            email,
            password: req.password,
            profile,
        })
    } else {
        Err(errors)
    }
}

/// Normalises and checks profile input, recording problems in `errors`.
/// Blank text becomes `None`.
pub fn validate_profile(input: ProfileInput, today: Date, errors: &mut FieldErrors) -> Profile {
    let phone_number = clean(input.phone_number).map(|p| {
        p.chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect::<String>()
    });
    if let Some(phone) = &phone_number {
        if !PHONE_RE.is_match(phone) {
            errors.add("phone_number", "Enter a valid phone number, e.g. +254712345678.");
        }
    }

    let date_of_birth = clean(input.date_of_birth).and_then(|raw| {
        match Date::parse(&raw, format_description!("[year]-[month]-[day]")) {
            Ok(dob) if compute_age(dob, today).is_ok() => Some(dob),
            Ok(_) => {
                errors.add("date_of_birth", "Date of birth cannot be in the future.");
                None
            }
            Err(_) => {
                errors.add("date_of_birth", "Date has wrong format. Use YYYY-MM-DD.");
                None
            }
        }
    });

    let first_name = clean(input.first_name);
    let last_name = clean(input.last_name);
    let county = clean(input.county);
    let sub_county = clean(input.sub_county);
    check_max_len("first_name", first_name.as_deref(), NAME_MAX_LEN, errors);
    check_max_len("last_name", last_name.as_deref(), NAME_MAX_LEN, errors);
    check_max_len("county", county.as_deref(), REGION_MAX_LEN, errors);
    check_max_len("sub_county", sub_county.as_deref(), REGION_MAX_LEN, errors);

    Profile {
        first_name,
        last_name,
        phone_number,
        date_of_birth,
        gender: parse_choice::<Gender>("gender", input.gender, errors),
        county,
        sub_county,
        education_level: parse_choice::<EducationLevel>("education_level", input.education_level, errors),
        employment_status: parse_choice::<EmploymentStatus>(
            "employment_status",
            input.employment_status,
            errors,
        ),
    }
}

fn check_max_len(field: &str, value: Option<&str>, max: usize, errors: &mut FieldErrors) {
    if value.is_some_and(|v| v.chars().count() > max) {
        errors.add(field, format!("Ensure this field has no more than {max} characters."));
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_choice<T>(field: &str, raw: Option<String>, errors: &mut FieldErrors) -> Option<T>
where
    T: FromStr + VariantNames,
{
    let raw = clean(raw)?;
    match T::from_str(&raw.to_lowercase()) {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(
                field,
                format!(
                    "\"{raw}\" is not a valid choice. Expected one of: {}.",
                    T::VARIANTS.join(", ")
                ),
            );
            None
        }
    }
}
