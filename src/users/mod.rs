pub mod eligibility;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod repo;

pub use model::{EducationLevel, EmploymentStatus, Gender, NewUser, Profile, User};
pub use repo::{PgUserRepository, RepoError, UserRepository};
