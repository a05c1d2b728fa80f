use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{NewUser, Profile, User};

const USERNAME_UNIQUE: &str = "users_username_key";
const EMAIL_UNIQUE: &str = "users_email_key";

const USER_COLUMNS: &str = r#"
    id, username, email, password_hash,
    first_name, last_name, phone_number, date_of_birth, gender,
    county, sub_county, education_level, employment_status,
    created_at, updated_at
"#;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    /// Inserts the user in one statement; uniqueness is decided by the store.
    async fn create(&self, new_user: NewUser) -> Result<User, RepoError>;
    /// Applies the provided profile fields; `Ok(None)` when the user is gone.
    async fn update_profile(&self, id: Uuid, changes: Profile) -> Result<Option<User>, RepoError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.find_one("email", email).await
    }

    async fn create(&self, new_user: NewUser) -> Result<User, RepoError> {
        let NewUser {
            id,
            username,
            email,
            password_hash,
            profile,
        } = new_user;
        let sql = format!(
            r#"
            INSERT INTO users (
                id, username, email, password_hash,
                first_name, last_name, phone_number, date_of_birth, gender,
                county, sub_county, education_level, employment_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .bind(profile.first_name)
            .bind(profile.last_name)
            .bind(profile.phone_number)
            .bind(profile.date_of_birth)
            .bind(profile.gender)
            .bind(profile.county)
            .bind(profile.sub_county)
            .bind(profile.education_level)
            .bind(profile.employment_status)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique_violation)
    }

    async fn update_profile(&self, id: Uuid, changes: Profile) -> Result<Option<User>, RepoError> {
        let sql = format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone_number = COALESCE($4, phone_number),
                date_of_birth = COALESCE($5, date_of_birth),
                gender = COALESCE($6, gender),
                county = COALESCE($7, county),
                sub_county = COALESCE($8, sub_county),
                education_level = COALESCE($9, education_level),
                employment_status = COALESCE($10, employment_status),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.first_name)
            .bind(changes.last_name)
            .bind(changes.phone_number)
            .bind(changes.date_of_birth)
            .bind(changes.gender)
            .bind(changes.county)
            .bind(changes.sub_county)
            .bind(changes.education_level)
            .bind(changes.employment_status)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

fn map_unique_violation(err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(USERNAME_UNIQUE) => return RepoError::DuplicateUsername,
                Some(EMAIL_UNIQUE) => return RepoError::DuplicateEmail,
                _ => {}
            }
        }
    }
    RepoError::Database(err)
}
