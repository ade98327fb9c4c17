use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::storage::{StoreError, UserRepository};
use crate::users::dto::{CreateUserRequest, UpdateUserRequest};
use crate::users::repo_types::{Metadata, User};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("name must only contain alphabetic characters")]
    InvalidName,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ServiceError::NotFound,
            other => ServiceError::Storage(other),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Letters and inner spaces only ("Ann", "Mary Ann", "José").
pub(crate) fn is_valid_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name.chars().all(|c| c.is_alphabetic() || c == ' ')
}

fn validate(name: &str, email: &str) -> Result<(), ServiceError> {
    if !is_valid_name(name) {
        return Err(ServiceError::InvalidName);
    }
    if !is_valid_email(email) {
        return Err(ServiceError::InvalidEmail);
    }
    Ok(())
}

pub async fn list_users(repo: &dyn UserRepository) -> Result<Vec<User>, ServiceError> {
    Ok(repo.get_all().await?)
}

pub async fn get_user(repo: &dyn UserRepository, id: &str) -> Result<User, ServiceError> {
    Ok(repo.get_by_id(id).await?)
}

/// Validates the request and stores a new user under a fresh UUID.
///
/// Generated ids are what keeps stored ids unique; the repositories do not check.
pub async fn create_user(
    repo: &dyn UserRepository,
    actor: &str,
    req: CreateUserRequest,
) -> Result<User, ServiceError> {
    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();
    validate(name, &email)?;

    let user = User::new(
        Uuid::new_v4().to_string(),
        name,
        email,
        Metadata::created(OffsetDateTime::now_utc(), actor),
    );
    repo.create(user.clone()).await?;

    info!(user_id = %user.id, "user created");
    Ok(user)
}

/// Applies the new name/email and returns the stored result.
pub async fn update_user(
    repo: &dyn UserRepository,
    id: &str,
    req: UpdateUserRequest,
) -> Result<User, ServiceError> {
    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();
    validate(name, &email)?;

    repo.update(id, name, &email).await?;
    debug!(user_id = %id, "user updated");
    Ok(repo.get_by_id(id).await?)
}

pub async fn delete_user(repo: &dyn UserRepository, id: &str) -> Result<(), ServiceError> {
    repo.delete(id).await?;
    info!(user_id = %id, "user deleted");
    Ok(())
}
