use std::path::PathBuf;

use rocket::http::Status;
use rocket::response::{self, Redirect, Responder};
use rocket::Request;
use thiserror::Error;

use crate::resp::problem::Problem;
use crate::role::Role;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unable to prepare media directory: {0}")]
    Media(#[from] std::io::Error),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index (username or email) rejected the write.
    #[error("a record with the same unique key already exists")]
    Duplicate,
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

#[derive(Debug, Error)]
#[error("unable to hash password: {0}")]
pub struct CredentialError(pub String);

/// Request level failures. Every handler returns these and Rocket turns them into either a
/// redirect to a login form or a problem document.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{field} '{value}' is already registered")]
    DuplicateIdentity { field: &'static str, value: String },
    #[error("bad {role} credentials")]
    AuthenticationFailure { role: Role },
    #[error("signing in as {role} is required")]
    Unauthenticated { role: Role },
    #[error("{kind} '{id}' doesn't exist")]
    NotFound { kind: &'static str, id: String },
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("invalid {field}: {detail}")]
    Validation { field: &'static str, detail: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> AppError {
        AppError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, detail: impl ToString) -> AppError {
        AppError::Validation {
            field,
            detail: detail.to_string(),
        }
    }

    /// Where the client is sent instead of receiving a problem document.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            AppError::AuthenticationFailure { role } | AppError::Unauthenticated { role } => {
                Some(role.login_path())
            }
            _ => None,
        }
    }
}

impl From<AppError> for Problem {
    fn from(e: AppError) -> Self {
        match e {
            AppError::DuplicateIdentity { field, value } => {
                Problem::new_untyped(Status::Conflict, "Identity already registered.")
                    .insert_str(field, value)
                    .detail(format!("This {} is already taken.", field))
                    .to_owned()
            }
            AppError::NotFound { kind, id } => {
                Problem::new_untyped(Status::NotFound, "Resource doesn't exist.")
                    .insert_str("kind", kind)
                    .insert_str("id", id)
                    .to_owned()
            }
            AppError::Upload(detail) => Problem::new_untyped(Status::BadRequest, "Upload failed.")
                .detail(detail)
                .to_owned(),
            AppError::Validation { field, detail } => {
                Problem::new_untyped(Status::UnprocessableEntity, "Invalid request data.")
                    .insert_str("field", field)
                    .detail(detail)
                    .to_owned()
            }
            AppError::Store(StoreError::Mongo(e)) => Problem::from(e),
            AppError::Store(other) => {
                Problem::new_untyped(Status::InternalServerError, "Unable to access storage.")
                    .detail(other)
                    .to_owned()
            }
            AppError::Credential(_) => Problem::new_untyped(
                Status::InternalServerError,
                "Unable to process credentials.",
            ),
            AppError::AuthenticationFailure { .. } | AppError::Unauthenticated { .. } => {
                Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.")
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        if let Some(target) = self.redirect_target() {
            tracing::debug!("{}, redirecting to {}", self, target);
            return Redirect::to(target).respond_to(req);
        }

        match &self {
            AppError::Store(_) | AppError::Credential(_) => {
                tracing::error!("request to {} failed: {}", req.uri(), self)
            }
            _ => tracing::debug!("request to {} rejected: {}", req.uri(), self),
        }

        Problem::from(self).respond_to(req)
    }
}
