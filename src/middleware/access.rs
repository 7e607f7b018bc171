use rocket::http::uri::Origin;
use uuid::Uuid;

use crate::error::AppError;
use crate::role::Role;
use crate::session::{Identity, Session};

/// Admits teacher sessions. Anyone else has the requested path recorded and is sent to the
/// teacher login form.
pub fn require_teacher(session: &Session<'_>, origin: &Origin<'_>) -> Result<Uuid, AppError> {
    match session.identity().teacher_id() {
        Some(id) => Ok(id),
        None => {
            session.remember_path(origin.to_string());
            Err(AppError::Unauthenticated {
                role: Role::Teacher,
            })
        }
    }
}

/// Admits either role. Anonymous visitors are sent to the student login form and come back
/// here after signing in.
pub fn require_viewer(session: &Session<'_>, origin: &Origin<'_>) -> Result<Identity, AppError> {
    match session.identity() {
        Identity::Anonymous => {
            session.remember_path(origin.to_string());
            Err(AppError::Unauthenticated {
                role: Role::Student,
            })
        }
        signed_in => Ok(signed_in),
    }
}
