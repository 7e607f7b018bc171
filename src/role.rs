use rocket::request::FromParam;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The two kinds of accounts. They live in separate collections and never share a session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn collection_name(self) -> &'static str {
        match self {
            Role::Teacher => "teachers",
            Role::Student => "students",
        }
    }

    pub fn login_path(self) -> &'static str {
        match self {
            Role::Teacher => "/auth/login/teacher",
            Role::Student => "/auth/login/student",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Teacher => write!(f, "teacher"),
            Role::Student => write!(f, "student"),
        }
    }
}

impl<'a> FromParam<'a> for Role {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        match param {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_from_path_segments() {
        assert_eq!(Role::from_param("teacher"), Ok(Role::Teacher));
        assert_eq!(Role::from_param("student"), Ok(Role::Student));
        assert_eq!(Role::from_param("admin"), Err("admin"));
        assert_eq!(Role::Student.login_path(), "/auth/login/student");
    }
}
