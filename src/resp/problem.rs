use std::fmt::{Display, Formatter};
use std::io::Cursor;

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,
    pub instance_uri: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            instance_uri: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn instance_uri(&mut self, value: String) -> &mut Problem {
        self.instance_uri = Some(value);
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    fn into_json(self) -> Map<String, Value> {
        let mut body = self.body;

        body.insert(String::from("type"), Value::from(self.type_uri));
        body.insert(String::from("title"), Value::from(self.title));

        if let Some(detail) = self.detail {
            body.insert(String::from("detail"), Value::from(detail));
        }
        body.insert(String::from("status"), Value::from(self.status.code));
        if let Some(instance) = self.instance_uri {
            body.insert(String::from("instance"), Value::from(instance));
        }

        body
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status;
        let mut problem = self;
        if problem.instance_uri.is_none() {
            problem.instance_uri(req.uri().path().to_string());
        }

        let body_string = Value::Object(problem.into_json()).to_string();

        Response::build()
            .status(status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header("Content-Language", "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

/// Storage failures. Nothing about the database is leaked beyond a short detail line.
impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        let (status, detail) = match e.kind.as_ref() {
            ErrorKind::Authentication { .. } | ErrorKind::ServerSelection { .. } => (
                Status::ServiceUnavailable,
                "The video library can't be reached right now.",
            ),
            ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => (
                Status::InternalServerError,
                "A stored record couldn't be read or written.",
            ),
            ErrorKind::Io(_) | ErrorKind::Write(_) => (
                Status::InternalServerError,
                "Saving failed, your changes might not have been stored.",
            ),
            _ => (
                Status::InternalServerError,
                "The video library failed to process the request.",
            ),
        };

        Problem::new_untyped(status, "Unable to access storage.")
            .detail(detail)
            .to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_carries_rfc7807_members() {
        let problem = Problem::new_untyped(Status::NotFound, "Resource doesn't exist.")
            .insert_str("kind", "video")
            .detail("gone")
            .to_owned();

        let json = problem.into_json();
        assert_eq!(json["type"], "about:blank");
        assert_eq!(json["title"], "Resource doesn't exist.");
        assert_eq!(json["status"], 404);
        assert_eq!(json["detail"], "gone");
        assert_eq!(json["kind"], "video");
        assert!(json.get("instance").is_none());
    }

    #[test]
    fn storage_io_failure_is_a_server_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let problem = Problem::from(mongodb::error::Error::from(io));

        assert_eq!(problem.status, Status::InternalServerError);
        assert_eq!(problem.title, "Unable to access storage.");
        assert!(problem.detail.is_some());
    }
}
