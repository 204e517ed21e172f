use std::io::Cursor;

use rocket::http::{ContentType, Status};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{catch, response, Request, Response};
use rocket::response::Responder;
use serde_json::{json, Value};
use snafu::Snafu;

pub type CustomResult<T> = Result<T, Error>;

/// Every failure a registry, ledger or store operation can report.
/// The variant is the machine-readable kind; the message is what the
/// operator consoles display.
#[derive(Debug, Snafu, Clone, PartialEq)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{message}"))]
    ValidationError { message: String },

    #[snafu(display("{message}"))]
    NotFoundError { message: String },

    #[snafu(display("{message}"))]
    InvalidStateError { message: String },

    #[snafu(display("{message}"))]
    ConflictError { message: String },

    #[snafu(display("{message}"))]
    CapacityError { message: String },

    #[snafu(display("{message}"))]
    AuthorizationError { message: String },

    #[snafu(display("failed to access the durable store: {message}"))]
    StoreError { message: String },
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ValidationError { .. } => "validation",
            Error::NotFoundError { .. } => "not-found",
            Error::InvalidStateError { .. } => "invalid-state",
            Error::ConflictError { .. } => "conflict",
            Error::CapacityError { .. } => "capacity",
            Error::AuthorizationError { .. } => "authorization",
            Error::StoreError { .. } => "store",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Error::ValidationError { .. } => Status::BadRequest,
            Error::InvalidStateError { .. } => Status::BadRequest,
            Error::NotFoundError { .. } => Status::NotFound,
            Error::ConflictError { .. } => Status::Conflict,
            Error::CapacityError { .. } => Status::Conflict,
            Error::AuthorizationError { .. } => Status::Unauthorized,
            Error::StoreError { .. } => Status::InternalServerError,
        }
    }
}

/// Render the error as the JSON body the consoles expect:
/// `{"error": "<kind>", "message": "<human readable>"}`.
impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _request: &'r Request<'_>) -> response::Result<'static> {
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        })
        .to_string();

        Response::build()
            .status(self.status())
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

/**************************************************************************************************/
/**************** CATCHERS ************************************************************************/
/**************************************************************************************************/

#[catch(401)]
pub fn unauthorized() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::Unauthorized,
        Json(json!({ "error": "authorization", "message": "Invalid access key" })),
    )
}

#[catch(404)]
pub fn not_found() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::NotFound,
        Json(json!({ "error": "not-found", "message": "Resource not found" })),
    )
}

#[catch(422)]
pub fn unprocessable() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::UnprocessableEntity,
        Json(json!({ "error": "validation", "message": "Malformed request body" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_expected_status_codes() {
        let cases = vec![
            (ValidationSnafu { message: "m" }.build(), Status::BadRequest),
            (NotFoundSnafu { message: "m" }.build(), Status::NotFound),
            (InvalidStateSnafu { message: "m" }.build(), Status::BadRequest),
            (ConflictSnafu { message: "m" }.build(), Status::Conflict),
            (CapacitySnafu { message: "m" }.build(), Status::Conflict),
            (AuthorizationSnafu { message: "m" }.build(), Status::Unauthorized),
            (StoreSnafu { message: "m" }.build(), Status::InternalServerError),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected);
        }
    }

    #[test]
    fn display_carries_the_message() {
        let error = ConflictSnafu { message: "Car number must be unique" }.build();
        assert_eq!(error.to_string(), "Car number must be unique");
        assert_eq!(error.kind(), "conflict");
    }
}
