use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<Error>() {
            Some(e) if e.is_input_error() => StatusCode::BAD_REQUEST,
            Some(Error::DatabaseNotFound(_)) => StatusCode::NOT_FOUND,
            Some(Error::NotLoaded) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), format!("Something went wrong: {}", self.0)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Error::NoImages(PathBuf::from("empty")), StatusCode::BAD_REQUEST)]
    #[case(Error::ImageDecode("bad".into()), StatusCode::BAD_REQUEST)]
    #[case(Error::InvalidName("../x".into()), StatusCode::BAD_REQUEST)]
    #[case(Error::DatabaseNotFound(PathBuf::from("db")), StatusCode::NOT_FOUND)]
    #[case(Error::NotLoaded, StatusCode::CONFLICT)]
    #[case(Error::Inconsistent { names: 1, rows: 2 }, StatusCode::INTERNAL_SERVER_ERROR)]
    fn error_status(#[case] err: Error, #[case] status: StatusCode) {
        assert_eq!(AppError::from(err).status(), status);
    }

    #[test]
    fn foreign_error_is_internal() {
        let err = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
