use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Email already exists")]
    EmailAlreadyExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Either email format is invalid or password length is less than 8")]
    InvalidEmailOrPassword,
    #[error("Password length is less than 8")]
    PasswordTooShort,
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Reset token is invalid or has expired")]
    InvalidResetToken,
    #[error("Google sign-in is not configured")]
    OAuthUnavailable,
    #[error("Too many requests from this IP, please try again later.")]
    TooManyRequests,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::EmailAlreadyExists => StatusCode::CONFLICT,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::InvalidEmailOrPassword => StatusCode::BAD_REQUEST,
            Error::PasswordTooShort => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::SessionNotFound => StatusCode::NOT_FOUND,
            Error::InvalidResetToken => StatusCode::BAD_REQUEST,
            Error::OAuthUnavailable => StatusCode::NOT_FOUND,
            Error::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn into_response_tuple(self) -> (StatusCode, String) {
        (self.status_code(), self.to_string())
    }
}
