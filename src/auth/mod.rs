//! Login detection and handling for AWS Cognito hosted UIs

mod cognito;

pub use cognito::{
    handle_login, is_cognito_url, Credentials, COGNITO_URL_MARKERS, MANUAL_LOGIN_GRACE,
};
