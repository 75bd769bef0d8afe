use thiserror::Error;

pub type QnResult<T> = Result<T, QnError>;

#[derive(Error, Debug)]
pub enum QnError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
