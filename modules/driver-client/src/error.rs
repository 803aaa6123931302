use thiserror::Error;

use threadwatch_common::DriverError;

pub type Result<T> = std::result::Result<T, DriverClientError>;

#[derive(Debug, Error)]
pub enum DriverClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for DriverClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DriverClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            DriverClientError::Decode(err.to_string())
        } else {
            DriverClientError::Network(err.to_string())
        }
    }
}

impl DriverClientError {
    /// Map onto the engine's driver taxonomy. `call` names the operation.
    pub fn into_driver_error(self, call: &str) -> DriverError {
        match self {
            DriverClientError::Network(m) => DriverError::Transport(m),
            DriverClientError::Timeout(m) => DriverError::Timeout(format!("{call}: {m}")),
            DriverClientError::Decode(message) => DriverError::Evaluation {
                call: call.to_string(),
                message,
            },
            DriverClientError::Api { status: 404, message } if message.contains("session") => {
                DriverError::SessionClosed
            }
            DriverClientError::Api { status: 409, message }
            | DriverClientError::Api { status: 410, message } => DriverError::StaleHandle(message),
            DriverClientError::Api { status, message } if call == "navigate" => {
                DriverError::Navigation(format!("status {status}: {message}"))
            }
            DriverClientError::Api { status, message } => DriverError::Evaluation {
                call: call.to_string(),
                message: format!("status {status}: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_handles_map_to_stale() {
        let err = DriverClientError::Api {
            status: 410,
            message: "handle el-3 detached".into(),
        };
        assert!(matches!(
            err.into_driver_error("click"),
            DriverError::StaleHandle(_)
        ));
    }

    #[test]
    fn missing_session_closes() {
        let err = DriverClientError::Api {
            status: 404,
            message: "no such session".into(),
        };
        assert!(matches!(
            err.into_driver_error("evaluate"),
            DriverError::SessionClosed
        ));
    }

    #[test]
    fn failed_navigation_is_navigation_error() {
        let err = DriverClientError::Api {
            status: 502,
            message: "net::ERR_NAME_NOT_RESOLVED".into(),
        };
        assert!(matches!(
            err.into_driver_error("navigate"),
            DriverError::Navigation(_)
        ));
    }
}
