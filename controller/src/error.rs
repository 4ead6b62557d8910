/// Error taxonomy of the controller. `Transient` failures are retried or
/// slept on; `Operational` failures are fatal at startup and park the
/// reconciler at runtime. Everything else is surfaced to the supervisor,
/// which logs and lets the throttle pace the next attempt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Temporary error: {0}")]
    Transient(String),

    #[error("Operational error: {0}")]
    Operational(String),

    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Database error: {source}")]
    Sql {
        #[from]
        source: sqlx::Error,
    },

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid version: {source}")]
    Version {
        #[from]
        source: semver::Error,
    },
}

impl Error {
    pub fn transient(msg: impl std::fmt::Display) -> Self {
        Error::Transient(msg.to_string())
    }

    pub fn operational(msg: impl std::fmt::Display) -> Self {
        Error::Operational(msg.to_string())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    pub fn is_operational(&self) -> bool {
        matches!(self, Error::Operational(_) | Error::Version { .. })
    }
}
