use thiserror::Error;

/// Driver message some stores report once the session has been torn down.
pub const CONN_CLOSED_MESSAGE: &str = "No operations allowed";

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Low‐level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Postgres error: {0}")]
    PgError(#[from] tokio_postgres::Error),

    #[error("MySQL error: {0}")]
    MySqlError(#[from] mysql_async::Error),

    /// The session is gone; nothing issued on it can succeed.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Store metadata was missing or malformed.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A value could not be converted for the target column.
    #[error("Bind error: {0}")]
    Bind(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DbError {
    /// True when the failure means the underlying session is unusable.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            DbError::ConnectionClosed(_) => true,
            DbError::PgError(err) => err.is_closed() || mentions_closed(&err.to_string()),
            DbError::MySqlError(err) => match err {
                mysql_async::Error::Io(_) => true,
                mysql_async::Error::Driver(mysql_async::DriverError::ConnectionClosed) => true,
                other => mentions_closed(&other.to_string()),
            },
            DbError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
            ),
            DbError::Metadata(_) | DbError::Bind(_) => false,
            DbError::Unknown(msg) => mentions_closed(msg),
        }
    }
}

fn mentions_closed(message: &str) -> bool {
    message.contains(CONN_CLOSED_MESSAGE)
}

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported database kind: {0}")]
    UnsupportedKind(String),

    #[error("Postgres connection failed: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("MySQL connection failed: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_closed_detection() {
        assert!(DbError::ConnectionClosed("socket reset".into()).is_connection_closed());
        assert!(
            DbError::Unknown("No operations allowed after connection closed.".into())
                .is_connection_closed()
        );
        assert!(
            DbError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
                .is_connection_closed()
        );
        assert!(!DbError::Bind("bad date".into()).is_connection_closed());
        assert!(!DbError::Unknown("duplicate key".into()).is_connection_closed());
    }
}
