use crate::sql::{
    base::{
        connection::{ConnectionFactory, Credentials, DatabaseKind, SqlConnection},
        error::ConnectorError,
    },
    mysql::connection::MySqlConnection,
    postgres::connection::PgConnection,
};
use async_trait::async_trait;
use tracing::info;

/// Opens real driver sessions: `tokio-postgres` for Postgres and
/// `mysql_async` for MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverConnectionFactory;

#[async_trait]
impl ConnectionFactory for DriverConnectionFactory {
    async fn connect(
        &self,
        kind: DatabaseKind,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn SqlConnection>, ConnectorError> {
        info!(%kind, "Opening database connection");
        match kind {
            DatabaseKind::Postgres => {
                let conn = PgConnection::connect(url, credentials).await?;
                Ok(Box::new(conn))
            }
            DatabaseKind::MySql => {
                let conn = MySqlConnection::connect(url, credentials).await?;
                Ok(Box::new(conn))
            }
        }
    }
}
