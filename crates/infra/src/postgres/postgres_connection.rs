use anyhow::Result;
use diesel::{
    Connection, PgConnection,
    connection::{CacheSize, SimpleConnection},
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
};

/// Runs on every checkout: no prepared statement cache (pgbouncer in
/// transaction mode) and a server-side cap on statement duration.
#[derive(Debug)]
struct BillingConnectionSetup {
    statement_timeout_ms: u64,
}

impl CustomizeConnection<PgConnection, R2d2Error> for BillingConnectionSetup {
    fn on_acquire(&self, conn: &mut PgConnection) -> std::result::Result<(), R2d2Error> {
        conn.set_prepared_statement_cache_size(CacheSize::Disabled);
        if self.statement_timeout_ms > 0 {
            conn.batch_execute(&format!(
                "SET statement_timeout = {}",
                self.statement_timeout_ms
            ))
            .map_err(R2d2Error::QueryError)?;
        }
        Ok(())
    }
}

pub type PgPoolSquad = Pool<ConnectionManager<PgConnection>>;

pub fn establish_connection(database_url: &str, statement_timeout_ms: u64) -> Result<PgPoolSquad> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .connection_customizer(Box::new(BillingConnectionSetup {
            statement_timeout_ms,
        }))
        .build(manager)?;
    Ok(pool)
}
