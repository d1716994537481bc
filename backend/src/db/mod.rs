pub mod entities;
pub mod enums;
pub mod schema;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};

    /// A private in-memory database with the full schema. One connection, so
    /// every query of a test sees the same memory database.
    pub async fn memory_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.expect("connect sqlite memory db");
        super::schema::ensure_schema(&db).await.expect("create schema");
        db
    }
}
