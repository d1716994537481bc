//! Table bootstrap for fresh databases and the test suite.

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::debug;

use crate::db::entities::{license, portable_grant, router, sale_event, session, voucher};

/// Creates every table, column index and unique key the services rely on.
/// Safe to call on every start-up.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, router::Entity).await?;
    create_table(db, &schema, license::Entity).await?;
    create_table(db, &schema, portable_grant::Entity).await?;
    create_table(db, &schema, session::Entity).await?;
    create_table(db, &schema, sale_event::Entity).await?;
    create_table(db, &schema, voucher::Entity).await?;

    // One grant per (scope, client): the basis of single-writer semantics.
    create_index(
        db,
        Index::create()
            .name("uq_portable_grants_scope_client")
            .table(portable_grant::Entity)
            .col(portable_grant::Column::ScopeId)
            .col(portable_grant::Column::ClientKey)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    create_index(
        db,
        Index::create()
            .name("uq_vouchers_router_code")
            .table(voucher::Entity)
            .col(voucher::Column::RouterId)
            .col(voucher::Column::Code)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    create_index(
        db,
        Index::create()
            .name("idx_sessions_router_status")
            .table(session::Entity)
            .col(session::Column::RouterId)
            .col(session::Column::Status)
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    debug!("Database schema is up to date.");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut table = schema.create_table_from_entity(entity);
    db.execute(backend.build(table.if_not_exists())).await?;

    for mut index in schema.create_index_from_entity(entity) {
        db.execute(backend.build(index.if_not_exists())).await?;
    }
    Ok(())
}

async fn create_index(db: &DatabaseConnection, index: IndexCreateStatement) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(backend.build(&index)).await?;
    Ok(())
}
