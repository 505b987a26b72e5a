pub use sea_orm_migration::prelude::*;

mod m20251101_000001_create_clinic_tables;

// RLS ポリシー用のユーティリティ
pub mod rls;

pub use rls::{disable_rls_sql, enable_rls_sql, RlsCommand, RlsPolicy, RlsRole};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20251101_000001_create_clinic_tables::Migration)]
    }
}
