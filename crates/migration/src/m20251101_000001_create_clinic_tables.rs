use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

use crate::rls::{disable_rls_sql, enable_rls_sql, RlsCommand, RlsPolicy, RlsRole};

#[derive(DeriveIden)]
enum Doctors {
    Table,
    Id,
    Name,
    DoctorExpertise,
    DoctorInfo,
    Image,
    AvailableDays,
    AvailableTimes,
}

#[derive(DeriveIden)]
enum Appointments {
    Table,
    Id,
    UserId,
    FirstName,
    LastName,
    Email,
    Appointments,
    Version,
    CreatedAt,
}

const OWNER_COMMANDS: [RlsCommand; 4] = [
    RlsCommand::Select,
    RlsCommand::Insert,
    RlsCommand::Update,
    RlsCommand::Delete,
];

fn doctors_read_policy() -> RlsPolicy {
    RlsPolicy {
        name: "doctors readable by everyone".to_string(),
        table: "doctors".to_string(),
        command: RlsCommand::Select,
        role: RlsRole::Public,
        using: Some("true".to_string()),
        check: None,
        schema: None,
    }
}

fn policies() -> Vec<RlsPolicy> {
    let mut policies: Vec<RlsPolicy> = OWNER_COMMANDS
        .iter()
        .map(|command| RlsPolicy::owner_only("appointments", *command, "user_id"))
        .collect();
    policies.push(doctors_read_policy());
    policies
}

// Policies go first, then RLS is switched off before the tables are dropped.
fn teardown_sql() -> Vec<String> {
    let mut statements: Vec<String> = policies().iter().map(RlsPolicy::drop_policy_sql).collect();
    statements.extend(["appointments", "doctors"].map(|table| disable_rls_sql(table, None)));
    statements
}

fn empty_json_array() -> SimpleExpr {
    Expr::cust("'[]'::jsonb")
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Doctors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Doctors::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Doctors::Name).text().not_null())
                    .col(ColumnDef::new(Doctors::DoctorExpertise).text().not_null())
                    .col(ColumnDef::new(Doctors::DoctorInfo).text())
                    .col(ColumnDef::new(Doctors::Image).text())
                    .col(
                        ColumnDef::new(Doctors::AvailableDays)
                            .json_binary()
                            .not_null()
                            .default(empty_json_array()),
                    )
                    .col(
                        ColumnDef::new(Doctors::AvailableTimes)
                            .json_binary()
                            .not_null()
                            .default(empty_json_array()),
                    )
                    .to_owned(),
            )
            .await?;

        // One record per user: the unique key is what the client's upsert
        // resolves against.
        manager
            .create_table(
                Table::create()
                    .table(Appointments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Appointments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Appointments::UserId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Appointments::FirstName).text())
                    .col(ColumnDef::new(Appointments::LastName).text())
                    .col(ColumnDef::new(Appointments::Email).text())
                    .col(
                        ColumnDef::new(Appointments::Appointments)
                            .json_binary()
                            .not_null()
                            .default(empty_json_array()),
                    )
                    .col(
                        ColumnDef::new(Appointments::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Appointments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();
        db.execute_unprepared(&enable_rls_sql("appointments", None))
            .await?;
        db.execute_unprepared(&enable_rls_sql("doctors", None))
            .await?;
        for policy in policies() {
            db.execute_unprepared(&policy.create_policy_sql()).await?;
            println!(" -> RLS policy '{}' created.", policy.name);
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for sql in teardown_sql() {
            db.execute_unprepared(&sql).await?;
        }

        manager
            .drop_table(Table::drop().table(Appointments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Doctors::Table).to_owned())
            .await
    }
}
