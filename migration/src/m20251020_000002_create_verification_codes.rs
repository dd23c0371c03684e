use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum VerificationCodes {
    Table,
    Id,
    Phone,
    Code,
    Scene,
    ExpiresAt,
    Used,
    CreatedAt,
}

/// 同一 (phone, scene) 至多一条记录
fn phone_scene_index() -> IndexCreateStatement {
    Index::create()
        .name("idx_verification_codes_phone_scene")
        .table(VerificationCodes::Table)
        .col(VerificationCodes::Phone)
        .col(VerificationCodes::Scene)
        .unique()
        .if_not_exists()
        .to_owned()
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VerificationCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VerificationCodes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VerificationCodes::Phone)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(VerificationCodes::Code).string_len(6).not_null())
                    .col(
                        ColumnDef::new(VerificationCodes::Scene)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationCodes::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationCodes::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(VerificationCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager.create_index(phone_scene_index()).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(VerificationCodes::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
