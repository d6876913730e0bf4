use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One snapshot row per participant, replaced wholesale on update
        manager
            .create_table(
                Table::create()
                    .table(CatalogSnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CatalogSnapshots::ParticipantId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CatalogSnapshots::Offers).json().not_null())
                    .col(ColumnDef::new(CatalogSnapshots::ContentHash).string().not_null())
                    .col(
                        ColumnDef::new(CatalogSnapshots::ProtocolVersion)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CatalogSnapshots::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CatalogSnapshots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CatalogSnapshots::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CatalogSnapshots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CatalogSnapshots {
    Table,
    ParticipantId,
    Offers,
    ContentHash,
    ProtocolVersion,
    FetchedAt,
    CreatedAt,
    UpdatedAt,
}
