use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create crawl targets table
        manager
            .create_table(
                Table::create()
                    .table(CrawlTargets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrawlTargets::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CrawlTargets::Name).string().not_null())
                    .col(
                        ColumnDef::new(CrawlTargets::Url)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(CrawlTargets::ParticipantId).string().not_null())
                    .col(ColumnDef::new(CrawlTargets::ProtocolVersion).string().not_null())
                    .col(ColumnDef::new(CrawlTargets::IntervalSecs).big_integer().not_null())
                    .col(
                        ColumnDef::new(CrawlTargets::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(CrawlTargets::State).string().not_null())
                    .col(
                        ColumnDef::new(CrawlTargets::ConsecutiveFailures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(CrawlTargets::LastAttemptAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(CrawlTargets::LastSuccessAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(CrawlTargets::NextEligibleAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(CrawlTargets::Seq).big_integer().not_null())
                    .col(
                        ColumnDef::new(CrawlTargets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CrawlTargets::UpdatedAt)
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
            .drop_table(Table::drop().table(CrawlTargets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CrawlTargets {
    Table,
    Id,
    Name,
    Url,
    ParticipantId,
    ProtocolVersion,
    IntervalSecs,
    Enabled,
    State,
    ConsecutiveFailures,
    LastAttemptAt,
    LastSuccessAt,
    NextEligibleAt,
    Seq,
    CreatedAt,
    UpdatedAt,
}
