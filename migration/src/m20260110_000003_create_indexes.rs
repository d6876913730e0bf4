use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Index for the scheduler's due scan: enabled idle targets by eligibility
        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_targets_state_next_eligible_at")
                    .table(CrawlTargets::Table)
                    .col(CrawlTargets::State)
                    .col(CrawlTargets::NextEligibleAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_targets_enabled")
                    .table(CrawlTargets::Table)
                    .col(CrawlTargets::Enabled)
                    .to_owned(),
            )
            .await?;

        // Listing follows registration order
        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_targets_seq")
                    .table(CrawlTargets::Table)
                    .col(CrawlTargets::Seq)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_crawl_targets_state_next_eligible_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_crawl_targets_enabled").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_crawl_targets_seq").to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum CrawlTargets {
    Table,
    State,
    NextEligibleAt,
    Enabled,
    Seq,
}
