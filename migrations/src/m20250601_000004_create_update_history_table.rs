use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only audit log of committed bulk adjustments
        manager
            .create_table(
                Table::create()
                    .table(UpdateHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UpdateHistory::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UpdateHistory::MonthYear).string().null())
                    .col(ColumnDef::new(UpdateHistory::ProductId).string().null())
                    .col(ColumnDef::new(UpdateHistory::CustomerId).string().null())
                    .col(
                        ColumnDef::new(UpdateHistory::Percentage)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UpdateHistory::Description).text().not_null())
                    .col(
                        ColumnDef::new(UpdateHistory::RecordsAffected)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpdateHistory::ChangeSummary)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpdateHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_update_history_created_at")
                    .table(UpdateHistory::Table)
                    .col(UpdateHistory::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UpdateHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UpdateHistory {
    Table,
    Id,
    MonthYear,
    ProductId,
    CustomerId,
    Percentage,
    Description,
    RecordsAffected,
    ChangeSummary,
    CreatedAt,
}
