use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Monthly per-product projection of working_demand, always rebuilt in full.
        manager
            .create_table(
                Table::create()
                    .table(ForecastAggregate::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ForecastAggregate::Period).date().not_null())
                    .col(
                        ColumnDef::new(ForecastAggregate::ProductId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ForecastAggregate::ProductName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ForecastAggregate::Quantity)
                            .double()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ForecastAggregate::Period)
                            .col(ForecastAggregate::ProductId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ForecastAggregate::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ForecastAggregate {
    Table,
    Period,
    ProductId,
    ProductName,
    Quantity,
}
