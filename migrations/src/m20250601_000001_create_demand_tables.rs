use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Both tables share one shape: original_demand is the ingestion copy,
        // working_demand is the copy bulk adjustments mutate.
        manager
            .create_table(demand_table(OriginalDemand::Table))
            .await?;
        manager
            .create_table(demand_table(WorkingDemand::Table))
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_working_demand_product_date")
                    .table(WorkingDemand::Table)
                    .col(Demand::ProductId)
                    .col(Demand::DemandDate)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_working_demand_customer")
                    .table(WorkingDemand::Table)
                    .col(Demand::CustomerId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkingDemand::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(OriginalDemand::Table).to_owned())
            .await
    }
}

fn demand_table<T>(table: T) -> TableCreateStatement
where
    T: IntoTableRef,
{
    Table::create()
        .table(table)
        .if_not_exists()
        .col(
            ColumnDef::new(Demand::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(Demand::DemandDate)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(Demand::ProductId).string().not_null())
        .col(ColumnDef::new(Demand::ProductName).string().not_null())
        .col(ColumnDef::new(Demand::CustomerId).string().not_null())
        .col(ColumnDef::new(Demand::CustomerName).string().not_null())
        .col(ColumnDef::new(Demand::Quantity).double().not_null())
        .col(
            ColumnDef::new(Demand::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(Demand::ModifiedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned()
}

#[derive(DeriveIden)]
enum OriginalDemand {
    Table,
}

#[derive(DeriveIden)]
enum WorkingDemand {
    Table,
}

#[derive(DeriveIden)]
enum Demand {
    Id,
    DemandDate,
    ProductId,
    ProductName,
    CustomerId,
    CustomerName,
    Quantity,
    CreatedAt,
    ModifiedAt,
}
