use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductParameters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductParameters::ProductId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProductParameters::ProductName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductParameters::Cost).double().not_null())
                    .col(
                        ColumnDef::new(ProductParameters::LeadTimeMonths)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductParameters::OrderingCost)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductParameters::HoldingCost)
                            .double()
                            .not_null(),
                    )
                    // eoq, rop and ss are NULL when the inputs make them undefined
                    .col(ColumnDef::new(ProductParameters::Eoq).double().null())
                    .col(ColumnDef::new(ProductParameters::Rop).double().null())
                    .col(ColumnDef::new(ProductParameters::Ss).double().null())
                    .col(ColumnDef::new(ProductParameters::Dl).double().not_null())
                    .col(
                        ColumnDef::new(ProductParameters::Forecast)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductParameters::DmdStdev)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductParameters::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductParameters::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProductParameters {
    Table,
    ProductId,
    ProductName,
    Cost,
    LeadTimeMonths,
    OrderingCost,
    HoldingCost,
    Eoq,
    Rop,
    Ss,
    Dl,
    Forecast,
    DmdStdev,
    UpdatedAt,
}
