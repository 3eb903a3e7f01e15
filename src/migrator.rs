//! Embedded schema migrations, applied by `db::run_migrations`.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_products_table::Migration),
            Box::new(m20250301_000002_create_stock_movements_table::Migration),
            Box::new(m20250301_000003_create_stock_audit_tables::Migration),
            Box::new(m20250301_000004_add_ledger_indexes::Migration),
        ]
    }
}

mod m20250301_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(
                            ColumnDef::new(Products::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::MinStockLevel)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::MaxStockLevel).integer().null())
                        .col(
                            ColumnDef::new(Products::ReorderPoint)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::CostPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Status).string().not_null())
                        .col(
                            ColumnDef::new(Products::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        BranchId,
        Sku,
        Name,
        Description,
        StockQuantity,
        MinStockLevel,
        MaxStockLevel,
        ReorderPoint,
        UnitPrice,
        CostPrice,
        Status,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_stock_movements_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::BranchId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::Type).string().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::PreviousQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::NewQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Reason).string().not_null())
                        .col(
                            ColumnDef::new(StockMovements::ReferenceNumber)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(StockMovements::Notes).text().null())
                        .col(ColumnDef::new(StockMovements::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMovements {
        Table,
        Id,
        ProductId,
        BranchId,
        Type,
        Quantity,
        PreviousQuantity,
        NewQuantity,
        Reason,
        ReferenceNumber,
        Notes,
        CreatedBy,
        CreatedAt,
    }
}

mod m20250301_000003_create_stock_audit_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_stock_audit_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAudits::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAudits::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAudits::BranchId).uuid().not_null())
                        .col(ColumnDef::new(StockAudits::AuditDate).date().not_null())
                        .col(ColumnDef::new(StockAudits::Status).string().not_null())
                        .col(
                            ColumnDef::new(StockAudits::TotalItems)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockAudits::CountedItems)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockAudits::Discrepancies)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockAudits::Notes).text().null())
                        .col(ColumnDef::new(StockAudits::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(StockAudits::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(StockAudits::UpdatedAt).timestamp().null())
                        .col(ColumnDef::new(StockAudits::CompletedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockAuditItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAuditItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAuditItems::AuditId).uuid().not_null())
                        .col(ColumnDef::new(StockAuditItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockAuditItems::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockAuditItems::ExpectedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAuditItems::ActualQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAuditItems::Difference)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAuditItems::CountedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAuditItems::ReconciledAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockAuditItems::ReconciledMovementId)
                                .uuid()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_audit_items_audit")
                                .from(StockAuditItems::Table, StockAuditItems::AuditId)
                                .to(StockAudits::Table, StockAudits::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One count row per product per audit; recounts replace the row
            manager
                .create_index(
                    Index::create()
                        .name("ux_stock_audit_items_audit_product")
                        .table(StockAuditItems::Table)
                        .col(StockAuditItems::AuditId)
                        .col(StockAuditItems::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAuditItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockAudits::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockAudits {
        Table,
        Id,
        BranchId,
        AuditDate,
        Status,
        TotalItems,
        CountedItems,
        Discrepancies,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        CompletedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockAuditItems {
        Table,
        Id,
        AuditId,
        ProductId,
        BranchId,
        ExpectedQuantity,
        ActualQuantity,
        Difference,
        CountedAt,
        ReconciledAt,
        ReconciledMovementId,
    }
}

mod m20250301_000004_add_ledger_indexes {
    use sea_orm_migration::prelude::*;

    use super::m20250301_000001_create_products_table::Products;
    use super::m20250301_000002_create_stock_movements_table::StockMovements;
    use super::m20250301_000003_create_stock_audit_tables::{StockAuditItems, StockAudits};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_add_ledger_indexes"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_index(
                    Index::create()
                        .name("idx_products_branch")
                        .table(Products::Table)
                        .col(Products::BranchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_movements_product_created")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .col(StockMovements::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_movements_branch")
                        .table(StockMovements::Table)
                        .col(StockMovements::BranchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_audits_branch_status")
                        .table(StockAudits::Table)
                        .col(StockAudits::BranchId)
                        .col(StockAudits::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_audit_items_audit")
                        .table(StockAuditItems::Table)
                        .col(StockAuditItems::AuditId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(Index::drop().name("idx_stock_audit_items_audit").to_owned())
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_stock_audits_branch_status")
                        .to_owned(),
                )
                .await?;
            manager
                .drop_index(Index::drop().name("idx_stock_movements_branch").to_owned())
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_stock_movements_product_created")
                        .to_owned(),
                )
                .await?;
            manager
                .drop_index(Index::drop().name("idx_products_branch").to_owned())
                .await
        }
    }
}
