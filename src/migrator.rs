use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240115_000001_create_users_tables::Migration),
            Box::new(m20240115_000002_create_catalog_tables::Migration),
            Box::new(m20240115_000003_create_order_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240115_000001_create_users_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000001_create_users_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string()
                                .not_null()
                                .default("buyer"),
                        )
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Contacts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Contacts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Contacts::UserId).uuid().not_null())
                        .col(ColumnDef::new(Contacts::City).string().not_null())
                        .col(ColumnDef::new(Contacts::Street).string().not_null())
                        .col(
                            ColumnDef::new(Contacts::House)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Contacts::Structure)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Contacts::Building)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Contacts::Apartment)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(Contacts::Phone).string().not_null())
                        .col(ColumnDef::new(Contacts::Note).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_contacts_user_id")
                        .table(Contacts::Table)
                        .col(Contacts::UserId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Contacts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Email,
        Name,
        Role,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Contacts {
        Table,
        Id,
        UserId,
        City,
        Street,
        House,
        Structure,
        Building,
        Apartment,
        Phone,
        Note,
    }
}

mod m20240115_000002_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Shops::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Shops::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Shops::Name).string().not_null())
                        .col(ColumnDef::new(Shops::UserId).uuid().null())
                        .col(ColumnDef::new(Shops::Url).string().null())
                        .to_owned(),
                )
                .await?;

            // One shop per uploading user per name.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_shops_name_user")
                        .table(Shops::Table)
                        .col(Shops::Name)
                        .col(Shops::UserId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Categories::ExternalId).integer().not_null())
                        .col(ColumnDef::new(Categories::Name).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_categories_external_id")
                        .table(Categories::Table)
                        .col(Categories::ExternalId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShopCategories::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ShopCategories::ShopId).uuid().not_null())
                        .col(ColumnDef::new(ShopCategories::CategoryId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(ShopCategories::ShopId)
                                .col(ShopCategories::CategoryId),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .to_owned(),
                )
                .await?;

            // Products sharing a name within a category are reused across
            // shops, never duplicated.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_products_name_category")
                        .table(Products::Table)
                        .col(Products::Name)
                        .col(Products::CategoryId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductListings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductListings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductListings::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductListings::ShopId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductListings::ExternalId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductListings::Model)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(ProductListings::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductListings::Price)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductListings::PriceRrc)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductListings::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_product_listings_external_shop")
                        .table(ProductListings::Table)
                        .col(ProductListings::ExternalId)
                        .col(ProductListings::ShopId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_listings_product_shop")
                        .table(ProductListings::Table)
                        .col(ProductListings::ProductId)
                        .col(ProductListings::ShopId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Parameters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Parameters::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Parameters::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ListingParameters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ListingParameters::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ListingParameters::ListingId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ListingParameters::ParameterId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ListingParameters::Value).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_listing_parameters_pair")
                        .table(ListingParameters::Table)
                        .col(ListingParameters::ListingId)
                        .col(ListingParameters::ParameterId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ListingParameters::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Parameters::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductListings::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ShopCategories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Shops::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Shops {
        Table,
        Id,
        Name,
        UserId,
        Url,
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        ExternalId,
        Name,
    }

    #[derive(DeriveIden)]
    enum ShopCategories {
        Table,
        ShopId,
        CategoryId,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        CategoryId,
        Name,
    }

    #[derive(DeriveIden)]
    enum ProductListings {
        Table,
        Id,
        ProductId,
        ShopId,
        ExternalId,
        Model,
        Quantity,
        Price,
        PriceRrc,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Parameters {
        Table,
        Id,
        Name,
    }

    #[derive(DeriveIden)]
    enum ListingParameters {
        Table,
        Id,
        ListingId,
        ParameterId,
        Value,
    }
}

mod m20240115_000003_create_order_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::UserId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ContactId).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string()
                                .not_null()
                                .default("new"),
                        )
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_user_id")
                        .table(Orders::Table)
                        .col(Orders::UserId)
                        .to_owned(),
                )
                .await?;

            // Active-basket invariant: at most one "new" order per user.
            // Partial unique indexes are not expressible through the schema
            // builder, and the same statement is valid on Postgres and SQLite.
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uq_orders_active_basket \
                     ON orders (user_id) WHERE status = 'new'",
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ShopId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::TotalPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // Basket adds merge into the existing line for a product.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_order_items_order_product")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .col(OrderItems::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        UserId,
        ContactId,
        Status,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ShopId,
        Quantity,
        TotalPrice,
        CreatedAt,
    }
}
