use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_events_table::Migration),
            Box::new(m20240101_000002_create_ticket_types_table::Migration),
            Box::new(m20240101_000003_create_bookings_table::Migration),
            Box::new(m20240101_000004_create_mpesa_payments_table::Migration),
        ]
    }
}

mod m20240101_000001_create_events_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Events::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Events::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Events::Title).string().not_null())
                        .col(ColumnDef::new(Events::Description).text().null())
                        .col(ColumnDef::new(Events::Date).date().not_null())
                        .col(ColumnDef::new(Events::Time).time().not_null())
                        .col(ColumnDef::new(Events::Location).string().null())
                        .col(ColumnDef::new(Events::PosterUrl).string().null())
                        .col(
                            ColumnDef::new(Events::Status)
                                .string()
                                .not_null()
                                .default("UPCOMING"),
                        )
                        .col(
                            ColumnDef::new(Events::PaymentMethod)
                                .string()
                                .not_null()
                                .default("TILL"),
                        )
                        .col(ColumnDef::new(Events::PaymentNumber).string().null())
                        .col(ColumnDef::new(Events::PaybillAccount).string().null())
                        .col(ColumnDef::new(Events::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Events::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_events_status")
                        .table(Events::Table)
                        .col(Events::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Events::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Events {
        Table,
        Id,
        Title,
        Description,
        Date,
        Time,
        Location,
        PosterUrl,
        Status,
        PaymentMethod,
        PaymentNumber,
        PaybillAccount,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_ticket_types_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_ticket_types_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TicketTypes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TicketTypes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TicketTypes::EventId).uuid().not_null())
                        .col(ColumnDef::new(TicketTypes::Name).string().not_null())
                        .col(
                            ColumnDef::new(TicketTypes::Price)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TicketTypes::Capacity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TicketTypes::Sold)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(TicketTypes::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(TicketTypes::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ticket_types_event_id")
                        .table(TicketTypes::Table)
                        .col(TicketTypes::EventId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TicketTypes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum TicketTypes {
        Table,
        Id,
        EventId,
        Name,
        Price,
        Capacity,
        Sold,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_bookings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_bookings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Bookings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Bookings::CustomerName).string().not_null())
                        .col(ColumnDef::new(Bookings::PhoneNumber).string().not_null())
                        .col(ColumnDef::new(Bookings::EventId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::TicketTypeId).uuid().not_null())
                        .col(
                            ColumnDef::new(Bookings::PaymentStatus)
                                .string()
                                .not_null()
                                .default("PENDING"),
                        )
                        .col(ColumnDef::new(Bookings::TicketCode).string().null())
                        .col(ColumnDef::new(Bookings::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Bookings::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_event_id")
                        .table(Bookings::Table)
                        .col(Bookings::EventId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_ticket_type_id")
                        .table(Bookings::Table)
                        .col(Bookings::TicketTypeId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_payment_status")
                        .table(Bookings::Table)
                        .col(Bookings::PaymentStatus)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Bookings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Bookings {
        Table,
        Id,
        CustomerName,
        PhoneNumber,
        EventId,
        TicketTypeId,
        PaymentStatus,
        TicketCode,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_mpesa_payments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_mpesa_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MpesaPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MpesaPayments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MpesaPayments::BookingId).uuid().not_null())
                        .col(ColumnDef::new(MpesaPayments::Phone).string().not_null())
                        .col(
                            ColumnDef::new(MpesaPayments::Amount)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(MpesaPayments::MerchantRequestId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MpesaPayments::CheckoutRequestId)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MpesaPayments::MpesaReceipt).string().null())
                        .col(
                            ColumnDef::new(MpesaPayments::Status)
                                .string()
                                .not_null()
                                .default("PENDING"),
                        )
                        .col(ColumnDef::new(MpesaPayments::RawCallback).text().null())
                        .col(
                            ColumnDef::new(MpesaPayments::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MpesaPayments::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            // One payment row per booking; retries overwrite the row in place.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_mpesa_payments_booking_id")
                        .table(MpesaPayments::Table)
                        .col(MpesaPayments::BookingId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_mpesa_payments_checkout_request_id")
                        .table(MpesaPayments::Table)
                        .col(MpesaPayments::CheckoutRequestId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MpesaPayments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum MpesaPayments {
        Table,
        Id,
        BookingId,
        Phone,
        Amount,
        MerchantRequestId,
        CheckoutRequestId,
        MpesaReceipt,
        Status,
        RawCallback,
        CreatedAt,
        UpdatedAt,
    }
}
