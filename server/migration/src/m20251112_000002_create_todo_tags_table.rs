use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TodoTag::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TodoTag::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TodoTag::TodoId).integer().not_null())
                    .col(ColumnDef::new(TodoTag::Name).string_len(50).not_null())
                    .col(
                        ColumnDef::new(TodoTag::Color)
                            .string_len(20)
                            .not_null()
                            .default("gray"),
                    )
                    .col(
                        ColumnDef::new(TodoTag::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TodoTag::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_todo_tags_todo_id")
                            .from(TodoTag::Table, TodoTag::TodoId)
                            .to(Todo::Table, Todo::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TodoTag::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TodoTag {
    #[sea_orm(iden = "todo_tags")]
    Table,
    Id,
    TodoId,
    Name,
    Color,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Todo {
    #[sea_orm(iden = "todos")]
    Table,
    Id,
}
