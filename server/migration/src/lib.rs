pub use sea_orm_migration::prelude::*;

mod m20251112_000001_create_todos_table;
mod m20251112_000002_create_todo_tags_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251112_000001_create_todos_table::Migration),
            Box::new(m20251112_000002_create_todo_tags_table::Migration),
        ]
    }
}
