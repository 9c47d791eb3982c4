pub mod prelude;

pub mod sea_orm_active_enums;
pub mod todo;
pub mod todo_tag;
