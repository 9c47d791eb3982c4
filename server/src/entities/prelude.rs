pub use super::todo::Entity as Todo;
pub use super::todo_tag::Entity as TodoTag;
