//! CLI command handlers.

mod fetch;
mod get;
mod list;

pub use fetch::run_fetch_command;
pub use get::run_get_command;
pub use list::run_list_command;
