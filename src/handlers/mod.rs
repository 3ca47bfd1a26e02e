//! Built-in task handlers.

mod command;
mod template;

pub use command::CommandHandler;
pub use template::{TemplateError, render_template};
