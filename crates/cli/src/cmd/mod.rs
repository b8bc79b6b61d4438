mod build;
mod list;

pub use build::{BuildArgs, cmd_build};
pub use list::cmd_list;
