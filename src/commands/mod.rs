mod calendar;
mod config_cmd;

use clap::ValueEnum;

pub use calendar::CalendarCommand;
pub use config_cmd::ConfigCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
