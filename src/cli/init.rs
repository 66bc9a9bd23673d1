use crate::cli::CliError;
use crate::config::initialize_config_file;
use std::path::Path;

pub fn handle_init_command(path: Option<&Path>) -> Result<(), CliError> {
    initialize_config_file(path)?;
    Ok(())
}
