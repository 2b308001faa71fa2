/// Command line and config file handling
pub mod args;
