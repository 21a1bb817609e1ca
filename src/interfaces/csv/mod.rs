pub mod command_reader;
pub mod report_writer;
