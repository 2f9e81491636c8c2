pub mod activity_reader;
pub mod report_writer;
