pub mod link_writer;
pub mod order_reader;
