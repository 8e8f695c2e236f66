pub mod ddl;
pub mod queue_entries;
