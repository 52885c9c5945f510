//! Record ingestion: CSV files -> `ApiRecord`s.

pub mod csv_reader;
pub mod record;
pub mod walker;

pub use csv_reader::{read_csv, read_many};
pub use record::ApiRecord;
pub use walker::{discover_csv_files, expand_inputs};
