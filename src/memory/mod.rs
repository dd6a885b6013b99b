pub mod context;
pub mod journal;
pub mod query;
pub mod records;
pub mod stats;
pub mod types;

pub use journal::JournalStore;
pub use records::RecordStore;
