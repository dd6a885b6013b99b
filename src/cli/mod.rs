pub mod context;
pub mod doctor;
pub mod search;
pub mod stats;
