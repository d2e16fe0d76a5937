pub mod records;
pub mod streams;
