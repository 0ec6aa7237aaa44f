pub mod dom;
pub mod extract;

pub use extract::extract_record;
