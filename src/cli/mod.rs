pub mod once;
pub mod status;
