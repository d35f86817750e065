pub mod evaluation;
pub mod submission;
