pub mod evaluation;
pub mod queue;
pub mod scoring;
pub mod storage;
pub mod summary;
pub mod vision;
