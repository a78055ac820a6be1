pub mod derivative;
pub mod paths;
pub mod scratch;
pub mod storage;
pub mod transformer;
