pub mod errors;
pub mod in_memory_match_repository;
pub mod match_repository;
pub mod subscription;
