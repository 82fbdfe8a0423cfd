// Domain layer module exports
// Following Hexagonal Architecture and DDD principles
// Domain is independent of infrastructure concerns

pub mod geometry;
pub mod office;
pub mod repositories;
