// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod in_memory_office_repository;
pub mod postgres_office_repository;

pub use in_memory_office_repository::InMemoryOfficeRepository;
pub use postgres_office_repository::PostgresOfficeRepository;
