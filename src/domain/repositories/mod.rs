// Repository interfaces (ports)
// Implemented by adapters in the infrastructure layer

pub mod office_repository;

pub use office_repository::OfficeRepository;
