pub mod basket;
pub mod catalog;
pub mod contacts;
pub mod ingestion;
pub mod orders;

pub use basket::BasketService;
pub use catalog::CatalogService;
pub use contacts::ContactService;
pub use ingestion::IngestionService;
pub use orders::OrderService;
