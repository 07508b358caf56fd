/// Built-in log dialects.

pub mod rails;
pub mod sidekiq;

pub(crate) mod params;

// Re-export the dialect types
pub use rails::RailsDialect;
pub use sidekiq::SidekiqDialect;
