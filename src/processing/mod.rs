pub mod histogram;
pub mod monte_carlo;
pub mod pipeline;
pub mod recommendations;
pub mod sanitizer;
pub mod statistics;
pub mod trend;
