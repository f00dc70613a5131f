pub mod certificates;
pub mod health;
pub mod index;
pub mod refresh;
pub mod stats;
