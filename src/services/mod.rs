pub mod catalog;
pub mod filter;
pub mod refresher;
pub mod upstream;
