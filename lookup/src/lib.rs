pub mod directory;
pub mod esg;
pub mod product;
