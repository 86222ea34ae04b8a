pub mod courier;
pub mod geography;
pub mod product;
pub mod user;
