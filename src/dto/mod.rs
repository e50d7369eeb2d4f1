pub mod auth;
pub mod cart;
pub mod discounts;
pub mod favorites;
pub mod orders;
pub mod products;
