pub mod auth;
pub mod locations;
pub mod views;
