pub mod activity;
pub mod auth;
pub mod health;
pub mod members;
pub mod projects;
