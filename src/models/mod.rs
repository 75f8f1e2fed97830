pub mod activity;
pub mod member;
pub mod project;
pub mod user;
