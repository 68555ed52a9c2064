pub mod auth;
pub mod site;
pub mod stories;
pub mod uploads;
