pub mod repository;

pub use repository::{DynSiteRepository, SiteRepository};

/// Settings key under which the uploaded logo's public URL is stored.
pub const LOGO_KEY: &str = "logo_url";
