//! Repository layer for data access

pub mod campaigns;
pub mod companies;
pub mod recipients;
pub mod user_settings;

pub use campaigns::CampaignRepository;
pub use companies::CompanyRepository;
pub use recipients::RecipientRepository;
pub use user_settings::UserSettingsRepository;
