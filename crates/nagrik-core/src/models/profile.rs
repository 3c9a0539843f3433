use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Languages the portal can address a citizen in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreferredLanguage {
    #[default]
    En,
    Hi,
    Bn,
    Te,
    Ta,
}

impl PreferredLanguage {
    pub fn display_name(&self) -> &'static str {
        match self {
            PreferredLanguage::En => "English",
            PreferredLanguage::Hi => "Hindi",
            PreferredLanguage::Bn => "Bengali",
            PreferredLanguage::Te => "Telugu",
            PreferredLanguage::Ta => "Tamil",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PreferredLanguage::En => "en",
            PreferredLanguage::Hi => "hi",
            PreferredLanguage::Bn => "bn",
            PreferredLanguage::Te => "te",
            PreferredLanguage::Ta => "ta",
        }
    }
}

impl std::fmt::Display for PreferredLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for PreferredLanguage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(PreferredLanguage::En),
            "hi" => Ok(PreferredLanguage::Hi),
            "bn" => Ok(PreferredLanguage::Bn),
            "te" => Ok(PreferredLanguage::Te),
            "ta" => Ok(PreferredLanguage::Ta),
            _ => Err(anyhow::anyhow!("Invalid language code: {}", s)),
        }
    }
}

/// A citizen profile row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub preferred_language: PreferredLanguage,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields a citizen can edit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(max = 200, message = "Full name too long"))]
    pub full_name: Option<String>,
    #[validate(length(max = 20, message = "Phone number too long"))]
    pub phone_number: Option<String>,
    pub preferred_language: PreferredLanguage,
}
