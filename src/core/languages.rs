// Supported recommendation languages
//
// Closed set, validated before any request enters the resolver pipeline.
// Each code carries a plain display name (API responses) and a prompt name
// (display name plus native script) used when addressing the generation
// backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language codes the recommendation pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    En,
    Hi,
    Ta,
    Te,
    Kn,
    Ml,
    Mr,
    Gu,
    Bn,
    Pa,
    Or,
    As,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 12] = [
        LanguageCode::En,
        LanguageCode::Hi,
        LanguageCode::Ta,
        LanguageCode::Te,
        LanguageCode::Kn,
        LanguageCode::Ml,
        LanguageCode::Mr,
        LanguageCode::Gu,
        LanguageCode::Bn,
        LanguageCode::Pa,
        LanguageCode::Or,
        LanguageCode::As,
    ];

    /// Parse a request-supplied code. Returns `None` for anything outside the
    /// supported set; callers turn that into `UnsupportedLanguage`.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "en" => Some(LanguageCode::En),
            "hi" => Some(LanguageCode::Hi),
            "ta" => Some(LanguageCode::Ta),
            "te" => Some(LanguageCode::Te),
            "kn" => Some(LanguageCode::Kn),
            "ml" => Some(LanguageCode::Ml),
            "mr" => Some(LanguageCode::Mr),
            "gu" => Some(LanguageCode::Gu),
            "bn" => Some(LanguageCode::Bn),
            "pa" => Some(LanguageCode::Pa),
            "or" => Some(LanguageCode::Or),
            "as" => Some(LanguageCode::As),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Hi => "hi",
            LanguageCode::Ta => "ta",
            LanguageCode::Te => "te",
            LanguageCode::Kn => "kn",
            LanguageCode::Ml => "ml",
            LanguageCode::Mr => "mr",
            LanguageCode::Gu => "gu",
            LanguageCode::Bn => "bn",
            LanguageCode::Pa => "pa",
            LanguageCode::Or => "or",
            LanguageCode::As => "as",
        }
    }

    /// Plain English name, used in API responses.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Hi => "Hindi",
            LanguageCode::Ta => "Tamil",
            LanguageCode::Te => "Telugu",
            LanguageCode::Kn => "Kannada",
            LanguageCode::Ml => "Malayalam",
            LanguageCode::Mr => "Marathi",
            LanguageCode::Gu => "Gujarati",
            LanguageCode::Bn => "Bengali",
            LanguageCode::Pa => "Punjabi",
            LanguageCode::Or => "Odia",
            LanguageCode::As => "Assamese",
        }
    }

    /// Name handed to the generation backend, including the native script so
    /// the model reliably answers in that language.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Hi => "Hindi (हिन्दी)",
            LanguageCode::Ta => "Tamil (தமிழ்)",
            LanguageCode::Te => "Telugu (తెలుగు)",
            LanguageCode::Kn => "Kannada (ಕನ್ನಡ)",
            LanguageCode::Ml => "Malayalam (മലയാളം)",
            LanguageCode::Mr => "Marathi (मराठी)",
            LanguageCode::Gu => "Gujarati (ગુજરાતી)",
            LanguageCode::Bn => "Bengali (বাংলা)",
            LanguageCode::Pa => "Punjabi (ਪੰਜਾਬੀ)",
            LanguageCode::Or => "Odia (ଓଡ଼ିଆ)",
            LanguageCode::As => "Assamese (অসমীয়া)",
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_code() {
        for lang in LanguageCode::ALL {
            assert_eq!(LanguageCode::parse(lang.code()), Some(lang));
        }
    }

    #[test]
    fn parse_rejects_unknown_codes() {
        assert_eq!(LanguageCode::parse("xx"), None);
        assert_eq!(LanguageCode::parse(""), None);
        assert_eq!(LanguageCode::parse("EN"), None);
    }

    #[test]
    fn every_language_has_names() {
        for lang in LanguageCode::ALL {
            assert!(!lang.display_name().is_empty());
            assert!(!lang.prompt_name().is_empty());
        }
    }

    #[test]
    fn serializes_as_bare_code() {
        let json = serde_json::to_string(&LanguageCode::Hi).unwrap();
        assert_eq!(json, "\"hi\"");
    }
}
