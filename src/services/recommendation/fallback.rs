// Canned remedy tier: generic professional-referral guidance per language.
//
// Last safety net of the resolver. Entries exist for English, Hindi and
// Tamil; every other supported code resolves to the English entry. The table
// is never mutated at runtime.

use crate::core::languages::LanguageCode;
use crate::core::types::RemedyRecord;

/// Canned remedy for the requested language, with the predicted label woven
/// into the diagnosis text. Guaranteed to carry a non-empty treatment list.
pub fn fallback_remedy(label: &str, language: LanguageCode) -> RemedyRecord {
    match language {
        LanguageCode::Hi => RemedyRecord {
            diagnosis: format!(
                "पौधे की स्थिति {} के रूप में पहचानी गई। विस्तृत निदान के लिए स्थानीय कृषि विस्तार अधिकारी से सलाह लें।",
                label
            ),
            causal_agent: "व्यावसायिक निदान की आवश्यकता".to_string(),
            treatments: vec![
                "स्थानीय कृषि विस्तार अधिकारी से सलाह लें".to_string(),
                "निकटतम कृषि विज्ञान केन्द्र (KVK) में नमूना ले जाएं".to_string(),
                "हेल्पलाइन संपर्क करें: 1800-180-1551 (किसान कॉल सेंटर)".to_string(),
                "उचित खेत स्वच्छता और फसल चक्र बनाए रखें".to_string(),
            ],
        },
        LanguageCode::Ta => RemedyRecord {
            diagnosis: format!(
                "தாவர நிலை {} என அடையாளம் காணப்பட்டுள்ளது. விரிவான நோயறிதலுக்கு உள்ளூர் விவசாய விரிவாக்க அதிகாரியுடன் கலந்தாலோசிக்கவும்.",
                label
            ),
            causal_agent: "தொழில்முறை நோயறிதல் தேவை".to_string(),
            treatments: vec![
                "உள்ளூர் விவசாய விரிவாக்க அதிகாரியுடன் கலந்தாலோசிக்கவும்".to_string(),
                "அருகிலுள்ள கிருஷி விஞ்ஞான் கேந்திராவிற்கு (KVK) மாதிரி எடுத்துச் செல்லுங்கள்".to_string(),
                "உதவி எண்ணை தொடர்பு கொள்ளுங்கள்: 1800-180-1551 (கிசான் கால் சென்டர்)".to_string(),
                "சரியான வயல் சுகாதாரம் மற்றும் பயிர் சுழற்சியை பராமரிக்கவும்".to_string(),
            ],
        },
        // Languages without a dedicated entry fall back to English.
        _ => RemedyRecord {
            diagnosis: format!(
                "Plant condition identified as {}. Please consult with local agricultural extension officer for detailed diagnosis.",
                label
            ),
            causal_agent: "Requires professional diagnosis".to_string(),
            treatments: vec![
                "Consult local agricultural extension officer".to_string(),
                "Take sample to nearest Krishi Vigyan Kendra (KVK)".to_string(),
                "Contact helpline: 1800-180-1551 (Kisan Call Centre)".to_string(),
                "Maintain proper field hygiene and crop rotation".to_string(),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_language_yields_a_valid_record() {
        for lang in LanguageCode::ALL {
            let record = fallback_remedy("Tomato_Late_Blight", lang);
            assert!(record.is_valid(), "invalid fallback for {}", lang);
            assert!(!record.treatments.is_empty());
        }
    }

    #[test]
    fn diagnosis_mentions_the_label() {
        for lang in [LanguageCode::En, LanguageCode::Hi, LanguageCode::Ta] {
            let record = fallback_remedy("Potato_Early_Blight", lang);
            assert!(record.diagnosis.contains("Potato_Early_Blight"));
        }
    }

    #[test]
    fn unlisted_languages_use_the_english_entry() {
        let te = fallback_remedy("X", LanguageCode::Te);
        let en = fallback_remedy("X", LanguageCode::En);
        assert_eq!(te, en);
    }
}
