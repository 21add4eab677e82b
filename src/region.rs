//! Static country-to-region table used to bucket institutions.

use serde::{Deserialize, Serialize};
use std::fmt;

const CHINA: &[&str] = &["CN"];

const KOREA_INDIA: &[&str] = &["KR", "IN"];

const HIGH_INCOME: &[&str] = &[
    "US", "JP", "DE", "FR", "GB", "IT", "ES", "CA", "AU", "CH", "NL", "BE", "SE", "SG", "AT", "FI",
    "DK", "IE", "NO", "IL",
];

const EMERGING: &[&str] = &[
    "RU", "PL", "CZ", "BR", "MX", "IR", "TR", "RO", "SK", "VN", "TH", "AR", "PK", "HU", "PT", "SA",
    "QA", "AE", "MY", "HK", "CL", "EG", "ZA", "GR", "BG", "ID", "UA", "KZ", "RS", "SI", "CO", "DZ",
    "PE", "VE", "UY", "EE", "PH", "JO", "NZ", "LU", "HR", "LV", "LT", "MO", "OM", "IQ", "IS", "BD",
    "ET", "TN", "LK", "LB", "KW", "CM", "MT", "FJ", "PR",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "China (CN)")]
    China,
    #[serde(rename = "Korea & India")]
    KoreaIndia,
    #[serde(rename = "High-Income Research Countries")]
    HighIncome,
    #[serde(rename = "Emerging/Transition Countries")]
    Emerging,
    #[serde(rename = "Other")]
    Other,
}

impl Region {
    pub fn label(&self) -> &'static str {
        match self {
            Region::China => "China (CN)",
            Region::KoreaIndia => "Korea & India",
            Region::HighIncome => "High-Income Research Countries",
            Region::Emerging => "Emerging/Transition Countries",
            Region::Other => "Other",
        }
    }

    /// Region of an ISO 3166-1 alpha-2 code; unknown or missing codes are `Other`.
    pub fn classify(country: Option<&str>) -> Region {
        let Some(code) = country.map(|c| c.trim().to_ascii_uppercase()) else {
            return Region::Other;
        };
        let code = code.as_str();
        if CHINA.contains(&code) {
            Region::China
        } else if KOREA_INDIA.contains(&code) {
            Region::KoreaIndia
        } else if HIGH_INCOME.contains(&code) {
            Region::HighIncome
        } else if EMERGING.contains(&code) {
            Region::Emerging
        } else {
            Region::Other
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Region::classify(Some("CN")).label(), "China (CN)");
        assert_eq!(Region::classify(Some("BR")).label(), "Emerging/Transition Countries");
        assert_eq!(Region::classify(Some("XX")).label(), "Other");
        assert_eq!(Region::classify(None).label(), "Other");
        assert_eq!(Region::classify(Some("in")), Region::KoreaIndia);
        assert_eq!(Region::classify(Some("US")), Region::HighIncome);
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&Region::KoreaIndia).expect("serialize");
        assert_eq!(json, "\"Korea & India\"");
    }
}
