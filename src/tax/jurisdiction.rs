//! GSTIN parsing and the state/UT code table used to decide intra- vs inter-state supply

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{GstError, GstResult};

/// Official GST state/UT codes
const STATES: &[(u8, &str)] = &[
    (1, "Jammu and Kashmir"),
    (2, "Himachal Pradesh"),
    (3, "Punjab"),
    (4, "Chandigarh"),
    (5, "Uttarakhand"),
    (6, "Haryana"),
    (7, "Delhi"),
    (8, "Rajasthan"),
    (9, "Uttar Pradesh"),
    (10, "Bihar"),
    (11, "Sikkim"),
    (12, "Arunachal Pradesh"),
    (13, "Nagaland"),
    (14, "Manipur"),
    (15, "Mizoram"),
    (16, "Tripura"),
    (17, "Meghalaya"),
    (18, "Assam"),
    (19, "West Bengal"),
    (20, "Jharkhand"),
    (21, "Odisha"),
    (22, "Chhattisgarh"),
    (23, "Madhya Pradesh"),
    (24, "Gujarat"),
    (25, "Daman and Diu"),
    (26, "Dadra and Nagar Haveli and Daman and Diu"),
    (27, "Maharashtra"),
    (28, "Andhra Pradesh (Before Division)"),
    (29, "Karnataka"),
    (30, "Goa"),
    (31, "Lakshadweep"),
    (32, "Kerala"),
    (33, "Tamil Nadu"),
    (34, "Puducherry"),
    (35, "Andaman and Nicobar Islands"),
    (36, "Telangana"),
    (37, "Andhra Pradesh"),
    (38, "Ladakh"),
    (96, "Other Countries"),
    (97, "Other Territory"),
];

/// Two-digit GST state code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StateCode(u8);

impl StateCode {
    /// Place-of-supply code for supplies made outside India
    pub const OTHER_COUNTRIES: StateCode = StateCode(96);

    /// Look up a state by its numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        STATES
            .iter()
            .any(|(c, _)| *c == code)
            .then_some(StateCode(code))
    }

    /// Resolve free-form place-of-supply text.
    ///
    /// Accepts a bare code (`"27"`, `"7"`), a code-prefixed label
    /// (`"27-Maharashtra"`) or a state name in any case.
    pub fn resolve(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() && digits.len() <= 2 {
            return digits.parse::<u8>().ok().and_then(Self::from_code);
        }

        STATES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(text))
            .map(|(code, _)| StateCode(*code))
    }

    /// Numeric code
    pub fn code(&self) -> u8 {
        self.0
    }

    /// State or UT name
    pub fn name(&self) -> &'static str {
        STATES
            .iter()
            .find(|(c, _)| *c == self.0)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }

    /// Whether this code denotes a place outside India
    pub fn is_foreign(&self) -> bool {
        *self == Self::OTHER_COUNTRIES
    }
}

impl TryFrom<u8> for StateCode {
    type Error = GstError;

    fn try_from(code: u8) -> GstResult<Self> {
        Self::from_code(code).ok_or_else(|| {
            GstError::UnresolvedJurisdiction(format!("unknown state code {code:02}"))
        })
    }
}

impl From<StateCode> for u8 {
    fn from(code: StateCode) -> Self {
        code.0
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

const CHECKSUM_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// GST identification number
///
/// Layout: 2-digit state code, 10-character PAN, entity code, literal `Z`,
/// check character. Construction always validates the layout and the state
/// code; the mod-36 check character is verified separately because sample
/// GSTINs often carry placeholder check characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gstin(String);

impl Gstin {
    /// Parse and validate a GSTIN, trimming and upper-casing the input
    pub fn parse(input: &str) -> GstResult<Self> {
        let value = input.trim().to_ascii_uppercase();
        let bytes = value.as_bytes();

        if bytes.len() != 15 {
            return Err(GstError::InvalidGstin(format!(
                "'{}' must be 15 characters, found {}",
                input.trim(),
                bytes.len()
            )));
        }

        let layout_ok = bytes[0..2].iter().all(u8::is_ascii_digit)
            && bytes[2..7].iter().all(u8::is_ascii_uppercase)
            && bytes[7..11].iter().all(u8::is_ascii_digit)
            && bytes[11].is_ascii_uppercase()
            && (matches!(bytes[12], b'1'..=b'9') || bytes[12].is_ascii_uppercase())
            && bytes[13] == b'Z'
            && (bytes[14].is_ascii_digit() || bytes[14].is_ascii_uppercase());

        if !layout_ok {
            return Err(GstError::InvalidGstin(format!(
                "'{value}' does not match the GSTIN layout"
            )));
        }

        let code: u8 = value[0..2].parse().map_err(|_| {
            GstError::InvalidGstin(format!("'{value}' has a non-numeric state code"))
        })?;
        if StateCode::from_code(code).is_none() || code == StateCode::OTHER_COUNTRIES.code() {
            return Err(GstError::InvalidGstin(format!(
                "'{value}' has unknown state code {code:02}"
            )));
        }

        Ok(Self(value))
    }

    /// Parse and additionally require a correct check character
    pub fn parse_strict(input: &str) -> GstResult<Self> {
        let gstin = Self::parse(input)?;
        if !gstin.has_valid_checksum() {
            return Err(GstError::InvalidGstin(format!(
                "'{}' has an invalid check character",
                gstin.0
            )));
        }
        Ok(gstin)
    }

    /// Registered state of the holder
    pub fn state_code(&self) -> StateCode {
        // Both digits were checked against the state table in `parse`.
        StateCode(self.0[0..2].parse().unwrap_or_default())
    }

    /// PAN of the holder
    pub fn pan(&self) -> &str {
        &self.0[2..12]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify the mod-36 check character
    pub fn has_valid_checksum(&self) -> bool {
        let bytes = self.0.as_bytes();
        let expected = checksum_char(&bytes[..14]);
        expected == Some(bytes[14])
    }
}

fn checksum_char(body: &[u8]) -> Option<u8> {
    let mut sum = 0u32;
    for (idx, byte) in body.iter().enumerate() {
        let value = CHECKSUM_ALPHABET.iter().position(|c| c == byte)? as u32;
        let factor = if idx % 2 == 0 { 1 } else { 2 };
        let product = value * factor;
        sum += product / 36 + product % 36;
    }
    let check = (36 - sum % 36) % 36;
    Some(CHECKSUM_ALPHABET[check as usize])
}

impl FromStr for Gstin {
    type Err = GstError;

    fn from_str(s: &str) -> GstResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Gstin {
    type Error = GstError;

    fn try_from(value: String) -> GstResult<Self> {
        Self::parse(&value)
    }
}

impl From<Gstin> for String {
    fn from(gstin: Gstin) -> Self {
        gstin.0
    }
}

impl fmt::Display for Gstin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_gstin() {
        let gstin = Gstin::parse(" 27aabcu9603r1zm ").unwrap();
        assert_eq!(gstin.as_str(), "27AABCU9603R1ZM");
        assert_eq!(gstin.state_code().code(), 27);
        assert_eq!(gstin.state_code().name(), "Maharashtra");
        assert_eq!(gstin.pan(), "AABCU9603R");
    }

    #[test]
    fn test_rejects_malformed_gstin() {
        for bad in [
            "",
            "27AABCU9603R1Z",
            "27AABCU9603R1XM",
            "2XAABCU9603R1ZM",
            "27AAB1U9603R1ZM",
            "27AABCU9603R0ZM",
            "99AABCU9603R1ZM",
            "96AABCU9603R1ZM",
        ] {
            assert!(
                matches!(Gstin::parse(bad), Err(GstError::InvalidGstin(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_checksum_verification() {
        assert!(Gstin::parse("27AAPFU0939F1ZV").unwrap().has_valid_checksum());
        assert!(Gstin::parse_strict("07AAACT2727Q1ZY").is_ok());
        // Placeholder check character
        assert!(!Gstin::parse("27AABCU9603R1ZM").unwrap().has_valid_checksum());
        assert!(Gstin::parse_strict("27AABCU9603R1ZM").is_err());
    }

    #[test]
    fn test_state_resolution() {
        assert_eq!(StateCode::resolve("27").map(|s| s.code()), Some(27));
        assert_eq!(StateCode::resolve("7").map(|s| s.code()), Some(7));
        assert_eq!(StateCode::resolve("29-Karnataka").map(|s| s.code()), Some(29));
        assert_eq!(StateCode::resolve("tamil nadu").map(|s| s.code()), Some(33));
        assert_eq!(StateCode::resolve("96"), Some(StateCode::OTHER_COUNTRIES));
        assert_eq!(StateCode::resolve("Atlantis"), None);
        assert_eq!(StateCode::resolve("55"), None);
        assert_eq!(StateCode::resolve(""), None);
    }

    #[test]
    fn test_gstin_serde_validates() {
        let ok: Result<Gstin, _> = serde_json::from_str("\"29AABCB5678R1ZM\"");
        assert!(ok.is_ok());
        let bad: Result<Gstin, _> = serde_json::from_str("\"not-a-gstin\"");
        assert!(bad.is_err());
    }
}
