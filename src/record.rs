//! Product provenance records stored as block payloads
use crate::error::ChainError;
use std::fmt;

/// Maximum length of a single record field.
pub const MAX_FIELD_LENGTH: usize = 128;
const FIELD_COUNT: usize = 7;

/// One manufactured item, as recorded on the ledger.
///
/// The payload form is the seven fields joined by commas:
/// `company,style,size,color,date,country,item_number`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProductRecord {
    pub company: String,
    pub style: String,
    pub size: String,
    pub color: String,
    /// Manufacture date as written on the label (e.g. `09/16/2009`).
    pub date: String,
    pub country: String,
    pub item_number: u64,
}

impl ProductRecord {
    pub fn new(
        company: &str,
        style: &str,
        size: &str,
        color: &str,
        date: &str,
        country: &str,
        item_number: u64,
    ) -> Result<Self, ChainError> {
        let record = ProductRecord {
            company: company.trim().to_string(),
            style: style.trim().to_string(),
            size: size.trim().to_string(),
            color: color.trim().to_string(),
            date: date.trim().to_string(),
            country: country.trim().to_string(),
            item_number,
        };
        record.validate()?;
        Ok(record)
    }

    fn text_fields(&self) -> [(&'static str, &str); 6] {
        [
            ("company", self.company.as_str()),
            ("style", self.style.as_str()),
            ("size", self.size.as_str()),
            ("color", self.color.as_str()),
            ("date", self.date.as_str()),
            ("country", self.country.as_str()),
        ]
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        for (name, value) in self.text_fields() {
            if value.is_empty() {
                return Err(ChainError::InvalidRecord(format!("{} cannot be empty", name)));
            }
            if value.len() > MAX_FIELD_LENGTH {
                return Err(ChainError::InvalidRecord(format!(
                    "{} too long (max {} characters)",
                    name, MAX_FIELD_LENGTH
                )));
            }
            if value.contains(',') || value.contains('\n') {
                return Err(ChainError::InvalidRecord(format!(
                    "{} cannot contain commas or newlines",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Payload bytes for appending to a ledger.
    pub fn to_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parse a record back out of a block payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, ChainError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| ChainError::InvalidRecord(format!("Payload is not UTF-8: {}", e)))?;
        text.parse()
    }
}

impl fmt::Display for ProductRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{}",
            self.company, self.style, self.size, self.color, self.date, self.country, self.item_number
        )
    }
}

impl std::str::FromStr for ProductRecord {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.len() != FIELD_COUNT {
            return Err(ChainError::InvalidRecord(format!(
                "Expected {} fields, got {}",
                FIELD_COUNT,
                fields.len()
            )));
        }
        let item_number = fields[6]
            .parse::<u64>()
            .map_err(|e| ChainError::InvalidRecord(format!("Invalid item number '{}': {}", fields[6], e)))?;
        ProductRecord::new(fields[0], fields[1], fields[2], fields[3], fields[4], fields[5], item_number)
    }
}
