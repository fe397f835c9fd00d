use serde::{Deserialize, Serialize};

/// The seven healthsheet sections, each stored exactly as the editor saved
/// it: a serialized `{version, records}` JSON payload, possibly blank.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthsheetSections {
    pub motivation: String,
    pub composition: String,
    pub collection: String,
    pub preprocessing: String,
    pub uses: String,
    pub distribution: String,
    pub maintenance: String,
}

impl HealthsheetSections {
    /// Sections in render order with their display titles.
    #[must_use]
    pub fn ordered(&self) -> [(&'static str, &str); 7] {
        [
            ("Motivation", self.motivation.as_str()),
            ("Data Composition", self.composition.as_str()),
            ("Collection Process", self.collection.as_str()),
            ("Pre-processing/De-Identification", self.preprocessing.as_str()),
            ("Uses", self.uses.as_str()),
            ("Dataset Distribution", self.distribution.as_str()),
            ("Maintenance", self.maintenance.as_str()),
        ]
    }
}

fn default_version() -> u32 {
    1
}

/// Parsed form of one section payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthsheetPayload {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub records: Vec<HealthsheetRecord>,
}

impl Default for HealthsheetPayload {
    fn default() -> Self {
        Self {
            version: 1,
            records: Vec::new(),
        }
    }
}

impl HealthsheetPayload {
    /// Blank or malformed payloads fall back to the empty
    /// `{version: 1, records: []}` document instead of failing.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(raw).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthsheetRecord {
    pub id: u64,
    pub question: String,
    #[serde(default)]
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_payload_defaults() {
        let payload = HealthsheetPayload::parse_lenient("   ");
        assert_eq!(payload.version, 1);
        assert!(payload.records.is_empty());
    }

    #[test]
    fn malformed_payload_defaults() {
        let payload = HealthsheetPayload::parse_lenient("{not json");
        assert_eq!(payload, HealthsheetPayload::default());
    }

    #[test]
    fn records_parse_with_missing_response() {
        let payload =
            HealthsheetPayload::parse_lenient(r#"{"version":1,"records":[{"id":3,"question":"Q"}]}"#);
        assert_eq!(payload.records.len(), 1);
        assert_eq!(payload.records[0].id, 3);
        assert_eq!(payload.records[0].response, "");
    }

    #[test]
    fn section_order_is_fixed() {
        let sections = HealthsheetSections::default();
        let titles: Vec<&str> = sections.ordered().iter().map(|(title, _)| *title).collect();
        assert_eq!(
            titles,
            vec![
                "Motivation",
                "Data Composition",
                "Collection Process",
                "Pre-processing/De-Identification",
                "Uses",
                "Dataset Distribution",
                "Maintenance",
            ]
        );
    }
}
