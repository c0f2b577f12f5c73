//! Per-version alignment ledger.

use serde::{Deserialize, Serialize};

/// Alignment recorded for one rubric version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentEntry {
    pub version: u32,
    pub alignment: u8,
    /// RFC 3339 timestamp of the scoring.
    pub timestamp: String,
    pub misaligned_count: usize,
}

/// Alignment results ordered by rubric version, at most one per version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlignmentHistory(Vec<AlignmentEntry>);

impl AlignmentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry, replacing any previous entry for the same version.
    pub fn record(&mut self, entry: AlignmentEntry) {
        match self.0.iter_mut().find(|e| e.version == entry.version) {
            Some(existing) => *existing = entry,
            None => self.0.push(entry),
        }
        self.0.sort_by_key(|e| e.version);
    }

    pub fn entries(&self) -> &[AlignmentEntry] {
        &self.0
    }

    pub fn latest(&self) -> Option<&AlignmentEntry> {
        self.0.last()
    }

    pub fn get(&self, version: u32) -> Option<&AlignmentEntry> {
        self.0.iter().find(|e| e.version == version)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a stored ledger. Entries written out of order are re-sorted and
    /// later duplicates win.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<AlignmentEntry> = serde_json::from_str(raw)?;
        let mut history = Self::new();
        for entry in entries {
            history.record(entry);
        }
        Ok(history)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: u32, alignment: u8) -> AlignmentEntry {
        AlignmentEntry {
            version,
            alignment,
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            misaligned_count: 3,
        }
    }

    #[test]
    fn test_same_version_replaces() {
        let mut history = AlignmentHistory::new();
        history.record(entry(2, 60));
        history.record(entry(2, 85));
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(2).unwrap().alignment, 85);
    }

    #[test]
    fn test_entries_stay_sorted() {
        let mut history = AlignmentHistory::new();
        history.record(entry(3, 70));
        history.record(entry(2, 60));
        history.record(entry(4, 90));
        history.record(entry(2, 65));
        let versions: Vec<u32> = history.entries().iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![2, 3, 4]);
        assert_eq!(history.latest().unwrap().alignment, 90);
    }

    #[test]
    fn test_wire_shape() {
        let mut history = AlignmentHistory::new();
        history.record(entry(2, 73));
        let json: serde_json::Value = serde_json::from_str(&history.to_json()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "version": 2,
                "alignment": 73,
                "timestamp": "2025-01-01T00:00:00Z",
                "misalignedCount": 3
            }])
        );
    }

    #[test]
    fn test_from_json_normalizes() {
        let raw = r#"[
            {"version": 3, "alignment": 70, "timestamp": "t3", "misalignedCount": 4},
            {"version": 2, "alignment": 50, "timestamp": "t2", "misalignedCount": 7},
            {"version": 3, "alignment": 75, "timestamp": "t3b", "misalignedCount": 3}
        ]"#;
        let history = AlignmentHistory::from_json(raw).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries()[0].version, 2);
        assert_eq!(history.get(3).unwrap().alignment, 75);
    }
}
