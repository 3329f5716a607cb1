use serde::{Deserialize, Serialize};

/// Identity of a PSU as supplied by the TPP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsuIdData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_id_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_corporate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_corporate_id_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_ip_address: Option<String>,
}

impl PsuIdData {
    pub fn new(psu_id: impl Into<String>) -> Self {
        Self {
            psu_id: Some(psu_id.into()),
            ..Default::default()
        }
    }

    pub fn with_corporate_id(mut self, corporate_id: impl Into<String>) -> Self {
        self.psu_corporate_id = Some(corporate_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.psu_id.as_deref().map_or(true, |id| id.trim().is_empty())
    }

    /// Same PSU id; corporate ids are compared only when both carry one.
    pub fn matches(&self, other: &PsuIdData) -> bool {
        if self.psu_id != other.psu_id {
            return false;
        }
        match (&self.psu_corporate_id, &other.psu_corporate_id) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}
