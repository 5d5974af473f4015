//! License SKU identifiers and the well-known catalogue.

use std::fmt;

use uuid::Uuid;

/// Catalogue of SKU names the tenant commonly assigns.
const CATALOGUE: &[(&str, &str)] = &[
    ("MICROSOFT_365_E3", "05e9a617-0261-4cee-bb44-138d3ef5d965"),
    ("MICROSOFT_365_E5", "06ebc4ee-1bb5-47dd-8120-11324bc54e06"),
    ("OFFICE_365_E1", "18181a46-0d4e-45cd-891e-60aabd171b4e"),
    ("OFFICE_365_E3", "6fd2c87f-b296-42f0-b197-1e91e994b900"),
    ("OFFICE_365_E5", "c7df2760-2c81-4ef7-b578-5b5392b571df"),
    ("MICROSOFT_POWER_APPS_DEV", "8f0c5670-4e56-4892-b06d-91c085d7004f"),
    (
        "MICROSOFT_COPILOT_STUDIO_VIRAL_TRIAL",
        "107a9a8b-79a1-40a9-836f-9508d3859b8a",
    ),
];

/// Errors raised while resolving SKU references.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkuResolutionError {
    /// Neither a catalogue name nor a GUID.
    #[error("unknown license SKU '{reference}'")]
    Unknown { reference: String },
    /// The list contained no SKUs.
    #[error("at least one license SKU is required")]
    Empty,
}

/// A license SKU identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkuId(Uuid);

impl SkuId {
    /// Resolve a catalogue name (case-insensitive) or a raw GUID.
    ///
    /// # Examples
    /// ```
    /// use roster::domain::SkuId;
    ///
    /// let by_name = SkuId::resolve("microsoft_power_apps_dev").expect("catalogue name");
    /// let by_guid = SkuId::resolve("8f0c5670-4e56-4892-b06d-91c085d7004f").expect("guid");
    /// assert_eq!(by_name, by_guid);
    /// ```
    pub fn resolve(reference: &str) -> Result<Self, SkuResolutionError> {
        let trimmed = reference.trim();
        if let Some((_, guid)) = CATALOGUE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        {
            return Uuid::parse_str(guid).map(Self).map_err(|_| {
                SkuResolutionError::Unknown {
                    reference: trimmed.to_owned(),
                }
            });
        }
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|_| SkuResolutionError::Unknown {
                reference: trimmed.to_owned(),
            })
    }

    /// Resolve a comma-separated list, ignoring blank entries.
    pub fn resolve_list(raw: &str) -> Result<Vec<Self>, SkuResolutionError> {
        let skus = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::resolve)
            .collect::<Result<Vec<_>, _>>()?;
        if skus.is_empty() {
            return Err(SkuResolutionError::Empty);
        }
        Ok(skus)
    }

    /// Underlying GUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Catalogue name for this SKU when it has one.
    pub fn catalogue_name(&self) -> Option<&'static str> {
        CATALOGUE
            .iter()
            .find(|(_, guid)| Uuid::parse_str(guid).is_ok_and(|id| id == self.0))
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for SkuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}
