use serde::Serialize;

/// A hand-authored category descriptor for the Windows update domain.
/// This list is configuration data, not derived from the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const WINDOWS_CATEGORIES: [CategoryInfo; 5] = [
    CategoryInfo {
        key: "security",
        name: "Security Updates",
        description: "Patches addressing vulnerabilities, including Patch Tuesday releases",
    },
    CategoryInfo {
        key: "quality",
        name: "Quality Updates",
        description: "Cumulative bug-fix and reliability rollups",
    },
    CategoryInfo {
        key: "feature",
        name: "Feature Updates",
        description: "Annual releases introducing new Windows capabilities",
    },
    CategoryInfo {
        key: "driver",
        name: "Driver Updates",
        description: "Hardware driver packages delivered through Windows Update",
    },
    CategoryInfo {
        key: "preview",
        name: "Preview Builds",
        description: "Insider and optional non-security preview releases",
    },
];

pub fn windows_categories() -> &'static [CategoryInfo] {
    &WINDOWS_CATEGORIES
}
