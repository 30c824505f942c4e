use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ticket classification used to steer the system instruction.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Hardware Failure
    #[default]
    #[serde(rename = "Hardware Failure")]
    HardwareFailure,

    /// Software / Bug
    #[serde(rename = "Software / Bug")]
    SoftwareBug,

    /// Billing & Account
    #[serde(rename = "Billing & Account")]
    BillingAccount,

    /// Network / Connectivity
    #[serde(rename = "Network / Connectivity")]
    NetworkConnectivity,

    /// Security Alert
    #[serde(rename = "Security Alert")]
    SecurityAlert,

    /// Other
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 6] = [
        Category::HardwareFailure,
        Category::SoftwareBug,
        Category::BillingAccount,
        Category::NetworkConnectivity,
        Category::SecurityAlert,
        Category::Other,
    ];

    /// The label shown to users and embedded in the system instruction.
    pub fn label(&self) -> &'static str {
        match self {
            Category::HardwareFailure => "Hardware Failure",
            Category::SoftwareBug => "Software / Bug",
            Category::BillingAccount => "Billing & Account",
            Category::NetworkConnectivity => "Network / Connectivity",
            Category::SecurityAlert => "Security Alert",
            Category::Other => "Other",
        }
    }

    /// A notice to show when this category is selected, if it changes how responses read.
    pub fn advisory(&self) -> Option<&'static str> {
        match self {
            Category::SecurityAlert => Some(
                "⚠️ SECURITY PROTOCOL ACTIVATED: Responses will prioritize account lockdown.",
            ),
            Category::BillingAccount => {
                Some("💲 FINANCE MODE: Responses will focus on refund policies.")
            }
            _ => None,
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Category::HardwareFailure => &["hardware"],
            Category::SoftwareBug => &["software", "bug"],
            Category::BillingAccount => &["billing", "account"],
            Category::NetworkConnectivity => &["network", "connectivity"],
            Category::SecurityAlert => &["security"],
            Category::Other => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts the full label, a one-word alias, or a 1-based index into [`Category::ALL`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        if let Ok(index) = needle.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|i| Category::ALL.get(i).copied())
                .ok_or_else(|| {
                    format!(
                        "category index {index} is out of range (1-{})",
                        Category::ALL.len()
                    )
                });
        }
        let normalized = normalize(needle);
        Category::ALL
            .iter()
            .copied()
            .find(|category| {
                normalize(category.label()) == normalized
                    || category.aliases().iter().any(|alias| *alias == normalized)
            })
            .ok_or_else(|| format!("unknown ticket category: {needle}"))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '&')
        .flat_map(char::to_lowercase)
        .collect()
}
