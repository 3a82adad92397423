//! The five fixed image-upload categories.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// One fixed image-upload slot. Each category maps to exactly one extraction
/// prompt and, implicitly, one set of output keys.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// The DISCOM (power distribution company) application page.
    Discom,
    /// The net-meter registration page.
    NetMeter,
    /// A location screenshot with latitude and longitude.
    Location,
    /// The PV module nameplate.
    PvModule,
    /// The inverter nameplate.
    Inverter,
}

impl Category {
    /// All categories, in merge order. Later categories win key collisions.
    pub const ALL: [Category; 5] = [
        Category::Discom,
        Category::NetMeter,
        Category::Location,
        Category::PvModule,
        Category::Inverter,
    ];

    /// The wire name, used both as the multipart part name and as the JSON
    /// key on upload forms.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Discom => "discom",
            Category::NetMeter => "netMeter",
            Category::Location => "location",
            Category::PvModule => "pvModule",
            Category::Inverter => "inverter",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown image category: {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn unknown_part_name_is_rejected() {
        assert!("selfie".parse::<Category>().is_err());
    }
}
