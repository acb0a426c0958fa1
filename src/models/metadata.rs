use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeviceClass {
    MacbookPro14,
    GalaxyBook4Pro360,
    Tablet,
    DevDesktop,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::MacbookPro14 => "MacBook Pro 14",
            DeviceClass::GalaxyBook4Pro360 => "Galaxy Book4 Pro 360",
            DeviceClass::Tablet => "Tablet",
            DeviceClass::DevDesktop => "Dev Desktop",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Gender {
    Male,
    Female,
}

/// Whether an accessory (hat, glasses) is worn. Serialized as `O` / `X`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Presence {
    #[serde(rename = "O")]
    Worn,
    #[default]
    #[serde(rename = "X")]
    NotWorn,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Participant and session attributes, filled in before any capture phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub name: String,
    pub device: DeviceClass,
    pub gender: Gender,
    pub hat: Presence,
    pub glasses: Presence,
    pub resolution: Resolution,
}

impl SessionMetadata {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("participant name must not be blank");
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            bail!(
                "screen resolution {}x{} is not usable",
                self.resolution.width,
                self.resolution.height
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionMetadata {
        SessionMetadata {
            name: "Kim Minji".into(),
            device: DeviceClass::Tablet,
            gender: Gender::Female,
            hat: Presence::NotWorn,
            glasses: Presence::Worn,
            resolution: Resolution {
                width: 1512,
                height: 982,
            },
        }
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut meta = sample();
        meta.name = "   ".into();
        assert!(meta.validate().is_err());
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn accessories_serialize_as_marks() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["hat"], "X");
        assert_eq!(json["glasses"], "O");
        assert_eq!(json["resolution"]["width"], 1512);
    }
}
