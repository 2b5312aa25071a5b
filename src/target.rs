//! Target device identity: validated hardware address + address type.

use std::fmt;

use crate::error::{KelpieError, Result};

/// Bluetooth address type, as understood by the management tool's `-t` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AddressType {
    /// Classic BR/EDR address.
    #[default]
    ClassicBrEdr,
    /// Low Energy public address.
    LePublic,
    /// Low Energy random address.
    LeRandom,
}

impl AddressType {
    /// Numeric value passed to the management tool.
    pub fn value(self) -> u8 {
        match self {
            Self::ClassicBrEdr => 0,
            Self::LePublic => 1,
            Self::LeRandom => 2,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClassicBrEdr => "BR/EDR",
            Self::LePublic => "LE public",
            Self::LeRandom => "LE random",
        };
        write!(f, "{name}")
    }
}

/// IO capability profile announced during pairing.
///
/// `NoInputNoOutput` is the profile used for silent pairing: neither side
/// is asked to confirm anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

impl IoCapability {
    /// Numeric value passed to the management tool's `-c` flag.
    pub fn value(self) -> u8 {
        match self {
            Self::DisplayOnly => 0,
            Self::DisplayYesNo => 1,
            Self::KeyboardOnly => 2,
            Self::NoInputNoOutput => 3,
            Self::KeyboardDisplay => 4,
        }
    }
}

/// A validated remote peripheral identity.
///
/// The address is held in lowercase canonical form; equality is value
/// equality on (address, address type). Construction rejects anything that
/// is not six case-insensitive colon-separated hex pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    address: String,
    address_type: AddressType,
}

impl Target {
    /// Parse and validate a target address.
    ///
    /// # Errors
    ///
    /// Returns [`KelpieError::Target`] if the address is not in the
    /// canonical `xx:xx:xx:xx:xx:xx` form.
    pub fn new(address: &str, address_type: AddressType) -> Result<Self> {
        if !is_valid_address(address) {
            return Err(KelpieError::Target(format!(
                "{address} is not a valid bluetooth address"
            )));
        }
        Ok(Self {
            address: address.to_ascii_lowercase(),
            address_type,
        })
    }

    /// Parse a classic BR/EDR target.
    ///
    /// # Errors
    ///
    /// Same as [`Target::new`].
    pub fn classic(address: &str) -> Result<Self> {
        Self::new(address, AddressType::ClassicBrEdr)
    }

    /// Lowercase canonical address string.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Address type of this target.
    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    /// Address in the form PulseAudio uses for BlueZ object names:
    /// uppercase, separators replaced with underscores.
    pub fn normalized_address(&self) -> String {
        self.address.to_ascii_uppercase().replace(':', "_")
    }

    /// PulseAudio card name for this device.
    pub fn pulse_card_name(&self) -> String {
        format!("bluez_card.{}", self.normalized_address())
    }

    /// PulseAudio capture-source name for this device.
    pub fn pulse_source_name(&self) -> String {
        format!("bluez_input.{}.0", self.normalized_address())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Check whether a string is six case-insensitive colon-separated hex pairs.
pub fn is_valid_address(address: &str) -> bool {
    let groups: Vec<&str> = address.split(':').collect();
    groups.len() == 6
        && groups
            .iter()
            .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn valid_addresses_accepted_and_lowercased() {
        let target = Target::classic("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(target.address(), "aa:bb:cc:dd:ee:ff");

        let mixed = Target::classic("aA:0b:Cc:1d:Ee:2f").unwrap();
        assert_eq!(mixed.address(), "aa:0b:cc:1d:ee:2f");
    }

    #[test]
    fn invalid_addresses_rejected() {
        for bad in [
            "",
            "AA:BB:CC:DD:EE",
            "AA:BB:CC:DD:EE:FF:00",
            "AA-BB-CC-DD-EE-FF",
            "AA:BB:CC:DD:EE:GG",
            "AAA:BB:CC:DD:EE:F",
            "not an address",
        ] {
            assert!(Target::classic(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn equality_is_case_insensitive_on_address() {
        let upper = Target::classic("AA:BB:CC:DD:EE:FF").unwrap();
        let lower = Target::classic("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn equality_distinguishes_address_type() {
        let classic = Target::new("aa:bb:cc:dd:ee:ff", AddressType::ClassicBrEdr).unwrap();
        let le = Target::new("aa:bb:cc:dd:ee:ff", AddressType::LePublic).unwrap();
        assert_ne!(classic, le);
    }

    #[test]
    fn pulse_names_use_fixed_transformation() {
        let target = Target::classic("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(target.normalized_address(), "AA_BB_CC_DD_EE_FF");
        assert_eq!(target.pulse_card_name(), "bluez_card.AA_BB_CC_DD_EE_FF");
        assert_eq!(
            target.pulse_source_name(),
            "bluez_input.AA_BB_CC_DD_EE_FF.0"
        );
    }

    #[test]
    fn address_type_values_match_management_tool() {
        assert_eq!(AddressType::ClassicBrEdr.value(), 0);
        assert_eq!(AddressType::LePublic.value(), 1);
        assert_eq!(AddressType::LeRandom.value(), 2);
        assert_eq!(IoCapability::NoInputNoOutput.value(), 3);
    }
}
