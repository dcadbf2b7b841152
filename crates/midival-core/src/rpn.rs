//! Registered Parameter Number (RPN) reconstruction.
//!
//! CC101/CC100 select a parameter, and CC6/CC38 then carry its data. The
//! selector persists across Data Entry messages until it is explicitly
//! re-selected.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::controller;
use crate::error::{Error, Result};
use crate::message::ControlChangeMessage;

/// The registered parameters this library understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegisteredParameter {
    PitchBendSensitivity,
    ChannelFineTuning,
    ChannelCoarseTuning,
    TuningProgramChange,
    TuningBankSelect,
    ModulationDepthChange,
    MpeConfigurationMessage,
}

impl RegisteredParameter {
    pub const ALL: [Self; 7] = [
        Self::PitchBendSensitivity,
        Self::ChannelFineTuning,
        Self::ChannelCoarseTuning,
        Self::TuningProgramChange,
        Self::TuningBankSelect,
        Self::ModulationDepthChange,
        Self::MpeConfigurationMessage,
    ];

    /// The `[msb, lsb]` selector pair for this parameter.
    pub fn selector(self) -> [u8; 2] {
        match self {
            Self::PitchBendSensitivity => [0, 0],
            Self::ChannelFineTuning => [0, 1],
            Self::ChannelCoarseTuning => [0, 2],
            Self::TuningProgramChange => [0, 3],
            Self::TuningBankSelect => [0, 4],
            Self::ModulationDepthChange => [0, 5],
            Self::MpeConfigurationMessage => [0, 6],
        }
    }

    /// Exact pair match against the parameter table.
    pub fn from_selector(msb: u8, lsb: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|param| param.selector() == [msb, lsb])
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PitchBendSensitivity => "PITCH_BEND_SENSITIVITY",
            Self::ChannelFineTuning => "CHANNEL_FINE_TUNING",
            Self::ChannelCoarseTuning => "CHANNEL_COARSE_TUNING",
            Self::TuningProgramChange => "TUNING_PROGRAM_CHANGE",
            Self::TuningBankSelect => "TUNING_BANK_SELECT",
            Self::ModulationDepthChange => "MODULATION_DEPTH_CHANGE",
            Self::MpeConfigurationMessage => "MPE_CONFIGURATION_MESSAGE",
        }
    }
}

impl fmt::Display for RegisteredParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Data Entry for a registered parameter.
///
/// Exactly one of `msb`/`lsb` is set: each Data Entry byte is reported as
/// its own event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredParameterEvent {
    pub channel: u8,
    pub parameter: RegisteredParameter,
    pub msb: Option<u8>,
    pub lsb: Option<u8>,
}

/// Two-byte RPN selector register. `None` marks a half not yet selected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RpnSelector {
    msb: Option<u8>,
    lsb: Option<u8>,
}

impl RpnSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_msb(&mut self, msb: u8) {
        self.msb = Some(msb);
    }

    pub fn select_lsb(&mut self, lsb: u8) {
        self.lsb = Some(lsb);
    }

    pub fn msb(&self) -> Option<u8> {
        self.msb
    }

    pub fn lsb(&self) -> Option<u8> {
        self.lsb
    }

    /// Resolve the current selection.
    ///
    /// An unselected LSB matches as 0. Without an MSB nothing is selected.
    pub fn lookup(&self) -> Result<RegisteredParameter> {
        let unknown = || Error::UnknownRegisteredParameter {
            msb: self.msb,
            lsb: self.lsb,
        };
        let msb = self.msb.ok_or_else(unknown)?;
        RegisteredParameter::from_selector(msb, self.lsb.unwrap_or(0)).ok_or_else(unknown)
    }

    /// Feed one control change through the selector.
    ///
    /// Selector controllers update the register and yield `Ok(None)`. Data
    /// Entry controllers resolve the register and yield the event, or fail
    /// when the selection is not a known parameter. Other controllers are
    /// ignored.
    pub fn process(
        &mut self,
        message: &ControlChangeMessage,
    ) -> Result<Option<RegisteredParameterEvent>> {
        match message.control {
            controller::RPN_MSB => {
                self.select_msb(message.value);
                Ok(None)
            }
            controller::RPN_LSB => {
                self.select_lsb(message.value);
                Ok(None)
            }
            controller::DATA_ENTRY_MSB => Ok(Some(RegisteredParameterEvent {
                channel: message.channel,
                parameter: self.lookup()?,
                msb: Some(message.value),
                lsb: None,
            })),
            controller::DATA_ENTRY_LSB => Ok(Some(RegisteredParameterEvent {
                channel: message.channel,
                parameter: self.lookup()?,
                msb: None,
                lsb: Some(message.value),
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChannelVoiceMessage;

    fn cc(channel: u8, control: u8, value: u8) -> ControlChangeMessage {
        ChannelVoiceMessage::from_bytes(&[0xB0 + channel - 1, control, value])
            .unwrap()
            .into()
    }

    #[test]
    fn test_parameter_table() {
        for param in RegisteredParameter::ALL {
            let [msb, lsb] = param.selector();
            assert_eq!(RegisteredParameter::from_selector(msb, lsb), Some(param));
        }
        assert_eq!(RegisteredParameter::from_selector(0, 7), None);
        assert_eq!(RegisteredParameter::from_selector(127, 127), None);
        assert_eq!(
            RegisteredParameter::MpeConfigurationMessage.to_string(),
            "MPE_CONFIGURATION_MESSAGE"
        );
    }

    #[test]
    fn test_msb_only_selects_pitch_bend_sensitivity() {
        let mut rpn = RpnSelector::new();
        assert_eq!(rpn.process(&cc(1, 101, 0)).unwrap(), None);

        let event = rpn.process(&cc(1, 6, 5)).unwrap().unwrap();
        assert_eq!(event.parameter, RegisteredParameter::PitchBendSensitivity);
        assert_eq!(event.parameter.name(), "PITCH_BEND_SENSITIVITY");
        assert_eq!(event.msb, Some(5));
        assert_eq!(event.lsb, None);
        assert_eq!(event.channel, 1);

        // Selection persists for the following Data Entry LSB
        let event = rpn.process(&cc(1, 38, 12)).unwrap().unwrap();
        assert_eq!(event.parameter, RegisteredParameter::PitchBendSensitivity);
        assert_eq!(event.msb, None);
        assert_eq!(event.lsb, Some(12));
    }

    #[test]
    fn test_halves_update_independently() {
        let mut rpn = RpnSelector::new();
        rpn.process(&cc(16, 100, 6)).unwrap();
        rpn.process(&cc(16, 101, 0)).unwrap();
        assert_eq!(rpn.msb(), Some(0));
        assert_eq!(rpn.lsb(), Some(6));

        let event = rpn.process(&cc(16, 6, 4)).unwrap().unwrap();
        assert_eq!(event.parameter, RegisteredParameter::MpeConfigurationMessage);
        assert_eq!(event.channel, 16);

        // Re-selecting only the LSB keeps the MSB
        rpn.process(&cc(16, 100, 2)).unwrap();
        let event = rpn.process(&cc(16, 6, 0)).unwrap().unwrap();
        assert_eq!(event.parameter, RegisteredParameter::ChannelCoarseTuning);
    }

    #[test]
    fn test_unknown_selection_fails_lookup() {
        let mut rpn = RpnSelector::new();
        assert_eq!(
            rpn.process(&cc(1, 6, 1)),
            Err(Error::UnknownRegisteredParameter {
                msb: None,
                lsb: None
            })
        );

        rpn.process(&cc(1, 101, 127)).unwrap();
        rpn.process(&cc(1, 100, 127)).unwrap();
        assert!(rpn.process(&cc(1, 38, 1)).is_err());
        assert!(rpn.lookup().is_err());
    }

    #[test]
    fn test_other_controllers_ignored() {
        let mut rpn = RpnSelector::new();
        assert_eq!(rpn.process(&cc(1, 74, 64)).unwrap(), None);
        assert_eq!(rpn, RpnSelector::new());
    }
}
