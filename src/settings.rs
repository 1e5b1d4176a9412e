/*!
Configuration consumed by the core.

`Settings` is a plain serde struct. Every field has a usable default, so a
front end can build one in code, or load a (possibly partial) JSON document
with `Settings::from_json_str`. Persisting settings is the caller's business.
*/

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Video timing standard. Selects frame layout and native audio rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTiming {
    #[default]
    Ntsc,
    Pal,
}

impl ConsoleTiming {
    /// Native TIA audio rate: two samples per scanline.
    pub fn native_audio_rate(self) -> u32 {
        match self {
            ConsoleTiming::Ntsc => 31_400,
            ConsoleTiming::Pal => 31_113,
        }
    }

    /// Nominal CPU clock in Hz.
    pub fn cpu_clock(self) -> u32 {
        match self {
            ConsoleTiming::Ntsc => 1_193_182,
            ConsoleTiming::Pal => 1_182_298,
        }
    }
}

/// Host audio output parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub enabled: bool,
    /// Host sample rate in Hz. Equal to the native rate means no resampling.
    pub sample_rate: u32,
    /// Samples per channel in one fragment.
    pub fragment_size: usize,
    /// Number of fragments the queue holds before dropping the oldest.
    pub capacity: usize,
    pub stereo: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 44_100,
            fragment_size: 512,
            capacity: 20,
            stereo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timing: ConsoleTiming,
    /// Seed for the bus RNG. `None` seeds from the OS.
    pub random_seed: Option<u64>,
    /// Fill RIOT and cartridge RAM with random bytes on reset.
    pub randomize_ram: bool,
    /// Start multi-bank cartridges in a random bank where the scheme allows it.
    pub random_start_bank: bool,
    /// Drive undefined TIA data bus bits with random values instead of the last bus value.
    pub tia_pins_driven: bool,
    /// Treat ARM co-processor faults as fatal instead of warnings.
    pub thumb_trap_fatal: bool,
    /// Let read traps fire on dummy (ghost) reads.
    pub ghost_reads_trap: bool,
    /// First scanline after VSYNC that is rendered. `None` uses the layout default.
    pub ystart: Option<u32>,
    pub audio: AudioSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timing: ConsoleTiming::Ntsc,
            random_seed: None,
            randomize_ram: false,
            random_start_bank: false,
            tia_pins_driven: false,
            thumb_trap_fatal: true,
            ghost_reads_trap: false,
            ystart: None,
            audio: AudioSettings::default(),
        }
    }
}

impl Settings {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let settings: Settings =
            serde_json::from_str(text).map_err(|e| CoreError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.audio.enabled {
            if self.audio.sample_rate == 0 {
                return Err(CoreError::Config("audio.sample_rate must be non-zero".into()));
            }
            if self.audio.fragment_size == 0 || self.audio.capacity == 0 {
                return Err(CoreError::Config(
                    "audio.fragment_size and audio.capacity must be non-zero".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let s = Settings::from_json_str(r#"{ "timing": "pal", "audio": { "stereo": true } }"#)
            .expect("parse");
        assert_eq!(s.timing, ConsoleTiming::Pal);
        assert!(s.audio.stereo);
        assert_eq!(s.audio.fragment_size, 512);
        assert!(!s.randomize_ram);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let err = Settings::from_json_str(r#"{ "audio": { "sample_rate": 0 } }"#).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn json_round_trip() {
        let mut s = Settings::default();
        s.random_seed = Some(42);
        let text = s.to_json_string().expect("serialize");
        assert_eq!(Settings::from_json_str(&text).expect("parse"), s);
    }
}
