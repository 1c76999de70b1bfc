//! Named hyperparameter presets.

use crate::config::ModelConfig;
use crate::types::Architecture;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Preset of architecture hyperparameters selected with `--profile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// EDSR baseline, 16 blocks of 64 filters
    Edsr,
    /// EDSR as published, 32 blocks of 256 filters with residual scaling
    EdsrPaper,
    WdsrA8,
    WdsrA16,
    WdsrA32,
    WdsrB8,
    WdsrB16,
    WdsrB32,
}

impl Profile {
    pub const ALL: [Profile; 8] = [
        Profile::Edsr,
        Profile::EdsrPaper,
        Profile::WdsrA8,
        Profile::WdsrA16,
        Profile::WdsrA32,
        Profile::WdsrB8,
        Profile::WdsrB16,
        Profile::WdsrB32,
    ];

    /// Overwrite the architecture hyperparameters of `model` with this preset.
    pub fn apply(self, model: &mut ModelConfig) {
        match self {
            Profile::Edsr => {
                model.architecture = Architecture::Edsr;
                model.num_filters = 64;
                model.num_res_blocks = 16;
                model.res_scaling = None;
            }
            Profile::EdsrPaper => {
                model.architecture = Architecture::Edsr;
                model.num_filters = 256;
                model.num_res_blocks = 32;
                model.res_scaling = Some(0.1);
            }
            Profile::WdsrA8 | Profile::WdsrA16 | Profile::WdsrA32 => {
                model.architecture = Architecture::WdsrA;
                model.num_filters = 32;
                model.num_res_blocks = self.num_res_blocks();
                model.res_expansion = 4;
                model.res_scaling = None;
                model.weightnorm = true;
            }
            Profile::WdsrB8 | Profile::WdsrB16 | Profile::WdsrB32 => {
                model.architecture = Architecture::WdsrB;
                model.num_filters = 32;
                model.num_res_blocks = self.num_res_blocks();
                model.res_expansion = 6;
                model.res_scaling = None;
                model.weightnorm = true;
            }
        }
    }

    fn num_res_blocks(self) -> usize {
        match self {
            Profile::Edsr => 16,
            Profile::EdsrPaper => 32,
            Profile::WdsrA8 | Profile::WdsrB8 => 8,
            Profile::WdsrA16 | Profile::WdsrB16 => 16,
            Profile::WdsrA32 | Profile::WdsrB32 => 32,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::Edsr => "edsr",
            Profile::EdsrPaper => "edsr-paper",
            Profile::WdsrA8 => "wdsr-a-8",
            Profile::WdsrA16 => "wdsr-a-16",
            Profile::WdsrA32 => "wdsr-a-32",
            Profile::WdsrB8 => "wdsr-b-8",
            Profile::WdsrB16 => "wdsr-b-16",
            Profile::WdsrB32 => "wdsr-b-32",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Profile::ALL
            .into_iter()
            .find(|profile| profile.to_string() == s.to_ascii_lowercase())
            .ok_or_else(|| {
                let names: Vec<String> = Profile::ALL.iter().map(|p| p.to_string()).collect();
                Error::InvalidArgument(format!(
                    "unknown profile '{s}', expected one of {}",
                    names.join(", ")
                ))
            })
    }
}
