//! Core type definitions for DIV2K super-resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::{Error, Result};

/// Integer upscaling factor between a low-resolution image and its
/// high-resolution counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Scale(u32);

impl Scale {
    pub const X2: Scale = Scale(2);
    pub const X3: Scale = Scale(3);
    pub const X4: Scale = Scale(4);

    /// Scale factor as an integer
    pub fn factor(self) -> u32 {
        self.0
    }

    /// Scale factor as usize, handy for tensor shapes
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for Scale {
    fn default() -> Self {
        Scale::X2
    }
}

impl TryFrom<u32> for Scale {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            2..=4 => Ok(Scale(value)),
            other => Err(Error::InvalidArgument(format!(
                "unsupported scale {other}, expected 2, 3 or 4"
            ))),
        }
    }
}

impl From<Scale> for u32 {
    fn from(scale: Scale) -> Self {
        scale.0
    }
}

impl FromStr for Scale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("invalid scale '{s}'")))?;
        Scale::try_from(value)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DIV2K dataset subset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Subset {
    /// Training images (0001-0800)
    Train,
    /// Validation images (0801-0900)
    Valid,
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subset::Train => write!(f, "train"),
            Subset::Valid => write!(f, "valid"),
        }
    }
}

impl FromStr for Subset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Subset::Train),
            "valid" => Ok(Subset::Valid),
            other => Err(Error::InvalidArgument(format!("unknown subset '{other}'"))),
        }
    }
}

/// Degradation operator used to produce the low-resolution images.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Downgrade {
    /// Bicubic downscaling (track 1)
    #[default]
    Bicubic,
    /// Unknown downscaling (track 2)
    Unknown,
    /// Realistic mild degradation, x4 only
    Mild,
    /// Realistic difficult degradation, x4 only
    Difficult,
    /// Realistic wild degradation, x4 only
    Wild,
}

impl Downgrade {
    /// Whether the DIV2K release stores this degradation under `X{scale}` directories.
    pub fn is_multi_scale(self) -> bool {
        matches!(self, Downgrade::Bicubic | Downgrade::Unknown)
    }

    /// File name suffix after `x4` for the realistic tracks.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Downgrade::Mild => "m",
            Downgrade::Difficult => "d",
            Downgrade::Wild => "w",
            Downgrade::Bicubic | Downgrade::Unknown => "",
        }
    }

    /// Check that this degradation is available at `scale`.
    pub fn check_scale(self, scale: Scale) -> Result<()> {
        if !self.is_multi_scale() && scale != Scale::X4 {
            return Err(Error::Config(format!(
                "downgrade '{self}' is only available for scale 4, got scale {scale}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Downgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Downgrade::Bicubic => "bicubic",
            Downgrade::Unknown => "unknown",
            Downgrade::Mild => "mild",
            Downgrade::Difficult => "difficult",
            Downgrade::Wild => "wild",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Downgrade {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bicubic" => Ok(Downgrade::Bicubic),
            "unknown" => Ok(Downgrade::Unknown),
            "mild" => Ok(Downgrade::Mild),
            "difficult" => Ok(Downgrade::Difficult),
            "wild" => Ok(Downgrade::Wild),
            other => Err(Error::InvalidArgument(format!("unknown downgrade '{other}'"))),
        }
    }
}

/// Super-resolution network architecture
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    /// Enhanced Deep Residual network
    #[default]
    Edsr,
    /// Wide-activation network, 3x3 expansion blocks
    WdsrA,
    /// Wide-activation network, 1x1 expansion with low-rank projection
    WdsrB,
}

impl Architecture {
    pub fn is_wdsr(self) -> bool {
        matches!(self, Architecture::WdsrA | Architecture::WdsrB)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Edsr => write!(f, "edsr"),
            Architecture::WdsrA => write!(f, "wdsr-a"),
            Architecture::WdsrB => write!(f, "wdsr-b"),
        }
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "edsr" => Ok(Architecture::Edsr),
            "wdsr-a" => Ok(Architecture::WdsrA),
            "wdsr-b" => Ok(Architecture::WdsrB),
            other => Err(Error::InvalidArgument(format!(
                "unknown model '{other}', expected edsr, wdsr-a or wdsr-b"
            ))),
        }
    }
}

/// Optimizer used for training
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerKind {
    /// Adam over plain convolution weights
    #[default]
    Adam,
    /// Adam over weight-normalized convolutions
    AdamWeightnorm,
}

impl OptimizerKind {
    pub fn from_weightnorm(weightnorm: bool) -> Self {
        if weightnorm {
            OptimizerKind::AdamWeightnorm
        } else {
            OptimizerKind::Adam
        }
    }

    pub fn uses_weightnorm(self) -> bool {
        self == OptimizerKind::AdamWeightnorm
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Adam => write!(f, "adam"),
            OptimizerKind::AdamWeightnorm => write!(f, "adam-weightnorm"),
        }
    }
}

/// Inclusive range of DIV2K image ids written as `first-last`, e.g. `1-800`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageIdRange {
    first: u32,
    last: u32,
}

impl ImageIdRange {
    pub fn new(first: u32, last: u32) -> Result<Self> {
        if first == 0 || last < first {
            return Err(Error::InvalidArgument(format!(
                "invalid image id range {first}-{last}"
            )));
        }
        Ok(Self { first, last })
    }

    /// Default DIV2K training ids
    pub fn div2k_train() -> Self {
        Self { first: 1, last: 800 }
    }

    /// Default DIV2K validation ids
    pub fn div2k_valid() -> Self {
        Self { first: 801, last: 900 }
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn last(&self) -> u32 {
        self.last
    }

    pub fn len(&self) -> usize {
        (self.last - self.first + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn ids(&self) -> RangeInclusive<u32> {
        self.first..=self.last
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.ids().collect()
    }
}

impl FromStr for ImageIdRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| Error::InvalidArgument(format!("invalid image id range '{s}'")))
        };

        match s.split_once('-') {
            Some((first, last)) => ImageIdRange::new(parse(first)?, parse(last)?),
            None => {
                let id = parse(s)?;
                ImageIdRange::new(id, id)
            }
        }
    }
}

impl TryFrom<String> for ImageIdRange {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ImageIdRange> for String {
    fn from(range: ImageIdRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for ImageIdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_bounds() {
        assert_eq!(Scale::try_from(3).unwrap(), Scale::X3);
        assert!(Scale::try_from(1).is_err());
        assert!(Scale::try_from(8).is_err());
        assert_eq!("4".parse::<Scale>().unwrap().factor(), 4);
        assert!("x4".parse::<Scale>().is_err());
    }

    #[test]
    fn test_scale_serde() {
        let json = serde_json::to_string(&Scale::X3).unwrap();
        assert_eq!(json, "3");
        let err = serde_json::from_str::<Scale>("5");
        assert!(err.is_err());
    }

    #[test]
    fn test_downgrade_scale_check() {
        assert!(Downgrade::Bicubic.check_scale(Scale::X2).is_ok());
        assert!(Downgrade::Unknown.check_scale(Scale::X3).is_ok());
        assert!(Downgrade::Mild.check_scale(Scale::X4).is_ok());
        assert!(Downgrade::Wild.check_scale(Scale::X2).is_err());
        assert_eq!(Downgrade::Difficult.file_suffix(), "d");
    }

    #[test]
    fn test_architecture_parse_and_display() {
        assert_eq!("wdsr-a".parse::<Architecture>().unwrap(), Architecture::WdsrA);
        assert_eq!("WDSR_B".parse::<Architecture>().unwrap(), Architecture::WdsrB);
        assert!("srgan".parse::<Architecture>().is_err());
        assert_eq!(Architecture::WdsrB.to_string(), "wdsr-b");
        assert_eq!(
            serde_json::to_string(&Architecture::WdsrA).unwrap(),
            "\"wdsr-a\""
        );
    }

    #[test]
    fn test_image_id_range() {
        let range: ImageIdRange = "1-800".parse().unwrap();
        assert_eq!(range, ImageIdRange::div2k_train());
        assert_eq!(range.len(), 800);

        let single: ImageIdRange = "42".parse().unwrap();
        assert_eq!(single.to_vec(), vec![42]);

        assert!("10-2".parse::<ImageIdRange>().is_err());
        assert!("0-5".parse::<ImageIdRange>().is_err());
        assert!("a-b".parse::<ImageIdRange>().is_err());
        assert_eq!(ImageIdRange::div2k_valid().to_string(), "801-900");
    }

    #[test]
    fn test_optimizer_kind() {
        assert_eq!(OptimizerKind::from_weightnorm(true), OptimizerKind::AdamWeightnorm);
        assert!(!OptimizerKind::Adam.uses_weightnorm());
        assert_eq!(OptimizerKind::AdamWeightnorm.to_string(), "adam-weightnorm");
    }
}
