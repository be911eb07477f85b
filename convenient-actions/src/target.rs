//! Build targets and the platform and configuration names they are keyed by.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platforms a target can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TargetPlatform {
    Win32,
    Win64,
    Mac,
    XboxOne,
    PS4,
    IOS,
    Android,
    WinRT,
    #[serde(rename = "WinRT_ARM")]
    WinRtArm,
    HTML5,
    Linux,
}

impl TargetPlatform {
    /// Every platform, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Win32,
        Self::Win64,
        Self::Mac,
        Self::XboxOne,
        Self::PS4,
        Self::IOS,
        Self::Android,
        Self::WinRT,
        Self::WinRtArm,
        Self::HTML5,
        Self::Linux,
    ];

    /// Name as used in file names and directories.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win32 => "Win32",
            Self::Win64 => "Win64",
            Self::Mac => "Mac",
            Self::XboxOne => "XboxOne",
            Self::PS4 => "PS4",
            Self::IOS => "IOS",
            Self::Android => "Android",
            Self::WinRT => "WinRT",
            Self::WinRtArm => "WinRT_ARM",
            Self::HTML5 => "HTML5",
            Self::Linux => "Linux",
        }
    }
}

/// Build configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TargetConfiguration {
    Debug,
    DebugGame,
    Development,
    Shipping,
    Test,
}

impl TargetConfiguration {
    /// Every configuration, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Debug,
        Self::DebugGame,
        Self::Development,
        Self::Shipping,
        Self::Test,
    ];

    /// Name as used in file names and directories.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::DebugGame => "DebugGame",
            Self::Development => "Development",
            Self::Shipping => "Shipping",
            Self::Test => "Test",
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TargetConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform '{s}'"))
    }
}

impl FromStr for TargetConfiguration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown configuration '{s}'"))
    }
}

/// One build target. Identifies the action history file of the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Target name, e.g. `ShooterGame`
    pub name: String,
    /// Platform being built
    pub platform: TargetPlatform,
    /// Configuration being built
    pub configuration: TargetConfiguration,
}

impl BuildTarget {
    /// Create a target.
    pub fn new(name: impl Into<String>, platform: TargetPlatform, configuration: TargetConfiguration) -> Self {
        Self {
            name: name.into(),
            platform,
            configuration,
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.platform, self.configuration)
    }
}
