//! Passive environment signals used for fingerprinting

use async_trait::async_trait;
use chrono::{Local, Offset};
use serde::{Deserialize, Serialize};

/// Signals gathered from the environment without asking the user anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    /// Reported user agent string
    pub user_agent: String,
    /// Language tag, e.g. `en-US`
    pub language: String,
    /// Screen width
    pub screen_width: u32,
    /// Screen height
    pub screen_height: u32,
    /// Minutes to add to local time to get UTC (negative east of Greenwich)
    pub timezone_offset: i32,
    /// Rendering-surface fingerprint, `None` when the surface is unavailable
    pub surface: Option<String>,
}

impl EnvironmentSignals {
    /// Join the signals and the stored value into the fingerprint string
    ///
    /// Segment order: user agent, language, `WxH`, timezone offset, surface,
    /// stored value. Missing surface and stored value become empty segments.
    pub fn fingerprint(&self, stored: Option<&str>) -> String {
        [
            self.user_agent.clone(),
            self.language.clone(),
            format!("{}x{}", self.screen_width, self.screen_height),
            self.timezone_offset.to_string(),
            self.surface.clone().unwrap_or_default(),
            stored.unwrap_or_default().to_string(),
        ]
        .join("|")
    }
}

/// Source of environment signals
#[async_trait]
pub trait SignalProbe: Send + Sync {
    async fn probe(&self) -> EnvironmentSignals;
}

/// Probe returning a fixed set of signals
#[derive(Debug, Clone)]
pub struct FixedProbe(pub EnvironmentSignals);

#[async_trait]
impl SignalProbe for FixedProbe {
    async fn probe(&self) -> EnvironmentSignals {
        self.0.clone()
    }
}

/// Probe reading the terminal host this process runs in
#[derive(Debug, Clone, Default)]
pub struct HostProbe;

const DEFAULT_COLUMNS: u32 = 80;
const DEFAULT_LINES: u32 = 24;

impl HostProbe {
    pub fn new() -> Self {
        Self
    }

    fn user_agent() -> String {
        format!(
            "rally/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    }

    fn language() -> String {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.is_empty())
            .map(|value| language_tag(&value))
            .unwrap_or_else(|| "en-US".to_string())
    }

    fn dimension(key: &str, default: u32) -> u32 {
        std::env::var(key)
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    fn surface() -> Option<String> {
        let term = std::env::var("TERM").ok().filter(|t| !t.is_empty())?;
        let colors = std::env::var("COLORTERM").unwrap_or_default();
        Some(format!("term:{};color:{}", term, colors))
    }
}

#[async_trait]
impl SignalProbe for HostProbe {
    async fn probe(&self) -> EnvironmentSignals {
        EnvironmentSignals {
            user_agent: Self::user_agent(),
            language: Self::language(),
            screen_width: Self::dimension("COLUMNS", DEFAULT_COLUMNS),
            screen_height: Self::dimension("LINES", DEFAULT_LINES),
            timezone_offset: local_timezone_offset(),
            surface: Self::surface(),
        }
    }
}

/// Local timezone offset in minutes, UTC minus local
pub fn local_timezone_offset() -> i32 {
    let east_secs = Local::now().offset().fix().local_minus_utc();
    -(east_secs / 60)
}

/// Convert a POSIX locale like `en_US.UTF-8` to a language tag like `en-US`
pub fn language_tag(locale: &str) -> String {
    let base = locale
        .split(['.', '@'])
        .next()
        .unwrap_or(locale);

    match base {
        "" | "C" | "POSIX" => "en-US".to_string(),
        other => other.replace('_', "-"),
    }
}
