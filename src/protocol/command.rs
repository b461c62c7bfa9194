//! Control command parsing
//!
//! Commands arrive as short case-sensitive text tokens on the control
//! endpoint. Unknown tokens and unparsable values are ignored so that newer
//! clients can talk to older devices without breaking them.

use crate::config::Resolution;

/// One parsed operator command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Capture and transmit a single image, independent of streaming state
    Capture,
    StartFrames,
    StopFrames,
    StartAudio,
    StopAudio,
    /// Frame interval in seconds (clamped on application)
    SetInterval(f64),
    /// JPEG quality (clamped on application)
    SetQuality(i64),
    SetResolution(Resolution),
    /// Request a status report on the status endpoint
    Status,
}

impl Command {
    /// Parse a raw command token, returning `None` for anything unrecognized
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "CAPTURE" => Some(Self::Capture),
            "START_FRAMES" => Some(Self::StartFrames),
            "STOP_FRAMES" => Some(Self::StopFrames),
            "START_AUDIO" => Some(Self::StartAudio),
            "STOP_AUDIO" => Some(Self::StopAudio),
            "STATUS" => Some(Self::Status),
            _ => {
                if let Some(rest) = token.strip_prefix("INTERVAL:") {
                    let interval: f64 = rest.parse().ok()?;
                    interval.is_finite().then_some(Self::SetInterval(interval))
                } else if let Some(rest) = token.strip_prefix("QUALITY:") {
                    rest.parse().ok().map(Self::SetQuality)
                } else if let Some(rest) = token.strip_prefix("SIZE:") {
                    let ordinal: i64 = rest.parse().ok()?;
                    Resolution::from_ordinal(ordinal).map(Self::SetResolution)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_tokens() {
        assert_eq!(Command::parse("CAPTURE"), Some(Command::Capture));
        assert_eq!(Command::parse("START_FRAMES"), Some(Command::StartFrames));
        assert_eq!(Command::parse("STOP_FRAMES"), Some(Command::StopFrames));
        assert_eq!(Command::parse("START_AUDIO"), Some(Command::StartAudio));
        assert_eq!(Command::parse("STOP_AUDIO"), Some(Command::StopAudio));
        assert_eq!(Command::parse("STATUS"), Some(Command::Status));
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        assert_eq!(Command::parse("capture"), None);
        assert_eq!(Command::parse("Start_Frames"), None);
    }

    #[test]
    fn test_valued_tokens() {
        assert_eq!(
            Command::parse("INTERVAL:0.500"),
            Some(Command::SetInterval(0.5))
        );
        assert_eq!(Command::parse("QUALITY:25"), Some(Command::SetQuality(25)));
        assert_eq!(
            Command::parse("SIZE:13"),
            Some(Command::SetResolution(Resolution::Uxga))
        );
    }

    #[test]
    fn test_out_of_range_values_still_parse() {
        // Clamping happens at application time, not parse time
        assert_eq!(Command::parse("QUALITY:200"), Some(Command::SetQuality(200)));
        assert_eq!(
            Command::parse("INTERVAL:999"),
            Some(Command::SetInterval(999.0))
        );
    }

    #[test]
    fn test_bad_input_is_ignored() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("REBOOT"), None);
        assert_eq!(Command::parse("QUALITY:abc"), None);
        assert_eq!(Command::parse("INTERVAL:NaN"), None);
        assert_eq!(Command::parse("SIZE:14"), None);
        assert_eq!(Command::parse("SIZE:-1"), None);
    }
}
