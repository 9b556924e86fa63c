//! Parsing of `iw` output.

use std::sync::OnceLock;

use regex::Regex;

/// Why an `iw` command failed, as far as its message tells us.
///
/// `iw` reports netlink failures as `command failed: <text> (<-errno>)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IwErrorKind {
    /// `EPERM` (-1): the caller may not reconfigure the interface.
    PermissionDenied,
    /// `EBUSY` (-16): usually the interface left monitor mode.
    Busy,
    /// `ENODEV` (-19): the interface is gone.
    NoSuchDevice,
    /// `EINVAL` (-22): the channel cannot legally be used here.
    InvalidArgument,
    /// Anything else.
    Other,
}

/// Lowest centre frequency of the 6 GHz band.
const SIX_GHZ_START_MHZ: u32 = 5925;

fn errno_regex() -> &'static Regex {
    static ERRNO: OnceLock<Regex> = OnceLock::new();
    ERRNO.get_or_init(|| Regex::new(r"\((-\d+)\)").expect("static errno pattern"))
}

fn channel_regex() -> &'static Regex {
    static CHANNEL: OnceLock<Regex> = OnceLock::new();
    CHANNEL.get_or_init(|| {
        Regex::new(r"^\s*\*\s+(\d+)(?:\.\d+)?\s+MHz\s+\[(\d+)\](.*)$").expect("static channel pattern")
    })
}

/// Classify the combined stdout/stderr of a failed `iw` invocation.
#[must_use]
pub fn classify_error(output: &str) -> IwErrorKind {
    let errno = errno_regex()
        .captures_iter(output)
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .last();

    match errno {
        Some(-1) => IwErrorKind::PermissionDenied,
        Some(-16) => IwErrorKind::Busy,
        Some(-19) => IwErrorKind::NoSuchDevice,
        Some(-22) => IwErrorKind::InvalidArgument,
        _ => IwErrorKind::Other,
    }
}

/// Extract the usable channel numbers from `iw phy <phy> channels`.
///
/// Each channel line looks like `* 2412 MHz [1]`. Lines marked
/// `(disabled)` are channels the regulatory domain forbids and are skipped.
/// 6 GHz channels reuse the small channel numbers, so they are skipped too.
#[must_use]
pub fn parse_channels(output: &str) -> Vec<u16> {
    output
        .lines()
        .filter_map(|line| channel_regex().captures(line))
        .filter(|caps| !caps[3].contains("(disabled)"))
        .filter(|caps| {
            caps[1]
                .parse::<u32>()
                .is_ok_and(|mhz| mhz < SIX_GHZ_START_MHZ)
        })
        .filter_map(|caps| caps[2].parse().ok())
        .collect()
}
