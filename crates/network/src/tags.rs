//! DayZ server state carried in the info tags
//!
//! DayZ packs extra state into its comma-separated tag list:
//!
//! ```text
//! battleye,no3rd,external,privHive,shard005,lqs0,etm4.000000,entm6.000000,isDLC,19:42
//! ```

/// State extracted from DayZ tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayzTags {
    /// Players waiting in the login queue (`lqs<n>`)
    pub queue: Option<i64>,
    /// Third-person camera disabled (`no3rd`)
    pub first_person: bool,
    /// DLC content enabled (`isDLC`)
    pub dlc_enabled: bool,
    /// Private hive (`privHive`)
    pub private_hive: bool,
    /// Hosted externally (`external`)
    pub external: bool,
    /// In-game time of day (`HH:MM`)
    pub time: Option<String>,
    /// Day time acceleration (`etm<n>`)
    pub day_acceleration: Option<i64>,
    /// Night time acceleration (`entm<n>`)
    pub night_acceleration: Option<i64>,
}

impl DayzTags {
    pub fn parse<S: AsRef<str>>(tags: &[S]) -> Self {
        let mut out = Self::default();

        for tag in tags {
            let tag = tag.as_ref();

            if let Some(value) = tag.strip_prefix("lqs").and_then(parse_leading_int) {
                out.queue = Some(value);
            }
            if tag.contains("no3rd") {
                out.first_person = true;
            }
            if tag.contains("isDLC") {
                out.dlc_enabled = true;
            }
            if tag.contains("privHive") {
                out.private_hive = true;
            }
            if tag.contains("external") {
                out.external = true;
            }
            if tag.contains(':') {
                out.time = Some(tag.to_string());
            }
            if let Some(value) = tag.strip_prefix("etm").and_then(parse_leading_int) {
                out.day_acceleration = Some(value);
            }
            if let Some(value) = tag.strip_prefix("entm").and_then(parse_leading_int) {
                out.night_acceleration = Some(value);
            }
        }

        out
    }
}

/// Parse the integer at the start of `s`, ignoring whatever follows
///
/// `"4.000000"` gives 4, `"12abc"` gives 12, `"abc"` gives nothing.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
