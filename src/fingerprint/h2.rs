//! HTTP/2 session fingerprint: SETTINGS values and order, connection-level
//! flow window, HEADERS priority, and pseudo-header order.
//!
//! The wire format mirrors the Akamai fingerprint encoding:
//! `settings|connection_flow|priority|order[||pheader_order]` where
//! `settings` is `;`-separated `ID:VALUE`, `priority` is `dep` or
//! `dep:weight:exclusive`, and `order` is a comma list of single letters.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Symbolic SETTINGS identifier. IDs outside the known set are carried as
/// `Unknown` so they still reach the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum H2Setting {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
    /// Setting 9, sent by Safari (RFC 9218 deployment signal).
    NoRfc7540Priorities,
    Unknown(u16),
}

impl H2Setting {
    pub fn id(self) -> u16 {
        match self {
            Self::HeaderTableSize => 1,
            Self::EnablePush => 2,
            Self::MaxConcurrentStreams => 3,
            Self::InitialWindowSize => 4,
            Self::MaxFrameSize => 5,
            Self::MaxHeaderListSize => 6,
            Self::NoRfc7540Priorities => 9,
            Self::Unknown(id) => id,
        }
    }

    pub fn from_id(id: u16) -> Self {
        match id {
            1 => Self::HeaderTableSize,
            2 => Self::EnablePush,
            3 => Self::MaxConcurrentStreams,
            4 => Self::InitialWindowSize,
            5 => Self::MaxFrameSize,
            6 => Self::MaxHeaderListSize,
            9 => Self::NoRfc7540Priorities,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for H2Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderTableSize => write!(f, "HEADER_TABLE_SIZE"),
            Self::EnablePush => write!(f, "ENABLE_PUSH"),
            Self::MaxConcurrentStreams => write!(f, "MAX_CONCURRENT_STREAMS"),
            Self::InitialWindowSize => write!(f, "INITIAL_WINDOW_SIZE"),
            Self::MaxFrameSize => write!(f, "MAX_FRAME_SIZE"),
            Self::MaxHeaderListSize => write!(f, "MAX_HEADER_LIST_SIZE"),
            Self::NoRfc7540Priorities => write!(f, "NO_RFC7540_PRIORITIES"),
            Self::Unknown(id) => write!(f, "UNKNOWN_SETTING_{id}"),
        }
    }
}

/// HTTP/2 pseudo-header. Emission order is browser-specific and part of the
/// fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PseudoHeader {
    Method,
    Authority,
    Scheme,
    Path,
}

impl PseudoHeader {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Method => ":method",
            Self::Authority => ":authority",
            Self::Scheme => ":scheme",
            Self::Path => ":path",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            ":method" => Some(Self::Method),
            ":authority" => Some(Self::Authority),
            ":scheme" => Some(Self::Scheme),
            ":path" => Some(Self::Path),
            _ => None,
        }
    }

    fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "m" => Some(Self::Method),
            "a" => Some(Self::Authority),
            "s" => Some(Self::Scheme),
            "p" => Some(Self::Path),
            _ => None,
        }
    }
}

/// Default pseudo-header order when neither profile nor settings string
/// provides one.
pub const DEFAULT_PHEADER_ORDER: [PseudoHeader; 4] = [
    PseudoHeader::Method,
    PseudoHeader::Authority,
    PseudoHeader::Scheme,
    PseudoHeader::Path,
];

/// RFC 7540 priority attached to a HEADERS frame. `weight` carries the
/// human 1..=256 value; the wire encodes `weight - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPriority {
    pub stream_dep: u32,
    pub exclusive: bool,
    pub weight: Option<u16>,
}

/// Standalone PRIORITY frame sent before the first HEADERS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityFrameSpec {
    pub stream_id: u32,
    pub priority: HeaderPriority,
}

/// Parsed HTTP/2 session prelude.
#[derive(Debug, Clone, Default)]
pub struct H2Settings {
    pub settings: HashMap<H2Setting, u32>,
    /// On-wire order of the SETTINGS frame entries.
    pub settings_order: Vec<H2Setting>,
    /// WINDOW_UPDATE delta applied to the connection window right after the
    /// preface. Zero means none.
    pub connection_flow: u32,
    pub header_priority: Option<HeaderPriority>,
    pub priority_frames: Vec<PriorityFrameSpec>,
}

impl H2Settings {
    /// SETTINGS entries in emission order. Zero-valued entries are skipped
    /// except ENABLE_PUSH, whose explicit zero is part of the fingerprint.
    pub fn ordered_settings(&self) -> Vec<(u16, u32)> {
        let mut out = Vec::with_capacity(self.settings_order.len());
        for &setting in &self.settings_order {
            let Some(&value) = self.settings.get(&setting) else {
                continue;
            };
            if value == 0 && setting != H2Setting::EnablePush {
                continue;
            }
            out.push((setting.id(), value));
        }
        out
    }
}

/// Settings present in `map`, known IDs first in ascending order, unknown
/// IDs after them also ascending.
fn present_in_id_order(map: &HashMap<H2Setting, u32>) -> Vec<H2Setting> {
    let mut present = Vec::with_capacity(map.len());
    for id in [1u16, 2, 3, 4, 5, 6, 9] {
        let setting = H2Setting::from_id(id);
        if map.contains_key(&setting) {
            present.push(setting);
        }
    }
    let mut unknown: Vec<H2Setting> = map
        .keys()
        .filter(|s| matches!(s, H2Setting::Unknown(_)))
        .copied()
        .collect();
    unknown.sort_by_key(|s| s.id());
    present.extend(unknown);
    present
}

/// Parse the pipe-delimited settings string. Returns the settings plus the
/// pseudo-header order when the string supplies or implies one.
pub fn parse_settings_string(input: &str) -> Result<(H2Settings, Option<Vec<PseudoHeader>>)> {
    // An explicit pseudo-header list rides after a `||` separator.
    let (settings_str, explicit_pheaders) = match input.split_once("||") {
        Some((left, right)) => (left, Some(right)),
        None => (input, None),
    };

    let parts: Vec<&str> = settings_str.split('|').collect();
    if parts.len() < 2 {
        return Err(Error::parse(
            "h2 settings",
            "expected at least 2 pipe-separated parts",
        ));
    }

    let mut out = H2Settings::default();

    if !parts[0].is_empty() {
        for pair in parts[0].split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (id_str, value_str) = pair
                .split_once(':')
                .ok_or_else(|| Error::parse("h2 settings", format!("bad pair '{pair}'")))?;
            let id: u16 = id_str
                .trim()
                .parse()
                .map_err(|_| Error::parse("h2 settings", format!("bad setting ID '{id_str}'")))?;
            let value: u32 = value_str.trim().parse().map_err(|_| {
                Error::parse("h2 settings", format!("bad setting value '{value_str}'"))
            })?;
            out.settings.insert(H2Setting::from_id(id), value);
        }
    }

    if parts.len() > 1 && !parts[1].is_empty() {
        out.connection_flow = parts[1].trim().parse().map_err(|_| {
            Error::parse("h2 connection_flow", parts[1].to_string())
        })?;
    }

    if parts.len() > 2 && !parts[2].is_empty() {
        out.header_priority = Some(parse_priority(parts[2].trim())?);
    }

    let order_letters: Vec<String> = if parts.len() > 3 && !parts[3].is_empty() {
        parts[3]
            .split(',')
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect()
    } else {
        Vec::new()
    };

    let present = present_in_id_order(&out.settings);
    if order_letters.is_empty() {
        out.settings_order = present;
    } else if order_letters.len() == present.len() {
        // Positional form: the i-th letter names the i-th present setting.
        for setting in &present {
            if !out.settings_order.contains(setting) {
                out.settings_order.push(*setting);
            }
        }
    } else {
        for letter in &order_letters {
            let setting = letter_to_setting(letter, &out.settings)?;
            if out.settings.contains_key(&setting) && !out.settings_order.contains(&setting) {
                out.settings_order.push(setting);
            }
        }
        // Settings the order string missed still have to be sent; append in
        // ID order.
        for setting in present {
            if !out.settings_order.contains(&setting) {
                out.settings_order.push(setting);
            }
        }
    }

    let pheaders = resolve_pheader_order(explicit_pheaders, &order_letters)?;
    Ok((out, pheaders))
}

/// `dep` alone (weight/exclusive inferred) or `dep:weight:exclusive`.
fn parse_priority(text: &str) -> Result<HeaderPriority> {
    let fields: Vec<&str> = text.split(':').collect();
    match fields.len() {
        1 => {
            let stream_dep: u32 = fields[0]
                .trim()
                .parse()
                .map_err(|_| Error::parse("h2 priority", fields[0].to_string()))?;
            let exclusive = stream_dep == 0;
            let weight = if exclusive { 256 } else { 42 };
            Ok(HeaderPriority {
                stream_dep,
                exclusive,
                weight: Some(weight),
            })
        }
        n if n >= 3 => {
            let stream_dep: u32 = fields[0]
                .trim()
                .parse()
                .map_err(|_| Error::parse("h2 priority", fields[0].to_string()))?;
            let weight: u16 = fields[1]
                .trim()
                .parse()
                .map_err(|_| Error::parse("h2 priority weight", fields[1].to_string()))?;
            let exclusive_str = fields[2].trim().to_lowercase();
            let exclusive = exclusive_str == "true" || exclusive_str == "1";
            Ok(HeaderPriority {
                stream_dep,
                exclusive,
                weight: Some(weight),
            })
        }
        _ => Err(Error::parse(
            "h2 priority",
            format!("expected 'dep' or 'dep:weight:exclusive', got '{text}'"),
        )),
    }
}

/// Fixed letter table used when the order string is not positional. `p` is
/// ambiguous between MAX_FRAME_SIZE and MAX_HEADER_LIST_SIZE and resolves to
/// whichever is actually present.
fn letter_to_setting(letter: &str, settings: &HashMap<H2Setting, u32>) -> Result<H2Setting> {
    let setting = match letter {
        "h" | "m" => H2Setting::HeaderTableSize,
        "e" | "a" => H2Setting::EnablePush,
        "c" => H2Setting::MaxConcurrentStreams,
        "i" | "s" => H2Setting::InitialWindowSize,
        "f" => H2Setting::MaxFrameSize,
        "p" => {
            if settings.contains_key(&H2Setting::MaxFrameSize) {
                H2Setting::MaxFrameSize
            } else if settings.contains_key(&H2Setting::MaxHeaderListSize) {
                H2Setting::MaxHeaderListSize
            } else {
                return Err(Error::parse(
                    "h2 settings order",
                    "letter 'p' with neither MAX_FRAME_SIZE nor MAX_HEADER_LIST_SIZE present",
                ));
            }
        }
        other => {
            return Err(Error::parse(
                "h2 settings order",
                format!("unknown order letter '{other}'"),
            ))
        }
    };
    Ok(setting)
}

fn resolve_pheader_order(
    explicit: Option<&str>,
    order_letters: &[String],
) -> Result<Option<Vec<PseudoHeader>>> {
    if let Some(explicit) = explicit {
        let explicit = explicit.trim();
        if !explicit.is_empty() {
            let mut order = Vec::with_capacity(4);
            for name in explicit.split(',') {
                let name = name.trim();
                let header = PseudoHeader::from_name(name)
                    .ok_or_else(|| Error::parse("pheader order", name.to_string()))?;
                order.push(header);
            }
            return Ok(Some(order));
        }
    }

    // Derivable form: the first four order letters all name pseudo-headers.
    if order_letters.len() >= 4 {
        let derived: Vec<PseudoHeader> = order_letters[..4]
            .iter()
            .filter_map(|l| PseudoHeader::from_letter(l))
            .collect();
        if derived.len() == 4 {
            return Ok(Some(derived));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_string_parses_to_ordered_settings() {
        let (settings, pheaders) =
            parse_settings_string("1:65536;2:0;4:6291456;6:262144|15663105|0|m,a,s,p").unwrap();

        assert_eq!(
            settings.settings.get(&H2Setting::HeaderTableSize),
            Some(&65536)
        );
        assert_eq!(settings.settings.get(&H2Setting::EnablePush), Some(&0));
        assert_eq!(
            settings.settings.get(&H2Setting::InitialWindowSize),
            Some(&6291456)
        );
        assert_eq!(
            settings.settings.get(&H2Setting::MaxHeaderListSize),
            Some(&262144)
        );
        assert_eq!(
            settings.settings_order,
            vec![
                H2Setting::HeaderTableSize,
                H2Setting::EnablePush,
                H2Setting::InitialWindowSize,
                H2Setting::MaxHeaderListSize
            ]
        );
        assert_eq!(settings.connection_flow, 15663105);

        let priority = settings.header_priority.unwrap();
        assert_eq!(priority.stream_dep, 0);
        assert!(priority.exclusive);
        assert_eq!(priority.weight, Some(256));

        assert_eq!(
            pheaders.unwrap(),
            vec![
                PseudoHeader::Method,
                PseudoHeader::Authority,
                PseudoHeader::Scheme,
                PseudoHeader::Path
            ]
        );
    }

    #[test]
    fn safari_string_carries_setting_9_and_explicit_priority() {
        let (settings, pheaders) =
            parse_settings_string("2:0;3:100;4:2097152;9:1|10420225|0:256:false|m,s,a,p").unwrap();

        assert_eq!(
            settings.settings.get(&H2Setting::NoRfc7540Priorities),
            Some(&1)
        );
        let priority = settings.header_priority.unwrap();
        assert_eq!(priority.stream_dep, 0);
        assert!(!priority.exclusive);
        assert_eq!(priority.weight, Some(256));

        assert_eq!(
            pheaders.unwrap(),
            vec![
                PseudoHeader::Method,
                PseudoHeader::Scheme,
                PseudoHeader::Authority,
                PseudoHeader::Path
            ]
        );

        // Setting 9 reaches the wire with its raw ID.
        let wire = settings.ordered_settings();
        assert!(wire.contains(&(9, 1)));
    }

    #[test]
    fn unknown_setting_ids_are_preserved() {
        let (settings, _) = parse_settings_string("7:1;1:4096|0|0|m").unwrap();
        assert_eq!(settings.settings.get(&H2Setting::Unknown(7)), Some(&1));
        assert_eq!(H2Setting::Unknown(7).to_string(), "UNKNOWN_SETTING_7");

        let wire = settings.ordered_settings();
        assert!(wire.contains(&(7, 1)));
    }

    #[test]
    fn zero_values_are_skipped_except_enable_push() {
        let (settings, _) = parse_settings_string("1:0;2:0;4:65535|0|0|m,a,s").unwrap();
        let wire = settings.ordered_settings();
        assert_eq!(wire, vec![(2, 0), (4, 65535)]);
    }

    #[test]
    fn non_positional_letters_fall_back_to_the_letter_table() {
        // Three letters, four present settings: letter-table path; `p`
        // resolves to MAX_HEADER_LIST_SIZE because MAX_FRAME_SIZE is absent.
        let (settings, _) =
            parse_settings_string("1:65536;2:0;4:6291456;6:262144|15663105|0|m,a,p").unwrap();
        assert_eq!(
            settings.settings_order,
            vec![
                H2Setting::HeaderTableSize,
                H2Setting::EnablePush,
                H2Setting::MaxHeaderListSize,
                // Missed setting appended in ID order.
                H2Setting::InitialWindowSize
            ]
        );
    }

    #[test]
    fn letter_p_prefers_max_frame_size_when_present() {
        let (settings, _) = parse_settings_string("1:65536;5:16384|0|0|m,p,c").unwrap();
        assert_eq!(
            settings.settings_order,
            vec![H2Setting::HeaderTableSize, H2Setting::MaxFrameSize]
        );
    }

    #[test]
    fn explicit_pheader_order_wins_over_derivation() {
        let (_, pheaders) = parse_settings_string(
            "1:65536|0|0|m,a,s,p||:method,:path,:authority,:scheme",
        )
        .unwrap();
        assert_eq!(
            pheaders.unwrap(),
            vec![
                PseudoHeader::Method,
                PseudoHeader::Path,
                PseudoHeader::Authority,
                PseudoHeader::Scheme
            ]
        );
    }

    #[test]
    fn no_order_part_falls_back_to_id_order() {
        let (settings, pheaders) = parse_settings_string("4:131072;1:65536|12517377").unwrap();
        assert_eq!(
            settings.settings_order,
            vec![H2Setting::HeaderTableSize, H2Setting::InitialWindowSize]
        );
        assert!(pheaders.is_none());
    }

    #[test]
    fn malformed_strings_error_with_field() {
        assert!(parse_settings_string("1:65536").is_err());
        assert!(parse_settings_string("1:x|0").is_err());
        assert!(parse_settings_string("1:1|flow").is_err());
        // One letter against two present settings forces the letter table,
        // where `z` is unknown.
        assert!(parse_settings_string("1:1;2:0|0|0|z").is_err());
    }
}
