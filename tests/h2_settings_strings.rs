//! Akamai settings-string scenarios across profiles and hand-written
//! inputs.

use wraith::fingerprint::h2::{parse_settings_string, H2Setting, PseudoHeader};
use wraith::fingerprint::profiles;
use wraith::Options;

#[test]
fn chrome_vector() {
    let (settings, pheaders) =
        parse_settings_string("1:65536;2:0;4:6291456;6:262144|15663105|0|m,a,s,p").unwrap();

    assert_eq!(
        settings.ordered_settings(),
        vec![(1, 65536), (2, 0), (4, 6291456), (6, 262144)]
    );
    assert_eq!(settings.connection_flow, 15663105);

    let priority = settings.header_priority.unwrap();
    assert_eq!(
        (priority.stream_dep, priority.exclusive, priority.weight),
        (0, true, Some(256))
    );

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
fn safari_vector() {
    let (settings, pheaders) =
        parse_settings_string("2:0;3:100;4:2097152;9:1|10420225|0:256:false|m,s,a,p").unwrap();

    assert_eq!(settings.settings.get(&H2Setting::NoRfc7540Priorities), Some(&1));
    assert_eq!(settings.connection_flow, 10420225);

    let priority = settings.header_priority.unwrap();
    assert!(!priority.exclusive);
    assert_eq!(priority.weight, Some(256));
    assert_eq!(priority.stream_dep, 0);

    assert_eq!(
        pheaders.unwrap(),
        vec![
            PseudoHeader::Method,
            PseudoHeader::Scheme,
            PseudoHeader::Authority,
            PseudoHeader::Path
        ]
    );

    // Setting 9 reaches the wire with raw ID 9, value 1.
    assert!(settings.ordered_settings().contains(&(9, 1)));
}

#[test]
fn firefox_vector_with_explicit_pheader_suffix() {
    let input = "1:65536;2:0;4:131072;5:16384|12517377|13:42:false|m,p,a,s||:method,:path,:authority,:scheme";
    let (settings, pheaders) = parse_settings_string(input).unwrap();

    assert_eq!(
        settings.ordered_settings(),
        vec![(1, 65536), (2, 0), (4, 131072), (5, 16384)]
    );

    let priority = settings.header_priority.unwrap();
    assert_eq!(priority.stream_dep, 13);
    assert_eq!(priority.weight, Some(42));
    assert!(!priority.exclusive);

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
fn unknown_setting_id_round_trips() {
    let (settings, _) = parse_settings_string("8:1;1:4096|0|0|m,a").unwrap();
    assert_eq!(settings.settings.get(&H2Setting::Unknown(8)), Some(&1));
    assert!(settings.ordered_settings().contains(&(8, 1)));
}

#[test]
fn profile_settings_strings_parse() {
    for profile in [
        profiles::chrome120 as fn(&mut Options),
        profiles::chrome,
        profiles::chromium,
        profiles::safari,
        profiles::chromium_ja4r,
        profiles::safari_ja4r,
    ] {
        let mut options = Options::new();
        profile(&mut options);
        let raw = options
            .h2_settings_string
            .as_deref()
            .expect("profile should carry a settings string");
        parse_settings_string(raw).unwrap_or_else(|e| panic!("'{raw}' failed: {e}"));
    }
}

#[test]
fn options_resolution_prefers_the_string_form() {
    let mut options = Options::new();
    profiles::chrome142(&mut options);
    assert!(options.h2_settings.is_some());
    options.h2_settings_string =
        Some("2:0;3:100;4:2097152;9:1|10420225|0:256:false|m,s,a,p".to_string());

    let (resolved, pheaders) = options.resolved_h2_settings().unwrap();
    assert_eq!(resolved.unwrap().connection_flow, 10420225);
    // The derived pseudo-header order overrides the profile's.
    assert_eq!(pheaders.unwrap()[1], PseudoHeader::Scheme);
}
