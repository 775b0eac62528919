//! Named browser profiles.
//!
//! Each profile mutates an [`Options`]: fingerprint string, HTTP/2 session
//! prelude, pseudo-header order, default headers, header emission order and
//! user agent - everything the named browser build sends. Profiles only
//! fill headers the caller has not already set.
//!
//! Chrome-family profiles below Chrome 142 permute their extension list per
//! application, mirroring the extension-order randomization Chrome ships
//! since 110.

use std::collections::HashMap;

use crate::fingerprint::h2::{H2Setting, H2Settings, HeaderPriority, PseudoHeader};
use crate::fingerprint::Fingerprint;
use crate::options::Options;

const CHROME_142_JA3: &str = "771,4865-4866-4867-49195-49199-49196-49200-52393-52392-49171-49172-156-157-47-53,65281-27-51-13-0-11-10-5-18-35-43-45-17613-23-65037-16-41,4588-29-23-24,0";

const CHROME_120_CIPHERS: &str =
    "4865-4866-4867-49195-49199-49196-49120-52393-52392-49171-49172-156-157-47-53";
const CHROMIUM_CIPHERS: &str =
    "4865-4866-4867-49195-49199-49196-49200-52393-52392-49171-49172-156-157-47-53";
const CHROME_120_EXTENSIONS: &str = "0-5-10-11-13-16-18-21-23-27-35-43-45-51-17513-65037-65281";
const CHROMIUM_EXTENSIONS: &str = "0-5-10-11-13-16-18-21-23-27-35-43-45-51-17513-65037-65281";

const FIREFOX_JA3: &str = "771,4865-4867-4866-49195-49199-52393-52392-49196-49200-49162-49161-49171-49172-156-157-47-53,0-23-65281-10-11-35-16-5-34-18-51-43-13-45-28-27-65037,4588-29-23-24-25-256-257,0";

const SAFARI_JA3: &str = "771,4865-4866-4867-49196-49195-52393-49200-49199-52392-49162-49161-49172-49171-157-156-53-47-49160-49170-10,0-23-65281-10-11-16-5-13-18-51-45-43-27-21,29-23-24-25,0";

const CHROME_120_H2: &str = "1:65536;2:0;4:6291456;6:262144|15663105|0:256:true|m,a,s,p";
const CHROMIUM_H2: &str = "1:65536;2:0;3:1000;4:6291456;6:262144|15663105|0:256:true|m,a,s,p";
const SAFARI_H2: &str = "2:0;3:100;4:2097152;9:1|10420225|0:256:false|m,s,a,p";

const CHROME_JA4R: &str = "t13d1515h2_002f,0035,009c,009d,1301,1302,1303,c013,c014,c02b,c02c,c02f,c030,cca8,cca9_0005,000a,000b,000d,0012,0017,001b,0023,002b,002d,0033,4469,ff01_0403,0804,0401,0503,0805,0501,0806,0601";
const CHROMIUM_JA4R: &str = "t13d5911_002f,0032,0033,0035,0038,0039,003c,003d,0040,0067,006a,006b,009c,009d,009e,009f,00a2,00a3,00ff,1301,1302,1303,c009,c00a,c013,c014,c023,c024,c027,c028,c02b,c02c,c02f,c030,c050,c051,c052,c053,c056,c057,c05c,c05d,c060,c061,c09c,c09d,c09e,c09f,c0a0,c0a1,c0a2,c0a3,c0ac,c0ad,c0ae,c0af,cca8,cca9,ccaa_000a,000b,000d,0016,0017,0023,0029,002b,002d,0033_0403,0503,0603,0807,0808,0809,080a,080b,0804,0805,0806,0401,0501,0601,0303,0301,0302,0402,0502,0602";
const FIREFOX_JA4R: &str = "t13d1717h2_002f,0035,009c,009d,1301,1302,1303,c009,c00a,c013,c014,c02b,c02c,c02f,c030,cca8,cca9_0005,000a,000b,000d,0012,0017,001b,001c,0022,0023,002b,002d,0033,fe0d,ff01_0403,0503,0603,0804,0805,0806,0401,0501,0601,0203,0201";
const SAFARI_JA4R: &str = "t13d2613h2_000a,002f,0035,003c,003d,009c,009d,1301,1302,1303,c008,c009,c00a,c012,c013,c014,c023,c024,c027,c028,c02b,c02c,c02f,c030,cca8,cca9_0005,000a,000b,000d,0012,0017,001b,002b,002d,0033,ff01_0403,0804,0401,0503,0805,0501,0806,0601";

const CHROME_142_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";
const CHROME_120_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const CHROME_116_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";
const EDGE_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36 Edg/142.0.0.0";
const OPERA_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36 OPR/101.0.0.0";
const FIREFOX_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:144.0) Gecko/20100101 Firefox/144.0";
const SAFARI_UA: &str = "Mozilla/5.0 (iPad; CPU OS 18_7 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.7.3 Mobile/15E148 Safari/604.1";
const SAFARI_DESKTOP_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.3 Safari/605.1.15";

const CHROME_HEADER_ORDER: &[&str] = &[
    "pragma",
    "host",
    "connection",
    "cache-control",
    "device-memory",
    "viewport-width",
    "rtt",
    "downlink",
    "ect",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-full-version",
    "sec-ch-ua-arch",
    "sec-ch-ua-platform",
    "sec-ch-ua-platform-version",
    "sec-ch-ua-model",
    "upgrade-insecure-requests",
    "user-agent",
    "accept",
    "sec-fetch-site",
    "sec-fetch-mode",
    "sec-fetch-user",
    "sec-fetch-dest",
    "referer",
    "accept-encoding",
    "accept-language",
    "cookie",
    "priority",
];

const FIREFOX_HEADER_ORDER: &[&str] = &[
    "host",
    "connection",
    "cache-control",
    "device-memory",
    "viewport-width",
    "rtt",
    "downlink",
    "ect",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-full-version",
    "sec-ch-ua-arch",
    "sec-ch-ua-platform",
    "sec-ch-ua-platform-version",
    "sec-ch-ua-model",
    "user-agent",
    "accept",
    "accept-language",
    "accept-encoding",
    "upgrade-insecure-requests",
    "sec-fetch-dest",
    "sec-fetch-mode",
    "sec-fetch-site",
    "sec-fetch-user",
    "cookie",
    "referer",
    "priority",
    "te",
];

fn owned(order: &[&str]) -> Vec<String> {
    order.iter().map(|s| s.to_string()).collect()
}

/// Randomly permute a dash-separated extension-ID segment with `swaps`
/// element swaps.
pub fn shuffle_extension_ids(segment: &str, swaps: usize) -> String {
    let mut ids: Vec<&str> = segment.split('-').collect();
    if ids.len() < 2 {
        return segment.to_string();
    }
    let mut rand = vec![0u8; swaps * 2];
    getrandom::getrandom(&mut rand).expect("system CSPRNG unavailable");
    for pair in rand.chunks_exact(2) {
        let a = pair[0] as usize % ids.len();
        let b = pair[1] as usize % ids.len();
        ids.swap(a, b);
    }
    ids.join("-")
}

fn chrome_pheader_order() -> Vec<PseudoHeader> {
    vec![
        PseudoHeader::Method,
        PseudoHeader::Authority,
        PseudoHeader::Scheme,
        PseudoHeader::Path,
    ]
}

fn firefox_pheader_order() -> Vec<PseudoHeader> {
    vec![
        PseudoHeader::Method,
        PseudoHeader::Path,
        PseudoHeader::Authority,
        PseudoHeader::Scheme,
    ]
}

/// Chrome 142 session prelude: `1:65536;2:0;4:6291456;6:262144|15663105|0|m,a,s,p`.
pub fn chrome142_h2_settings() -> H2Settings {
    let settings: HashMap<H2Setting, u32> = [
        (H2Setting::HeaderTableSize, 65536),
        (H2Setting::EnablePush, 0),
        (H2Setting::InitialWindowSize, 6291456),
        (H2Setting::MaxHeaderListSize, 262144),
    ]
    .into_iter()
    .collect();

    H2Settings {
        settings,
        settings_order: vec![
            H2Setting::HeaderTableSize,
            H2Setting::EnablePush,
            H2Setting::InitialWindowSize,
            H2Setting::MaxHeaderListSize,
        ],
        connection_flow: 15663105,
        header_priority: Some(HeaderPriority {
            stream_dep: 0,
            exclusive: true,
            weight: Some(256),
        }),
        priority_frames: Vec::new(),
    }
}

/// Firefox session prelude: `1:65536;2:0;4:131072;5:16384|12517377|13:42:0|m,p,a,s`.
pub fn firefox_h2_settings() -> H2Settings {
    let settings: HashMap<H2Setting, u32> = [
        (H2Setting::HeaderTableSize, 65536),
        (H2Setting::EnablePush, 0),
        (H2Setting::InitialWindowSize, 131072),
        (H2Setting::MaxFrameSize, 16384),
    ]
    .into_iter()
    .collect();

    H2Settings {
        settings,
        settings_order: vec![
            H2Setting::HeaderTableSize,
            H2Setting::EnablePush,
            H2Setting::InitialWindowSize,
            H2Setting::MaxFrameSize,
        ],
        connection_flow: 12517377,
        header_priority: Some(HeaderPriority {
            stream_dep: 0,
            exclusive: false,
            weight: Some(42),
        }),
        priority_frames: Vec::new(),
    }
}

fn chrome_default_headers(options: &mut Options, sec_ch_ua: &str) {
    options.headers.set("Sec-Ch-Ua", sec_ch_ua);
    options.headers.set("Sec-Ch-Ua-Mobile", "?0");
    options.headers.set("Sec-Ch-Ua-Platform", "\"Windows\"");
    options.headers.set("Sec-Fetch-Dest", "document");
    options.headers.set("Sec-Fetch-Mode", "navigate");
    options.headers.set("Sec-Fetch-Site", "none");
    options.headers.set("Sec-Fetch-User", "?1");
    options.headers.set("Upgrade-Insecure-Requests", "1");
    options.headers.set_default(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    );
}

/// Chrome 142.
pub fn chrome142(options: &mut Options) {
    options.fingerprint = Fingerprint::Ja3(CHROME_142_JA3.to_string());
    options.h2_settings = Some(chrome142_h2_settings());
    options.pheader_order = Some(chrome_pheader_order());
    chrome_default_headers(
        options,
        "\"Chromium\";v=\"142\", \"Google Chrome\";v=\"142\", \"Not_A Brand\";v=\"99\"",
    );
    options.header_order = Some(owned(CHROME_HEADER_ORDER));
    options.user_agent = CHROME_142_UA.to_string();
}

/// Chrome 120. The extension segment is re-shuffled per application.
pub fn chrome120(options: &mut Options) {
    let extensions = shuffle_extension_ids(CHROME_120_EXTENSIONS, 7);
    options.fingerprint = Fingerprint::Ja3(format!(
        "771,{CHROME_120_CIPHERS},{extensions}-41,29-23-24,0"
    ));
    options.h2_settings_string = Some(CHROME_120_H2.to_string());
    options.headers.set_default(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    );
    options.user_agent = CHROME_120_UA.to_string();
}

/// Chrome 116 (the generic "Chrome" profile Opera builds on).
pub fn chrome(options: &mut Options) {
    let extensions = shuffle_extension_ids(CHROMIUM_EXTENSIONS, 7);
    options.fingerprint = Fingerprint::Ja3(format!(
        "771,{CHROMIUM_CIPHERS},{extensions}-41,29-23-24,0"
    ));
    options.h2_settings_string = Some(CHROMIUM_H2.to_string());
    options.headers.set_default(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    );
    options.user_agent = CHROME_116_UA.to_string();
}

/// Chromium.
pub fn chromium(options: &mut Options) {
    chrome(options);
    options.user_agent = CHROME_120_UA.to_string();
}

/// Edge 142 (Chrome 142 stack with the Edge user agent).
pub fn edge(options: &mut Options) {
    chrome142(options);
    options.user_agent = EDGE_UA.to_string();
    options.headers.set_default(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    );
}

/// Opera (Chrome 116 stack with the Opera user agent).
pub fn opera(options: &mut Options) {
    chrome(options);
    options.user_agent = OPERA_UA.to_string();
}

/// Firefox 144.
pub fn firefox(options: &mut Options) {
    options.fingerprint = Fingerprint::Ja3(FIREFOX_JA3.to_string());
    options.h2_settings = Some(firefox_h2_settings());
    options.pheader_order = Some(firefox_pheader_order());

    options.headers.set("upgrade-insecure-requests", "1");
    options.headers.set("Sec-Fetch-Dest", "document");
    options.headers.set("Sec-Fetch-Mode", "navigate");
    options.headers.set("Sec-Fetch-Site", "none");
    options.headers.set("Sec-Fetch-User", "?1");
    options.headers.set("Accept-Encoding", "gzip, deflate, br, zstd");
    options.headers.set("Priority", "u=0, i");
    options.headers.set("te", "trailers");
    options.headers.set_default(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    );
    options
        .headers
        .set_default("Accept-Language", "en-US,en;q=0.5");

    options.header_order = Some(owned(FIREFOX_HEADER_ORDER));
    options.user_agent = FIREFOX_UA.to_string();
}

/// Safari 18 (iPadOS). Carries NO_RFC7540_PRIORITIES and the `m,s,a,p`
/// pseudo-header order via the settings string.
pub fn safari(options: &mut Options) {
    options.fingerprint = Fingerprint::Ja3(SAFARI_JA3.to_string());
    options.h2_settings_string = Some(SAFARI_H2.to_string());
    options.headers.set_default(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    );
    options.user_agent = SAFARI_UA.to_string();
}

/// Chrome via JA4R fingerprint.
pub fn chrome_ja4r(options: &mut Options) {
    options.fingerprint = Fingerprint::Ja4r(CHROME_JA4R.to_string());
    options.h2_settings = Some(chrome142_h2_settings());
    options.pheader_order = Some(chrome_pheader_order());
    chrome_default_headers(
        options,
        "\"Chromium\";v=\"116\", \"Not)A;Brand\";v=\"24\", \"Google Chrome\";v=\"116\"",
    );
    options.header_order = Some(owned(CHROME_HEADER_ORDER));
    options.user_agent = CHROME_116_UA.to_string();
}

/// Chromium via JA4R fingerprint.
pub fn chromium_ja4r(options: &mut Options) {
    options.fingerprint = Fingerprint::Ja4r(CHROMIUM_JA4R.to_string());
    options.h2_settings_string = Some(CHROMIUM_H2.to_string());
    options.user_agent = CHROME_120_UA.to_string();
}

/// Edge via JA4R fingerprint.
pub fn edge_ja4r(options: &mut Options) {
    chrome_ja4r(options);
    options.user_agent = EDGE_UA.to_string();
}

/// Opera via JA4R fingerprint.
pub fn opera_ja4r(options: &mut Options) {
    chrome_ja4r(options);
    options.user_agent = OPERA_UA.to_string();
}

/// Firefox via JA4R fingerprint.
pub fn firefox_ja4r(options: &mut Options) {
    options.fingerprint = Fingerprint::Ja4r(FIREFOX_JA4R.to_string());
    options.h2_settings = Some(firefox_h2_settings());
    options.pheader_order = Some(firefox_pheader_order());
    options.headers.set("Accept-Encoding", "gzip, deflate, br, zstd");
    options.headers.set("te", "trailers");
    options.headers.set_default(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    );
    options.header_order = Some(owned(FIREFOX_HEADER_ORDER));
    options.user_agent = FIREFOX_UA.to_string();
}

/// Safari via JA4R fingerprint.
pub fn safari_ja4r(options: &mut Options) {
    options.fingerprint = Fingerprint::Ja4r(SAFARI_JA4R.to_string());
    options.h2_settings_string = Some(SAFARI_H2.to_string());
    options.headers.set_default(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    );
    options.user_agent = SAFARI_DESKTOP_UA.to_string();
}
