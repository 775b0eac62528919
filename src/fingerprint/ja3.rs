//! JA3 fingerprint parsing and ClientHello assembly.
//!
//! A JA3 string is five comma-separated fields: TLS version code,
//! dash-separated cipher IDs, extension IDs, supported-group IDs, and EC
//! point-format IDs. The extension field is order-significant; assembly
//! applies the corrections browsers make that JA3 does not encode
//! (ec_point_formats injection, GREASE placement, PSK always last).

use crate::error::{Error, Result};
use crate::fingerprint::catalog::{ExtensionCatalog, TlsExtensionOverrides};
use crate::fingerprint::spec::{
    BrowserClass, ClientHelloSpec, ExtensionSpec, GREASE_PLACEHOLDER, VERSION_TLS10, VERSION_TLS11,
    VERSION_TLS12, VERSION_TLS13,
};

/// Parse a JA3 string into a ClientHello specification.
pub fn parse(ja3: &str, user_agent: &str) -> Result<ClientHelloSpec> {
    parse_with_overrides(ja3, user_agent, None)
}

/// Parse a JA3 string, layering caller extension overrides onto the catalog.
pub fn parse_with_overrides(
    ja3: &str,
    user_agent: &str,
    overrides: Option<&TlsExtensionOverrides>,
) -> Result<ClientHelloSpec> {
    let fields: Vec<&str> = ja3.split(',').collect();
    if fields.len() < 5 {
        return Err(Error::parse(
            "ja3",
            format!("expected 5 comma-separated fields, got {}", fields.len()),
        ));
    }

    let browser = BrowserClass::from_user_agent(user_agent);

    let version: u16 = fields[0]
        .parse()
        .map_err(|_| Error::parse("ja3 version", fields[0].to_string()))?;
    let ciphers = parse_id_list(fields[1], "ja3 ciphers", false)?;
    let mut extension_ids = parse_id_list(fields[2], "ja3 extensions", false)?;
    let curves = parse_id_list(fields[3], "ja3 curves", true)?;
    let point_formats = parse_point_formats(fields[4])?;

    let include_psk = extension_ids.contains(&41);
    let mut catalog = ExtensionCatalog::build(browser, include_psk);
    if let Some(overrides) = overrides {
        catalog.apply_overrides(overrides);
    }

    // Supported groups: the JA3 curve field verbatim, GREASE-prefixed for
    // Chrome.
    let mut groups = Vec::with_capacity(curves.len() + 1);
    if browser.is_chrome() {
        groups.push(GREASE_PLACEHOLDER);
    }
    groups.extend(&curves);
    catalog.set(ExtensionSpec::SupportedGroups(groups));

    // ec_point_formats: JA3 does not encode ID 11 explicitly, but sending
    // point formats requires the extension on the wire. Inject it after 10,
    // or before 41, or at the end.
    if !point_formats.is_empty() {
        catalog.set(ExtensionSpec::EcPointFormats(point_formats));
        if !extension_ids.contains(&11) {
            if let Some(pos) = extension_ids.iter().position(|&id| id == 10) {
                extension_ids.insert(pos + 1, 11);
            } else if let Some(pos) = extension_ids.iter().position(|&id| id == 41) {
                extension_ids.insert(pos, 11);
            } else {
                extension_ids.push(11);
            }
        }
    }

    let (version_min, version_max) = version_window(version)?;
    catalog.set(ExtensionSpec::SupportedVersions(supported_version_list(
        browser,
        version_min,
        version_max,
    )));

    let mut extensions = Vec::with_capacity(extension_ids.len() + 2);
    let mut psk = None;
    if browser.is_chrome() {
        extensions.push(ExtensionSpec::Grease);
    }
    for &id in &extension_ids {
        let resolved = catalog.resolve(id)?;
        if id == 41 {
            psk = Some(resolved);
        } else {
            extensions.push(resolved);
        }
    }
    if browser.is_chrome() {
        extensions.push(ExtensionSpec::Grease);
    }
    if let Some(psk) = psk {
        extensions.push(psk);
    }

    let mut cipher_suites = Vec::with_capacity(ciphers.len() + 1);
    if browser.is_chrome() {
        cipher_suites.push(GREASE_PLACEHOLDER);
    }
    cipher_suites.extend(ciphers);

    Ok(ClientHelloSpec {
        tls_version_min: version_min,
        tls_version_max: version_max,
        cipher_suites,
        compression_methods: vec![0],
        extensions,
    })
}

/// Map the JA3 version token onto a protocol version window.
pub fn version_window(token: u16) -> Result<(u16, u16)> {
    match token {
        771 => Ok((VERSION_TLS12, VERSION_TLS13)),
        770 => Ok((VERSION_TLS11, VERSION_TLS12)),
        769 => Ok((VERSION_TLS10, VERSION_TLS11)),
        other => Err(Error::UnsupportedVersion(other)),
    }
}

/// supported_versions contents: the window in descending order,
/// GREASE-prefixed for Chrome.
pub fn supported_version_list(browser: BrowserClass, min: u16, max: u16) -> Vec<u16> {
    let mut versions = Vec::with_capacity(4);
    if browser.is_chrome() {
        versions.push(GREASE_PLACEHOLDER);
    }
    let mut v = max;
    while v >= min {
        versions.push(v);
        v -= 1;
    }
    versions
}

fn parse_id_list(field: &str, name: &'static str, allow_empty: bool) -> Result<Vec<u16>> {
    if field.is_empty() {
        if allow_empty {
            return Ok(Vec::new());
        }
        return Err(Error::parse(name, "empty field"));
    }
    field
        .split('-')
        .map(|tok| {
            tok.parse::<u16>()
                .map_err(|_| Error::parse(name, tok.to_string()))
        })
        .collect()
}

fn parse_point_formats(field: &str) -> Result<Vec<u8>> {
    if field.is_empty() {
        return Ok(Vec::new());
    }
    field
        .split('-')
        .map(|tok| {
            tok.parse::<u8>()
                .map_err(|_| Error::parse("ja3 point_formats", tok.to_string()))
        })
        .collect()
}
