//! MDict header parsing.
//!
//! Header structure on disk:
//! - 4 bytes: header length (big-endian)
//! - N bytes: UTF-16LE XML content
//! - 4 bytes: adler32 of the XML bytes (big-endian)
//!
//! The XML is not parsed as XML. Real-world files carry unescaped entities
//! and mismatched quoting, so attributes are pulled out with a tolerant
//! regex scan, with a fallback to `<Tag>..</Tag>` content for the metadata
//! strings.

use std::fs::File;

use adler32::adler32;
use byteorder::{BigEndian, ReadBytesExt};
use encoding_rs::Encoding;
use log::{debug, warn};
use regex::Regex;

use super::error::{MdictError, Result};
use super::models::{EncryptMode, Header};
use super::utils;

/// Parse the header section from the start of the file.
///
/// The stored checksum is verified but a mismatch only logs a warning:
/// several authoring tools emit inconsistent header checksums and users
/// still expect those files to open.
pub fn parse(file: &mut File) -> Result<Header> {
    let file_len = file.metadata()?.len();
    let raw_len = file.read_u32::<BigEndian>()?;
    if raw_len as u64 + 8 > file_len {
        return Err(MdictError::MalformedHeader(format!(
            "declared header length {} overflows file of {} bytes",
            raw_len, file_len
        )));
    }

    let raw_bytes = utils::read_section(file, 4, raw_len as u64)?;
    let stored_adler32 = file.read_u32::<BigEndian>()?;

    let actual = adler32(&raw_bytes[..])?;
    if actual != stored_adler32 {
        warn!(
            "header checksum mismatch (stored {:#010x}, computed {:#010x}), continuing",
            stored_adler32, actual
        );
    }

    let xml = utils::decode_utf16le(&raw_bytes);
    if xml.is_empty() && !raw_bytes.is_empty() {
        return Err(MdictError::MalformedHeader(
            "header XML could not be decoded".to_string(),
        ));
    }
    // Normalize the Library_Data tag variant emitted by some tools.
    let xml = xml.replacen("Library_Data", "Dictionary", 1);

    let engine_version = extract_attr(&xml, "GeneratedByEngineVersion");
    let version = engine_version.parse::<f64>().unwrap_or(2.0);
    if version >= 3.0 {
        return Err(MdictError::UnsupportedVersion(version));
    }
    let number_width = if version >= 2.0 { 8 } else { 4 };

    let title = attr_or_tag(&xml, "Title");
    let description = attr_or_tag(&xml, "Description");
    let stylesheet = attr_or_tag(&xml, "StyleSheet");
    let creation_date = extract_attr(&xml, "CreationDate");
    let data_source_format = extract_attr(&xml, "DataSourceFormat");
    let encrypt = parse_encrypt(&extract_attr(&xml, "Encrypted"));
    let encoding = parse_encoding(&extract_attr(&xml, "Encoding"));

    let header = Header {
        raw_len,
        raw_bytes,
        xml,
        stored_adler32,
        version,
        engine_version,
        encoding,
        encrypt,
        title,
        description,
        stylesheet,
        creation_date,
        data_source_format,
        number_width,
        header_end_pos: 4 + raw_len as u64 + 4,
    };
    debug!(
        "header parsed: version={}, encoding={}, encrypt={:?}, title={:?}",
        header.version,
        header.encoding.name(),
        header.encrypt,
        header.title
    );
    Ok(header)
}

/// Extract an attribute value, accepting both `name="value"` and
/// `name='value'` forms. Returns an empty string when absent.
fn extract_attr(xml: &str, name: &str) -> String {
    let patterns = [
        format!(r#"{}="([^"]*)""#, name),
        format!(r#"{}='([^']*)'"#, name),
    ];
    for pattern in &patterns {
        if let Some(captures) = Regex::new(pattern).ok().and_then(|re| re.captures(xml)) {
            return captures[1].to_string();
        }
    }
    String::new()
}

/// Extract the text between `<Tag ...>` and `</Tag>`.
fn extract_tag_content(xml: &str, tag: &str) -> String {
    let pattern = format!(r"(?s)<{0}[^>]*>(.*?)</{0}>", tag);
    match Regex::new(&pattern).ok().and_then(|re| re.captures(xml)) {
        Some(captures) => captures[1].trim().to_string(),
        None => String::new(),
    }
}

fn attr_or_tag(xml: &str, name: &str) -> String {
    let value = extract_attr(xml, name);
    if value.is_empty() {
        extract_tag_content(xml, name)
    } else {
        value
    }
}

fn parse_encrypt(value: &str) -> EncryptMode {
    match value.trim() {
        "" | "No" | "no" | "NO" | "false" | "False" | "FALSE" | "0" => EncryptMode::None,
        "Yes" | "yes" | "YES" | "true" | "True" | "TRUE" | "1" => EncryptMode::Record,
        "2" => EncryptMode::KeyInfo,
        other => match other.as_bytes().first() {
            Some(b'2') => EncryptMode::KeyInfo,
            Some(b'1') => EncryptMode::Record,
            _ => EncryptMode::None,
        },
    }
}

fn parse_encoding(value: &str) -> &'static Encoding {
    let label = value.trim();
    // GBK and GB2312 label files that in practice use the GB18030
    // superset; the hyphen-less "utf16" token has no WHATWG label.
    let label = match label.to_ascii_lowercase().as_str() {
        "gbk" | "gb2312" => "GB18030",
        "utf16" => "UTF-16LE",
        _ => label,
    };
    Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8)
}
