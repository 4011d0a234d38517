//! Interoperable Object Reference decoding.
//!
//! A stringified reference is `IOR:` followed by the hex form of a CDR
//! encapsulation holding a repository type id and a sequence of tagged
//! profiles. Only the Internet-IOP profile is interpreted: it carries the
//! host and port a peer listens on.
//!
//! # Example
//!
//! ```
//! use regdb::ior::{self, IiopProfile, Ior, NoResolver};
//!
//! let reference = Ior::new("IDL:Tango/Device_5:1.0")
//!     .with_profile(IiopProfile::new("10.0.0.5", 12345, b"key".to_vec()).to_tagged(false))
//!     .encode(false);
//!
//! assert_eq!(ior::host_port_from_ior(&reference, &NoResolver).unwrap(), "10.0.0.5:12345");
//! ```

mod cdr;
pub mod resolver;

use cdr::{CdrReader, CdrWriter};
use serde::Serialize;
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::debug;

pub use resolver::{NameResolver, NoResolver, SystemResolver};

/// Profile tag of the Internet Inter-ORB Protocol.
pub const TAG_INTERNET_IOP: u32 = 0;
/// Profile tag of the multiple-components profile.
pub const TAG_MULTIPLE_COMPONENTS: u32 = 1;

const PREFIX: &str = "IOR:";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IorError {
    #[error("reference too short")]
    TooShort,

    #[error("reference does not start with 'IOR:'")]
    BadPrefix,

    #[error("invalid hex payload: {0}")]
    BadHex(#[from] hex::FromHexError),

    #[error("truncated data at offset {offset} (needed {needed} bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid boolean octet {value} at offset {offset}")]
    InvalidBoolean { offset: usize, value: u8 },

    #[error("marshalling error: {0}")]
    Marshal(String),

    #[error("reference has neither a type id nor profiles")]
    Empty,

    #[error("reference has no Internet-IOP profile")]
    NoInternetProfile,
}

/// One profile as found in the reference, body still encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedProfile {
    pub tag: u32,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

/// Decoded Internet-IOP profile body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IiopProfile {
    pub version: (u8, u8),
    pub host: String,
    pub port: u16,
    #[serde(with = "hex::serde")]
    pub object_key: Vec<u8>,
}

impl IiopProfile {
    /// An IIOP 1.0 profile.
    pub fn new(host: impl Into<String>, port: u16, object_key: Vec<u8>) -> Self {
        Self {
            version: (1, 0),
            host: host.into(),
            port,
            object_key,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, IorError> {
        let mut r = CdrReader::encapsulation(data)?;
        let major = r.read_octet()?;
        let minor = r.read_octet()?;
        let host = r.read_string()?;
        let port = r.read_u16()?;
        let object_key = r.read_octets()?.to_vec();
        // IIOP 1.1+ appends tagged components; they carry no addressing we use.
        Ok(Self {
            version: (major, minor),
            host,
            port,
            object_key,
        })
    }

    /// Encode without tagged components.
    pub fn to_tagged(&self, little_endian: bool) -> TaggedProfile {
        let mut w = CdrWriter::encapsulation(little_endian);
        w.write_octet(self.version.0);
        w.write_octet(self.version.1);
        w.write_string(&self.host);
        w.write_u16(self.port);
        w.write_octets(&self.object_key);
        if self.version.1 >= 1 {
            w.write_u32(0);
        }
        TaggedProfile {
            tag: TAG_INTERNET_IOP,
            data: w.into_bytes(),
        }
    }
}

/// A decoded object reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ior {
    pub type_id: String,
    pub profiles: Vec<TaggedProfile>,
}

impl Ior {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            profiles: Vec::new(),
        }
    }

    pub fn with_profile(mut self, profile: TaggedProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Parse a stringified `IOR:<hex>` reference.
    pub fn parse(reference: &str) -> Result<Self, IorError> {
        if reference.len() < PREFIX.len() {
            return Err(IorError::TooShort);
        }
        let payload = reference.strip_prefix(PREFIX).ok_or(IorError::BadPrefix)?;
        let bytes = hex::decode(payload)?;

        let mut r = CdrReader::encapsulation(&bytes)?;
        let type_id = r.read_string()?;

        // Each profile needs at least a tag and a length.
        let count = r.read_sequence_len(8)?;
        let mut profiles = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = r.read_u32()?;
            let data = r.read_octets()?.to_vec();
            profiles.push(TaggedProfile { tag, data });
        }

        if profiles.is_empty() && type_id.is_empty() {
            return Err(IorError::Empty);
        }

        debug!(type_id = %type_id, profiles = profiles.len(), "decoded object reference");
        Ok(Self { type_id, profiles })
    }

    /// Decode the first Internet-IOP profile.
    pub fn iiop_profile(&self) -> Result<IiopProfile, IorError> {
        let profile = self
            .profiles
            .iter()
            .find(|p| p.tag == TAG_INTERNET_IOP)
            .ok_or(IorError::NoInternetProfile)?;
        IiopProfile::decode(&profile.data)
    }

    /// Stringify as `IOR:<hex>` (lower-case hex).
    pub fn encode(&self, little_endian: bool) -> String {
        let mut w = CdrWriter::encapsulation(little_endian);
        w.write_string(&self.type_id);
        w.write_u32(self.profiles.len() as u32);
        for profile in &self.profiles {
            w.write_u32(profile.tag);
            w.write_octets(&profile.data);
        }
        format!("{PREFIX}{}", hex::encode(w.into_bytes()))
    }
}

/// How a host string found in a profile is to be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// Starts like a dotted quad: digits up to the first `.`.
    Address,
    /// Contains a `.` after a non-digit label.
    QualifiedName,
    /// No `.` at all.
    ShortName,
}

pub fn classify_host(host: &str) -> HostKind {
    match host.find('.') {
        None => HostKind::ShortName,
        Some(dot) if host[..dot].bytes().all(|b| b.is_ascii_digit()) => HostKind::Address,
        Some(_) => HostKind::QualifiedName,
    }
}

/// Best-effort host name for a profile host.
///
/// Addresses are reverse resolved and short names qualified; on any lookup
/// failure the host is returned as found.
pub fn resolve_host(host: &str, resolver: &dyn NameResolver) -> String {
    let resolved = match classify_host(host) {
        HostKind::Address => host
            .parse::<Ipv4Addr>()
            .ok()
            .and_then(|addr| resolver.reverse(addr)),
        HostKind::ShortName => resolver.qualify(host),
        HostKind::QualifiedName => None,
    };
    resolved.unwrap_or_else(|| host.to_string())
}

/// Extract `host:port` from a stringified reference.
pub fn host_port_from_ior(reference: &str, resolver: &dyn NameResolver) -> Result<String, IorError> {
    let profile = Ior::parse(reference)?.iiop_profile()?;
    let host = resolve_host(&profile.host, resolver);
    Ok(format!("{host}:{}", profile.port))
}
