/// Object reference decoding tests
///
/// Run with: cargo test --test ior_tests
use regdb::ior::{
    HostKind, IiopProfile, Ior, IorError, NameResolver, NoResolver, TAG_INTERNET_IOP, classify_host,
    host_port_from_ior,
};
use std::cell::RefCell;
use std::net::Ipv4Addr;

/// Big-endian reference, type id `IDL:X:1.0`, one IIOP 1.0 profile for
/// 10.0.0.5:12345 with object key `key`.
const REFERENCE: &str = concat!(
    "IOR:",
    "00000000",                     // byte order, padding
    "0000000a",                     // type id length
    "49444c3a583a312e3000",         // "IDL:X:1.0\0"
    "0000",                         // padding
    "00000001",                     // profile count
    "00000000",                     // TAG_INTERNET_IOP
    "0000001b",                     // profile length
    "00010000",                     // byte order, version 1.0, padding
    "00000009",                     // host length
    "31302e302e302e3500",           // "10.0.0.5\0"
    "00",                           // padding
    "3039",                         // port 12345
    "00000003",                     // object key length
    "6b6579",                       // "key"
);

/// Answers from a fixed table and records every question.
#[derive(Default)]
struct TableResolver {
    asked: RefCell<Vec<String>>,
}

impl NameResolver for TableResolver {
    fn reverse(&self, addr: Ipv4Addr) -> Option<String> {
        self.asked.borrow_mut().push(addr.to_string());
        (addr == Ipv4Addr::new(10, 0, 0, 5)).then(|| "ctrl01.lab.example".to_string())
    }

    fn qualify(&self, host: &str) -> Option<String> {
        self.asked.borrow_mut().push(host.to_string());
        (host == "ctrl01").then(|| "ctrl01.lab.example".to_string())
    }
}

fn reference_for(host: &str, port: u16) -> String {
    Ior::new("IDL:Tango/Device_5:1.0")
        .with_profile(IiopProfile::new(host, port, b"device".to_vec()).to_tagged(false))
        .encode(false)
}

#[test]
fn test_decode_hand_built_reference() {
    let ior = Ior::parse(REFERENCE).unwrap();
    assert_eq!(ior.type_id, "IDL:X:1.0");
    assert_eq!(ior.profiles.len(), 1);
    assert_eq!(ior.profiles[0].tag, TAG_INTERNET_IOP);

    let profile = ior.iiop_profile().unwrap();
    assert_eq!(profile.version, (1, 0));
    assert_eq!(profile.host, "10.0.0.5");
    assert_eq!(profile.port, 12345);
    assert_eq!(profile.object_key, b"key");

    assert_eq!(host_port_from_ior(REFERENCE, &NoResolver).unwrap(), "10.0.0.5:12345");
}

#[test]
fn test_encoder_matches_wire_layout() {
    let encoded = Ior::new("IDL:X:1.0")
        .with_profile(IiopProfile::new("10.0.0.5", 12345, b"key".to_vec()).to_tagged(false))
        .encode(false);
    assert_eq!(encoded, REFERENCE);
}

#[test]
fn test_little_endian_reference() {
    let encoded = Ior::new("IDL:X:1.0")
        .with_profile(IiopProfile::new("10.0.0.5", 12345, b"key".to_vec()).to_tagged(true))
        .encode(true);
    assert_ne!(encoded, REFERENCE);
    assert_eq!(host_port_from_ior(&encoded, &NoResolver).unwrap(), "10.0.0.5:12345");
}

#[test]
fn test_address_reverse_resolved() {
    let resolver = TableResolver::default();
    assert_eq!(
        host_port_from_ior(REFERENCE, &resolver).unwrap(),
        "ctrl01.lab.example:12345"
    );
    assert_eq!(*resolver.asked.borrow(), vec!["10.0.0.5".to_string()]);
}

#[test]
fn test_unknown_address_kept() {
    let resolver = TableResolver::default();
    let reference = reference_for("10.9.9.9", 80);
    assert_eq!(host_port_from_ior(&reference, &resolver).unwrap(), "10.9.9.9:80");
}

#[test]
fn test_short_name_qualified() {
    let resolver = TableResolver::default();
    let reference = reference_for("ctrl01", 10000);
    assert_eq!(
        host_port_from_ior(&reference, &resolver).unwrap(),
        "ctrl01.lab.example:10000"
    );

    let unknown = reference_for("ctrl02", 10000);
    assert_eq!(host_port_from_ior(&unknown, &resolver).unwrap(), "ctrl02:10000");
}

#[test]
fn test_qualified_name_not_looked_up() {
    let resolver = TableResolver::default();
    let reference = reference_for("ctrl01.other.example", 20000);
    assert_eq!(
        host_port_from_ior(&reference, &resolver).unwrap(),
        "ctrl01.other.example:20000"
    );
    assert!(resolver.asked.borrow().is_empty());
}

#[test]
fn test_host_classes() {
    assert_eq!(classify_host("10.0.0.5"), HostKind::Address);
    assert_eq!(classify_host("ctrl01.lab"), HostKind::QualifiedName);
    assert_eq!(classify_host("ctrl01"), HostKind::ShortName);
}

#[test]
fn test_malformed_references() {
    let cases: &[(&str, fn(&IorError) -> bool)] = &[
        ("IOR", |e| *e == IorError::TooShort),
        ("", |e| *e == IorError::TooShort),
        ("ior:00000000", |e| *e == IorError::BadPrefix),
        ("XYZ:00000000", |e| *e == IorError::BadPrefix),
        ("IOR:000", |e| matches!(e, IorError::BadHex(_))),
        ("IOR:zz00", |e| matches!(e, IorError::BadHex(_))),
        ("IOR:", |e| matches!(e, IorError::Truncated { .. })),
        ("IOR:02", |e| matches!(e, IorError::InvalidBoolean { value: 2, .. })),
        ("IOR:000000000000000000000000", |e| *e == IorError::Empty),
        ("IOR:0000000000000000ffffffff", |e| matches!(e, IorError::Truncated { .. })),
        ("IOR:00000000000000ff", |e| matches!(e, IorError::Truncated { .. })),
    ];

    for (reference, expected) in cases {
        let err = host_port_from_ior(reference, &NoResolver).unwrap_err();
        assert!(expected(&err), "{reference:?} gave {err:?}");
    }
}

#[test]
fn test_json_dump() {
    let ior = Ior::parse(REFERENCE).unwrap();
    let json = serde_json::to_value(&ior).unwrap();
    assert_eq!(json["type_id"], "IDL:X:1.0");
    assert_eq!(json["profiles"][0]["tag"], 0);

    let profile = serde_json::to_value(ior.iiop_profile().unwrap()).unwrap();
    assert_eq!(profile["host"], "10.0.0.5");
    assert_eq!(profile["port"], 12345);
    assert_eq!(profile["object_key"], "6b6579");
}
