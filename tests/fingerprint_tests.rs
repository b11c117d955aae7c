//! 设备指纹与字体推导测试

use css_fingerprint::core::fingerprint::{Fingerprint, FontSet, Headers};
use css_fingerprint::{FingerprintError, FontCatalog};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn set(fonts: &[&str]) -> BTreeSet<String> {
    fonts.iter().map(|f| f.to_string()).collect()
}

#[test]
fn test_set_property_last_write_wins() {
    let mut fp = Fingerprint::new();
    fp.set_property("lang", "en");
    fp.set_property("lang", "fr");
    fp.set_property("tz", "UTC");

    assert_eq!(fp.properties.len(), 2);
    assert_eq!(fp.properties["lang"], "fr");
}

#[test]
fn test_derive_present_fonts() {
    let mut fp = Fingerprint::new();
    fp.record_font_probe("Arial").unwrap();
    fp.record_font_probe("Comic-Sans-MS").unwrap();

    let present = fp
        .derive_present_fonts(["Arial", "Comic-Sans-MS", "Georgia", "Verdana"])
        .unwrap()
        .clone();

    assert_eq!(present, set(&["Georgia", "Verdana"]));
    assert!(fp.fonts.is_derived());
    assert_eq!(fp.probed_fonts(), None);
    assert_eq!(fp.present_fonts(), Some(&present));
}

#[test]
fn test_probe_outside_reference_is_ignored() {
    let mut fp = Fingerprint::new();
    fp.record_font_probe("Wingdings").unwrap();

    let present = fp.derive_present_fonts(["Arial"]).unwrap();
    assert_eq!(present, &set(&["Arial"]));
}

#[test]
fn test_derive_is_single_use() {
    let mut fp = Fingerprint::new();
    fp.record_font_probe("Arial").unwrap();
    fp.derive_present_fonts(["Arial", "Georgia"]).unwrap();

    let err = fp.derive_present_fonts(["Arial", "Georgia"]).unwrap_err();
    assert!(matches!(err, FingerprintError::AlreadyDerived));
    // 第一次推导的结果保持不变
    assert_eq!(fp.present_fonts(), Some(&set(&["Georgia"])));

    assert!(matches!(
        fp.record_font_probe("Georgia"),
        Err(FingerprintError::AlreadyDerived)
    ));
}

#[test]
fn test_derive_with_catalog() {
    let catalog = FontCatalog::from_list(["Arial", "Georgia", "Arial"]);
    assert_eq!(catalog.len(), 2);

    let mut fp = Fingerprint::new();
    fp.record_font_probe("Georgia").unwrap();
    let present = fp.derive_present_fonts(catalog.iter()).unwrap();
    assert_eq!(present, &set(&["Arial"]));
}

#[test]
fn test_serialization_is_order_independent() {
    let mut a = Fingerprint::new();
    a.set_property("lang", "en");
    a.set_property("tz", "UTC");
    a.record_font_probe("Arial").unwrap();
    a.record_font_probe("Georgia").unwrap();
    a.headers = Some(vec![("b", "2"), ("a", "1")].into_iter().collect());

    let mut b = Fingerprint::new();
    b.record_font_probe("Georgia").unwrap();
    b.record_font_probe("Arial").unwrap();
    b.set_property("tz", "UTC");
    b.set_property("lang", "en");
    b.headers = Some(vec![("a", "1"), ("b", "2")].into_iter().collect());

    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());

    let value: serde_json::Value = serde_json::from_str(&a.to_json().unwrap()).unwrap();
    assert_eq!(value["properties"]["lang"], "en");
    assert_eq!(value["fonts"]["state"], "probed");
    assert_eq!(value["fonts"]["fonts"][0], "Arial");
    assert_eq!(value["headers"][0][0], "a");
}

#[test]
fn test_serialization_after_derivation() {
    let mut fp = Fingerprint::new();
    fp.record_font_probe("Arial").unwrap();
    fp.derive_present_fonts(["Arial", "Georgia"]).unwrap();

    let back: Fingerprint = serde_json::from_str(&fp.to_json().unwrap()).unwrap();
    assert_eq!(back.fonts, FontSet::Present(set(&["Georgia"])));
    assert_eq!(back.headers, None);
}

#[test]
fn test_headers_lookup() {
    let headers: Headers = vec![("User-Agent", "Mozilla/5.0"), ("Accept", "text/css")]
        .into_iter()
        .collect();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers.get("user-agent"), Some("Mozilla/5.0"));
    assert_eq!(headers.get("cookie"), None);
    assert!(Headers::new().is_empty());
}

proptest! {
    #[test]
    fn prop_properties_last_write_wins(
        writes in prop::collection::vec(("[a-d]", "[a-z]{0,4}"), 0..32)
    ) {
        let mut fp = Fingerprint::new();
        let mut expected = BTreeMap::new();
        for (key, value) in &writes {
            fp.set_property(key.clone(), value.clone());
            expected.insert(key.clone(), value.clone());
        }
        prop_assert_eq!(fp.properties, expected);
    }

    #[test]
    fn prop_present_fonts_is_reference_minus_probed(
        reference in prop::collection::btree_set("[A-Z][a-z]{1,6}", 0..16),
        probed in prop::collection::btree_set("[A-Z][a-z]{1,6}", 0..16),
    ) {
        let mut fp = Fingerprint::new();
        for font in &probed {
            fp.record_font_probe(font.clone()).unwrap();
        }
        let present = fp.derive_present_fonts(reference.iter()).unwrap().clone();
        let expected: BTreeSet<String> = reference.difference(&probed).cloned().collect();
        prop_assert_eq!(present, expected);
    }
}
