//! 格式族端到端编解码回归。

use bookgate_tag::{PasswordRegistry, Tag, TagFactory};
use std::collections::HashMap;
use std::sync::Arc;

fn factory_with_passwords() -> TagFactory {
    let mut passwords = HashMap::new();
    passwords.insert("DE290Tag.access".to_string(), "12345678".to_string());
    passwords.insert("DE290Tag.kill".to_string(), "87654321".to_string());
    passwords.insert("DE6Tag.access".to_string(), "de6-access".to_string());
    passwords.insert("DE6Tag.kill".to_string(), "de6-kill".to_string());
    passwords.insert("DE386Tag.access".to_string(), "de386-access".to_string());
    passwords.insert("DE386Tag.kill".to_string(), "de386-kill".to_string());
    passwords.insert("BRTag.secret".to_string(), "br-secret".to_string());
    TagFactory::new(Arc::new(PasswordRegistry::new(passwords)))
}

#[test]
fn de290_parse_of_built_epc_returns_media_id_and_security() {
    let factory = factory_with_passwords();
    for media_id in [0u64, 1, 6600, 22062, 987_654_321, (1 << 63) - 1] {
        for secured in [false, true] {
            let built = factory
                .for_initialization("DE290", &media_id.to_string(), secured)
                .expect("build");
            let parsed = factory.from_hex(&built.epc_hex()).expect("parse");

            assert_eq!(parsed.tag_type(), "DE290Tag");
            assert_eq!(parsed.media_id().expect("media id"), media_id.to_string());
            assert_eq!(parsed.is_secured(), secured);
            // 口令是 (EPC 前 12 字节, 密钥) 的纯函数。
            assert_eq!(parsed.access_password(), built.access_password());
            assert_eq!(parsed.kill_password(), built.kill_password());
            assert_ne!(parsed.access_password(), parsed.kill_password());
        }
    }
}

#[test]
fn de290_known_layout_for_media_id_6600() {
    let factory = factory_with_passwords();
    let tag = factory
        .for_initialization("DE290", "6600", true)
        .expect("build");
    assert_eq!(tag.epc_hex(), "19E9F87100000000000019C800000001");
    assert_eq!(tag.pc_hex(), "4000");

    let unsecured = factory
        .for_initialization("DE290", "6600", false)
        .expect("build");
    assert_eq!(unsecured.epc_hex(), "19E9F87100000000000019C800000000");
}

#[test]
fn cd290_uses_legacy_header_with_same_layout() {
    let factory = factory_with_passwords();
    let tag = factory
        .for_initialization("CD290", "6600", true)
        .expect("build");
    assert_eq!(tag.epc_hex(), "1381F87100000000000019C800000001");

    let parsed = factory.from_hex(&tag.epc_hex()).expect("parse");
    assert_eq!(parsed.tag_type(), "DE290Tag");
    assert_eq!(parsed.media_id().expect("media id"), "6600");
}

#[test]
fn de290f_all_id_types_round_trip_through_hex() {
    let factory = factory_with_passwords();
    for media_id in ["6600", "@4711", "49HBZUBD0001234", "C1DE0042", "AB-C.12:"] {
        let built = factory
            .for_initialization("DE290F", media_id, true)
            .expect("build");
        let parsed = factory.from_hex(&built.epc_hex()).expect("parse");
        assert_eq!(parsed.tag_type(), "DE290FTag");
        assert_eq!(parsed.media_id().expect("media id"), *media_id);
        assert!(parsed.is_secured());
    }
}

#[test]
fn de290f_shares_de290_password_keys() {
    let factory = factory_with_passwords();
    let de290f = factory
        .for_initialization("DE290F", "6600", true)
        .expect("build");
    // 前 12 字节相同的 DE290 标签应得到相同口令（键均为 DE290Tag.*）。
    let clone = factory.from_hex(&de290f.epc_hex()).expect("parse");
    assert_eq!(de290f.access_password(), clone.access_password());
}

#[test]
fn de386_round_trip_preserves_version() {
    let factory = factory_with_passwords();
    for media_id in ["A", "42", "AB12345678"] {
        let built = factory
            .for_initialization("DE386", media_id, true)
            .expect("build");
        let parsed = factory.from_hex(&built.epc_hex()).expect("parse");
        assert_eq!(parsed.tag_type(), "DE386Tag");
        assert_eq!(parsed.media_id().expect("media id"), *media_id);
        if let Tag::De386(de386) = &parsed {
            assert_eq!(de386.version(), 0x00);
        } else {
            panic!("expected DE386 tag");
        }
    }

    assert!(factory.for_initialization("DE386", "ELEVENCHARS", true).is_err());
}

#[test]
fn de6_round_trip_keeps_fixed_pc() {
    let factory = factory_with_passwords();
    let built = factory
        .for_initialization("DE6", "31415926", true)
        .expect("build");
    assert_eq!(built.pc_hex(), "4400");
    assert!(built.is_epc_length_valid());

    let parsed = factory.from_hex(&built.epc_hex()).expect("parse");
    assert_eq!(parsed.tag_type(), "DE6Tag");
    assert_eq!(parsed.media_id().expect("media id"), "31415926");
}

#[test]
fn br_round_trip_through_bytes_keeps_even_length() {
    let factory = factory_with_passwords();
    for media_id in ["B", "BR42", "LIBRARY BOOK 7"] {
        let mut template = factory.from_hex("4101FF00").expect("seed");
        assert_eq!(template.tag_type(), "BRTag");
        template.set_media_id(media_id).expect("set media id");
        assert_eq!(template.epc().len() % 2, 0);

        let parsed = factory.from_bytes(Some(template.pc()), template.epc());
        assert_eq!(parsed.tag_type(), "BRTag");
        assert_eq!(parsed.media_id().expect("media id"), *media_id);
    }
}

#[test]
fn pc_length_field_always_matches_epc() {
    let factory = factory_with_passwords();
    let samples = [
        factory.for_initialization("DE290", "22062", true).expect("de290"),
        factory.for_initialization("DE290F", "@99", false).expect("de290f"),
        factory.for_initialization("DE386", "XYZ", true).expect("de386"),
        factory.for_initialization("DE6", "8", false).expect("de6"),
    ];
    for tag in samples {
        assert!(tag.is_epc_length_valid(), "tag_type={}", tag.tag_type());
        assert_eq!(tag.epc_len_from_pc(), tag.epc().len());
    }
}

#[test]
fn raw_media_id_is_uppercase_epc_hex() {
    let factory = factory_with_passwords();
    let tag = factory.from_hex("3034257bf468d4800000162e").expect("raw");
    assert_eq!(tag.tag_type(), "RawTag");
    assert_eq!(tag.media_id().expect("media id"), "3034257BF468D4800000162E");
    assert_eq!(tag.access_password(), [0; 4]);
    assert!(tag.validate_media_id("42").is_err());
}

#[test]
fn missing_password_keys_fall_back_to_placeholder_derivation() {
    let bare = TagFactory::new(Arc::new(PasswordRegistry::new(HashMap::new())));
    let configured = factory_with_passwords();

    let from_bare = bare.for_initialization("DE290", "6600", true).expect("build");
    let from_configured = configured
        .for_initialization("DE290", "6600", true)
        .expect("build");

    // 占位密钥仍能派生口令，但与真实配置不同。
    assert_ne!(from_bare.access_password(), from_configured.access_password());
}
