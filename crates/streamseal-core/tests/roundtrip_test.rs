//! Outbound-protect followed by inbound-verify/decrypt must reproduce
//! the original plaintext content and report success through the
//! observation log.

mod common;

use std::{cell::RefCell, rc::Rc};

use common::{
    canonical_digest, envelope_with_body, find_start, source, subtree, subtree_text, test_env,
    test_rsa_key,
};
use streamseal_core::{
    Action, InboundProperties, InboundSecurity, OutboundProperties, OutboundSecurity, SecurePart,
    SecurityEvent, collect_events, names,
};
use streamseal_crypto::SigningKey;
use streamseal_xml::XmlEvent;

/// Protect a document and return the output event list.
fn protect(properties: OutboundProperties, document: Vec<XmlEvent>) -> Vec<XmlEvent> {
    let out = Rc::new(RefCell::new(Vec::new()));
    let mut outbound = OutboundSecurity::new(properties, Box::new(Rc::clone(&out))).unwrap();
    for event in document {
        outbound.push(event).unwrap();
    }
    outbound.finish().unwrap();
    Rc::try_unwrap(out).unwrap().into_inner()
}

fn validate(
    properties: InboundProperties,
    document: Vec<XmlEvent>,
) -> (Vec<XmlEvent>, Vec<SecurityEvent>) {
    let reader = InboundSecurity::new(properties).process(source(document)).unwrap();
    collect_events(reader).unwrap()
}

#[test]
fn signed_body_with_default_hmac_key() {
    let signing = SigningKey::hmac(b"shared secret".to_vec());
    let verifying = signing.verifying_key();

    let protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(1))
            .with_action(Action::Signature)
            .with_signature_part(SecurePart::element(common::NS_EXAMPLE, "Body"))
            .with_signing_key(signing),
        envelope_with_body("payload"),
    );

    // The signature's single reference points at the id injected on Body,
    // and its digest value is the hash of Body's canonicalized subtree.
    let body = find_start(&protected, common::NS_EXAMPLE, "Body").unwrap();
    let injected_id = body.attribute_value(names::NS_WSU, "Id").unwrap().to_string();
    assert!(injected_id.starts_with("id-"));

    let references: Vec<_> = protected
        .iter()
        .filter_map(|e| e.as_start().filter(|s| s.name.matches(names::NS_DS, "Reference")))
        .collect();
    assert_eq!(references.len(), 1);
    assert_eq!(
        references[0].attribute_value("", "URI"),
        Some(format!("#{injected_id}").as_str())
    );

    let digest_value = subtree_text(&protected, names::NS_DS, "DigestValue");
    let expected = {
        use base64::{Engine as _, engine::general_purpose::STANDARD};
        STANDARD.encode(canonical_digest(&subtree(&protected, common::NS_EXAMPLE, "Body")))
    };
    assert_eq!(digest_value, expected);

    let (events, log) = validate(
        InboundProperties::new()
            .with_environment(test_env(2))
            .with_default_verification_key(verifying),
        protected,
    );

    assert_eq!(subtree_text(&events, common::NS_EXAMPLE, "Body"), "payload");
    assert!(log.iter().any(|e| matches!(e, SecurityEvent::SignatureVerified { reference_count: 1 })));
    assert!(log.iter().any(|e| matches!(
        e,
        SecurityEvent::SignedPart { name, reference_id }
            if name.local_name == "Body" && *reference_id == injected_id
    )));
}

#[test]
fn signed_body_with_rsa_binary_token() {
    let signing = SigningKey::RsaSha256(test_rsa_key().clone());

    let protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(3))
            .with_action(Action::Signature)
            .with_signature_part(SecurePart::element(common::NS_EXAMPLE, "Body"))
            .with_signing_key(signing),
        envelope_with_body("rsa payload"),
    );

    // The emitted binary token resolves verification without any
    // pre-registered keys.
    let bst = find_start(&protected, names::NS_WSSE, "BinarySecurityToken").unwrap();
    let bst_id = bst.attribute_value(names::NS_WSU, "Id").unwrap().to_string();

    let token_reference = find_start(&protected, names::NS_WSSE, "Reference").unwrap();
    assert_eq!(
        token_reference.attribute_value("", "URI"),
        Some(format!("#{bst_id}").as_str())
    );

    let (events, log) =
        validate(InboundProperties::new().with_environment(test_env(4)), protected);

    assert_eq!(subtree_text(&events, common::NS_EXAMPLE, "Body"), "rsa payload");
    assert!(log.iter().any(|e| matches!(
        e,
        SecurityEvent::TokenRecognized { id, .. } if *id == bst_id
    )));
    assert!(log.iter().any(|e| matches!(e, SecurityEvent::SignatureVerified { .. })));
}

#[test]
fn signed_body_with_ed25519_binary_token() {
    let signing = SigningKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[9; 32]));

    let protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(5))
            .with_action(Action::Signature)
            .with_signature_part(SecurePart::element(common::NS_EXAMPLE, "Body"))
            .with_signing_key(signing),
        envelope_with_body("ed payload"),
    );

    let (events, log) =
        validate(InboundProperties::new().with_environment(test_env(6)), protected);

    assert_eq!(subtree_text(&events, common::NS_EXAMPLE, "Body"), "ed payload");
    assert!(log.iter().any(|e| matches!(e, SecurityEvent::SignatureVerified { .. })));
}

#[test]
fn encrypted_body_roundtrip() {
    let recipient = test_rsa_key().to_public_key();

    let original = envelope_with_body("secret payload");
    let original_body = subtree(&original, common::NS_EXAMPLE, "Body");

    let protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(7))
            .with_action(Action::Encrypt)
            .with_encryption_part(SecurePart::element(common::NS_EXAMPLE, "Body"))
            .with_encryption_recipient(recipient),
        original,
    );

    // The body is gone from the wire; an encrypted-data element with a
    // referenced id took its place.
    assert!(find_start(&protected, common::NS_EXAMPLE, "Body").is_none());
    let encrypted_data = find_start(&protected, names::NS_XENC, "EncryptedData").unwrap();
    let data_id = encrypted_data.attribute_value("", "Id").unwrap().to_string();
    let data_reference = find_start(&protected, names::NS_XENC, "DataReference").unwrap();
    assert_eq!(
        data_reference.attribute_value("", "URI"),
        Some(format!("#{data_id}").as_str())
    );

    let (events, log) = validate(
        InboundProperties::new()
            .with_environment(test_env(8))
            .with_decryption_key(test_rsa_key().clone()),
        protected,
    );

    // Byte-identical plaintext: same canonical form as before encryption.
    let recovered_body = subtree(&events, common::NS_EXAMPLE, "Body");
    assert_eq!(
        common::canonical_bytes(&recovered_body),
        common::canonical_bytes(&original_body)
    );
    assert!(find_start(&events, names::NS_XENC, "EncryptedData").is_none());
    assert!(log.iter().any(|e| matches!(
        e,
        SecurityEvent::EncryptedPart { name, reference_id }
            if name.local_name == "Body" && *reference_id == data_id
    )));
}

#[test]
fn content_coverage_keeps_the_element_tags() {
    let recipient = test_rsa_key().to_public_key();

    let protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(9))
            .with_action(Action::Encrypt)
            .with_encryption_part(SecurePart::content(common::NS_EXAMPLE, "Body"))
            .with_encryption_recipient(recipient),
        envelope_with_body("inner secret"),
    );

    // Tags stay in clear, the text does not.
    assert!(find_start(&protected, common::NS_EXAMPLE, "Body").is_some());
    assert!(!protected.iter().any(|e| e.as_characters() == Some("inner secret")));

    let (events, log) = validate(
        InboundProperties::new()
            .with_environment(test_env(10))
            .with_decryption_key(test_rsa_key().clone()),
        protected,
    );

    assert_eq!(subtree_text(&events, common::NS_EXAMPLE, "Body"), "inner secret");
    assert!(log.iter().any(|e| matches!(e, SecurityEvent::ContentEncrypted { .. })));
}

#[test]
fn sign_then_encrypt_roundtrip() {
    let signing = SigningKey::RsaSha256(test_rsa_key().clone());
    let recipient = test_rsa_key().to_public_key();

    let protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(11))
            .with_action(Action::Timestamp)
            .with_action(Action::Signature)
            .with_action(Action::Encrypt)
            .with_signature_part(SecurePart::element(common::NS_EXAMPLE, "Body"))
            .with_encryption_part(SecurePart::element(common::NS_EXAMPLE, "Body"))
            .with_signing_key(signing)
            .with_encryption_recipient(recipient),
        envelope_with_body("signed and sealed"),
    );

    // The signed body is encrypted on the wire.
    assert!(find_start(&protected, common::NS_EXAMPLE, "Body").is_none());

    let (events, log) = validate(
        InboundProperties::new()
            .with_environment(test_env(12))
            .with_decryption_key(test_rsa_key().clone()),
        protected,
    );

    assert_eq!(subtree_text(&events, common::NS_EXAMPLE, "Body"), "signed and sealed");
    assert!(log.iter().any(|e| matches!(e, SecurityEvent::TimestampValidated { .. })));
    assert!(log.iter().any(|e| matches!(e, SecurityEvent::SignatureVerified { .. })));
    assert!(log.iter().any(|e| matches!(e, SecurityEvent::SignedPart { .. })));
    assert!(log.iter().any(|e| matches!(e, SecurityEvent::EncryptedPart { .. })));
}

#[test]
fn tampered_body_fails_the_digest_check() {
    let signing = SigningKey::hmac(b"shared secret".to_vec());
    let verifying = signing.verifying_key();

    let mut protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(13))
            .with_action(Action::Signature)
            .with_signature_part(SecurePart::element(common::NS_EXAMPLE, "Body"))
            .with_signing_key(signing),
        envelope_with_body("payload"),
    );

    // Flip the signed text after signing.
    for event in &mut protected {
        if event.as_characters() == Some("payload") {
            *event = XmlEvent::text("paYload");
        }
    }

    let reader = InboundSecurity::new(
        InboundProperties::new()
            .with_environment(test_env(14))
            .with_default_verification_key(verifying),
    )
    .process(source(protected))
    .unwrap();
    let result = collect_events(reader);

    assert!(matches!(result, Err(streamseal_core::SecurityError::FailedCheck { .. })));
}

#[test]
fn signature_without_registered_token_is_token_not_found() {
    let signing = SigningKey::RsaSha256(test_rsa_key().clone());

    let mut protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(15))
            .with_action(Action::Signature)
            .with_signature_part(SecurePart::element(common::NS_EXAMPLE, "Body"))
            .with_signing_key(signing),
        envelope_with_body("payload"),
    );

    // Drop the binary token from the header: the signature's key
    // reference now points at nothing.
    let bst_range = subtree(&protected, names::NS_WSSE, "BinarySecurityToken");
    protected.retain(|event| !bst_range.contains(event));

    let reader = InboundSecurity::new(InboundProperties::new().with_environment(test_env(16)))
        .process(source(protected))
        .unwrap();
    let result = collect_events(reader);

    assert!(matches!(result, Err(streamseal_core::SecurityError::TokenNotFound { .. })));
}

#[test]
fn unmatched_configured_part_is_not_an_error() {
    let signing = SigningKey::hmac(b"shared secret".to_vec());

    let protected = protect(
        OutboundProperties::new()
            .with_environment(test_env(17))
            .with_action(Action::Signature)
            .with_signature_part(SecurePart::element(common::NS_EXAMPLE, "NoSuchPart"))
            .with_signing_key(signing),
        envelope_with_body("payload"),
    );

    // Nothing matched: no signature block is emitted at all.
    assert!(find_start(&protected, names::NS_DS, "Signature").is_none());
    assert_eq!(subtree_text(&protected, common::NS_EXAMPLE, "Body"), "payload");
}
