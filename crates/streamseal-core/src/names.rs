//! The security-header element vocabulary.
//!
//! Qualified-name constructors for the wire elements this engine emits
//! and recognizes. Names are built on demand; matching always goes
//! through [`streamseal_xml::QName::matches`] with the namespace
//! constants below, never through prefixes.

use streamseal_crypto::KeyEncoding;
use streamseal_xml::{NamespaceBinding, QName};

/// WS-Security extension namespace.
pub const NS_WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
/// WS-Security utility namespace.
pub const NS_WSU: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
/// XML Digital Signature namespace.
pub const NS_DS: &str = "http://www.w3.org/2000/09/xmldsig#";
/// XML Encryption namespace.
pub const NS_XENC: &str = "http://www.w3.org/2001/04/xmlenc#";

/// Base64 encoding type for binary tokens.
pub const ENCODING_BASE64: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Binary-token value type: RSA public key, SubjectPublicKeyInfo DER.
pub const VALUE_TYPE_RSA_SPKI: &str = "urn:streamseal:key:rsa-spki-der";
/// Binary-token value type: raw Ed25519 public key.
pub const VALUE_TYPE_ED25519: &str = "urn:streamseal:key:ed25519";

/// EncryptedData type for whole-element coverage.
pub const TYPE_ELEMENT: &str = "http://www.w3.org/2001/04/xmlenc#Element";
/// EncryptedData type for content-only coverage.
pub const TYPE_CONTENT: &str = "http://www.w3.org/2001/04/xmlenc#Content";

fn wsse(local: &str) -> QName {
    QName::new(NS_WSSE, local, "wsse")
}

fn wsu(local: &str) -> QName {
    QName::new(NS_WSU, local, "wsu")
}

fn ds(local: &str) -> QName {
    QName::new(NS_DS, local, "ds")
}

fn xenc(local: &str) -> QName {
    QName::new(NS_XENC, local, "xenc")
}

/// `wsse:Security`.
pub fn security() -> QName {
    wsse("Security")
}

/// `wsse:BinarySecurityToken`.
pub fn binary_security_token() -> QName {
    wsse("BinarySecurityToken")
}

/// `wsse:SecurityTokenReference`.
pub fn security_token_reference() -> QName {
    wsse("SecurityTokenReference")
}

/// `wsse:Reference`.
pub fn token_reference() -> QName {
    wsse("Reference")
}

/// `wsu:Timestamp`.
pub fn timestamp() -> QName {
    wsu("Timestamp")
}

/// `wsu:Created`.
pub fn created() -> QName {
    wsu("Created")
}

/// `wsu:Expires`.
pub fn expires() -> QName {
    wsu("Expires")
}

/// The `wsu:Id` attribute name.
pub fn wsu_id() -> QName {
    wsu("Id")
}

/// `ds:Signature`.
pub fn signature() -> QName {
    ds("Signature")
}

/// `ds:SignedInfo`.
pub fn signed_info() -> QName {
    ds("SignedInfo")
}

/// `ds:CanonicalizationMethod`.
pub fn canonicalization_method() -> QName {
    ds("CanonicalizationMethod")
}

/// `ds:SignatureMethod`.
pub fn signature_method() -> QName {
    ds("SignatureMethod")
}

/// `ds:Reference`.
pub fn ds_reference() -> QName {
    ds("Reference")
}

/// `ds:Transforms`.
pub fn transforms() -> QName {
    ds("Transforms")
}

/// `ds:Transform`.
pub fn transform() -> QName {
    ds("Transform")
}

/// `ds:DigestMethod`.
pub fn digest_method() -> QName {
    ds("DigestMethod")
}

/// `ds:DigestValue`.
pub fn digest_value() -> QName {
    ds("DigestValue")
}

/// `ds:SignatureValue`.
pub fn signature_value() -> QName {
    ds("SignatureValue")
}

/// `ds:KeyInfo`.
pub fn key_info() -> QName {
    ds("KeyInfo")
}

/// `xenc:EncryptedKey`.
pub fn encrypted_key() -> QName {
    xenc("EncryptedKey")
}

/// `xenc:EncryptedData`.
pub fn encrypted_data() -> QName {
    xenc("EncryptedData")
}

/// `xenc:EncryptionMethod`.
pub fn encryption_method() -> QName {
    xenc("EncryptionMethod")
}

/// `xenc:CipherData`.
pub fn cipher_data() -> QName {
    xenc("CipherData")
}

/// `xenc:CipherValue`.
pub fn cipher_value() -> QName {
    xenc("CipherValue")
}

/// `xenc:ReferenceList`.
pub fn reference_list() -> QName {
    xenc("ReferenceList")
}

/// `xenc:DataReference`.
pub fn data_reference() -> QName {
    xenc("DataReference")
}

/// Unqualified `Algorithm` attribute.
pub fn algorithm_attr() -> QName {
    QName::local("Algorithm")
}

/// Unqualified `URI` attribute.
pub fn uri_attr() -> QName {
    QName::local("URI")
}

/// Unqualified `Id` attribute (EncryptedKey / EncryptedData).
pub fn id_attr() -> QName {
    QName::local("Id")
}

/// Unqualified `Type` attribute (EncryptedData).
pub fn type_attr() -> QName {
    QName::local("Type")
}

/// Unqualified `ValueType` attribute.
pub fn value_type_attr() -> QName {
    QName::local("ValueType")
}

/// Unqualified `EncodingType` attribute.
pub fn encoding_type_attr() -> QName {
    QName::local("EncodingType")
}

/// Namespace binding for the `wsse` prefix.
pub fn bind_wsse() -> NamespaceBinding {
    NamespaceBinding::new("wsse", NS_WSSE)
}

/// Namespace binding for the `wsu` prefix.
pub fn bind_wsu() -> NamespaceBinding {
    NamespaceBinding::new("wsu", NS_WSU)
}

/// Namespace binding for the `ds` prefix.
pub fn bind_ds() -> NamespaceBinding {
    NamespaceBinding::new("ds", NS_DS)
}

/// Namespace binding for the `xenc` prefix.
pub fn bind_xenc() -> NamespaceBinding {
    NamespaceBinding::new("xenc", NS_XENC)
}

/// Strip the leading `#` from a same-document reference URI.
pub fn fragment_id(uri: &str) -> &str {
    uri.strip_prefix('#').unwrap_or(uri)
}

/// Binary-token value type URI for a key encoding.
pub fn value_type_for(encoding: KeyEncoding) -> &'static str {
    match encoding {
        KeyEncoding::RsaSpkiDer => VALUE_TYPE_RSA_SPKI,
        KeyEncoding::Ed25519Raw => VALUE_TYPE_ED25519,
    }
}

/// Key encoding for a binary-token value type URI.
pub fn encoding_for(value_type: &str) -> Option<KeyEncoding> {
    match value_type {
        VALUE_TYPE_RSA_SPKI => Some(KeyEncoding::RsaSpkiDer),
        VALUE_TYPE_ED25519 => Some(KeyEncoding::Ed25519Raw),
        _ => None,
    }
}
