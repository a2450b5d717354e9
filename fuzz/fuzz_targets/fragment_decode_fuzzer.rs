//! Fuzz target for the encrypted-fragment codec.
//!
//! Decrypted cipher values are decoded as CBOR event lists. Arbitrary
//! bytes must never panic the decoder, only return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use streamseal_xml::XmlEvent;

fuzz_target!(|data: &[u8]| {
    let _ = ciborium::de::from_reader::<Vec<XmlEvent>, _>(data);
});
