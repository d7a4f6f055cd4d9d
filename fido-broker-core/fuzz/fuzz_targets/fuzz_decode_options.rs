#![no_main]

//! Fuzz target for codec::decode()
//!
//! Arbitrary bytes must never panic the decoder, and anything it accepts must
//! re-encode to a form that decodes to the same options.
//!
//! Run with: cargo +nightly fuzz run fuzz_decode_options

use fido_broker_core::{codec, BrokerError, DecodeError, RequestKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(options) = codec::decode(data) else {
        return;
    };

    // Omitted optional fields come back as explicit nulls, which can push a
    // blob near the cap over it
    let encoded = match codec::encode(&options) {
        Ok(encoded) => encoded,
        Err(BrokerError::Decode(DecodeError::TooLarge { .. })) => return,
        Err(e) => panic!("decoded options must re-encode: {e}"),
    };
    let decoded = codec::decode(&encoded).expect("re-encoded options must decode");
    assert_eq!(decoded, options);

    // Validation must not panic on any decodable input
    let _ = options.validate(RequestKind::Register);
    let _ = options.validate(RequestKind::Sign);
});
