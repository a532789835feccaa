//! Identifier and token generation

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique record id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Shipment tracking token: 8 uppercase hex characters.
///
/// Drawn from the random tail of a fresh uuid7, the leading bytes of which are
/// a millisecond timestamp and would repeat across close calls.
pub fn new_tracking_token() -> String {
    let id = uuid7();
    hex::encode_upper(&id.as_bytes()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_token_shape() {
        let token = new_tracking_token();

        assert_eq!(token.len(), 8);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn ids_carry_prefix() {
        let id = new_uuid_to_bech32("trade").unwrap();
        assert!(id.starts_with("trade1"));
    }
}
