//! TON address encoding between the raw `workchain:hex` form and the
//! user-friendly base64 form expected by wallets.
//!
//! Layout of the friendly form: one tag byte (bounceable/non-bounceable,
//! plus a test-only flag), one signed workchain byte, the 32-byte account
//! id, and a CRC16/XMODEM checksum, URL-safe base64 encoded (48 chars).

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TEST_ONLY: u8 = 0x80;

const ACCOUNT_ID_LEN: usize = 32;
const FRIENDLY_LEN: usize = 36;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("expected `workchain:hex` raw address, got `{0}`")]
    MalformedRaw(String),
    #[error("workchain {0} does not fit a signed byte")]
    WorkchainRange(i32),
    #[error("account id must be 32 bytes, got {0}")]
    AccountIdLength(usize),
    #[error("invalid base64: {0}")]
    Base64(String),
    #[error("friendly address must decode to 36 bytes, got {0}")]
    FriendlyLength(usize),
    #[error("unknown address tag byte {0:#04x}")]
    UnknownTag(u8),
    #[error("checksum mismatch")]
    Checksum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub workchain: i8,
    pub account_id: [u8; ACCOUNT_ID_LEN],
    pub bounceable: bool,
    pub test_only: bool,
}

impl DecodedAddress {
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.account_id))
    }
}

/// Encode a raw `workchain:hex` address as the non-bounceable user-friendly
/// form, flagged test-only when `test_only` is set. Wallet-facing addresses
/// use the non-bounceable tag; `UQ…` on mainnet, `0Q…` on testnet.
pub fn to_user_friendly(raw: &str, test_only: bool) -> Result<String, AddressError> {
    let (workchain, account_id) = parse_raw(raw)?;
    let mut tag = TAG_NON_BOUNCEABLE;
    if test_only {
        tag |= FLAG_TEST_ONLY;
    }

    let mut bytes = [0u8; FRIENDLY_LEN];
    bytes[0] = tag;
    bytes[1] = workchain as u8;
    bytes[2..2 + ACCOUNT_ID_LEN].copy_from_slice(&account_id);
    let crc = crc16_xmodem(&bytes[..2 + ACCOUNT_ID_LEN]);
    bytes[34] = (crc >> 8) as u8;
    bytes[35] = (crc & 0xff) as u8;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode a user-friendly address, verifying length and checksum.
pub fn parse_user_friendly(friendly: &str) -> Result<DecodedAddress, AddressError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(friendly)
        .map_err(|e| AddressError::Base64(e.to_string()))?;
    if bytes.len() != FRIENDLY_LEN {
        return Err(AddressError::FriendlyLength(bytes.len()));
    }

    let expected = crc16_xmodem(&bytes[..34]);
    let found = ((bytes[34] as u16) << 8) | bytes[35] as u16;
    if expected != found {
        return Err(AddressError::Checksum);
    }

    let tag = bytes[0];
    let test_only = tag & FLAG_TEST_ONLY != 0;
    let bounceable = match tag & !FLAG_TEST_ONLY {
        TAG_BOUNCEABLE => true,
        TAG_NON_BOUNCEABLE => false,
        _ => return Err(AddressError::UnknownTag(tag)),
    };

    let mut account_id = [0u8; ACCOUNT_ID_LEN];
    account_id.copy_from_slice(&bytes[2..2 + ACCOUNT_ID_LEN]);
    Ok(DecodedAddress {
        workchain: bytes[1] as i8,
        account_id,
        bounceable,
        test_only,
    })
}

fn parse_raw(raw: &str) -> Result<(i8, [u8; ACCOUNT_ID_LEN]), AddressError> {
    let (chain, id_hex) = raw
        .split_once(':')
        .ok_or_else(|| AddressError::MalformedRaw(raw.to_owned()))?;
    let workchain: i32 = chain
        .parse()
        .map_err(|_| AddressError::MalformedRaw(raw.to_owned()))?;
    let workchain =
        i8::try_from(workchain).map_err(|_| AddressError::WorkchainRange(workchain))?;

    let id = hex::decode(id_hex).map_err(|_| AddressError::MalformedRaw(raw.to_owned()))?;
    let account_id: [u8; ACCOUNT_ID_LEN] = id
        .as_slice()
        .try_into()
        .map_err(|_| AddressError::AccountIdLength(id.len()))?;
    Ok((workchain, account_id))
}

/// CRC16/XMODEM (poly 0x1021, init 0), the checksum TON addresses carry.
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
