//! Token descriptors and token-transfer message encoders.
//!
//! SLP messages are a bare `OP_RETURN` script. ALP messages are sections
//! packed into an eMPP (`OP_RETURN OP_RESERVED <push>...`) script, which can
//! carry extra pushdata such as an offer advertisement.

use std::fmt;
use std::str::FromStr;

use bitcoin::ScriptBuf;
use bitcoin::opcodes::all::{OP_RESERVED, OP_RETURN};
use bitcoin::script::{Builder, PushBytes};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{Error, Result};

pub const SLP_LOKAD_ID: &[u8; 4] = b"SLP\0";
pub const ALP_LOKAD_ID: &[u8; 4] = b"SLP2";

/// SLP allows at most 19 amounts in a SEND.
pub const SLP_MAX_SEND_OUTPUTS: usize = 19;
/// ALP amounts are 48-bit.
pub const ALP_MAX_AMOUNT: u64 = (1 << 48) - 1;
/// Bytes of one amount in an SLP SEND.
pub const SLP_AMOUNT_LEN: usize = 8;
/// Bytes of one amount in an ALP SEND.
pub const ALP_AMOUNT_LEN: usize = 6;

pub const SLP_TOKEN_TYPE_FUNGIBLE: u8 = 0x01;
pub const SLP_TOKEN_TYPE_NFT1_CHILD: u8 = 0x41;
pub const SLP_TOKEN_TYPE_NFT1_GROUP: u8 = 0x81;
pub const ALP_TOKEN_TYPE_STANDARD: u8 = 0x00;

/// Token protocols the engine can emit transfer messages for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenProtocol {
    Slp,
    Alp,
}

impl fmt::Display for TokenProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenProtocol::Slp => write!(f, "SLP"),
            TokenProtocol::Alp => write!(f, "ALP"),
        }
    }
}

impl FromStr for TokenProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SLP" => Ok(TokenProtocol::Slp),
            "ALP" => Ok(TokenProtocol::Alp),
            other => Err(Error::UnsupportedProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenType {
    pub protocol: TokenProtocol,
    /// Protocol-specific token type number.
    pub number: u8,
}

/// Token held by an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Token id as displayed (big-endian hex).
    pub token_id: String,
    pub token_type: TokenType,
    /// Base-unit amount. The indexer serializes it as a decimal string.
    #[serde(with = "U64StringSerde")]
    pub amount: u64,
    #[serde(default)]
    pub is_mint_baton: bool,
}

/// (De)serializes a `u64` as a decimal string, accepting plain numbers too.
pub struct U64StringSerde;

impl U64StringSerde {
    pub fn serialize<S>(val: &u64, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        String::serialize(&val.to_string(), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StrOrNum {
            Str(String),
            Num(u64),
        }
        match StrOrNum::deserialize(deserializer)? {
            StrOrNum::Str(s) => u64::from_str(&s)
                .map_err(|e| de::Error::custom(format!("u64 from string error: {e}"))),
            StrOrNum::Num(n) => Ok(n),
        }
    }
}

fn token_id_bytes(token_id: &str) -> Result<[u8; 32]> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(token_id, &mut bytes)?;
    Ok(bytes)
}

// Token messages sit behind OP_RETURN and are never executed, so they use
// plain length-prefixed pushes even for single bytes, as the token
// protocols require.
fn push_data(builder: Builder, data: &[u8]) -> Result<Builder> {
    Ok(builder.push_slice(<&PushBytes>::try_from(data)?))
}

/// SLP SEND: `OP_RETURN <"SLP\0"> <type> <"SEND"> <token id> <amount BE8>...`
///
/// `amounts[i]` is sent to output `i + 1`.
pub fn slp_send(token_id: &str, token_type: u8, amounts: &[u64]) -> Result<ScriptBuf> {
    if amounts.is_empty() || amounts.len() > SLP_MAX_SEND_OUTPUTS {
        return Err(Error::Encoding(format!(
            "SLP SEND needs 1 to {SLP_MAX_SEND_OUTPUTS} amounts, got {}",
            amounts.len()
        )));
    }
    let token_id = token_id_bytes(token_id)?;
    let mut builder = Builder::new().push_opcode(OP_RETURN);
    builder = push_data(builder, SLP_LOKAD_ID)?;
    builder = push_data(builder, &[token_type])?;
    builder = push_data(builder, b"SEND")?;
    builder = push_data(builder, &token_id)?;
    for amount in amounts {
        builder = push_data(builder, &amount.to_be_bytes())?;
    }
    Ok(builder.into_script())
}

/// ALP SEND section (not a script; wrap it with [`empp_script`]).
///
/// The token id is stored in little-endian byte order.
pub fn alp_send(token_id: &str, token_type: u8, amounts: &[u64]) -> Result<Vec<u8>> {
    if amounts.len() > 127 {
        return Err(Error::Encoding(format!(
            "ALP SEND supports at most 127 amounts, got {}",
            amounts.len()
        )));
    }
    let mut token_id = token_id_bytes(token_id)?;
    token_id.reverse();
    let mut section = Vec::with_capacity(43 + ALP_AMOUNT_LEN * amounts.len());
    section.extend_from_slice(ALP_LOKAD_ID);
    section.push(token_type);
    section.push(4);
    section.extend_from_slice(b"SEND");
    section.extend_from_slice(&token_id);
    section.push(amounts.len() as u8);
    for &amount in amounts {
        if amount > ALP_MAX_AMOUNT {
            return Err(Error::Encoding(format!("ALP amount {amount} exceeds 48 bits")));
        }
        section.extend_from_slice(&amount.to_le_bytes()[..ALP_AMOUNT_LEN]);
    }
    Ok(section)
}

/// eMPP script: `OP_RETURN OP_RESERVED <pushdata>...`
pub fn empp_script<T: AsRef<[u8]>>(pushdata: &[T]) -> Result<ScriptBuf> {
    let mut builder = Builder::new()
        .push_opcode(OP_RETURN)
        .push_opcode(OP_RESERVED);
    for data in pushdata {
        let data = data.as_ref();
        if data.is_empty() || data.len() > 0xff {
            return Err(Error::Encoding(format!(
                "eMPP pushdata must be 1 to 255 bytes, got {}",
                data.len()
            )));
        }
        builder = push_data(builder, data)?;
    }
    Ok(builder.into_script())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::OP_PUSHDATA1;

    const TOKEN_ID: &str = "0102030405060708091011121314151617181920212223242526272829303132";

    #[test]
    fn slp_send_layout() {
        let script = slp_send(TOKEN_ID, SLP_TOKEN_TYPE_FUNGIBLE, &[0, 1000]).unwrap();
        let bytes = script.as_bytes();
        assert_eq!(&bytes[..6], &[0x6a, 0x04, b'S', b'L', b'P', 0]);
        assert_eq!(&bytes[6..8], &[0x01, 0x01]);
        assert_eq!(&bytes[8..13], &[0x04, b'S', b'E', b'N', b'D']);
        assert_eq!(bytes[13], 0x20);
        assert_eq!(&bytes[14..46], &hex::decode(TOKEN_ID).unwrap()[..]);
        assert_eq!(&bytes[46..55], &[0x08, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[55..], &[0x08, 0, 0, 0, 0, 0, 0, 0x03, 0xe8]);
    }

    #[test]
    fn slp_send_amount_count_is_bounded() {
        assert!(slp_send(TOKEN_ID, 1, &[]).is_err());
        assert!(slp_send(TOKEN_ID, 1, &[1; 20]).is_err());
        assert!(slp_send("abcd", 1, &[1]).is_err());
    }

    #[test]
    fn alp_send_layout() {
        let section = alp_send(TOKEN_ID, ALP_TOKEN_TYPE_STANDARD, &[0, 0x0102]).unwrap();
        assert_eq!(&section[..4], b"SLP2");
        assert_eq!(section[4], 0);
        assert_eq!(&section[5..10], &[4, b'S', b'E', b'N', b'D']);
        assert_eq!(section[10], 0x32);
        assert_eq!(section[41], 0x01);
        assert_eq!(section[42], 2);
        assert_eq!(&section[43..49], &[0; 6]);
        assert_eq!(&section[49..], &[0x02, 0x01, 0, 0, 0, 0]);
        assert!(alp_send(TOKEN_ID, 0, &[ALP_MAX_AMOUNT + 1]).is_err());
    }

    #[test]
    fn empp_wraps_sections() {
        let script = empp_script(&[b"AGR0".to_vec(), vec![0xaa; 80]]).unwrap();
        let bytes = script.as_bytes();
        assert_eq!(&bytes[..3], &[0x6a, 0x50, 4]);
        assert_eq!(&bytes[7..9], &[OP_PUSHDATA1, 80]);
        assert!(empp_script::<Vec<u8>>(&[vec![]]).is_err());
    }

    #[test]
    fn token_from_indexer_json() {
        let token: Token = serde_json::from_str(
            r#"{"tokenId":"aa","tokenType":{"protocol":"ALP","number":0},"amount":"1234"}"#,
        )
        .unwrap();
        assert_eq!(token.amount, 1234);
        assert_eq!(token.token_type.protocol, TokenProtocol::Alp);
        assert!(!token.is_mint_baton);

        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains(r#""amount":"1234""#));
    }

    #[test]
    fn protocol_names() {
        assert_eq!("SLP".parse::<TokenProtocol>().unwrap(), TokenProtocol::Slp);
        assert!(matches!(
            "NFT".parse::<TokenProtocol>(),
            Err(Error::UnsupportedProtocol(_))
        ));
    }
}
