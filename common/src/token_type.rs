use crate::{
  constants::TOKEN_KEY_ID_BYTES,
  error::{ProtocolError, ProtocolResult},
  rsa_blind, voprf_p384,
};

/// Supported token types. The numeric values are protocol constants and go
/// on the wire as big-endian u16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TokenType {
  /// Privately verifiable token (VOPRF, P-384, SHA-384)
  Voprf = 0x0001,
  /// Publicly verifiable token (blind RSA, 2048-bit)
  BlindRsa = 0x0002,
}

impl TokenType {
  pub fn value(&self) -> u16 {
    *self as u16
  }

  /// Parameter table for this token type
  pub fn entry(&self) -> &'static TokenTypeEntry {
    match self {
      TokenType::Voprf => &VOPRF,
      TokenType::BlindRsa => &BLIND_RSA,
    }
  }
}

impl TryFrom<u16> for TokenType {
  type Error = ProtocolError;

  fn try_from(value: u16) -> ProtocolResult<Self> {
    match value {
      0x0001 => Ok(TokenType::Voprf),
      0x0002 => Ok(TokenType::BlindRsa),
      other => Err(ProtocolError::UnknownTokenType(other)),
    }
  }
}

/// Static parameters of a token type. Entries are defined once per mechanism
/// and never mutated; adding a mechanism means adding an entry here plus a
/// `TokenMechanism` implementation, the codec stays untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTypeEntry {
  pub value: TokenType,
  pub name: &'static str,
  /// Key id digest size
  pub nid: usize,
  /// Whether anyone holding the issuer public key can verify a token
  pub public_verifiable: bool,
  pub public_metadata: bool,
  pub private_metadata: bool,
  /// Authenticator size
  pub nk: usize,
  /// Serialized group element size; for blind RSA the blinded message is
  /// modulus-sized, so this equals `nk`
  pub ne: usize,
  /// Serialized scalar size (zero for blind RSA)
  pub ns: usize,
}

impl TokenTypeEntry {
  /// Length of the `blinded_msg` field carried in a TokenRequest
  pub const fn blinded_msg_len(&self) -> usize {
    self.ne
  }
}

pub const VOPRF: TokenTypeEntry = TokenTypeEntry {
  value: TokenType::Voprf,
  name: "VOPRF (P-384, SHA-384)",
  nid: TOKEN_KEY_ID_BYTES,
  public_verifiable: false,
  public_metadata: false,
  private_metadata: false,
  nk: voprf_p384::NK,
  ne: voprf_p384::NE,
  ns: voprf_p384::NS,
};

pub const BLIND_RSA: TokenTypeEntry = TokenTypeEntry {
  value: TokenType::BlindRsa,
  name: "Blind RSA (2048)",
  nid: TOKEN_KEY_ID_BYTES,
  public_verifiable: true,
  public_metadata: false,
  private_metadata: false,
  nk: rsa_blind::NK,
  ne: rsa_blind::NK,
  ns: 0,
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_by_wire_value() {
    assert_eq!(TokenType::try_from(0x0001).unwrap(), TokenType::Voprf);
    assert_eq!(TokenType::try_from(0x0002).unwrap(), TokenType::BlindRsa);
    let err = TokenType::try_from(0xf91a).unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownTokenType(0xf91a)));
  }

  #[test]
  fn entry_parameters() {
    let voprf = TokenType::Voprf.entry();
    assert_eq!(voprf.value.value(), 0x0001);
    assert!(!voprf.public_verifiable);
    assert_eq!((voprf.ne, voprf.ns, voprf.nk), (49, 48, 48));

    let rsa = TokenType::BlindRsa.entry();
    assert_eq!(rsa.value.value(), 0x0002);
    assert!(rsa.public_verifiable);
    assert_eq!(rsa.nk, 256);
    assert_eq!(rsa.blinded_msg_len(), 256);
  }
}
