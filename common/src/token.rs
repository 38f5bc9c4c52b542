use crate::{
  constants::*,
  error::{ProtocolError, ProtocolResult},
  token_type::TokenType,
};
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

/// Derive the 32-byte token key id from the issuer public key bytes
pub fn token_key_id(public_key_bytes: &[u8]) -> [u8; TOKEN_KEY_ID_BYTES] {
  Sha256::digest(public_key_bytes).into()
}

/* ------------------------------------------------------ */
/// Challenge handed out by an origin, describing what an issued token must
/// attest: the issuer, a caller-supplied redemption context and the origins
/// the token may be redeemed at. Read-only for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChallenge {
  token_type: TokenType,
  issuer_name: String,
  redemption_context: Vec<u8>,
  origin_info: Vec<String>,
}

impl TokenChallenge {
  /// Build a challenge. The redemption context must be empty or 32 bytes.
  pub fn new(token_type: TokenType, issuer_name: &str, redemption_context: &[u8], origin_info: &[&str]) -> ProtocolResult<Self> {
    if issuer_name.len() > u16::MAX as usize {
      return Err(ProtocolError::InvalidLength { field: "issuer_name" });
    }
    if !redemption_context.is_empty() && redemption_context.len() != REDEMPTION_CONTEXT_BYTES {
      return Err(ProtocolError::InvalidLength { field: "redemption_context" });
    }
    if origin_info.iter().any(|o| o.contains(ORIGIN_INFO_SEPARATOR)) {
      return Err(ProtocolError::InvalidOriginName);
    }
    let joined_len = origin_info.iter().map(|o| o.len()).sum::<usize>()
      + origin_info.len().saturating_sub(1) * ORIGIN_INFO_SEPARATOR.len();
    if joined_len > u16::MAX as usize {
      return Err(ProtocolError::InvalidLength { field: "origin_info" });
    }

    Ok(Self {
      token_type,
      issuer_name: issuer_name.to_string(),
      redemption_context: redemption_context.to_vec(),
      origin_info: origin_info.iter().map(|o| o.to_string()).collect(),
    })
  }

  pub fn token_type(&self) -> TokenType {
    self.token_type
  }

  pub fn issuer_name(&self) -> &str {
    &self.issuer_name
  }

  pub fn redemption_context(&self) -> &[u8] {
    &self.redemption_context
  }

  pub fn origin_info(&self) -> &[String] {
    &self.origin_info
  }

  pub fn serialize(&self) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&self.token_type.value().to_be_bytes());
    out.extend_from_slice(&(self.issuer_name.len() as u16).to_be_bytes());
    out.extend_from_slice(self.issuer_name.as_bytes());
    out.push(self.redemption_context.len() as u8);
    out.extend_from_slice(&self.redemption_context);
    let origin_info = self.origin_info.join(ORIGIN_INFO_SEPARATOR);
    out.extend_from_slice(&(origin_info.len() as u16).to_be_bytes());
    out.extend_from_slice(origin_info.as_bytes());
    out
  }

  pub fn deserialize(bytes: &[u8]) -> ProtocolResult<Self> {
    let mut reader = Reader::new(bytes);
    let token_type = TokenType::try_from(reader.read_u16("token_type")?)?;

    let name_len = reader.read_u16("issuer_name")? as usize;
    let issuer_name = std::str::from_utf8(reader.read_bytes(name_len, "issuer_name")?)
      .map_err(|_| ProtocolError::InvalidUtf8("issuer_name"))?
      .to_string();

    let context_len = reader.read_u8("redemption_context")? as usize;
    let redemption_context = reader.read_bytes(context_len, "redemption_context")?.to_vec();
    if !redemption_context.is_empty() && redemption_context.len() != REDEMPTION_CONTEXT_BYTES {
      return Err(ProtocolError::InvalidLength { field: "redemption_context" });
    }

    let origin_len = reader.read_u16("origin_info")? as usize;
    let origin_joined =
      std::str::from_utf8(reader.read_bytes(origin_len, "origin_info")?).map_err(|_| ProtocolError::InvalidUtf8("origin_info"))?;
    let origin_info = if origin_joined.is_empty() {
      Vec::new()
    } else {
      origin_joined.split(ORIGIN_INFO_SEPARATOR).map(|o| o.to_string()).collect()
    };
    reader.finish("token_challenge")?;

    Ok(Self {
      token_type,
      issuer_name,
      redemption_context,
      origin_info,
    })
  }

  /// SHA-256 digest of the serialized challenge, bound into the token
  pub fn digest(&self) -> [u8; CHALLENGE_DIGEST_BYTES] {
    Sha256::digest(self.serialize()).into()
  }

  /// Convert to base64url string
  pub fn to_base64url(&self) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(self.serialize())
  }

  /// Convert from base64url string
  pub fn try_from_base64url(input: &str) -> ProtocolResult<Self> {
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(input.as_bytes())?;
    Self::deserialize(&bytes)
  }
}

/* ------------------------------------------------------ */
/// The canonical message that gets blinded, evaluated and finally
/// authenticated: it binds the client nonce, the challenge digest and the
/// issuer key id under the token type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorInput {
  token_type: TokenType,
  nonce: [u8; NONCE_BYTES],
  challenge_digest: [u8; CHALLENGE_DIGEST_BYTES],
  token_key_id: [u8; TOKEN_KEY_ID_BYTES],
}

impl AuthenticatorInput {
  /// Serialized length: type tag plus the three fixed digests
  pub const SERIALIZED_LEN: usize = 2 + NONCE_BYTES + CHALLENGE_DIGEST_BYTES + TOKEN_KEY_ID_BYTES;

  pub fn new(
    token_type: TokenType,
    nonce: [u8; NONCE_BYTES],
    challenge_digest: [u8; CHALLENGE_DIGEST_BYTES],
    token_key_id: [u8; TOKEN_KEY_ID_BYTES],
  ) -> Self {
    Self {
      token_type,
      nonce,
      challenge_digest,
      token_key_id,
    }
  }

  pub fn token_type(&self) -> TokenType {
    self.token_type
  }

  pub fn nonce(&self) -> [u8; NONCE_BYTES] {
    self.nonce
  }

  pub fn challenge_digest(&self) -> [u8; CHALLENGE_DIGEST_BYTES] {
    self.challenge_digest
  }

  pub fn token_key_id(&self) -> [u8; TOKEN_KEY_ID_BYTES] {
    self.token_key_id
  }

  /// Least significant byte of the token key id in network byte order
  pub fn truncated_token_key_id(&self) -> u8 {
    self.token_key_id[TOKEN_KEY_ID_BYTES - 1]
  }

  pub fn serialize(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(Self::SERIALIZED_LEN);
    out.extend_from_slice(&self.token_type.value().to_be_bytes());
    out.extend_from_slice(&self.nonce);
    out.extend_from_slice(&self.challenge_digest);
    out.extend_from_slice(&self.token_key_id);
    out
  }

  pub fn deserialize(bytes: &[u8]) -> ProtocolResult<Self> {
    let mut reader = Reader::new(bytes);
    let token_type = TokenType::try_from(reader.read_u16("token_type")?)?;
    let nonce = reader.read_array::<NONCE_BYTES>("nonce")?;
    let challenge_digest = reader.read_array::<CHALLENGE_DIGEST_BYTES>("challenge_digest")?;
    let token_key_id = reader.read_array::<TOKEN_KEY_ID_BYTES>("token_key_id")?;
    reader.finish("authenticator_input")?;

    Ok(Self {
      token_type,
      nonce,
      challenge_digest,
      token_key_id,
    })
  }
}

/* ------------------------------------------------------ */
/// Request sent from client to issuer: the blinded token input plus a
/// one-byte key selection hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
  token_type: TokenType,
  truncated_token_key_id: u8,
  blinded_msg: Vec<u8>,
}

impl TokenRequest {
  /// Build a request; the blinded message length is fixed per token type and
  /// checked here, not only at parse time.
  pub fn new(token_type: TokenType, truncated_token_key_id: u8, blinded_msg: Vec<u8>) -> ProtocolResult<Self> {
    if blinded_msg.len() != token_type.entry().blinded_msg_len() {
      return Err(ProtocolError::InvalidLength { field: "blinded_msg" });
    }
    Ok(Self {
      token_type,
      truncated_token_key_id,
      blinded_msg,
    })
  }

  pub fn token_type(&self) -> TokenType {
    self.token_type
  }

  pub fn truncated_token_key_id(&self) -> u8 {
    self.truncated_token_key_id
  }

  pub fn blinded_msg(&self) -> &[u8] {
    &self.blinded_msg
  }

  pub fn serialize(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + self.blinded_msg.len());
    out.extend_from_slice(&self.token_type.value().to_be_bytes());
    out.push(self.truncated_token_key_id);
    out.extend_from_slice(&self.blinded_msg);
    out
  }

  pub fn deserialize(bytes: &[u8]) -> ProtocolResult<Self> {
    let mut reader = Reader::new(bytes);
    let token_type = TokenType::try_from(reader.read_u16("token_type")?)?;
    let truncated_token_key_id = reader.read_u8("truncated_token_key_id")?;
    let blinded_msg = reader.read_bytes(token_type.entry().blinded_msg_len(), "blinded_msg")?.to_vec();
    reader.finish("token_request")?;

    Self::new(token_type, truncated_token_key_id, blinded_msg)
  }
}

/* ------------------------------------------------------ */
/// A finalized token: the authenticator input and the mechanism output over
/// it. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  auth_input: AuthenticatorInput,
  authenticator: Vec<u8>,
}

impl Token {
  /// Build a token; the authenticator length is fixed per token type
  pub fn new(auth_input: AuthenticatorInput, authenticator: Vec<u8>) -> ProtocolResult<Self> {
    if authenticator.len() != auth_input.token_type().entry().nk {
      return Err(ProtocolError::InvalidLength { field: "authenticator" });
    }
    Ok(Self { auth_input, authenticator })
  }

  pub fn token_type(&self) -> TokenType {
    self.auth_input.token_type()
  }

  pub fn auth_input(&self) -> &AuthenticatorInput {
    &self.auth_input
  }

  pub fn authenticator(&self) -> &[u8] {
    &self.authenticator
  }

  pub fn serialize(&self) -> Vec<u8> {
    let mut out = self.auth_input.serialize();
    out.extend_from_slice(&self.authenticator);
    out
  }

  pub fn deserialize(bytes: &[u8]) -> ProtocolResult<Self> {
    if bytes.len() < AuthenticatorInput::SERIALIZED_LEN {
      return Err(ProtocolError::InvalidLength { field: "authenticator_input" });
    }
    let auth_input = AuthenticatorInput::deserialize(&bytes[..AuthenticatorInput::SERIALIZED_LEN])?;
    let authenticator = bytes[AuthenticatorInput::SERIALIZED_LEN..].to_vec();
    Self::new(auth_input, authenticator)
  }

  /// Convert to base64url string
  pub fn to_base64url(&self) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(self.serialize())
  }

  /// Convert from base64url string
  pub fn try_from_base64url(input: &str) -> ProtocolResult<Self> {
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(input.as_bytes())?;
    Self::deserialize(&bytes)
  }
}

/* ------------------------------------------------------ */
/// Bounds-checked big-endian reader over a wire buffer
struct Reader<'a> {
  buf: &'a [u8],
  offset: usize,
}

impl<'a> Reader<'a> {
  fn new(buf: &'a [u8]) -> Self {
    Self { buf, offset: 0 }
  }

  fn read_bytes(&mut self, len: usize, field: &'static str) -> ProtocolResult<&'a [u8]> {
    let end = self
      .offset
      .checked_add(len)
      .filter(|end| *end <= self.buf.len())
      .ok_or(ProtocolError::InvalidLength { field })?;
    let out = &self.buf[self.offset..end];
    self.offset = end;
    Ok(out)
  }

  fn read_array<const N: usize>(&mut self, field: &'static str) -> ProtocolResult<[u8; N]> {
    let bytes = self.read_bytes(N, field)?;
    Ok(bytes.try_into().expect("length checked above"))
  }

  fn read_u8(&mut self, field: &'static str) -> ProtocolResult<u8> {
    Ok(self.read_bytes(1, field)?[0])
  }

  fn read_u16(&mut self, field: &'static str) -> ProtocolResult<u16> {
    let bytes = self.read_array::<2>(field)?;
    Ok(u16::from_be_bytes(bytes))
  }

  fn finish(self, field: &'static str) -> ProtocolResult<()> {
    if self.offset != self.buf.len() {
      return Err(ProtocolError::InvalidLength { field });
    }
    Ok(())
  }
}

/* ------------------------------------------------------ */
