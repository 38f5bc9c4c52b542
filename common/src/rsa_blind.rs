use crate::{
  constants::TOKEN_KEY_ID_BYTES,
  error::{ProtocolError, ProtocolResult},
  mechanism::{BlindOutput, TokenMechanism},
  token::Token,
  token_type::TokenType,
};
use async_trait::async_trait;
use blind_rsa_signatures::{BlindSignature, BlindedMessage, Hash, KeyPair, Options, Signature};
use sha2::{Digest, Sha256};

/// Signature and modulus size; the wire format fixes 2048-bit issuer keys
pub const NK: usize = 256;

const DEFAULT_RSA_BIT_SIZE: usize = 2048;
const PSS_SALT_BYTES: usize = 48;

/// RSASSA-PSS salt modes of the blind signature suite (SHA-384). The mode is
/// chosen once per deployment; a token issued under one mode does not verify
/// under the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlindRsaMode {
  /// 48-byte salt
  Pss,
  /// Zero-length salt
  #[default]
  PssZero,
}

impl From<BlindRsaMode> for Options {
  fn from(mode: BlindRsaMode) -> Self {
    match mode {
      BlindRsaMode::Pss => Options::new(Hash::Sha384, false, PSS_SALT_BYTES),
      BlindRsaMode::PssZero => Options::new(Hash::Sha384, true, 0),
    }
  }
}

/* ------------------------------------------------------ */
/// RSA private key wrapper for blind RSA signatures
pub struct RsaPrivateKey {
  inner: blind_rsa_signatures::SecretKey,
}

impl RsaPrivateKey {
  /// Build a fresh private key. Issuers should rotate these periodically
  /// rather than pinning a long-lived key, since the key id is visible in
  /// every token.
  pub fn new(bits: Option<usize>) -> ProtocolResult<Self> {
    let rng = &mut rand::thread_rng();
    let key_pair = KeyPair::generate(rng, bits.unwrap_or(DEFAULT_RSA_BIT_SIZE))?;
    Ok(Self { inner: key_pair.sk })
  }

  /// Derive key from pem string to use a static private key
  pub fn from_pem(pem: &str) -> ProtocolResult<Self> {
    let key = blind_rsa_signatures::SecretKey::from_pem(pem)?;
    Ok(Self { inner: key })
  }

  /// Export as pem string
  pub fn to_pem(&self) -> ProtocolResult<String> {
    Ok(self.inner.to_pem()?)
  }

  /// Expose public key
  pub fn to_public_key(&self) -> RsaPublicKey {
    RsaPublicKey {
      inner: blind_rsa_signatures::PublicKey(self.inner.0.to_public_key()),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// RSA public key wrapper for blind RSA signatures
pub struct RsaPublicKey {
  inner: blind_rsa_signatures::PublicKey,
}

impl RsaPublicKey {
  /// Derive key from pem string
  pub fn from_pem(pem: &str) -> ProtocolResult<Self> {
    let key = blind_rsa_signatures::PublicKey::from_pem(pem)?;
    Ok(Self { inner: key })
  }

  /// Derive key from a SubjectPublicKeyInfo encoding. Both the RSASSA-PSS
  /// and the plain rsaEncryption algorithm tags are accepted, so keys
  /// exported by other stacks import unchanged.
  pub fn from_spki(spki: &[u8]) -> ProtocolResult<Self> {
    let key = blind_rsa_signatures::PublicKey::from_spki(spki, Some(&Options::default()))?;
    Ok(Self { inner: key })
  }

  /// SubjectPublicKeyInfo encoding with the RSASSA-PSS algorithm tag; these
  /// are the bytes the token key id is derived from
  pub fn to_spki(&self) -> ProtocolResult<Vec<u8>> {
    Ok(self.inner.to_spki(Some(&Options::default()))?)
  }

  /// Create key id
  pub fn key_id(&self) -> ProtocolResult<[u8; TOKEN_KEY_ID_BYTES]> {
    let bytes = self.to_spki()?;
    Ok(Sha256::digest(&bytes).into())
  }
}

/* ------------------------------------------------------ */
/// Blind signature response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindRsaTokenResponse {
  blind_sig: [u8; NK],
}

impl BlindRsaTokenResponse {
  pub fn new(blind_sig: &[u8]) -> ProtocolResult<Self> {
    let blind_sig = blind_sig
      .try_into()
      .map_err(|_| ProtocolError::InvalidLength { field: "blind_sig" })?;
    Ok(Self { blind_sig })
  }

  pub fn blind_sig(&self) -> &[u8] {
    &self.blind_sig
  }

  pub fn serialize(&self) -> Vec<u8> {
    self.blind_sig.to_vec()
  }

  pub fn deserialize(bytes: &[u8]) -> ProtocolResult<Self> {
    Self::new(bytes)
  }
}

/* ------------------------------------------------------ */
/// Client-private state between blind and finalize: the blinding secret, the
/// unblinded token input and the imported issuer key handle
pub struct BlindRsaSecret {
  secret: blind_rsa_signatures::Secret,
  token_input: Vec<u8>,
  public_key: RsaPublicKey,
}

/// Publicly verifiable token mechanism (token type 0x0002)
#[derive(Debug, Clone, Copy, Default)]
pub struct BlindRsaMechanism {
  mode: BlindRsaMode,
}

impl BlindRsaMechanism {
  pub fn new(mode: BlindRsaMode) -> Self {
    Self { mode }
  }

  pub fn mode(&self) -> BlindRsaMode {
    self.mode
  }
}

#[async_trait]
impl TokenMechanism for BlindRsaMechanism {
  type PrivateKey = RsaPrivateKey;
  type PublicKey = RsaPublicKey;
  type Secret = BlindRsaSecret;
  type Response = BlindRsaTokenResponse;

  fn token_type(&self) -> TokenType {
    TokenType::BlindRsa
  }

  async fn key_gen(&self) -> ProtocolResult<(RsaPrivateKey, RsaPublicKey)> {
    let private_key = RsaPrivateKey::new(None)?;
    let public_key = private_key.to_public_key();
    Ok((private_key, public_key))
  }

  fn public_key_bytes(&self, public_key: &RsaPublicKey) -> ProtocolResult<Vec<u8>> {
    public_key.to_spki()
  }

  async fn blind(&self, public_key: &RsaPublicKey, token_input: &[u8]) -> ProtocolResult<BlindOutput<BlindRsaSecret>> {
    let rng = &mut rand::thread_rng();
    // the token input is already bound to a fresh nonce, no message randomizer
    let result = public_key.inner.blind(rng, token_input, false, &self.mode.into())?;
    Ok(BlindOutput {
      blinded_msg: result.blind_msg.0,
      secret: BlindRsaSecret {
        secret: result.secret,
        token_input: token_input.to_vec(),
        public_key: public_key.clone(),
      },
    })
  }

  async fn evaluate(&self, private_key: &RsaPrivateKey, blinded_msg: &[u8]) -> ProtocolResult<BlindRsaTokenResponse> {
    let rng = &mut rand::thread_rng();
    let blind_msg = BlindedMessage(blinded_msg.to_vec());
    let blind_sig = private_key.inner.blind_sign(rng, &blind_msg, &self.mode.into())?;
    BlindRsaTokenResponse::new(&blind_sig.0)
  }

  async fn finalize(&self, secret: BlindRsaSecret, response: &BlindRsaTokenResponse) -> ProtocolResult<Vec<u8>> {
    let blind_sig = BlindSignature(response.blind_sig().to_vec());
    let signature = secret
      .public_key
      .inner
      .finalize(&blind_sig, &secret.secret, None, &secret.token_input, &self.mode.into())?;
    Ok(signature.0)
  }

  async fn verify(
    &self,
    _private_key: &RsaPrivateKey,
    public_key: &RsaPublicKey,
    token_input: &[u8],
    authenticator: &[u8],
  ) -> ProtocolResult<bool> {
    verify_authenticator(public_key, token_input, authenticator, self.mode)
  }
}

/* ------------------------------------------------------ */
/// Verify a publicly verifiable token against the issuer public key. This is
/// a pure function of public material; any party holding the key can run it.
pub fn verify_token(token: &Token, public_key: &RsaPublicKey, mode: BlindRsaMode) -> ProtocolResult<bool> {
  if token.token_type() != TokenType::BlindRsa {
    return Err(ProtocolError::TokenTypeMismatch);
  }
  verify_authenticator(public_key, &token.auth_input().serialize(), token.authenticator(), mode)
}

fn verify_authenticator(
  public_key: &RsaPublicKey,
  token_input: &[u8],
  authenticator: &[u8],
  mode: BlindRsaMode,
) -> ProtocolResult<bool> {
  let signature = Signature(authenticator.to_vec());
  match signature.verify(&public_key.inner, None, token_input, &mode.into()) {
    Ok(()) => Ok(true),
    Err(blind_rsa_signatures::Error::VerificationFailed) => Ok(false),
    Err(e) => Err(e.into()),
  }
}

/* ------------------------------------------------------ */
#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn blind_sign_finalize_verify() {
    let mechanism = BlindRsaMechanism::new(BlindRsaMode::Pss);
    let (sk, pk) = mechanism.key_gen().await.unwrap();

    // [Client] Blind the token input, send the blinded message to the signer
    let token_input = b"blind rsa token input".to_vec();
    let blind_output = mechanism.blind(&pk, &token_input).await.unwrap();
    assert_eq!(blind_output.blinded_msg.len(), NK);

    // [Signer] Sign the blinded message
    let response = mechanism.evaluate(&sk, &blind_output.blinded_msg).await.unwrap();

    // [Client] Unblind the signature
    let authenticator = mechanism.finalize(blind_output.secret, &response).await.unwrap();
    assert_eq!(authenticator.len(), NK);

    // [Verifier] Check against the public key alone
    assert!(mechanism.verify(&sk, &pk, &token_input, &authenticator).await.unwrap());
    assert!(!mechanism.verify(&sk, &pk, b"other input", &authenticator).await.unwrap());
  }

  #[tokio::test]
  async fn salt_mode_mismatch_is_rejected() {
    let pss = BlindRsaMechanism::new(BlindRsaMode::Pss);
    let pss_zero = BlindRsaMechanism::new(BlindRsaMode::PssZero);
    let (sk, pk) = pss_zero.key_gen().await.unwrap();

    let token_input = b"token input".to_vec();
    let blind_output = pss_zero.blind(&pk, &token_input).await.unwrap();
    let response = pss_zero.evaluate(&sk, &blind_output.blinded_msg).await.unwrap();
    let authenticator = pss_zero.finalize(blind_output.secret, &response).await.unwrap();

    assert!(pss_zero.verify(&sk, &pk, &token_input, &authenticator).await.unwrap());
    assert!(!pss.verify(&sk, &pk, &token_input, &authenticator).await.unwrap());
  }

  #[tokio::test]
  async fn pem_and_spki_roundtrip() {
    let sk = RsaPrivateKey::new(Some(2048)).unwrap();
    let pk = sk.to_public_key();

    let sk2 = RsaPrivateKey::from_pem(&sk.to_pem().unwrap()).unwrap();
    assert_eq!(sk2.to_public_key(), pk);

    let pk2 = RsaPublicKey::from_spki(&pk.to_spki().unwrap()).unwrap();
    assert_eq!(pk2, pk);
    assert_eq!(pk2.key_id().unwrap(), pk.key_id().unwrap());
  }

  #[test]
  fn response_codec() {
    let response = BlindRsaTokenResponse::new(&[7u8; NK]).unwrap();
    let parsed = BlindRsaTokenResponse::deserialize(&response.serialize()).unwrap();
    assert_eq!(parsed, response);

    let err = BlindRsaTokenResponse::new(&[7u8; NK - 1]).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidLength { field: "blind_sig" }));
  }
}
