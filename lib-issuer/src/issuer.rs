use crate::log::*;
use libcommon::{ProtocolError, ProtocolResult, Token, TokenMechanism, TokenRequest};

/// Issuer side of the issuance protocol: holds the key pair for one
/// mechanism and answers token requests. Requests leave no per-request state
/// behind; replay tracking of redeemed tokens belongs to a redemption store
/// in front of the issuer, not here.
pub struct TokenIssuer<M>
where
  M: TokenMechanism,
{
  name: String,
  mechanism: M,
  private_key: M::PrivateKey,
  public_key: M::PublicKey,
}

impl<M> TokenIssuer<M>
where
  M: TokenMechanism,
{
  pub fn new(name: &str, mechanism: M, private_key: M::PrivateKey, public_key: M::PublicKey) -> Self {
    Self {
      name: name.to_string(),
      mechanism,
      private_key,
      public_key,
    }
  }

  /// Generate a fresh key pair for the mechanism and build an issuer on it
  pub async fn with_fresh_keys(name: &str, mechanism: M) -> ProtocolResult<Self> {
    let (private_key, public_key) = mechanism.key_gen().await?;
    info!("issuer key pair generated: {}", mechanism.token_type().entry().name);
    Ok(Self::new(name, mechanism, private_key, public_key))
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn mechanism(&self) -> &M {
    &self.mechanism
  }

  pub fn public_key(&self) -> &M::PublicKey {
    &self.public_key
  }

  /// Evaluate or sign a blinded token request into the mechanism response
  pub async fn issue(&self, request: &TokenRequest) -> ProtocolResult<M::Response> {
    if request.token_type() != self.mechanism.token_type() {
      return Err(ProtocolError::TokenTypeMismatch);
    }
    let response = self.mechanism.evaluate(&self.private_key, request.blinded_msg()).await?;
    debug!("token request evaluated by issuer {}", self.name);
    Ok(response)
  }

  /// Check a finalized token against this issuer's key material. For the
  /// privately verifiable mechanism this is the only place verification can
  /// happen; the publicly verifiable one can also be checked with
  /// `rsa_blind::verify_token` and the public key alone.
  pub async fn verify(&self, token: &Token) -> ProtocolResult<bool> {
    if token.token_type() != self.mechanism.token_type() {
      return Err(ProtocolError::TokenTypeMismatch);
    }
    let token_input = token.auth_input().serialize();
    let valid = self
      .mechanism
      .verify(&self.private_key, &self.public_key, &token_input, token.authenticator())
      .await?;
    debug!("token verification by issuer {}: {}", self.name, valid);
    Ok(valid)
  }
}
