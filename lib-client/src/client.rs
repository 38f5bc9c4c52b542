use crate::log::*;
use libcommon::{
  token_key_id, AuthenticatorInput, BlindOutput, ProtocolError, ProtocolResult, Token, TokenChallenge, TokenMechanism,
  TokenRequest, NONCE_BYTES,
};
use rand::{rngs::OsRng, RngCore};

/// Ephemeral state of one in-flight session, created by
/// [`TokenClient::create_token_request`] and consumed exactly once by
/// [`TokenClient::finalize`]. Dropping it abandons the session with nothing
/// to undo. A retried transport request must reuse this state; regenerating
/// it would mint a second nonce for the same logical attempt.
pub struct TokenSession<M>
where
  M: TokenMechanism,
{
  auth_input: AuthenticatorInput,
  secret: M::Secret,
}

impl<M> TokenSession<M>
where
  M: TokenMechanism,
{
  pub fn auth_input(&self) -> &AuthenticatorInput {
    &self.auth_input
  }
}

/// Client side of the issuance protocol, bound at construction to one
/// mechanism and one issuer public key. Sessions are independent; a client
/// can run any number of them concurrently.
pub struct TokenClient<M>
where
  M: TokenMechanism,
{
  mechanism: M,
  public_key: M::PublicKey,
  public_key_bytes: Vec<u8>,
}

impl<M> TokenClient<M>
where
  M: TokenMechanism,
{
  pub fn new(mechanism: M, public_key: M::PublicKey) -> ProtocolResult<Self> {
    let public_key_bytes = mechanism.public_key_bytes(&public_key)?;
    Ok(Self {
      mechanism,
      public_key,
      public_key_bytes,
    })
  }

  pub fn public_key(&self) -> &M::PublicKey {
    &self.public_key
  }

  /// Consume a challenge and produce the token request together with the
  /// session state needed to finalize the matching response. Fails without
  /// emitting a partial request if blinding fails.
  pub async fn create_token_request(&self, challenge: &TokenChallenge) -> ProtocolResult<(TokenRequest, TokenSession<M>)> {
    if challenge.token_type() != self.mechanism.token_type() {
      return Err(ProtocolError::TokenTypeMismatch);
    }

    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);

    let challenge_digest = challenge.digest();
    let key_id = token_key_id(&self.public_key_bytes);
    let auth_input = AuthenticatorInput::new(self.mechanism.token_type(), nonce, challenge_digest, key_id);
    let token_input = auth_input.serialize();

    let BlindOutput { blinded_msg, secret } = self.mechanism.blind(&self.public_key, &token_input).await?;
    let request = TokenRequest::new(self.mechanism.token_type(), auth_input.truncated_token_key_id(), blinded_msg)?;
    debug!("token request created: {}", self.mechanism.token_type().entry().name);

    Ok((request, TokenSession { auth_input, secret }))
  }

  /// Unblind the issuer response into a finalized token. The session is
  /// consumed whether or not finalization succeeds.
  pub async fn finalize(&self, session: TokenSession<M>, response: &M::Response) -> ProtocolResult<Token> {
    let authenticator = self.mechanism.finalize(session.secret, response).await?;
    let token = Token::new(session.auth_input, authenticator)?;
    debug!("token finalized: {}", token.token_type().entry().name);
    Ok(token)
  }
}

/* ------------------------------------------------------ */
#[cfg(test)]
mod tests {
  use super::*;
  use libcommon::{
    rsa_blind::{BlindRsaMechanism, BlindRsaMode},
    voprf_p384::VoprfMechanism,
    TokenType,
  };

  fn challenge(token_type: TokenType) -> TokenChallenge {
    TokenChallenge::new(token_type, "issuer.com", &[0u8; 32], &["origin.example.com"]).unwrap()
  }

  #[tokio::test]
  async fn request_carries_truncated_key_id() {
    let mechanism = VoprfMechanism;
    let (_, pk) = mechanism.key_gen().await.unwrap();
    let expected = pk.key_id()[31];

    let client = TokenClient::new(mechanism, pk).unwrap();
    let (request, session) = client.create_token_request(&challenge(TokenType::Voprf)).await.unwrap();

    assert_eq!(request.truncated_token_key_id(), expected);
    assert_eq!(session.auth_input().truncated_token_key_id(), expected);
  }

  #[tokio::test]
  async fn sessions_draw_distinct_nonces() {
    let mechanism = BlindRsaMechanism::new(BlindRsaMode::Pss);
    let (_, pk) = mechanism.key_gen().await.unwrap();
    let client = TokenClient::new(mechanism, pk).unwrap();

    let tok_chl = challenge(TokenType::BlindRsa);
    let (_, first) = client.create_token_request(&tok_chl).await.unwrap();
    let (_, second) = client.create_token_request(&tok_chl).await.unwrap();

    assert_ne!(first.auth_input().nonce(), second.auth_input().nonce());
    // both sessions are bound to the same challenge and key
    assert_eq!(first.auth_input().challenge_digest(), second.auth_input().challenge_digest());
    assert_eq!(first.auth_input().token_key_id(), second.auth_input().token_key_id());
  }

  #[tokio::test]
  async fn challenge_type_must_match_mechanism() {
    let mechanism = VoprfMechanism;
    let (_, pk) = mechanism.key_gen().await.unwrap();
    let client = TokenClient::new(mechanism, pk).unwrap();

    let err = client.create_token_request(&challenge(TokenType::BlindRsa)).await.unwrap_err();
    assert!(matches!(err, ProtocolError::TokenTypeMismatch));
  }
}
