use crate::{error::ProtocolResult, token_type::TokenType};
use async_trait::async_trait;

/// Result of blinding a token input: the wire-ready blinded message and the
/// client-private secret needed to finalize the issuer response.
pub struct BlindOutput<S> {
  pub blinded_msg: Vec<u8>,
  /// This must never be exposed to the issuer
  pub secret: S,
}

/// Cryptographic capability set of one token type. Client and issuer are
/// handed exactly one implementation at construction time; there is no
/// mechanism negotiation mid-session. Tests may inject a substitute
/// implementation the same way.
#[async_trait]
pub trait TokenMechanism: Send + Sync {
  type PrivateKey: Send + Sync;
  type PublicKey: Send + Sync;
  /// Per-session blinding/finalization state, consumed once by `finalize`
  type Secret: Send;
  /// Mechanism-specific TokenResponse wire struct
  type Response: Send + Sync;

  fn token_type(&self) -> TokenType;

  /// Generate a fresh issuer key pair
  async fn key_gen(&self) -> ProtocolResult<(Self::PrivateKey, Self::PublicKey)>;

  /// The public key encoding the token key id is derived from
  fn public_key_bytes(&self, public_key: &Self::PublicKey) -> ProtocolResult<Vec<u8>>;

  /// Blind a serialized token input under the issuer public key
  async fn blind(&self, public_key: &Self::PublicKey, token_input: &[u8]) -> ProtocolResult<BlindOutput<Self::Secret>>;

  /// Issuer side: evaluate (VOPRF) or sign (blind RSA) a blinded message
  async fn evaluate(&self, private_key: &Self::PrivateKey, blinded_msg: &[u8]) -> ProtocolResult<Self::Response>;

  /// Unblind the issuer response into the token authenticator. For VOPRF
  /// this also checks the attached DLEQ proof and fails without producing
  /// an authenticator if the proof does not hold.
  async fn finalize(&self, secret: Self::Secret, response: &Self::Response) -> ProtocolResult<Vec<u8>>;

  /// Check an authenticator over a token input. VOPRF needs the issuer
  /// private key, blind RSA only the public key; implementations use
  /// whichever side applies. `Ok(false)` means the token is invalid, not
  /// that the operation failed.
  async fn verify(
    &self,
    private_key: &Self::PrivateKey,
    public_key: &Self::PublicKey,
    token_input: &[u8],
    authenticator: &[u8],
  ) -> ProtocolResult<bool>;
}
