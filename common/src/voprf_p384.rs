use crate::{
  constants::TOKEN_KEY_ID_BYTES,
  error::{ProtocolError, ProtocolResult},
  mechanism::{BlindOutput, TokenMechanism},
  token_type::TokenType,
};
use async_trait::async_trait;
use p384::NistP384;
use sha2::{Digest, Sha256};
use voprf::{BlindedElement, EvaluationElement, Group, Proof, VoprfClient, VoprfServer};

/// Serialized group element size (compressed SEC1 point)
pub const NE: usize = 49;
/// Serialized scalar size
pub const NS: usize = 48;
/// PRF output size (SHA-384)
pub const NK: usize = 48;

type Element = <NistP384 as Group>::Elem;

/* ------------------------------------------------------ */
/// Issuer-side VOPRF key: an evaluation server bound to a P-384 scalar.
/// Only the holder of this key can verify privately verifiable tokens.
pub struct VoprfPrivateKey {
  server: VoprfServer<NistP384>,
}

impl VoprfPrivateKey {
  /// Generate a fresh issuance key
  pub fn new() -> ProtocolResult<Self> {
    let mut rng = rand::thread_rng();
    let server = VoprfServer::<NistP384>::new(&mut rng)?;
    Ok(Self { server })
  }

  /// Restore a key from its serialized scalar
  pub fn from_bytes(bytes: &[u8]) -> ProtocolResult<Self> {
    let server = VoprfServer::<NistP384>::new_with_key(bytes)?;
    Ok(Self { server })
  }

  /// Serialized private scalar, for key storage and rotation
  pub fn to_bytes(&self) -> Vec<u8> {
    NistP384::serialize_scalar(self.server.get_private_key()).to_vec()
  }

  /// Expose public key
  pub fn to_public_key(&self) -> VoprfPublicKey {
    VoprfPublicKey {
      element: self.server.get_public_key(),
    }
  }
}

/// Client-side VOPRF key: the issuer public group element
#[derive(Debug, Clone, Copy)]
pub struct VoprfPublicKey {
  element: Element,
}

impl VoprfPublicKey {
  /// Derive key from its compressed SEC1 encoding
  pub fn from_bytes(bytes: &[u8]) -> ProtocolResult<Self> {
    let element = NistP384::deserialize_elem(bytes)?;
    Ok(Self { element })
  }

  /// Compressed SEC1 encoding; these are the bytes the token key id is
  /// derived from
  pub fn to_bytes(&self) -> Vec<u8> {
    NistP384::serialize_elem(self.element).to_vec()
  }

  /// Create key id
  pub fn key_id(&self) -> [u8; TOKEN_KEY_ID_BYTES] {
    Sha256::digest(self.to_bytes()).into()
  }
}

/* ------------------------------------------------------ */
/// Evaluation response: the evaluated element and the DLEQ proof that it was
/// computed under the issuer key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoprfTokenResponse {
  evaluate_msg: [u8; NE],
  evaluate_proof: [u8; 2 * NS],
}

impl VoprfTokenResponse {
  pub fn new(evaluate_msg: &[u8], evaluate_proof: &[u8]) -> ProtocolResult<Self> {
    let evaluate_msg = evaluate_msg
      .try_into()
      .map_err(|_| ProtocolError::InvalidLength { field: "evaluate_msg" })?;
    let evaluate_proof = evaluate_proof
      .try_into()
      .map_err(|_| ProtocolError::InvalidLength { field: "evaluate_proof" })?;
    Ok(Self {
      evaluate_msg,
      evaluate_proof,
    })
  }

  pub fn evaluate_msg(&self) -> &[u8] {
    &self.evaluate_msg
  }

  pub fn evaluate_proof(&self) -> &[u8] {
    &self.evaluate_proof
  }

  pub fn serialize(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(NE + 2 * NS);
    out.extend_from_slice(&self.evaluate_msg);
    out.extend_from_slice(&self.evaluate_proof);
    out
  }

  pub fn deserialize(bytes: &[u8]) -> ProtocolResult<Self> {
    if bytes.len() != NE + 2 * NS {
      return Err(ProtocolError::InvalidLength { field: "token_response" });
    }
    Self::new(&bytes[..NE], &bytes[NE..])
  }
}

/* ------------------------------------------------------ */
/// Client-private state between blind and finalize
pub struct VoprfSecret {
  state: VoprfClient<NistP384>,
  token_input: Vec<u8>,
  public_key: Element,
}

/// Privately verifiable token mechanism (token type 0x0001)
#[derive(Debug, Clone, Copy, Default)]
pub struct VoprfMechanism;

#[async_trait]
impl TokenMechanism for VoprfMechanism {
  type PrivateKey = VoprfPrivateKey;
  type PublicKey = VoprfPublicKey;
  type Secret = VoprfSecret;
  type Response = VoprfTokenResponse;

  fn token_type(&self) -> TokenType {
    TokenType::Voprf
  }

  async fn key_gen(&self) -> ProtocolResult<(VoprfPrivateKey, VoprfPublicKey)> {
    let private_key = VoprfPrivateKey::new()?;
    let public_key = private_key.to_public_key();
    Ok((private_key, public_key))
  }

  fn public_key_bytes(&self, public_key: &VoprfPublicKey) -> ProtocolResult<Vec<u8>> {
    Ok(public_key.to_bytes())
  }

  async fn blind(&self, public_key: &VoprfPublicKey, token_input: &[u8]) -> ProtocolResult<BlindOutput<VoprfSecret>> {
    let mut rng = rand::thread_rng();
    let result = VoprfClient::<NistP384>::blind(token_input, &mut rng)?;
    Ok(BlindOutput {
      blinded_msg: result.message.serialize().to_vec(),
      secret: VoprfSecret {
        state: result.state,
        token_input: token_input.to_vec(),
        public_key: public_key.element,
      },
    })
  }

  async fn evaluate(&self, private_key: &VoprfPrivateKey, blinded_msg: &[u8]) -> ProtocolResult<VoprfTokenResponse> {
    let blinded_element = BlindedElement::<NistP384>::deserialize(blinded_msg)?;
    let mut rng = rand::thread_rng();
    let result = private_key.server.blind_evaluate(&mut rng, &blinded_element);
    VoprfTokenResponse::new(result.message.serialize().as_slice(), result.proof.serialize().as_slice())
  }

  async fn finalize(&self, secret: VoprfSecret, response: &VoprfTokenResponse) -> ProtocolResult<Vec<u8>> {
    let evaluation_element = EvaluationElement::<NistP384>::deserialize(response.evaluate_msg())?;
    let proof = Proof::<NistP384>::deserialize(response.evaluate_proof())?;
    let output = secret
      .state
      .finalize(&secret.token_input, &evaluation_element, &proof, secret.public_key)?;
    Ok(output.to_vec())
  }

  async fn verify(
    &self,
    private_key: &VoprfPrivateKey,
    _public_key: &VoprfPublicKey,
    token_input: &[u8],
    authenticator: &[u8],
  ) -> ProtocolResult<bool> {
    let expected = private_key.server.evaluate(token_input)?;
    Ok(expected.as_slice() == authenticator)
  }
}

/* ------------------------------------------------------ */
#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn blind_evaluate_finalize_verify() {
    let mechanism = VoprfMechanism;
    let (sk, pk) = mechanism.key_gen().await.unwrap();

    // [Client] Blind the token input, send the blinded message to the issuer
    let token_input = b"voprf token input".to_vec();
    let blind_output = mechanism.blind(&pk, &token_input).await.unwrap();
    assert_eq!(blind_output.blinded_msg.len(), NE);

    // [Issuer] Evaluate the blinded message and attach a DLEQ proof
    let response = mechanism.evaluate(&sk, &blind_output.blinded_msg).await.unwrap();

    // [Client] Unblind and check the proof
    let authenticator = mechanism.finalize(blind_output.secret, &response).await.unwrap();
    assert_eq!(authenticator.len(), NK);

    // [Issuer] Recompute and compare
    assert!(mechanism.verify(&sk, &pk, &token_input, &authenticator).await.unwrap());
    assert!(!mechanism.verify(&sk, &pk, b"other input", &authenticator).await.unwrap());
  }

  #[tokio::test]
  async fn tampered_proof_fails_finalize() {
    let mechanism = VoprfMechanism;
    let (sk, pk) = mechanism.key_gen().await.unwrap();

    let blind_output = mechanism.blind(&pk, b"token input").await.unwrap();
    let response = mechanism.evaluate(&sk, &blind_output.blinded_msg).await.unwrap();

    let mut proof = response.evaluate_proof().to_vec();
    proof[0] ^= 0x01;
    let tampered = VoprfTokenResponse::new(response.evaluate_msg(), &proof).unwrap();

    let err = mechanism.finalize(blind_output.secret, &tampered).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ProofVerification | ProtocolError::Voprf(_)));
  }

  #[tokio::test]
  async fn evaluation_under_wrong_key_fails_finalize() {
    let mechanism = VoprfMechanism;
    let (_, pk) = mechanism.key_gen().await.unwrap();
    let (other_sk, _) = mechanism.key_gen().await.unwrap();

    let blind_output = mechanism.blind(&pk, b"token input").await.unwrap();
    let response = mechanism.evaluate(&other_sk, &blind_output.blinded_msg).await.unwrap();

    // proof is valid for the wrong key, so it cannot verify against `pk`
    assert!(mechanism.finalize(blind_output.secret, &response).await.is_err());
  }

  #[test]
  fn key_bytes_roundtrip() {
    let sk = VoprfPrivateKey::new().unwrap();
    let pk = sk.to_public_key();
    let restored = VoprfPublicKey::from_bytes(&pk.to_bytes()).unwrap();
    assert_eq!(restored.to_bytes(), pk.to_bytes());
    assert_eq!(restored.key_id(), pk.key_id());

    let restored_sk = VoprfPrivateKey::from_bytes(&sk.to_bytes()).unwrap();
    assert_eq!(restored_sk.to_public_key().to_bytes(), pk.to_bytes());
  }

  #[test]
  fn response_codec() {
    let response = VoprfTokenResponse::new(&[1u8; NE], &[2u8; 2 * NS]).unwrap();
    let parsed = VoprfTokenResponse::deserialize(&response.serialize()).unwrap();
    assert_eq!(parsed, response);
  }

  #[test]
  fn response_rejects_short_proof() {
    let err = VoprfTokenResponse::new(&[1u8; NE], &[2u8; 2 * NS - 1]).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidLength { field: "evaluate_proof" }));

    let err = VoprfTokenResponse::deserialize(&[0u8; NE + 2 * NS - 1]).unwrap_err();
    assert!(err.is_malformed_input());
  }
}
