use thiserror::Error;

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Describes things that can go wrong in the issuance protocol.
/// An invalid token is not an error: `verify` returns `Ok(false)` for it.
#[derive(Debug, Error)]
pub enum ProtocolError {
  // malformed wire input, raised at construction and at parse time
  #[error("unknown token type {0:#06x}")]
  UnknownTokenType(u16),
  #[error("mismatch of token type")]
  TokenTypeMismatch,
  #[error("{field} has an invalid length")]
  InvalidLength { field: &'static str },
  #[error("{0} is not valid utf-8")]
  InvalidUtf8(&'static str),
  #[error("origin name contains the origin info separator")]
  InvalidOriginName,
  #[error("invalid base64url encoding: {0}")]
  InvalidBase64(#[from] base64::DecodeError),

  // mechanism failures, fatal to the session they occur in
  #[error("blind rsa operation failed: {0}")]
  BlindRsa(#[from] blind_rsa_signatures::Error),
  #[error("voprf operation failed: {0:?}")]
  Voprf(voprf::Error),

  /// The DLEQ proof attached to an evaluation did not verify; no token is produced
  #[error("evaluation proof verification failed")]
  ProofVerification,
}

impl ProtocolError {
  /// True for structural wire errors (wrong type tag or field length)
  pub fn is_malformed_input(&self) -> bool {
    matches!(
      self,
      ProtocolError::UnknownTokenType(_)
        | ProtocolError::TokenTypeMismatch
        | ProtocolError::InvalidLength { .. }
        | ProtocolError::InvalidUtf8(_)
        | ProtocolError::InvalidOriginName
        | ProtocolError::InvalidBase64(_)
    )
  }
}

impl From<voprf::Error> for ProtocolError {
  fn from(e: voprf::Error) -> Self {
    match e {
      voprf::Error::ProofVerification => ProtocolError::ProofVerification,
      e => ProtocolError::Voprf(e),
    }
  }
}
