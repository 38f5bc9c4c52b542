mod constants;
mod error;
mod mechanism;
mod token;
mod token_type;

pub mod rsa_blind;
pub mod voprf_p384;

pub use constants::*;
pub use error::{ProtocolError, ProtocolResult};
pub use mechanism::{BlindOutput, TokenMechanism};
pub use token::{token_key_id, AuthenticatorInput, Token, TokenChallenge, TokenRequest};
pub use token_type::{TokenType, TokenTypeEntry, BLIND_RSA, VOPRF};
