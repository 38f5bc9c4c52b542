mod issuer;
mod log;

pub use issuer::TokenIssuer;
pub mod token {
  pub use libcommon::*;
}
