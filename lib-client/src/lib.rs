mod client;
mod log;

pub use client::{TokenClient, TokenSession};
pub mod token {
  pub use libcommon::*;
}
