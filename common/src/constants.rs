/// Client nonce length in bytes
pub const NONCE_BYTES: usize = 32;

/// Challenge digest length in bytes
pub const CHALLENGE_DIGEST_BYTES: usize = 32;

/// Token key id digest length in bytes
pub const TOKEN_KEY_ID_BYTES: usize = 32;

/// Redemption context length in bytes when present (an empty context is also allowed)
pub const REDEMPTION_CONTEXT_BYTES: usize = 32;

/// Separator joining origin names in a serialized challenge
pub const ORIGIN_INFO_SEPARATOR: &str = ",";
