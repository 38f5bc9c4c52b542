pub(crate) use tracing::{debug, info};
