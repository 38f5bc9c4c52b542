pub(crate) use tracing::debug;
