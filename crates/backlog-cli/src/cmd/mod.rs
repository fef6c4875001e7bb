pub mod config;
pub mod init;
pub mod project;

use std::future::Future;

/// Drive one async store call to completion from a sync command.
pub(crate) fn block_on<F: Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(fut))
}
