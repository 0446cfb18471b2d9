//! GitHub Actions workflow commands
//!
//! Log groups fold build output in the Actions log view; step outputs are
//! appended to the file named by `GITHUB_OUTPUT`.

use super::context::UiContext;
use crate::error::{ProvisionError, ProvisionResult};
use console::style;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// A folded log group, closed when dropped
pub struct LogGroup {
    github: bool,
}

impl LogGroup {
    /// Open a group titled `title`
    pub fn start(ctx: &UiContext, title: &str) -> Self {
        if ctx.is_github_actions() {
            println!("::group::{}", title);
        } else {
            println!("{}", style(title).bold());
        }
        Self {
            github: ctx.is_github_actions(),
        }
    }
}

impl Drop for LogGroup {
    fn drop(&mut self) {
        if self.github {
            println!("::endgroup::");
        }
    }
}

/// Publish a step output
///
/// Written to `GITHUB_OUTPUT` when running under Actions, printed as
/// `name=value` otherwise.
pub async fn set_output(name: &str, value: &str) -> ProvisionResult<()> {
    match std::env::var_os("GITHUB_OUTPUT") {
        Some(path) => append_output(Path::new(&path), name, value).await,
        None => {
            println!("{}={}", name, value);
            Ok(())
        }
    }
}

async fn append_output(path: &Path, name: &str, value: &str) -> ProvisionResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| ProvisionError::io(format!("opening {}", path.display()), e))?;

    file.write_all(format!("{}={}\n", name, value).as_bytes())
        .await
        .map_err(|e| ProvisionError::io(format!("writing {}", path.display()), e))?;
    file.flush()
        .await
        .map_err(|e| ProvisionError::io(format!("writing {}", path.display()), e))
}
