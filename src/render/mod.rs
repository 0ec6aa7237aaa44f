pub mod webdriver;

#[cfg(test)]
pub mod fake;

use std::time::Duration;

use crate::error::RenderError;

/// A stateful browser tab that can load a page and report when it is ready.
///
/// One session serves a whole run; it is not shared between tasks.
#[allow(async_fn_in_trait)]
pub trait RenderSession {
    /// Load `url` in the current tab.
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Wait for the age/entry gate control and click it.
    async fn unlock(&mut self, timeout: Duration) -> Result<(), RenderError>;

    /// Poll until the artifact link is present, or time out.
    async fn wait_for_marker(&mut self, timeout: Duration) -> Result<(), RenderError>;

    /// Current rendered markup.
    async fn page_source(&mut self) -> Result<String, RenderError>;
}
