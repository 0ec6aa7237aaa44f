use std::collections::HashMap;
use std::time::Duration;

use super::RenderSession;
use crate::error::RenderError;
use crate::parser::extract::links::ARTIFACT_MARKER;

/// Scripted session: serves canned markup per URL and counts calls.
#[derive(Default)]
pub struct FakeSession {
    pages: HashMap<String, String>,
    /// Gate clicks that fail before one succeeds.
    pub failing_unlocks: u32,
    pub navigations: Vec<String>,
    pub unlock_calls: u32,
    pub marker_waits: u32,
    current: Option<String>,
}

impl FakeSession {
    pub fn with_page(mut self, url: &str, markup: &str) -> Self {
        self.pages.insert(url.to_string(), markup.to_string());
        self
    }
}

impl RenderSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.navigations.push(url.to_string());
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn unlock(&mut self, timeout: Duration) -> Result<(), RenderError> {
        self.unlock_calls += 1;
        if self.failing_unlocks > 0 {
            self.failing_unlocks -= 1;
            return Err(RenderError::Timeout(timeout, "gate control"));
        }
        Ok(())
    }

    async fn wait_for_marker(&mut self, timeout: Duration) -> Result<(), RenderError> {
        self.marker_waits += 1;
        let ready = self
            .current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .is_some_and(|markup| markup.contains(ARTIFACT_MARKER));
        if ready {
            Ok(())
        } else {
            Err(RenderError::Timeout(timeout, "artifact link"))
        }
    }

    async fn page_source(&mut self) -> Result<String, RenderError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .cloned()
            .ok_or_else(|| RenderError::Protocol("no page loaded".into()))
    }
}
