//! Headless browser screenshots and viewport checks
//!
//! Screenshots are taken by running a local Chrome/Chromium binary in
//! headless mode once per viewport. Without a browser or a screenshot
//! directory the track reports `Not Measured`.

use crate::checks::{
    AuditContext, Category, CategoryScore, Checker, CheckerReport, Effort, Evidence, Finding,
    Severity,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Binary names searched on `PATH`, in order
const BROWSER_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

/// Extra time granted to the browser on top of the page timeout
const BROWSER_GRACE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Viewport {
    name: &'static str,
    width: u32,
    height: u32,
}

const VIEWPORTS: [Viewport; 2] = [
    Viewport {
        name: "desktop",
        width: 1350,
        height: 940,
    },
    Viewport {
        name: "mobile",
        width: 390,
        height: 844,
    },
];

/// Locates a headless-capable browser
///
/// `CHROME_PATH` wins when it points at an existing file; otherwise the
/// first known binary name found on `PATH` is returned.
pub fn find_browser() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CHROME_PATH").map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
        tracing::debug!("CHROME_PATH {} is not a file", path.display());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        BROWSER_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

fn browser_args(viewport: &Viewport, output: &Path, url: &str) -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--hide-scrollbars".to_string(),
        format!("--window-size={},{}", viewport.width, viewport.height),
        format!("--screenshot={}", output.display()),
        url.to_string(),
    ]
}

/// Screenshot path as recorded in the report, relative to the output directory
fn artifact_name(dir: &Path, file: &str) -> String {
    match dir.file_name() {
        Some(name) => format!("{}/{}", name.to_string_lossy(), file),
        None => file.to_string(),
    }
}

pub struct VisualChecker {
    screenshot_dir: Option<PathBuf>,
    browser: Option<PathBuf>,
}

impl VisualChecker {
    /// Creates the checker with the browser found on this machine
    pub fn new(screenshot_dir: Option<PathBuf>) -> Self {
        Self::with_browser(screenshot_dir, find_browser())
    }

    pub fn with_browser(screenshot_dir: Option<PathBuf>, browser: Option<PathBuf>) -> Self {
        Self {
            screenshot_dir,
            browser,
        }
    }

    async fn capture(
        &self,
        browser: &Path,
        dir: &Path,
        viewport: &Viewport,
        url: &str,
        timeout: Duration,
    ) -> Result<String, String> {
        let file = format!("{}.png", viewport.name);
        let output = dir.join(&file);

        let run = Command::new(browser)
            .args(browser_args(viewport, &output, url))
            .kill_on_drop(true)
            .output();
        let result = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| format!("{} screenshot timed out", viewport.name))?
            .map_err(|e| format!("failed to launch {}: {}", browser.display(), e))?;

        if !result.status.success() {
            return Err(format!(
                "{} screenshot exited with {}: {}",
                viewport.name,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            ));
        }
        if !output.is_file() {
            return Err(format!("{} screenshot was not written", viewport.name));
        }
        Ok(artifact_name(dir, &file))
    }
}

#[async_trait]
impl Checker for VisualChecker {
    fn name(&self) -> &'static str {
        "visual"
    }

    fn category(&self) -> Category {
        Category::Technical
    }

    fn contributes_score(&self) -> bool {
        false
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        let mut findings = Vec::new();
        let homepage = ctx.homepage();

        if let Some((page, signals)) =
            homepage.and_then(|page| page.signals.as_ref().map(|signals| (page, signals)))
        {
            if !signals.has_viewport {
                findings.push(
                    Finding::new(
                        Category::Technical,
                        Severity::High,
                        "Missing viewport meta tag",
                        "The homepage declares no viewport meta tag.",
                    )
                    .impact("Mobile browsers render the page at desktop width and scale it down.")
                    .recommendation(
                        "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">.",
                    )
                    .evidence([Evidence::new(page.url.clone(), "no meta[name=viewport]")])
                    .effort(Effort::Low),
                );
            }
        }

        let Some(browser) = &self.browser else {
            return CheckerReport::scored(
                self,
                CategoryScore::not_measured("no headless Chrome or Chromium found"),
                findings,
            );
        };
        let Some(dir) = &self.screenshot_dir else {
            return CheckerReport::scored(
                self,
                CategoryScore::not_measured("no screenshot directory configured"),
                findings,
            );
        };

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!("Cannot create screenshot directory {}: {}", dir.display(), e);
            return CheckerReport::scored(
                self,
                CategoryScore::not_measured(format!("cannot create {}: {}", dir.display(), e)),
                findings,
            );
        }

        let url = homepage
            .map(|page| page.final_url.clone())
            .unwrap_or_else(|| ctx.scope.start().to_string());
        let timeout = ctx.options.timeout + BROWSER_GRACE;

        let mut artifacts = Vec::new();
        let mut errors = Vec::new();
        for viewport in &VIEWPORTS {
            match self.capture(browser, dir, viewport, &url, timeout).await {
                Ok(artifact) => {
                    tracing::info!("Captured {} screenshot of {}", viewport.name, url);
                    artifacts.push(artifact);
                }
                Err(e) => {
                    tracing::warn!("Screenshot failed: {}", e);
                    errors.push(e);
                }
            }
        }

        let mut report = if artifacts.is_empty() {
            CheckerReport::scored(self, CategoryScore::not_measured(errors.join("; ")), findings)
        } else {
            CheckerReport::findings_only(self, findings)
        };
        report.artifacts = artifacts;
        report
    }
}
