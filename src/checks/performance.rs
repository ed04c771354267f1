//! Core Web Vitals through the PageSpeed Insights API

use crate::checks::{
    round1, AuditContext, Category, CategoryScore, Checker, CheckerReport, Effort, Evidence,
    Finding, Severity,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const PAGESPEED_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Lower bound on the API timeout; PageSpeed runs Lighthouse server-side
const MIN_API_TIMEOUT: Duration = Duration::from_secs(30);

const LAB_WEIGHT: f64 = 0.6;
const FIELD_WEIGHT: f64 = 0.4;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageSpeedResponse {
    lighthouse_result: Option<LighthouseResult>,
    loading_experience: Option<LoadingExperience>,
    origin_loading_experience: Option<LoadingExperience>,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    #[serde(default)]
    categories: HashMap<String, LighthouseCategory>,
}

#[derive(Debug, Deserialize)]
struct LighthouseCategory {
    score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoadingExperience {
    #[serde(default)]
    metrics: HashMap<String, FieldMetric>,
}

#[derive(Debug, Deserialize)]
struct FieldMetric {
    percentile: Option<f64>,
}

impl PageSpeedResponse {
    /// Lighthouse performance score on a 0-100 scale
    fn lab_score(&self) -> Option<f64> {
        self.lighthouse_result
            .as_ref()?
            .categories
            .get("performance")?
            .score
            .map(|score| round1(score * 100.0))
    }

    /// 75th percentile of the first metric key present, page data before origin data
    fn field_metric(&self, keys: &[&str]) -> Option<f64> {
        let lookup = |experience: &Option<LoadingExperience>| {
            let metrics = &experience.as_ref()?.metrics;
            keys.iter()
                .find_map(|key| metrics.get(*key).and_then(|m| m.percentile))
        };
        lookup(&self.loading_experience).or_else(|| lookup(&self.origin_loading_experience))
    }

    fn field_vitals(&self) -> FieldVitals {
        FieldVitals {
            lcp_ms: self.field_metric(&["LARGEST_CONTENTFUL_PAINT_MS"]),
            inp_ms: self.field_metric(&["INTERACTION_TO_NEXT_PAINT", "INTERACTION_TO_NEXT_PAINT_MS"]),
            // CrUX reports CLS multiplied by 100
            cls: self
                .field_metric(&["CUMULATIVE_LAYOUT_SHIFT_SCORE"])
                .map(|v| if v > 1.0 { v / 100.0 } else { v }),
        }
    }
}

/// Real-user Core Web Vitals at the 75th percentile
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct FieldVitals {
    lcp_ms: Option<f64>,
    inp_ms: Option<f64>,
    cls: Option<f64>,
}

impl FieldVitals {
    fn score(&self) -> Option<f64> {
        let scores: Vec<f64> = [
            threshold_score(self.lcp_ms, 2500.0, 4000.0),
            threshold_score(self.inp_ms, 200.0, 500.0),
            threshold_score(self.cls, 0.10, 0.25),
        ]
        .into_iter()
        .flatten()
        .collect();
        if scores.is_empty() {
            None
        } else {
            Some(round1(scores.iter().sum::<f64>() / scores.len() as f64))
        }
    }
}

/// 100 at or below `good`, 30 at or above `poor`, linear in between
fn threshold_score(value: Option<f64>, good: f64, poor: f64) -> Option<f64> {
    let value = value?;
    Some(if value <= good {
        100.0
    } else if value >= poor {
        30.0
    } else {
        round1(100.0 - (value - good) / (poor - good) * 70.0)
    })
}

fn composite(lab: Option<f64>, field: Option<f64>) -> Option<f64> {
    match (lab, field) {
        (Some(lab), Some(field)) => Some(lab * LAB_WEIGHT + field * FIELD_WEIGHT),
        (Some(score), None) | (None, Some(score)) => Some(score),
        (None, None) => None,
    }
}

pub struct PerformanceChecker {
    api_key: Option<String>,
    endpoint: String,
}

impl PerformanceChecker {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_endpoint(api_key, PAGESPEED_ENDPOINT)
    }

    /// Points the checker at a different PageSpeed-compatible endpoint
    pub fn with_endpoint(api_key: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: endpoint.into(),
        }
    }

    async fn run_strategy(
        &self,
        client: &reqwest::Client,
        target: &str,
        key: &str,
        strategy: &str,
    ) -> Result<PageSpeedResponse, reqwest::Error> {
        tracing::debug!("Requesting PageSpeed {} results for {}", strategy, target);
        client
            .get(&self.endpoint)
            .query(&[
                ("url", target),
                ("strategy", strategy),
                ("category", "performance"),
                ("locale", "en_US"),
                ("key", key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<PageSpeedResponse>()
            .await
    }

    fn unavailable(&self, target: &str, reason: String) -> CheckerReport {
        tracing::warn!("PageSpeed measurement unavailable: {}", reason);
        let finding = Finding::new(
            Category::Performance,
            Severity::Low,
            "Live CWV API data unavailable",
            format!("PageSpeed fetch failed: {}.", reason),
        )
        .impact("Performance is reported as not measured and real-user regressions may be missed.")
        .recommendation("Check the PageSpeed API key and quota, then rerun.")
        .evidence([Evidence::new(target, "PageSpeed request failed")])
        .effort(Effort::Low);
        CheckerReport::scored(
            self,
            CategoryScore::not_measured(format!("PageSpeed request failed: {}", reason)),
            vec![finding],
        )
    }
}

#[async_trait]
impl Checker for PerformanceChecker {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn category(&self) -> Category {
        Category::Performance
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        let Some(key) = self.api_key.as_deref() else {
            return CheckerReport::scored(
                self,
                CategoryScore::not_measured("no PageSpeed API key configured"),
                Vec::new(),
            );
        };

        let target = ctx
            .homepage()
            .map(|page| page.final_url.clone())
            .unwrap_or_else(|| ctx.scope.start().to_string());

        let client = match reqwest::Client::builder()
            .timeout(std::cmp::max(MIN_API_TIMEOUT, ctx.options.timeout * 2))
            .build()
        {
            Ok(client) => client,
            Err(e) => return self.unavailable(&target, e.to_string()),
        };

        let (mobile, desktop) = futures::future::join(
            self.run_strategy(&client, &target, key, "mobile"),
            self.run_strategy(&client, &target, key, "desktop"),
        )
        .await;

        let (mobile, desktop) = match (mobile, desktop) {
            (Err(e), Err(_)) => return self.unavailable(&target, e.to_string()),
            (mobile, desktop) => (mobile.ok(), desktop.ok()),
        };

        let labs: Vec<f64> = [&mobile, &desktop]
            .into_iter()
            .flatten()
            .filter_map(PageSpeedResponse::lab_score)
            .collect();
        let lab = if labs.is_empty() {
            None
        } else {
            Some(round1(labs.iter().sum::<f64>() / labs.len() as f64))
        };
        let vitals = mobile.as_ref().map(PageSpeedResponse::field_vitals).unwrap_or_default();
        let field = vitals.score();

        let score = match composite(lab, field) {
            Some(score) => CategoryScore::measured(score),
            None => CategoryScore::not_measured("PageSpeed returned no performance data"),
        };
        tracing::info!("PageSpeed lab score {:?}, field score {:?}", lab, field);

        let mut findings = Vec::new();
        if let Some(lcp) = vitals.lcp_ms.filter(|v| *v > 4000.0) {
            findings.push(
                Finding::new(
                    Category::Performance,
                    Severity::High,
                    "Poor field LCP (mobile)",
                    format!("Field LCP p75 is {}ms (target <= 2500ms).", round1(lcp)),
                )
                .impact("Slow loading hurts rankings, user retention and conversion rates.")
                .recommendation("Optimize hero assets, critical CSS, TTFB and render-blocking scripts.")
                .evidence([Evidence::new(target.clone(), format!("LCP {}ms", round1(lcp)))]),
            );
        }
        if let Some(inp) = vitals.inp_ms.filter(|v| *v > 500.0) {
            findings.push(
                Finding::new(
                    Category::Performance,
                    Severity::High,
                    "Poor field INP (mobile)",
                    format!("Field INP p75 is {}ms (target <= 200ms).", round1(inp)),
                )
                .impact("Input delay degrades the experience and suppresses performance gains.")
                .recommendation("Reduce main-thread blocking JavaScript and optimize event handlers.")
                .evidence([Evidence::new(target.clone(), format!("INP {}ms", round1(inp)))]),
            );
        }
        if let Some(cls) = vitals.cls.filter(|v| *v > 0.25) {
            findings.push(
                Finding::new(
                    Category::Performance,
                    Severity::High,
                    "Poor field CLS (mobile)",
                    format!("Field CLS p75 is {:.3} (target <= 0.10).", cls),
                )
                .impact("Layout instability damages perceived quality and engagement.")
                .recommendation("Reserve dimensions for media and embeds and stabilize dynamic UI insertion.")
                .evidence([Evidence::new(target.clone(), format!("CLS {:.3}", cls))]),
            );
        }

        CheckerReport::scored(self, score, findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn response(score: f64, lcp: Option<f64>) -> serde_json::Value {
        let mut metrics = json!({
            "INTERACTION_TO_NEXT_PAINT": {"percentile": 150},
            "CUMULATIVE_LAYOUT_SHIFT_SCORE": {"percentile": 5}
        });
        if let Some(lcp) = lcp {
            metrics["LARGEST_CONTENTFUL_PAINT_MS"] = json!({ "percentile": lcp });
        }
        json!({
            "lighthouseResult": {"categories": {"performance": {"score": score}}},
            "loadingExperience": {"metrics": metrics}
        })
    }

    async fn mock_strategy(server: &MockServer, strategy: &str, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/runPagespeed"))
            .and(query_param("strategy", strategy))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    fn checker(server: &MockServer) -> PerformanceChecker {
        PerformanceChecker::with_endpoint(
            Some("test-key".to_string()),
            format!("{}/runPagespeed", server.uri()),
        )
    }

    #[test]
    fn test_threshold_score() {
        assert_eq!(threshold_score(Some(2500.0), 2500.0, 4000.0), Some(100.0));
        assert_eq!(threshold_score(Some(4000.0), 2500.0, 4000.0), Some(30.0));
        assert_eq!(threshold_score(Some(3250.0), 2500.0, 4000.0), Some(65.0));
        assert_eq!(threshold_score(None, 2500.0, 4000.0), None);
    }

    #[test]
    fn test_composite_weights() {
        assert_eq!(composite(Some(80.0), Some(50.0)).map(round1), Some(68.0));
        assert_eq!(composite(None, Some(50.0)), Some(50.0));
        assert_eq!(composite(None, None), None);
    }

    #[tokio::test]
    async fn test_without_key_not_measured() {
        let ctx = context(vec![html_page("/", "<html></html>")]);
        let report = PerformanceChecker::new(None).evaluate(&ctx).await;
        assert!(!report.score.as_ref().unwrap().is_measured());
        assert!(report.findings.is_empty());
    }

    #[tokio::test]
    async fn test_lab_and_field_combined() {
        let server = MockServer::start().await;
        mock_strategy(&server, "mobile", 200, response(0.8, Some(3000.0))).await;
        mock_strategy(&server, "desktop", 200, response(0.9, None)).await;

        let ctx = context(vec![html_page("/", "<html></html>")]);
        let report = checker(&server).evaluate(&ctx).await;

        // lab 85, field (76.7 + 100 + 100) / 3 = 92.2
        assert_eq!(report.score.as_ref().unwrap().value(), Some(87.9));
        assert!(report.findings.is_empty());
    }

    #[tokio::test]
    async fn test_poor_field_lcp_is_high() {
        let server = MockServer::start().await;
        mock_strategy(&server, "mobile", 200, response(0.4, Some(5200.0))).await;
        mock_strategy(&server, "desktop", 500, json!({"error": {"message": "boom"}})).await;

        let ctx = context(vec![html_page("/", "<html></html>")]);
        let report = checker(&server).evaluate(&ctx).await;

        assert!(report.score.as_ref().unwrap().is_measured());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].title, "Poor field LCP (mobile)");
        assert_eq!(report.findings[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_api_failure_not_measured() {
        let server = MockServer::start().await;
        mock_strategy(&server, "mobile", 403, json!({})).await;
        mock_strategy(&server, "desktop", 403, json!({})).await;

        let ctx = context(vec![html_page("/", "<html></html>")]);
        let report = checker(&server).evaluate(&ctx).await;

        assert!(!report.score.as_ref().unwrap().is_measured());
        assert_eq!(report.findings[0].title, "Live CWV API data unavailable");
        assert_eq!(report.findings[0].severity, Severity::Low);
    }
}
