const PSI_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";
const REPORT_LINK_BASE: &str = "https://developers.google.com/speed/pagespeed/insights/?url=";

trait ReportFetcher {
    async fn fetch(&self, url: &str, strategy: Strategy) -> Result<Value, FetchError>;
}

#[derive(Debug, Clone)]
struct PsiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl PsiClient {
    fn new(endpoint: String, api_key: String, timeout: Duration) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|err| format!("failed to create http client: {err}"))?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }
}

impl ReportFetcher for PsiClient {
    async fn fetch(&self, url: &str, strategy: Strategy) -> Result<Value, FetchError> {
        let res = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("url", url),
                ("key", self.api_key.as_str()),
                ("strategy", strategy.label()),
            ])
            .send()
            .await
            .map_err(|err| FetchError::Transport {
                status: None,
                message: err.to_string(),
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|err| FetchError::Transport {
            status: Some(status.as_u16()),
            message: err.to_string(),
        })?;
        if !status.is_success() {
            return Err(FetchError::Transport {
                status: Some(status.as_u16()),
                message: truncate_for_log(&body, 200),
            });
        }

        serde_json::from_str::<Value>(&body)
            .map_err(|err| FetchError::Schema(format!("report parse failed: {err}")))
    }
}

fn report_link(url: &str) -> String {
    format!("{REPORT_LINK_BASE}{url}")
}

// The category score arrives as a [0,1] fraction; audits carry pre-formatted
// display strings that are taken verbatim.
fn extract_metrics(report: &Value) -> Result<StrategyMetrics, FetchError> {
    let lighthouse = report
        .get("lighthouseResult")
        .ok_or_else(|| schema_error("lighthouseResult"))?;
    let fraction = lighthouse
        .pointer("/categories/performance/score")
        .and_then(Value::as_f64)
        .ok_or_else(|| schema_error("lighthouseResult.categories.performance.score"))?;
    let audits = lighthouse
        .get("audits")
        .ok_or_else(|| schema_error("lighthouseResult.audits"))?;

    Ok(StrategyMetrics {
        score: fraction * 100.0,
        fcp: audit_display(audits, "first-contentful-paint")?,
        lcp: audit_display(audits, "largest-contentful-paint")?,
        tbt: audit_display(audits, "total-blocking-time")?,
        cls: audit_display(audits, "cumulative-layout-shift")?,
        si: audit_display(audits, "speed-index")?,
    })
}

fn audit_display(audits: &Value, key: &str) -> Result<String, FetchError> {
    audits
        .pointer(&format!("/{key}/displayValue"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| FetchError::Schema(format!("lighthouseResult.audits.{key}.displayValue")))
}

fn schema_error(path: &str) -> FetchError {
    FetchError::Schema(path.to_string())
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "..."
}

#[derive(Debug, Clone, Copy)]
enum Pacer {
    FixedDelay(Duration),
    Unthrottled,
}

impl Pacer {
    fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Pacer::Unthrottled
        } else {
            Pacer::FixedDelay(Duration::from_millis(ms))
        }
    }

    async fn pause(&self) {
        if let Pacer::FixedDelay(delay) = self {
            tokio::time::sleep(*delay).await;
        }
    }
}

// Shared by the extractor and orchestrator test modules.
#[cfg(test)]
fn sample_report(fraction: f64) -> Value {
    serde_json::json!({
        "lighthouseResult": {
            "categories": {
                "performance": { "score": fraction }
            },
            "audits": {
                "first-contentful-paint": { "displayValue": "1.2 s" },
                "largest-contentful-paint": { "displayValue": "2.5 s" },
                "total-blocking-time": { "displayValue": "150 ms" },
                "cumulative-layout-shift": { "displayValue": "0.01" },
                "speed-index": { "displayValue": "3.4 s" }
            }
        }
    })
}

#[cfg(test)]
mod extract_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn score_scales_fraction_to_hundred() {
        let metrics = extract_metrics(&sample_report(0.873)).unwrap();
        assert_eq!(metrics.score, 87.3);
        assert_eq!(metrics.fcp, "1.2 s");
        assert_eq!(metrics.si, "3.4 s");
    }

    #[test]
    fn missing_lighthouse_result_is_a_schema_error() {
        let err = extract_metrics(&json!({})).unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));
    }

    #[test]
    fn missing_audit_is_a_schema_error() {
        let mut report = sample_report(0.5);
        report["lighthouseResult"]["audits"]
            .as_object_mut()
            .unwrap()
            .remove("speed-index");
        let err = extract_metrics(&report).unwrap_err();
        assert!(matches!(err, FetchError::Schema(path) if path.contains("speed-index")));
    }

    #[test]
    fn non_numeric_score_is_a_schema_error() {
        let mut report = sample_report(0.5);
        report["lighthouseResult"]["categories"]["performance"]["score"] = json!("fast");
        assert!(extract_metrics(&report).is_err());
    }

    #[test]
    fn report_link_appends_target_url() {
        assert_eq!(
            report_link("https://a.com"),
            "https://developers.google.com/speed/pagespeed/insights/?url=https://a.com"
        );
    }
}
