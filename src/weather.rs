use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

const WEATHER_URL: &str =
    "https://lazzy-dev.kakao.com/v0.7/card/weather?lat=37.4018632&lon=127.1081415&test=1";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("weather endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("weather response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("weather response is missing {0}")]
    MissingField(&'static str),
}

// The endpoint nests the reading under
// Content.AirPollution.combineAir.now; every level is optional so a
// truncated document surfaces as MissingField instead of a parse error.
#[derive(Debug, Deserialize)]
struct WeatherResponse {
    #[serde(rename = "Content")]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(rename = "AirPollution")]
    air_pollution: Option<AirPollution>,
}

#[derive(Debug, Deserialize)]
struct AirPollution {
    #[serde(rename = "combineAir")]
    combine_air: Option<CombineAir>,
}

#[derive(Debug, Deserialize)]
struct CombineAir {
    now: Option<WeatherReport>,
}

/// One air-quality reading: where it was measured, which pollutant, and
/// the descriptive severity label.
#[derive(Debug, Deserialize)]
pub struct WeatherReport {
    #[serde(rename = "observatoryName")]
    observatory_name: String,
    text: String,
    desc: String,
}

impl WeatherReport {
    fn to_sentence(&self) -> String {
        format!(
            "{}의 {} 수치는 *{}* 입니다.",
            self.observatory_name, self.text, self.desc
        )
    }
}

/// Source of the formatted weather sentence, stubbed out in dispatcher
/// tests.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_conditions(&self) -> Result<String, WeatherError>;
}

pub struct WeatherClient {
    http: reqwest::Client,
    url: String,
}

impl WeatherClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            url: WEATHER_URL.to_string(),
        }
    }

    /// Single GET, no retry.
    async fn fetch(&self) -> Result<String, WeatherError> {
        let response = self
            .http
            .get(&self.url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status));
        }
        let body = response.text().await?;
        Ok(parse_report(&body)?.to_sentence())
    }
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn current_conditions(&self) -> Result<String, WeatherError> {
        self.fetch().await
    }
}

fn parse_report(body: &str) -> Result<WeatherReport, WeatherError> {
    let response: WeatherResponse = serde_json::from_str(body)?;
    response
        .content
        .ok_or(WeatherError::MissingField("Content"))?
        .air_pollution
        .ok_or(WeatherError::MissingField("Content.AirPollution"))?
        .combine_air
        .ok_or(WeatherError::MissingField("AirPollution.combineAir"))?
        .now
        .ok_or(WeatherError::MissingField("combineAir.now"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_BODY: &str = r#"{"Content":{"AirPollution":{"combineAir":{"now":{"observatoryName":"강남","text":"미세먼지","desc":"좋음"}}}}}"#;

    #[test]
    fn formats_the_reading_into_a_sentence() {
        let report = parse_report(FULL_BODY).unwrap();
        assert_eq!(report.to_sentence(), "강남의 미세먼지 수치는 *좋음* 입니다.");
    }

    #[test]
    fn malformed_body_is_a_json_error() {
        let err = parse_report("not json at all").unwrap_err();
        assert!(matches!(err, WeatherError::Json(_)));
    }

    #[test]
    fn empty_document_is_missing_content() {
        let err = parse_report("{}").unwrap_err();
        assert!(matches!(err, WeatherError::MissingField("Content")));
    }

    #[test]
    fn truncated_nesting_reports_the_missing_path() {
        let err = parse_report(r#"{"Content":{"AirPollution":{}}}"#).unwrap_err();
        assert!(matches!(
            err,
            WeatherError::MissingField("AirPollution.combineAir")
        ));
    }

    #[test]
    fn reading_without_required_fields_is_a_json_error() {
        let body = r#"{"Content":{"AirPollution":{"combineAir":{"now":{"observatoryName":"강남"}}}}}"#;
        let err = parse_report(body).unwrap_err();
        assert!(matches!(err, WeatherError::Json(_)));
    }
}
