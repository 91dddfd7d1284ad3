use crate::core::source::AdapterError;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::sync::LazyLock;
use tracing::debug;

/// Grams per troy ounce.
pub const TROY_OUNCE_GRAMS: f64 = 31.1035;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// Tried in order; the first pattern that matches a candidate wins.
static PRICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(\d+\.?\d*)\s*元/克",
        r"¥\s*(\d+\.?\d*)",
        r"(\d+\.?\d*)\s*元",
        r"价格\s*[:：]\s*(\d+\.?\d*)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid price pattern"))
    .collect()
});

/// Builds the HTTP client shared by all network adapters.
pub fn http_client() -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
}

/// GETs `url` and returns the body, rejecting non-2xx and blank responses.
pub async fn get_text(client: &Client, url: &str) -> Result<String, AdapterError> {
    debug!("Requesting {}", url);
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status(status.as_u16()));
    }
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Err(AdapterError::Empty);
    }
    Ok(text)
}

/// Pulls a per-gram price out of free text such as `"水贝金价 918.5元/克"`.
pub fn extract_price(text: &str) -> Option<f64> {
    PRICE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    })
}

/// Converts a price per troy ounce to a price per gram, rounded to cents.
pub fn per_gram(price_per_ounce: f64) -> f64 {
    crate::core::quote::round_cents(price_per_ounce / TROY_OUNCE_GRAMS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_price_patterns() {
        assert_eq!(extract_price("水贝黄金 918.5元/克"), Some(918.5));
        assert_eq!(extract_price("今日金价 ¥ 920"), Some(920.0));
        assert_eq!(extract_price("回收 905 元"), Some(905.0));
        assert_eq!(extract_price("价格：930.25"), Some(930.25));
        assert_eq!(extract_price("价格: 931"), Some(931.0));
        assert_eq!(extract_price("no numbers here"), None);
        assert_eq!(extract_price(""), None);
    }

    #[test]
    fn test_extract_price_prefers_per_gram_pattern() {
        assert_eq!(extract_price("¥100 涨跌 918.5元/克"), Some(918.5));
    }

    #[test]
    fn test_per_gram() {
        assert_eq!(per_gram(31.1035), 1.0);
        assert_eq!(per_gram(28_000.0), 900.22);
    }
}
