use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header::ACCEPT_LANGUAGE, request::Parts},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LangParam {
    lang: Option<String>,
}

/// Caller's language preferences, most preferred first. A `?lang=` query
/// parameter is placed ahead of the `Accept-Language` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptLanguage(pub Vec<String>);

impl AcceptLanguage {
    pub fn preferences(&self) -> &[String] {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AcceptLanguage
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut prefs = Vec::new();

        // A query string that does not deserialize just means no explicit choice.
        if let Ok(Query(param)) = Query::<LangParam>::try_from_uri(&parts.uri) {
            let explicit = param
                .lang
                .map(|v| v.trim().replace('_', "-").to_ascii_lowercase())
                .filter(|v| !v.is_empty());
            prefs.extend(explicit);
        }

        if let Some(header) = parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
        {
            for tag in parse_accept_language(header) {
                if !prefs.contains(&tag) {
                    prefs.push(tag);
                }
            }
        }

        Ok(Self(prefs))
    }
}

/// Parses an `Accept-Language` value into tags ordered by `q` weight
/// (stable for equal weights). `*`, `q=0` and malformed weights are dropped.
pub fn parse_accept_language(header: &str) -> Vec<String> {
    let mut weighted: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }

            let mut q = 1.0_f32;
            for param in parts {
                if let Some((name, value)) = param.split_once('=') {
                    if name.trim().eq_ignore_ascii_case("q") {
                        q = value.trim().parse().ok()?;
                    }
                }
            }
            if !(q > 0.0 && q <= 1.0) {
                return None;
            }

            Some((tag.replace('_', "-").to_ascii_lowercase(), q))
        })
        .collect();

    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut tags: Vec<String> = Vec::with_capacity(weighted.len());
    for (tag, _) in weighted {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn orders_by_weight() {
        assert_eq!(
            parse_accept_language("fr;q=0.5, es-MX, en;q=0.8"),
            vec!["es-mx", "en", "fr"]
        );
    }

    #[test]
    fn equal_weights_keep_header_order() {
        assert_eq!(parse_accept_language("de, es, en"), vec!["de", "es", "en"]);
    }

    #[test]
    fn drops_wildcard_zero_and_garbage() {
        assert_eq!(
            parse_accept_language("*, es;q=0, en;q=abc, pt;q=0.3, ,"),
            vec!["pt"]
        );
        assert!(parse_accept_language("").is_empty());
    }

    #[tokio::test]
    async fn query_parameter_takes_precedence() {
        let req = Request::builder()
            .uri("/api/products?limit=5&lang=ES")
            .header(ACCEPT_LANGUAGE, "en, es;q=0.5")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let lang = AcceptLanguage::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(lang.preferences(), ["es".to_string(), "en".to_string()]);
    }

    #[tokio::test]
    async fn query_parameter_is_percent_decoded() {
        for (uri, expected) in [
            ("/api/products?lang=%65s", "es"),
            ("/api/products?lang=es%2DMX", "es-mx"),
            ("/api/products?lang=pt_BR&limit=1", "pt-br"),
        ] {
            let req = Request::builder().uri(uri).body(()).unwrap();
            let (mut parts, _) = req.into_parts();
            let lang = AcceptLanguage::from_request_parts(&mut parts, &()).await.unwrap();
            assert_eq!(lang.preferences(), [expected.to_string()], "uri {uri}");
        }
    }

    #[tokio::test]
    async fn no_header_means_no_preferences() {
        let req = Request::builder().uri("/health").body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let lang = AcceptLanguage::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(lang.preferences().is_empty());
    }
}
