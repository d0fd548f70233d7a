//! Carrier over an HTTP header map.

use opentelemetry::propagation::{Extractor, Injector};

/// Injects context into an [`http::HeaderMap`], e.g. of an outgoing request.
///
/// A key or value that is not legal in an HTTP header is dropped silently:
/// propagator-chosen header names are legal by construction, so nothing is
/// lost in practice.
#[derive(Debug)]
pub struct HeaderInjector<'a>(
    /// The header map to write into.
    pub &'a mut http::HeaderMap,
);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let Ok(name) = http::header::HeaderName::from_bytes(key.as_bytes()) {
            if let Ok(val) = http::header::HeaderValue::from_str(&value) {
                self.0.insert(name, val);
            }
        }
    }
}

/// Extracts context from an [`http::HeaderMap`], e.g. of an incoming request.
///
/// Header-name lookup is case-insensitive per HTTP; for a header that appears
/// multiple times `get` yields the first value. A value that is not visible
/// ASCII reads as absent.
#[derive(Debug)]
pub struct HeaderExtractor<'a>(
    /// The header map to read from.
    pub &'a http::HeaderMap,
);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uber::UberPropagator;
    use opentelemetry::{
        propagation::TextMapPropagator,
        testing::trace::TestSpan,
        trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
        Context,
    };

    #[test]
    fn get_is_case_insensitive() {
        let mut headers = http::HeaderMap::new();
        headers.insert("Uber-Trace-Id", "value".parse().unwrap());

        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("uber-trace-id"), Some("value"));
        assert_eq!(extractor.get("UBER-TRACE-ID"), Some("value"));
    }

    #[test]
    fn get_returns_first_of_multiple_values() {
        let mut headers = http::HeaderMap::new();
        headers.append("uber-trace-id", "first".parse().unwrap());
        headers.append("uber-trace-id", "second".parse().unwrap());

        assert_eq!(HeaderExtractor(&headers).get("uber-trace-id"), Some("first"));
    }

    #[test]
    fn set_replaces_value() {
        let mut headers = http::HeaderMap::new();
        {
            let mut injector = HeaderInjector(&mut headers);
            injector.set("uber-trace-id", "first".to_string());
            injector.set("uber-trace-id", "second".to_string());
        }

        assert_eq!(headers.get("uber-trace-id").unwrap(), "second");
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn set_drops_illegal_name() {
        let mut headers = http::HeaderMap::new();
        HeaderInjector(&mut headers).set("illegal name", "value".to_string());
        assert!(headers.is_empty());
    }

    #[test]
    fn propagation_through_header_map() {
        let propagator = UberPropagator::new();
        let span_context = SpanContext::new(
            TraceId::from_u128(0xee2e_c3bb_2402_eb08_625a_76f7_62fb_73bb),
            SpanId::from_u64(0x5c30_1b3c_b0f6_6539),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );

        let mut headers = http::HeaderMap::new();
        propagator.inject_context(
            &Context::current_with_span(TestSpan(span_context.clone())),
            &mut HeaderInjector(&mut headers),
        );
        assert_eq!(
            headers.get("uber-trace-id").unwrap(),
            "ee2ec3bb2402eb08625a76f762fb73bb:5c301b3cb0f66539:0000000000000000:1"
        );

        let cx = propagator.extract(&HeaderExtractor(&headers));
        assert_eq!(cx.span().span_context(), &span_context);
    }
}
