//! Composition of multiple propagators over one carrier.

use opentelemetry::{
    propagation::{text_map_propagator::FieldIter, Extractor, Injector, TextMapPropagator},
    Context,
};
use std::collections::HashSet;

/// A propagator that runs an ordered list of propagators against the same
/// carrier.
///
/// The list is fixed at construction. Injection applies every propagator in
/// registration order; each writes only its own fields, computed from the
/// context alone, so co-registered propagators never clobber one another.
///
/// Extraction also runs in registration order, threading the context through
/// each propagator. A propagator that finds nothing returns its input
/// unchanged, so when several produce a context the last registration wins,
/// and a miss never replaces a context an earlier propagator (or the caller)
/// already established.
#[derive(Debug)]
pub struct CompositePropagator {
    propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>>,
    fields: Vec<String>,
}

impl CompositePropagator {
    /// Constructs a composite out of `propagators`, keeping their order.
    pub fn new(propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>>) -> Self {
        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        for propagator in &propagators {
            for field in propagator.fields() {
                if seen.insert(field.to_string()) {
                    fields.push(field.to_string());
                }
            }
        }

        CompositePropagator {
            propagators,
            fields,
        }
    }
}

impl TextMapPropagator for CompositePropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        for propagator in &self.propagators {
            propagator.inject_context(cx, injector)
        }
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        self.propagators
            .iter()
            .fold(cx.clone(), |current_cx, propagator| {
                propagator.extract_with_context(&current_cx, extractor)
            })
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(self.fields.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uber::UberPropagator;
    use opentelemetry::{
        testing::trace::TestSpan,
        trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
    };
    use opentelemetry_sdk::propagation::TraceContextPropagator;
    use std::collections::HashMap;

    const UBER_TRACE_ID: u128 = 0xee2e_c3bb_2402_eb08_625a_76f7_62fb_73bb;
    const W3C_TRACE_ID: u128 = 0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736;
    const SPAN_ID: u64 = 0x5c30_1b3c_b0f6_6539;

    fn uber_first() -> CompositePropagator {
        CompositePropagator::new(vec![
            Box::new(UberPropagator::new()),
            Box::new(TraceContextPropagator::new()),
        ])
    }

    fn w3c_first() -> CompositePropagator {
        CompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(UberPropagator::new()),
        ])
    }

    fn sampled_context(trace_id: u128) -> SpanContext {
        SpanContext::new(
            TraceId::from_u128(trace_id),
            SpanId::from_u64(SPAN_ID),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        )
    }

    fn both_headers() -> HashMap<String, String> {
        let mut carrier: HashMap<String, String> = HashMap::new();
        carrier.set(
            "uber-trace-id",
            format!("{:032x}:{SPAN_ID:016x}:0000000000000000:1", UBER_TRACE_ID),
        );
        carrier.set(
            "traceparent",
            format!("00-{W3C_TRACE_ID:032x}-{SPAN_ID:016x}-01"),
        );
        carrier
    }

    #[test]
    fn inject_applies_every_propagator() {
        let composite = uber_first();
        let mut carrier: HashMap<String, String> = HashMap::new();
        composite.inject_context(
            &Context::current_with_span(TestSpan(sampled_context(UBER_TRACE_ID))),
            &mut carrier,
        );

        assert_eq!(
            Extractor::get(&carrier, "uber-trace-id"),
            Some("ee2ec3bb2402eb08625a76f762fb73bb:5c301b3cb0f66539:0000000000000000:1")
        );
        assert_eq!(
            Extractor::get(&carrier, "traceparent"),
            Some("00-ee2ec3bb2402eb08625a76f762fb73bb-5c301b3cb0f66539-01")
        );
    }

    #[test]
    fn extract_last_registered_wins() {
        let carrier = both_headers();

        let cx = uber_first().extract(&carrier);
        assert_eq!(cx.span().span_context(), &sampled_context(W3C_TRACE_ID));

        let cx = w3c_first().extract(&carrier);
        assert_eq!(cx.span().span_context(), &sampled_context(UBER_TRACE_ID));
    }

    #[test]
    fn extract_miss_keeps_earlier_result() {
        // Only the earlier-registered propagator's header is present; the
        // later one's miss must not erase what was extracted.
        let mut carrier: HashMap<String, String> = HashMap::new();
        carrier.set(
            "uber-trace-id",
            format!("{UBER_TRACE_ID:032x}:{SPAN_ID:016x}:0000000000000000:1"),
        );

        let cx = w3c_first().extract(&carrier);
        assert_eq!(cx.span().span_context(), &sampled_context(UBER_TRACE_ID));
    }

    #[test]
    fn extract_malformed_header_falls_back_to_other_codec() {
        let mut carrier = both_headers();
        carrier.set("traceparent", "00-garbage-garbage-zz".to_string());

        // The w3c codec registered last produces nothing, so the uber
        // extraction survives.
        let cx = uber_first().extract(&carrier);
        assert_eq!(cx.span().span_context(), &sampled_context(UBER_TRACE_ID));
    }

    #[test]
    fn extract_nothing_preserves_caller_context() {
        let caller = Context::current_with_span(TestSpan(sampled_context(UBER_TRACE_ID)));
        let carrier: HashMap<String, String> = HashMap::new();

        let cx = uber_first().extract_with_context(&caller, &carrier);
        assert_eq!(cx.span().span_context(), &sampled_context(UBER_TRACE_ID));
    }

    #[test]
    fn empty_composite_is_noop() {
        let composite = CompositePropagator::new(vec![]);
        let mut carrier: HashMap<String, String> = HashMap::new();
        composite.inject_context(
            &Context::current_with_span(TestSpan(sampled_context(UBER_TRACE_ID))),
            &mut carrier,
        );
        assert!(carrier.is_empty());

        let cx = composite.extract(&both_headers());
        assert_eq!(cx.span().span_context(), &SpanContext::empty_context());
    }

    #[test]
    fn fields_union_preserves_registration_order() {
        let propagator = uber_first();
        let fields = propagator.fields().collect::<Vec<_>>();
        assert_eq!(fields, vec!["uber-trace-id", "traceparent", "tracestate"]);
    }
}
