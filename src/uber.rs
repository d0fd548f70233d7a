//! Propagator for the Jaeger native propagation format (`uber-trace-id`).

use opentelemetry::{
    global::{self, Error},
    propagation::{text_map_propagator::FieldIter, Extractor, Injector, PropagationError, TextMapPropagator},
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
    Context,
};

const UBER_HEADER: &str = "uber-trace-id";

const MAX_TRACE_ID_DIGITS: usize = 32;
const MAX_SPAN_ID_DIGITS: usize = 16;
const MAX_PARENT_SPAN_ID_DIGITS: usize = 16;
const MAX_FLAGS_DIGITS: usize = 2;

/// Propagates a `SpanContext` in the [Jaeger propagation format], better known
/// as the `uber-trace-id` header, so that traces started by peers which still
/// speak this legacy format are not broken.
///
/// The header value has the form `TRACEID:SPANID:PARENTSPANID:FLAGS`, all
/// lower-case hex. The parent span id field is deprecated and written as
/// sixteen zero digits; on extraction its value is ignored. Peers are allowed
/// to shorten ids by dropping leading zero digits, so short ids are
/// zero-padded on the left when read back. An id whose digits are all zero is
/// reserved to mean "absent" and never produces a context.
///
/// Of the Jaeger flag bits only the sampled bit (`0x01`) is propagated; the
/// debug (`0x02`) and firehose (`0x08`) bits are cleared in both directions.
///
/// The header name is fixed: every peer speaking this format uses the same
/// name, so unlike [`TraceContextPropagator`] there is nothing to configure.
///
/// [Jaeger propagation format]: https://www.jaegertracing.io/docs/1.40/client-libraries/#propagation-format
/// [`TraceContextPropagator`]: https://docs.rs/opentelemetry_sdk/latest/opentelemetry_sdk/propagation/struct.TraceContextPropagator.html
#[derive(Clone, Debug)]
pub struct UberPropagator {
    fields: [String; 1],
}

impl Default for UberPropagator {
    fn default() -> Self {
        UberPropagator::new()
    }
}

impl UberPropagator {
    /// Create a new `UberPropagator`.
    pub fn new() -> Self {
        UberPropagator {
            fields: [UBER_HEADER.to_owned()],
        }
    }

    fn extract_span_context(&self, extractor: &dyn Extractor) -> Option<SpanContext> {
        let header_value = extractor.get(UBER_HEADER).unwrap_or("");
        if header_value.is_empty() {
            // A missing header is the normal case, not a malformed one.
            return None;
        }

        match parse_header(header_value) {
            Some(span_context) => Some(span_context),
            None => {
                global::handle_error(Error::Propagation(PropagationError::extract(
                    "invalid uber-trace-id header",
                    "UberPropagator",
                )));
                None
            }
        }
    }
}

/// Parse `TRACEID:SPANID:PARENTSPANID:FLAGS` with an optional `-`-introduced
/// vendor suffix after the flags group.
///
/// Grammar per field: 1-32, 1-16, 1-16 and 1-2 lower-case hex digits. The
/// parent span id group is validated but its value is deprecated and ignored.
fn parse_header(header_value: &str) -> Option<SpanContext> {
    let parts = header_value.splitn(4, ':').collect::<Vec<&str>>();
    if parts.len() != 4 {
        return None;
    }

    let trace_id = TraceId::from_hex(hex_group(parts[0], MAX_TRACE_ID_DIGITS)?).ok()?;
    let span_id = SpanId::from_hex(hex_group(parts[1], MAX_SPAN_ID_DIGITS)?).ok()?;
    hex_group(parts[2], MAX_PARENT_SPAN_ID_DIGITS)?;

    // Anything after the first `-` is a vendor extension such as a debug id.
    // The suffix itself may contain `:`.
    let flags_part = match parts[3].split_once('-') {
        Some((flags_part, _suffix)) => flags_part,
        None => parts[3],
    };
    let flags = u8::from_str_radix(hex_group(flags_part, MAX_FLAGS_DIGITS)?, 16).ok()?;
    let trace_flags = TraceFlags::new(flags) & TraceFlags::SAMPLED;

    let span_context = SpanContext::new(trace_id, span_id, trace_flags, true, TraceState::default());

    // All-zero ids decode fine but are reserved to mean "absent"; accepting
    // one would fabricate a real-looking trace.
    if !span_context.is_valid() {
        return None;
    }

    Some(span_context)
}

fn hex_group(group: &str, max_digits: usize) -> Option<&str> {
    if group.is_empty() || group.len() > max_digits {
        return None;
    }
    if !group.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    Some(group)
}

impl TextMapPropagator for UberPropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return;
        }

        // Clear all flags other than the sampling bit. The debug and firehose
        // bits valid for Jaeger are not part of this format's contract.
        let flags = span_context.trace_flags() & TraceFlags::SAMPLED;

        let header_value = format!(
            "{}:{}:{:016x}:{:x}",
            span_context.trace_id(),
            span_context.span_id(),
            0u64, // parent span id, deprecated
            flags,
        );
        injector.set(UBER_HEADER, header_value);
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        self.extract_span_context(extractor)
            .map(|sc| cx.with_remote_span_context(sc))
            .unwrap_or_else(|| cx.clone())
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(self.fields.as_ref())
    }
}
