//! Trace context propagation across process boundaries.
//!
//! A trace context (trace id, span id, sampling flags) crosses a process
//! boundary by being written into and read back out of a *carrier*: the
//! header map of an HTTP request, the environment of a child process, or the
//! record headers of a queued message. This crate provides:
//!
//! - [`UberPropagator`], a codec for the legacy Jaeger `uber-trace-id`
//!   single-header wire format;
//! - carriers for HTTP header maps ([`HeaderInjector`]/[`HeaderExtractor`]),
//!   environment variables ([`EnvCarrier`]), and ordered message record
//!   headers ([`HeaderCarrier`]);
//! - [`CompositePropagator`], which runs several codecs over one carrier so
//!   a service can speak the legacy format and the W3C format at once, with
//!   last-registered-wins precedence on extraction.
//!
//! All propagators implement [`TextMapPropagator`], so any of them (usually
//! the composite) can be installed as the process-wide default with
//! [`opentelemetry::global::set_text_map_propagator`].
//!
//! ## Example
//!
//! ```
//! use opentelemetry::propagation::TextMapPropagator;
//! use opentelemetry::trace::TraceContextExt;
//! use otel_propagators::UberPropagator;
//! use std::collections::HashMap;
//!
//! // Headers of an incoming request from a peer speaking the legacy format.
//! let mut headers = HashMap::new();
//! headers.insert(
//!     "uber-trace-id".to_string(),
//!     "ee2ec3bb2402eb08625a76f762fb73bb:5c301b3cb0f66539:0000000000000000:1".to_string(),
//! );
//!
//! let cx = UberPropagator::new().extract(&headers);
//! let span_context = cx.span().span_context().clone();
//! assert!(span_context.is_valid());
//! assert!(span_context.is_sampled());
//! ```
//!
//! [`TextMapPropagator`]: opentelemetry::propagation::TextMapPropagator
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(
    docsrs,
    feature(doc_cfg, doc_auto_cfg),
    deny(rustdoc::broken_intra_doc_links)
)]
#![cfg_attr(test, deny(warnings))]

pub mod composite;
pub mod env;
pub mod http;
pub mod message;
pub mod uber;

pub use composite::CompositePropagator;
pub use env::{EnvCarrier, EnvKeyError, EnvStore, KeyEncoding, MapEnv, ProcessEnv, ENV_CARRIER_PREFIX};
pub use http::{HeaderExtractor, HeaderInjector};
pub use message::{HeaderCarrier, MessageHeader, RecordHeader};
pub use uber::UberPropagator;
