//! Request aggregation.
//!
//! # Responsibilities
//! - Consume head, body chunk and end events for one exchange
//! - Concatenate body chunks in arrival order
//! - Emit exactly one immutable [`Request`] once the end boundary is seen
//! - Resolve the absolute request URL against the server base URL
//!
//! # Design Decisions
//! - Transport fragmentation never reaches the dispatcher
//! - A message that never ends is dropped; nothing is emitted for it

use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use thiserror::Error;
use url::Url;

use crate::http::request::{resolve_url, Headers, Request, RequestHead};

/// One event produced by the HTTP decoder for a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Head(RequestHead),
    Body(Bytes),
    End,
}

/// Errors raised while assembling a request.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Body bytes arrived before the request head.
    #[error("body received before request head")]
    BodyBeforeHead,

    /// A second head arrived for the same message.
    #[error("duplicate request head")]
    DuplicateHead,

    /// End of message arrived before the request head.
    #[error("end of message received before request head")]
    EndBeforeHead,

    /// A part arrived after the message was already complete.
    #[error("message part received after end of message")]
    AfterEnd,

    /// The transport failed before the end of the message.
    #[error("request incomplete: {0}")]
    Incomplete(#[source] hyper::Error),
}

#[derive(Debug)]
enum Progress {
    AwaitingHead,
    Receiving { head: RequestHead, body: BytesMut },
    Done,
}

/// Assembles [`MessagePart`] events into a [`Request`].
#[derive(Debug)]
pub struct RequestAggregator {
    base_url: Option<Url>,
    progress: Progress,
}

impl RequestAggregator {
    pub fn new(base_url: Option<Url>) -> Self {
        Self {
            base_url,
            progress: Progress::AwaitingHead,
        }
    }

    /// Feed one event. Returns the request once `End` has been observed.
    pub fn push(&mut self, part: MessagePart) -> Result<Option<Request>, AggregateError> {
        match part {
            MessagePart::Head(head) => match self.progress {
                Progress::AwaitingHead => {
                    self.progress = Progress::Receiving {
                        head,
                        body: BytesMut::new(),
                    };
                    Ok(None)
                }
                Progress::Receiving { .. } => Err(AggregateError::DuplicateHead),
                Progress::Done => Err(AggregateError::AfterEnd),
            },
            MessagePart::Body(chunk) => match &mut self.progress {
                Progress::Receiving { body, .. } => {
                    body.extend_from_slice(&chunk);
                    Ok(None)
                }
                Progress::AwaitingHead => Err(AggregateError::BodyBeforeHead),
                Progress::Done => Err(AggregateError::AfterEnd),
            },
            MessagePart::End => match std::mem::replace(&mut self.progress, Progress::Done) {
                Progress::Receiving { head, body } => {
                    let url = self
                        .base_url
                        .as_ref()
                        .map(|base| resolve_url(base, &head.uri));
                    Ok(Some(Request::from_parts(head, body.freeze(), url)))
                }
                Progress::AwaitingHead => {
                    self.progress = Progress::AwaitingHead;
                    Err(AggregateError::EndBeforeHead)
                }
                Progress::Done => Err(AggregateError::AfterEnd),
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.progress, Progress::Done)
    }
}

/// Drive a hyper request through a [`RequestAggregator`].
///
/// Data frames are fed in arrival order; trailer frames are ignored. A body
/// read failure discards everything received so far.
pub async fn aggregate(
    request: hyper::Request<Incoming>,
    base_url: Option<&Url>,
) -> Result<Request, AggregateError> {
    let (parts, mut body) = request.into_parts();
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let mut aggregator = RequestAggregator::new(base_url.cloned());
    aggregator.push(MessagePart::Head(RequestHead {
        method: parts.method,
        uri,
        headers: Headers::from_header_map(&parts.headers),
        version: parts.version,
    }))?;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(AggregateError::Incomplete)?;
        if let Ok(data) = frame.into_data() {
            aggregator.push(MessagePart::Body(data))?;
        }
    }

    aggregator
        .push(MessagePart::End)?
        .ok_or(AggregateError::EndBeforeHead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::{Method, Version};

    fn head(uri: &str) -> MessagePart {
        MessagePart::Head(RequestHead::new(Method::POST, uri))
    }

    #[test]
    fn empty_body_emits_on_end() {
        let mut aggregator = RequestAggregator::new(None);
        assert!(aggregator.push(head("/ping")).unwrap().is_none());

        let request = aggregator.push(MessagePart::End).unwrap().unwrap();
        assert_eq!(request.uri(), "/ping");
        assert!(request.body().is_empty());
        assert!(aggregator.is_complete());
    }

    #[test]
    fn chunks_concatenate_in_order() {
        let mut aggregator = RequestAggregator::new(None);
        aggregator.push(head("/echo")).unwrap();
        for chunk in ["{\"ke", "y\":", "\"test\"", "}"] {
            assert!(aggregator
                .push(MessagePart::Body(Bytes::from(chunk)))
                .unwrap()
                .is_none());
        }

        let request = aggregator.push(MessagePart::End).unwrap().unwrap();
        assert_eq!(request.body().as_ref(), br#"{"key":"test"}"#);
    }

    #[test]
    fn nothing_emitted_without_end() {
        let mut aggregator = RequestAggregator::new(None);
        aggregator.push(head("/upload")).unwrap();
        assert!(aggregator
            .push(MessagePart::Body(Bytes::from_static(b"partial")))
            .unwrap()
            .is_none());
        assert!(!aggregator.is_complete());
    }

    #[test]
    fn protocol_violations_are_rejected() {
        let mut aggregator = RequestAggregator::new(None);
        assert!(matches!(
            aggregator.push(MessagePart::Body(Bytes::new())),
            Err(AggregateError::BodyBeforeHead)
        ));
        assert!(matches!(
            aggregator.push(MessagePart::End),
            Err(AggregateError::EndBeforeHead)
        ));

        aggregator.push(head("/")).unwrap();
        assert!(matches!(
            aggregator.push(head("/")),
            Err(AggregateError::DuplicateHead)
        ));

        aggregator.push(MessagePart::End).unwrap();
        assert!(matches!(
            aggregator.push(MessagePart::End),
            Err(AggregateError::AfterEnd)
        ));
    }

    #[test]
    fn version_and_url_carried_through() {
        let base = Url::parse("http://127.0.0.1:6123").unwrap();
        let mut aggregator = RequestAggregator::new(Some(base));
        let mut request_head = RequestHead::new(Method::GET, "/loc?lat=1");
        request_head.version = Version::HTTP_10;
        aggregator.push(MessagePart::Head(request_head)).unwrap();

        let request = aggregator.push(MessagePart::End).unwrap().unwrap();
        assert_eq!(request.version(), Version::HTTP_10);
        assert_eq!(
            request.url().map(Url::as_str),
            Some("http://127.0.0.1:6123/loc?lat=1")
        );
    }

    #[test]
    fn scheme_relative_path_stays_on_base_host() {
        let base = Url::parse("http://127.0.0.1:6123").unwrap();
        let mut aggregator = RequestAggregator::new(Some(base));
        aggregator
            .push(MessagePart::Head(RequestHead::new(
                Method::GET,
                "//evil.example/steal?x=1",
            )))
            .unwrap();

        let request = aggregator.push(MessagePart::End).unwrap().unwrap();
        let url = request.url().unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(6123));
        assert_eq!(url.path(), "//evil.example/steal");
        assert_eq!(url.query(), Some("x=1"));
    }
}
