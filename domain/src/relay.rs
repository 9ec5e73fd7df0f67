//! Upstream relay for the live order feed.
//!
//! A `RelaySession` authenticates the caller, opens exactly one upstream event
//! stream and forwards its chunks, unmodified and in order, to a
//! `RelayStream` that the web layer uses as a response body.
//!
//! Cancellation runs both ways through one `CancellationToken` per session:
//! dropping the `RelayStream` (browser gone) cancels it and the pipe task drops
//! the upstream connection; the upstream ending or failing ends the pipe task,
//! which closes the `RelayStream`. The session token is a child of the process
//! shutdown token, so shutdown ends every session too.

use crate::credentials::{CredentialProvider, SessionCookies};
use crate::error::Error;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use log::*;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

/// Upstream chunks as they arrive from the transport.
pub type UpstreamBody = BoxStream<'static, Result<Bytes, Error>>;

/// Result of asking the upstream for its event stream.
pub enum UpstreamOpen {
    /// 2xx: the body is ready to be piped.
    Streaming(UpstreamBody),
    /// Anything else, with the upstream's body when one could be read.
    Rejected { status: u16, body: Option<String> },
}

/// Something that can open the order event stream for a bearer credential.
#[async_trait]
pub trait OrderStreamSource: Send + Sync {
    async fn open(&self, authorization: &str) -> Result<UpstreamOpen, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Auth,
    Upstream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    UpstreamError,
    ClientDisconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Idle,
    Authenticating,
    OpeningUpstream,
    Piping,
    Failed(FailureKind),
    Closed(CloseReason),
}

impl RelayPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayPhase::Failed(_) | RelayPhase::Closed(_))
    }
}

pub struct RelaySession {
    id: Uuid,
    cancel: CancellationToken,
    phase: RelayPhase,
}

impl RelaySession {
    /// New session whose cancellation is tied to `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: parent.child_token(),
            phase: RelayPhase::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    fn transition(&mut self, next: RelayPhase) {
        debug!("Relay session {}: {:?} -> {:?}", self.id, self.phase, next);
        if let RelayPhase::Closed(_) | RelayPhase::Failed(_) = next {
            self.cancel.cancel();
        }
        self.phase = next;
    }

    /// Authenticate, open the upstream stream and start piping it.
    ///
    /// Fails before anything is streamed when the caller has no credential or
    /// the upstream refuses; afterwards, failures only end the returned stream.
    pub async fn open(
        mut self,
        credentials: &dyn CredentialProvider,
        source: &dyn OrderStreamSource,
        cookies: &SessionCookies,
    ) -> Result<RelayStream, Error> {
        self.transition(RelayPhase::Authenticating);
        let Some(authorization) = credentials.authorization(cookies).await else {
            info!("Relay session {} rejected: no valid credential", self.id);
            self.transition(RelayPhase::Failed(FailureKind::Auth));
            return Err(Error::unauthenticated());
        };

        self.transition(RelayPhase::OpeningUpstream);
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Relay session {} cancelled while opening upstream", self.id);
                self.transition(RelayPhase::Closed(CloseReason::ClientDisconnected));
                return Err(Error::other("Relay cancelled before upstream opened"));
            }
            opened = source.open(&authorization) => opened,
        };

        let upstream = match opened {
            Ok(UpstreamOpen::Streaming(upstream)) => upstream,
            Ok(UpstreamOpen::Rejected { status, body }) => {
                warn!(
                    "Relay session {}: upstream refused with status {}",
                    self.id, status
                );
                self.transition(RelayPhase::Failed(FailureKind::Upstream));
                return Err(Error::upstream(status, body));
            }
            Err(e) => {
                warn!("Relay session {}: failed to open upstream: {e}", self.id);
                self.transition(RelayPhase::Failed(FailureKind::Upstream));
                return Err(e);
            }
        };

        self.transition(RelayPhase::Piping);

        // Capacity 1: at most one chunk waits between upstream and the response.
        let (tx, rx) = mpsc::channel(1);
        let guard = self.cancel.clone().drop_guard();
        tokio::spawn(self.pipe(upstream, tx));

        Ok(RelayStream {
            rx,
            _cancel_on_drop: guard,
        })
    }

    async fn pipe(
        mut self,
        mut upstream: UpstreamBody,
        tx: mpsc::Sender<Result<Bytes, Error>>,
    ) -> CloseReason {
        let cancel = self.cancel.clone();

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break CloseReason::ClientDisconnected,
                next = upstream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let delivered = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        sent = tx.send(Ok(chunk)) => sent.is_ok(),
                    };
                    if !delivered {
                        break CloseReason::ClientDisconnected;
                    }
                }
                Some(Err(e)) => {
                    warn!("Relay session {}: upstream stream failed: {e}", self.id);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = tx.send(Err(e)) => {}
                    }
                    break CloseReason::UpstreamError;
                }
                None => break CloseReason::Normal,
            }
        };

        // Dropping the upstream body aborts the upstream connection.
        drop(upstream);
        drop(tx);

        match reason {
            CloseReason::ClientDisconnected => {
                debug!("Relay session {}: client disconnected", self.id)
            }
            CloseReason::Normal => info!("Relay session {}: upstream ended", self.id),
            CloseReason::UpstreamError => {}
        }
        self.transition(RelayPhase::Closed(reason));

        reason
    }
}

/// Outbound side of a relay session, suitable as an HTTP response body.
/// Dropping it cancels the session.
pub struct RelayStream {
    rx: mpsc::Receiver<Result<Bytes, Error>>,
    _cancel_on_drop: DropGuard,
}

impl Stream for RelayStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio_stream::wrappers::ReceiverStream;

    struct FixedCredentials(Option<&'static str>);

    #[async_trait]
    impl CredentialProvider for FixedCredentials {
        async fn authorization(&self, _cookies: &SessionCookies) -> Option<String> {
            self.0.map(|token| format!("Bearer {token}"))
        }
    }

    /// Hands out a prepared upstream once and records how it was called.
    struct FakeSource {
        calls: AtomicUsize,
        seen_authorization: Mutex<Option<String>>,
        next: Mutex<Option<UpstreamOpen>>,
    }

    impl FakeSource {
        fn new(next: UpstreamOpen) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen_authorization: Mutex::new(None),
                next: Mutex::new(Some(next)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderStreamSource for FakeSource {
        async fn open(&self, authorization: &str) -> Result<UpstreamOpen, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_authorization.lock().await = Some(authorization.to_string());
            self.next
                .lock()
                .await
                .take()
                .ok_or_else(|| Error::other("upstream opened twice"))
        }
    }

    fn cookies() -> SessionCookies {
        SessionCookies {
            access_token: Some("abc".to_string()),
            refresh_token: None,
        }
    }

    fn chunks(items: &[&'static str]) -> UpstreamOpen {
        let items: Vec<Result<Bytes, Error>> = items
            .iter()
            .map(|item| Ok(Bytes::from_static(item.as_bytes())))
            .collect();
        UpstreamOpen::Streaming(stream::iter(items).boxed())
    }

    #[tokio::test]
    async fn test_missing_credential_never_opens_upstream() {
        let source = FakeSource::new(chunks(&["never"]));
        let shutdown = CancellationToken::new();

        let result = RelaySession::new(&shutdown)
            .open(&FixedCredentials(None), &source, &cookies())
            .await;

        let err = result.err().expect("relay should be refused");
        assert!(err.is_unauthenticated());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_rejection_is_forwarded_with_its_status() {
        let source = FakeSource::new(UpstreamOpen::Rejected {
            status: 503,
            body: Some("maintenance".to_string()),
        });
        let shutdown = CancellationToken::new();

        let result = RelaySession::new(&shutdown)
            .open(&FixedCredentials(Some("abc")), &source, &cookies())
            .await;

        let err = result.err().expect("relay should fail");
        assert_eq!(
            err.error_kind,
            crate::error::DomainErrorKind::External(crate::error::ExternalErrorKind::Upstream {
                status: 503,
                body: Some("maintenance".to_string()),
            })
        );
        assert_eq!(source.calls(), 1);
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_session_cancels_its_own_token() {
        let shutdown = CancellationToken::new();
        let mut session = RelaySession::new(&shutdown);
        let token = session.cancel.clone();

        session.transition(RelayPhase::Failed(FailureKind::Upstream));

        assert!(token.is_cancelled());
        assert!(session.phase().is_terminal());
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_bearer_credential_is_passed_to_upstream() {
        let source = FakeSource::new(chunks(&[]));
        let shutdown = CancellationToken::new();

        let relay = RelaySession::new(&shutdown)
            .open(&FixedCredentials(Some("abc")), &source, &cookies())
            .await
            .unwrap();
        drop(relay);

        assert_eq!(
            source.seen_authorization.lock().await.as_deref(),
            Some("Bearer abc")
        );
    }

    #[tokio::test]
    async fn test_chunks_are_forwarded_byte_for_byte_in_order() {
        let first = "event: order\ndata: {\"a\":1}\n\n";
        let second = "event: order\ndata: {\"a\":2}\n\n";
        let source = FakeSource::new(chunks(&[first, second]));
        let shutdown = CancellationToken::new();

        let relay = RelaySession::new(&shutdown)
            .open(&FixedCredentials(Some("abc")), &source, &cookies())
            .await
            .unwrap();

        let forwarded: Vec<Bytes> = relay.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(
            forwarded,
            vec![Bytes::from_static(first.as_bytes()), Bytes::from_static(second.as_bytes())]
        );
    }

    #[tokio::test]
    async fn test_upstream_error_mid_stream_ends_relay_with_error() {
        let items: Vec<Result<Bytes, Error>> = vec![
            Ok(Bytes::from_static(b"event: order\ndata: {}\n\n")),
            Err(Error::other("connection reset")),
            Ok(Bytes::from_static(b"never forwarded")),
        ];
        let source = FakeSource::new(UpstreamOpen::Streaming(stream::iter(items).boxed()));
        let shutdown = CancellationToken::new();

        let mut relay = RelaySession::new(&shutdown)
            .open(&FixedCredentials(Some("abc")), &source, &cookies())
            .await
            .unwrap();

        assert!(relay.next().await.unwrap().is_ok());
        assert!(relay.next().await.unwrap().is_err());
        assert!(relay.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_relay_stream_closes_upstream() {
        let (upstream_tx, upstream_rx) = mpsc::channel::<Result<Bytes, Error>>(4);
        let source = FakeSource::new(UpstreamOpen::Streaming(
            ReceiverStream::new(upstream_rx).boxed(),
        ));
        let shutdown = CancellationToken::new();

        let mut relay = RelaySession::new(&shutdown)
            .open(&FixedCredentials(Some("abc")), &source, &cookies())
            .await
            .unwrap();

        upstream_tx
            .send(Ok(Bytes::from_static(b"event: order\ndata: {}\n\n")))
            .await
            .unwrap();
        assert!(relay.next().await.unwrap().is_ok());

        drop(relay);

        tokio::time::timeout(Duration::from_secs(1), upstream_tx.closed())
            .await
            .expect("upstream should be dropped after the client disconnects");
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_ends_active_relays() {
        let (upstream_tx, upstream_rx) = mpsc::channel::<Result<Bytes, Error>>(4);
        let source = FakeSource::new(UpstreamOpen::Streaming(
            ReceiverStream::new(upstream_rx).boxed(),
        ));
        let shutdown = CancellationToken::new();

        let mut relay = RelaySession::new(&shutdown)
            .open(&FixedCredentials(Some("abc")), &source, &cookies())
            .await
            .unwrap();

        shutdown.cancel();

        let next = tokio::time::timeout(Duration::from_secs(1), relay.next())
            .await
            .expect("relay should end on shutdown");
        assert!(next.is_none());
        tokio::time::timeout(Duration::from_secs(1), upstream_tx.closed())
            .await
            .expect("upstream should be dropped on shutdown");
    }

    #[tokio::test]
    async fn test_pipe_reports_close_reason() {
        let shutdown = CancellationToken::new();
        let mut session = RelaySession::new(&shutdown);
        session.transition(RelayPhase::Piping);
        let (tx, mut rx) = mpsc::channel(1);
        let upstream = stream::iter(vec![Ok(Bytes::from_static(b"x"))]).boxed();

        let pipe = tokio::spawn(session.pipe(upstream, tx));
        assert_eq!(rx.recv().await.unwrap().unwrap(), Bytes::from_static(b"x"));

        assert_eq!(pipe.await.unwrap(), CloseReason::Normal);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_only_failed_and_closed_phases_are_terminal() {
        assert!(!RelayPhase::Idle.is_terminal());
        assert!(!RelayPhase::Authenticating.is_terminal());
        assert!(!RelayPhase::OpeningUpstream.is_terminal());
        assert!(!RelayPhase::Piping.is_terminal());
        assert!(RelayPhase::Failed(FailureKind::Auth).is_terminal());
        assert!(RelayPhase::Closed(CloseReason::ClientDisconnected).is_terminal());
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        let shutdown = CancellationToken::new();
        let a = RelaySession::new(&shutdown);
        let b = RelaySession::new(&shutdown);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.phase(), RelayPhase::Idle);
    }
}
