use std::fmt;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, info, trace, warn};
use tup_message::{encode_message_frame, CodecError, FrameAssembler, Message, MessageType};
use tup_transport::{Link, SerialConfig, TransportError};

use crate::config::ContextConfig;
use crate::error::{ContextError, Result};
use crate::observer::Observer;
use crate::pending::{answered_command, PendingRequests};

/// Body bytes an `UploadEffectPart` spends outside its data:
/// type (2) + nargs (1) + u32 part number (5) + raw tag and length (3).
const UPLOAD_PART_OVERHEAD: usize = 11;

/// Lifecycle of the link held by a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    /// Link acquired, line settings not applied yet.
    Open,
    /// Ready for traffic.
    Configured,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkState::Closed => "closed",
            LinkState::Open => "open but not configured",
            LinkState::Configured => "configured",
        })
    }
}

/// Result of one processing call.
#[derive(Debug, Default)]
pub struct Processed {
    frames: usize,
    responses: Vec<Message>,
    resynced: bool,
}

impl Processed {
    /// Frames extracted, correlated or not.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Responses matched to commands sent through this context, in arrival order.
    pub fn responses(&self) -> &[Message] {
        &self.responses
    }

    pub fn into_responses(self) -> Vec<Message> {
        self.responses
    }

    /// A corrupt frame followed the delivered ones and the receive buffer was reset.
    pub fn resynced(&self) -> bool {
        self.resynced
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }
}

/// One link to one device.
///
/// Not internally synchronized: a single thread should own the I/O loop.
/// The context never keeps a caller's [`Message`] beyond the call that
/// borrowed it.
pub struct Context {
    link: Option<Box<dyn Link>>,
    state: LinkState,
    line: Option<SerialConfig>,
    config: ContextConfig,
    rx: FrameAssembler,
    tx: BytesMut,
    pending: PendingRequests,
    observer: Option<Box<dyn Observer>>,
    poisoned: bool,
}

impl Context {
    /// Create a closed context without an observer.
    pub fn new() -> Self {
        let config = ContextConfig::default();
        Self {
            link: None,
            state: LinkState::Closed,
            line: None,
            config,
            rx: FrameAssembler::new(config.frame_config()),
            tx: BytesMut::with_capacity(config.frame_config().max_frame_size()),
            pending: PendingRequests::new(config.max_pending),
            observer: None,
            poisoned: false,
        }
    }

    /// Register the observer for unsolicited frames.
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Override buffer sizes and timeouts.
    pub fn with_config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self.rx = FrameAssembler::new(config.frame_config());
        self.tx = BytesMut::with_capacity(config.frame_config().max_frame_size());
        self.pending = PendingRequests::new(config.max_pending);
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Line settings applied by the last [`Context::set_config`].
    pub fn line_config(&self) -> Option<&SerialConfig> {
        self.line.as_ref()
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    /// Commands sent and not answered yet.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Bytes received that do not form a complete frame yet.
    pub fn buffered(&self) -> usize {
        self.rx.buffered()
    }

    /// Open the device at `path` (`unix:<path>` for a socket bridge).
    #[cfg(unix)]
    pub fn open(&mut self, path: &str) -> Result<()> {
        if self.link.is_some() {
            return Err(ContextError::AlreadyOpen);
        }
        let link = tup_transport::open_link(path)?;
        info!(path, transport = link.transport_name(), "link opened");
        self.attach(link);
        Ok(())
    }

    /// Take ownership of an already-connected link.
    pub fn open_with(&mut self, link: Box<dyn Link>) -> Result<()> {
        if self.link.is_some() {
            return Err(ContextError::AlreadyOpen);
        }
        info!(transport = link.transport_name(), "link attached");
        self.attach(link);
        Ok(())
    }

    fn attach(&mut self, link: Box<dyn Link>) {
        self.link = Some(link);
        self.state = LinkState::Open;
        self.poisoned = false;
        self.line = None;
        self.rx.reset();
        self.pending.clear();
    }

    /// Apply line settings. Valid while open or configured.
    pub fn set_config(&mut self, line: SerialConfig) -> Result<()> {
        let state = self.state;
        let link = self
            .link
            .as_mut()
            .ok_or(ContextError::BadState { op: "configure", state })?;
        link.configure(&line)?;
        info!(%line, "line configured");
        self.line = Some(line);
        self.state = LinkState::Configured;
        Ok(())
    }

    /// Release the link. Idempotent.
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            info!(transport = link.transport_name(), "link closed");
        }
        self.state = LinkState::Closed;
        self.line = None;
        self.poisoned = false;
        self.rx.reset();
        self.tx.clear();
        self.pending.clear();
    }

    /// Write one frame.
    ///
    /// Fails with `WouldBlock` when the link takes no bytes at all; the caller
    /// retries. Once part of the frame is out, the rest is written within
    /// `write_timeout` or the call fails with `Timeout` and further sends
    /// fail until the context is reopened.
    pub fn send(&mut self, msg: &Message) -> Result<()> {
        if self.state != LinkState::Configured {
            return Err(ContextError::BadState {
                op: "send",
                state: self.state,
            });
        }
        if self.poisoned {
            return Err(ContextError::Poisoned);
        }
        let kind = msg
            .kind()
            .ok_or_else(|| CodecError::InvalidArgument("cannot send an empty message".into()))?;

        self.tx.clear();
        encode_message_frame(msg, &mut self.tx, self.config.max_frame_body)?;
        self.write_tx()?;
        debug!(%kind, bytes = self.tx.len(), "frame sent");

        if kind.is_command() {
            self.pending.push(kind);
        }
        Ok(())
    }

    fn write_tx(&mut self) -> Result<()> {
        let state = self.state;
        let Some(link) = self.link.as_mut() else {
            return Err(ContextError::BadState { op: "send", state });
        };

        let mut offset = 0usize;
        while offset < self.tx.len() {
            match link.write(&self.tx[offset..]) {
                Ok(0) => {
                    self.poisoned = true;
                    return Err(TransportError::Closed.into());
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
                Err(err) if err.kind() == IoErrorKind::WouldBlock && offset == 0 => {
                    return Err(ContextError::WouldBlock);
                }
                Err(err) if err.kind() == IoErrorKind::WouldBlock => {
                    let writable = match link.wait_writable(Some(self.config.write_timeout)) {
                        Ok(writable) => writable,
                        Err(err) => {
                            self.poisoned = true;
                            return Err(err.into());
                        }
                    };
                    if !writable {
                        // A partial frame is on the wire; nothing sent after it can be framed.
                        warn!(written = offset, total = self.tx.len(), "link stalled mid-frame");
                        self.poisoned = true;
                        return Err(ContextError::Timeout(self.config.write_timeout));
                    }
                }
                Err(err) => {
                    self.poisoned = true;
                    return Err(err.into());
                }
            }
        }

        loop {
            match link.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
                Err(err) if err.kind() == IoErrorKind::WouldBlock => continue,
                Err(err) => {
                    self.poisoned = true;
                    return Err(err.into());
                }
            }
        }
    }

    /// Read what the link has now and handle every complete frame.
    ///
    /// Never blocks. Correlated responses are returned; other frames go to
    /// the observer or are dropped when there is none. With no complete
    /// frame available the result is empty, not an error.
    pub fn process_fd(&mut self) -> Result<Processed> {
        self.require_link("process")?;
        let (processed, _) = self.drain_link()?;
        Ok(processed)
    }

    /// Wait up to `timeout` for data, then process it like [`Context::process_fd`].
    ///
    /// `Some(Duration::ZERO)` polls once; `None` waits indefinitely. Fails
    /// with `Timeout` when nothing arrived in time.
    pub fn wait_and_process(&mut self, timeout: Option<Duration>) -> Result<Processed> {
        let state = self.state;
        let Some(link) = self.link.as_ref() else {
            return Err(ContextError::BadState { op: "wait", state });
        };

        match link.wait_readable(timeout) {
            Ok(true) => {}
            Ok(false) => return Err(ContextError::Timeout(timeout.unwrap_or_default())),
            Err(err) => {
                let err = ContextError::from(err);
                self.fail_link(&err);
                return Err(err);
            }
        }

        let (processed, read) = self.drain_link()?;
        if read == 0 && self.link.is_some() {
            // Readable with nothing to read: the peer hung up.
            let err = ContextError::from(TransportError::Closed);
            self.fail_link(&err);
            return Err(err);
        }
        Ok(processed)
    }

    /// Send `msg` and wait for the response that answers it.
    ///
    /// Other frames arriving meanwhile are handled as usual. Responses to
    /// other outstanding commands extracted during the wait are dropped.
    pub fn request(&mut self, msg: &Message, timeout: Duration) -> Result<Message> {
        let command = match msg.kind() {
            Some(kind) if kind.is_command() => kind,
            other => {
                return Err(CodecError::InvalidArgument(format!(
                    "request needs a command, got {}",
                    other.map_or("an empty message", MessageType::name)
                ))
                .into())
            }
        };
        self.send(msg)?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let processed = match self.wait_and_process(Some(remaining)) {
                Ok(processed) => processed,
                Err(ContextError::Timeout(_)) => {
                    self.pending.cancel(command);
                    return Err(ContextError::Timeout(timeout));
                }
                Err(err) => return Err(err),
            };

            let mut found = None;
            for response in processed.into_responses() {
                if found.is_none() && answered_command(&response) == Some(command) {
                    found = Some(response);
                } else {
                    debug!(kind = ?response.kind(), "dropping response to another command");
                }
            }
            if let Some(response) = found {
                return Ok(response);
            }
            if remaining.is_zero() {
                self.pending.cancel(command);
                return Err(ContextError::Timeout(timeout));
            }
        }
    }

    /// Send a command that the device acknowledges, failing on an `Error` reply.
    pub fn command(&mut self, msg: &Message, timeout: Duration) -> Result<()> {
        let response = self.request(msg, timeout)?;
        match response.kind() {
            Some(MessageType::Ack) => Ok(()),
            Some(MessageType::Error) => Err(ContextError::Device(response.parse_error()?)),
            other => Err(ContextError::UnexpectedResponse(format!(
                "expected ack, got {}",
                other.map_or("an empty message", MessageType::name)
            ))),
        }
    }

    /// Upload an effect blob in parts sized to the frame limit.
    ///
    /// Each step must be acknowledged within `timeout`.
    pub fn upload_effect(&mut self, effect_id: u16, data: &[u8], timeout: Duration) -> Result<()> {
        let chunk = self
            .config
            .max_frame_body
            .saturating_sub(UPLOAD_PART_OVERHEAD)
            .min(u16::MAX as usize);
        if chunk == 0 {
            return Err(CodecError::TooBig(format!(
                "frame body of {} bytes cannot carry effect data",
                self.config.max_frame_body
            ))
            .into());
        }
        let n_parts = u32::try_from(data.len().div_ceil(chunk))
            .map_err(|_| CodecError::TooBig(format!("effect of {} bytes", data.len())))?;

        let mut msg = Message::with_capacity(chunk + UPLOAD_PART_OVERHEAD);
        msg.init_begin_effect_upload(effect_id, n_parts);
        self.command(&msg, timeout)?;

        for (part_no, part) in (0u32..).zip(data.chunks(chunk)) {
            msg.init_upload_effect_part(part_no, part)?;
            self.command(&msg, timeout)?;
            trace!(part_no, n_parts, bytes = part.len(), "effect part acknowledged");
        }

        msg.init_end_effect_upload();
        self.command(&msg, timeout)?;
        info!(effect_id, bytes = data.len(), n_parts, "effect uploaded");
        Ok(())
    }

    fn require_link(&self, op: &'static str) -> Result<()> {
        if self.link.is_none() {
            return Err(ContextError::BadState {
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Read and handle frames until the link has nothing more to give.
    ///
    /// Returns the processing result and the number of bytes read.
    fn drain_link(&mut self) -> Result<(Processed, usize)> {
        let mut processed = Processed::default();
        let mut total = 0usize;

        loop {
            let Some(link) = self.link.as_mut() else {
                break;
            };
            let fill = match self.rx.fill_from(link.as_mut()) {
                Ok(fill) => fill,
                Err(err) => {
                    let err = ContextError::from(err);
                    self.fail_link(&err);
                    return Err(err);
                }
            };
            total += fill.read;

            if let Err(err) = self.extract_frames(&mut processed) {
                self.notify_error(&err);
                if processed.frames == 0 {
                    return Err(err);
                }
                processed.resynced = true;
                break;
            }
            if fill.drained {
                break;
            }
        }

        if !processed.is_empty() {
            debug!(
                frames = processed.frames,
                responses = processed.responses.len(),
                "processed inbound frames"
            );
        }
        Ok((processed, total))
    }

    fn extract_frames(&mut self, processed: &mut Processed) -> Result<()> {
        loop {
            let body = match self.rx.next_frame() {
                Ok(Some(body)) => body,
                Ok(None) => return Ok(()),
                Err(err) => return Err(ContextError::CorruptFrame(err)),
            };
            let msg = match Message::decode(&body) {
                Ok(msg) => msg,
                Err(CodecError::UnsupportedType(code)) => {
                    warn!(code, "skipping frame with unknown message type");
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "malformed message body, resynchronizing");
                    self.rx.reset();
                    return Err(ContextError::CorruptFrame(err));
                }
            };
            processed.frames += 1;
            self.classify(msg, processed);

            if self.link.is_none() {
                // The observer closed the context.
                return Ok(());
            }
        }
    }

    fn classify(&mut self, msg: Message, processed: &mut Processed) {
        if let Some(command) = self.pending.resolve(&msg) {
            debug!(%command, kind = ?msg.kind(), "response correlated");
            if let Some(mut observer) = self.observer.take() {
                observer.on_response(self, &msg);
                self.observer = Some(observer);
            }
            processed.responses.push(msg);
            return;
        }
        match self.observer.take() {
            Some(mut observer) => {
                debug!(kind = ?msg.kind(), "dispatching unsolicited frame");
                observer.on_unsolicited(self, &msg);
                self.observer = Some(observer);
            }
            None => {
                debug!(kind = ?msg.kind(), "no observer, dropping unsolicited frame");
            }
        }
    }

    fn notify_error(&mut self, err: &ContextError) {
        if let Some(mut observer) = self.observer.take() {
            observer.on_error(self, err);
            self.observer = Some(observer);
        }
    }

    /// Invalidate sends until reopened and tell the observer.
    fn fail_link(&mut self, err: &ContextError) {
        warn!(error = %err, "link failed");
        self.poisoned = true;
        self.notify_error(err);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state)
            .field("link", &self.link)
            .field("line", &self.line)
            .field("config", &self.config)
            .field("buffered", &self.rx.buffered())
            .field("pending", &self.pending.len())
            .field("has_observer", &self.observer.is_some())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tup_transport::SocketLink;

    use super::*;
    use crate::error::ErrorKind;

    /// Accepts `budget` bytes in total, then reports a full transmit queue
    /// that never drains.
    #[derive(Debug)]
    struct StallingLink {
        budget: Arc<AtomicUsize>,
    }

    impl Read for StallingLink {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    impl Write for StallingLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let left = self.budget.load(Ordering::SeqCst);
            if left == 0 {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = left.min(buf.len());
            self.budget.fetch_sub(n, Ordering::SeqCst);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Link for StallingLink {
        fn configure(&mut self, _config: &SerialConfig) -> tup_transport::Result<()> {
            Ok(())
        }

        fn wait_readable(&self, _timeout: Option<Duration>) -> tup_transport::Result<bool> {
            Ok(false)
        }

        fn wait_writable(&self, _timeout: Option<Duration>) -> tup_transport::Result<bool> {
            Ok(self.budget.load(Ordering::SeqCst) > 0)
        }

        fn transport_name(&self) -> &'static str {
            "stalling"
        }
    }

    fn stalling(budget: usize) -> (Context, Arc<AtomicUsize>) {
        let budget = Arc::new(AtomicUsize::new(budget));
        let mut ctx = Context::new().with_config(ContextConfig {
            write_timeout: Duration::from_millis(10),
            ..ContextConfig::default()
        });
        ctx.open_with(Box::new(StallingLink {
            budget: budget.clone(),
        }))
        .unwrap();
        ctx.set_config(SerialConfig::default()).unwrap();
        (ctx, budget)
    }

    fn configured() -> (Context, UnixStream) {
        let (link, device) = SocketLink::pair().unwrap();
        let mut ctx = Context::new();
        ctx.open_with(Box::new(link)).unwrap();
        ctx.set_config(SerialConfig::default()).unwrap();
        (ctx, device)
    }

    #[test]
    fn lifecycle_transitions() {
        let (link, _device) = SocketLink::pair().unwrap();
        let mut ctx = Context::new();
        assert_eq!(ctx.state(), LinkState::Closed);

        ctx.open_with(Box::new(link)).unwrap();
        assert_eq!(ctx.state(), LinkState::Open);

        ctx.set_config(SerialConfig::default()).unwrap();
        assert_eq!(ctx.state(), LinkState::Configured);
        assert_eq!(ctx.line_config(), Some(&SerialConfig::default()));

        ctx.close();
        assert_eq!(ctx.state(), LinkState::Closed);
        ctx.close();
        assert_eq!(ctx.state(), LinkState::Closed);
    }

    #[test]
    fn reopen_requires_close() {
        let (ctx_link, _d1) = SocketLink::pair().unwrap();
        let (other, _d2) = SocketLink::pair().unwrap();
        let mut ctx = Context::new();
        ctx.open_with(Box::new(ctx_link)).unwrap();

        let err = ctx.open_with(Box::new(other)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Busy);
    }

    #[test]
    fn closed_context_rejects_io() {
        let mut ctx = Context::new();
        let mut msg = Message::new();
        msg.init_get_version();

        assert_eq!(ctx.send(&msg).unwrap_err().kind(), ErrorKind::BadDescriptor);
        assert_eq!(ctx.process_fd().unwrap_err().kind(), ErrorKind::BadDescriptor);
        assert_eq!(
            ctx.wait_and_process(Some(Duration::ZERO)).unwrap_err().kind(),
            ErrorKind::BadDescriptor
        );
        assert_eq!(
            ctx.set_config(SerialConfig::default()).unwrap_err().kind(),
            ErrorKind::BadDescriptor
        );
    }

    #[test]
    fn unconfigured_send_rejected() {
        let (link, _device) = SocketLink::pair().unwrap();
        let mut ctx = Context::new();
        ctx.open_with(Box::new(link)).unwrap();

        let mut msg = Message::new();
        msg.init_play(0);
        assert_eq!(ctx.send(&msg).unwrap_err().kind(), ErrorKind::BadDescriptor);
    }

    #[test]
    fn empty_message_rejected() {
        let (mut ctx, _device) = configured();
        let err = ctx.send(&Message::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn send_writes_one_frame_and_tracks_command() {
        let (mut ctx, mut device) = configured();
        let mut msg = Message::new();
        msg.init_stop(2);
        ctx.send(&msg).unwrap();
        assert_eq!(ctx.pending_requests(), 1);

        let mut wire = BytesMut::new();
        encode_message_frame(&msg, &mut wire, 4096).unwrap();
        let mut received = vec![0u8; wire.len()];
        device.read_exact(&mut received).unwrap();
        assert_eq!(received, wire.to_vec());
    }

    #[test]
    fn oversized_message_is_too_big() {
        let (link, _device) = SocketLink::pair().unwrap();
        let mut ctx = Context::new().with_config(ContextConfig {
            max_frame_body: 16,
            ..ContextConfig::default()
        });
        ctx.open_with(Box::new(link)).unwrap();
        ctx.set_config(SerialConfig::default()).unwrap();

        let mut msg = Message::new();
        msg.init_upload_effect_part(0, &[0u8; 32]).unwrap();
        assert_eq!(ctx.send(&msg).unwrap_err().kind(), ErrorKind::TooBig);
        assert_eq!(ctx.pending_requests(), 0);
    }

    #[test]
    fn full_queue_before_first_byte_is_retryable() {
        let (mut ctx, budget) = stalling(0);
        let mut msg = Message::new();
        msg.init_play(1);

        assert_eq!(ctx.send(&msg).unwrap_err().kind(), ErrorKind::WouldBlock);
        assert_eq!(ctx.pending_requests(), 0);

        budget.store(64, Ordering::SeqCst);
        ctx.send(&msg).unwrap();
        assert_eq!(ctx.pending_requests(), 1);
    }

    #[test]
    fn stall_mid_frame_times_out_and_blocks_further_sends() {
        let (mut ctx, budget) = stalling(3);
        let mut msg = Message::new();
        msg.init_load(2, 9);

        let err = ctx.send(&msg).unwrap_err();
        assert!(matches!(err, ContextError::Timeout(_)), "{err}");
        assert_eq!(ctx.pending_requests(), 0);

        // Room again, but the earlier fragment cannot be completed.
        budget.store(64, Ordering::SeqCst);
        assert_eq!(ctx.send(&msg).unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(budget.load(Ordering::SeqCst), 64);

        ctx.close();
        let (link, _device) = SocketLink::pair().unwrap();
        ctx.open_with(Box::new(link)).unwrap();
        ctx.set_config(SerialConfig::default()).unwrap();
        ctx.send(&msg).unwrap();
    }

    #[test]
    fn processed_accessors() {
        let processed = Processed::default();
        assert!(processed.is_empty());
        assert_eq!(processed.frames(), 0);
        assert!(processed.responses().is_empty());
        assert!(!processed.resynced());
    }
}
