//! A bot's connection to the relay.
//!
//! The session owns a read loop that decodes relay frames, records them in
//! the conversation history and asks the [`TurnCoordinator`] whether to
//! reply. Authorized replies run as short-lived tasks behind the
//! [`ResponseThrottle`], sharing history and the socket's write half.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::history::{ConversationHistory, HistoryEntry};
use super::throttle::ResponseThrottle;
use super::turn::TurnCoordinator;
use crate::chat::{write_chunked, ChatEvent, FrameDecoder};
use crate::config::BotConfig;
use crate::provider::{ProviderError, ReplyGenerator};
use crate::Result;

/// Size of the socket read buffer.
const READ_BUFFER_SIZE: usize = 1024;

/// Message sent when no reply could be generated.
pub fn apology(name: &str) -> String {
    format!("I'm sorry, I ({name}) couldn't generate a response at this time.")
}

/// Connect to the relay configured in `config`.
pub async fn connect(config: &BotConfig) -> Result<TcpStream> {
    let addr = format!("{}:{}", config.host, config.port);
    let stream = TcpStream::connect(&addr).await?;
    info!("Connected to relay at {}", addr);
    Ok(stream)
}

struct SessionState {
    history: ConversationHistory,
    turn: TurnCoordinator,
}

struct SessionInner<G> {
    name: String,
    persona: String,
    generator: G,
    config: BotConfig,
    throttle: ResponseThrottle,
    state: Mutex<SessionState>,
}

impl<G: ReplyGenerator> SessionInner<G> {
    /// Call the generator, applying the configured timeout.
    async fn generate(&self, history: &[HistoryEntry]) -> std::result::Result<String, ProviderError> {
        let call = self.generator.generate_reply(&self.persona, history);
        match self.config.reply_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ProviderError::Timeout(limit.as_secs()))?,
            None => call.await,
        }
    }
}

/// A bot participant in the chat.
pub struct BotSession<G> {
    inner: Arc<SessionInner<G>>,
}

impl<G: ReplyGenerator + 'static> BotSession<G> {
    /// Create a session for the bot called `name`.
    pub fn new(
        name: impl Into<String>,
        persona: impl Into<String>,
        generator: G,
        config: BotConfig,
    ) -> Self {
        let name = name.into();
        let state = SessionState {
            history: ConversationHistory::new(config.history_capacity),
            turn: TurnCoordinator::new(name.clone()),
        };
        let throttle = ResponseThrottle::new(config.think_min_secs, config.think_max_secs);

        Self {
            inner: Arc::new(SessionInner {
                name,
                persona: persona.into(),
                generator,
                config,
                throttle,
                state: Mutex::new(state),
            }),
        }
    }

    /// The bot's display name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Snapshot of the stored history, oldest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        let state = self.inner.state.lock().await;
        state.history.recent(state.history.len())
    }

    /// Send the name handshake and process relay traffic until the relay
    /// closes the connection.
    pub async fn run<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        writer.write_all(self.inner.name.as_bytes()).await?;
        writer.flush().await?;
        info!(
            "{} joined the chat using {}",
            self.inner.name,
            self.inner.generator.name()
        );

        let writer = Arc::new(Mutex::new(writer));
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                info!("Relay closed the connection");
                return Ok(());
            }
            for event in decoder.feed(&buf[..n]) {
                self.handle_event(event, &writer).await;
            }
        }
    }

    async fn handle_event<W>(&self, event: ChatEvent, writer: &Arc<Mutex<W>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("RECEIVED: {}: {}", event.sender, event.body);

        let mut state = self.inner.state.lock().await;
        if event.sender != self.inner.name {
            state
                .history
                .push(HistoryEntry::participant(&event.sender, &event.body));
        }

        let decision = state.turn.evaluate(&event);
        if !decision.is_respond() {
            debug!("Not replying to {} ({:?})", event.sender, decision);
            return;
        }

        let Some(slot) = self.inner.throttle.try_reserve() else {
            debug!(
                "Reply already in flight, not scheduling another for {}",
                event.sender
            );
            return;
        };
        state.turn.commit(&event.sender);
        drop(state);

        slot.spawn(respond(Arc::clone(&self.inner), Arc::clone(writer)));
    }
}

async fn respond<G, W>(inner: Arc<SessionInner<G>>, writer: Arc<Mutex<W>>)
where
    G: ReplyGenerator,
    W: AsyncWrite + Unpin + Send,
{
    let history = {
        let state = inner.state.lock().await;
        state.history.recent(inner.config.history_window)
    };

    let reply = match inner.generate(&history).await {
        Ok(text) => text,
        Err(e) => {
            error!("Error generating response: {}", e);
            apology(&inner.name)
        }
    };
    let reply = reply.trim();
    if reply.is_empty() {
        warn!("Generated an empty reply, nothing sent");
        return;
    }

    {
        let mut state = inner.state.lock().await;
        state.history.push(HistoryEntry::assistant(reply));
        state.turn.record_own_reply();
    }

    let mut writer = writer.lock().await;
    match write_chunked(
        &mut *writer,
        reply,
        inner.config.chunk_size,
        inner.config.chunk_delay(),
    )
    .await
    {
        Ok(()) => info!("SENT: {}", reply),
        Err(e) => error!("Error sending message: {}", e),
    }
}
