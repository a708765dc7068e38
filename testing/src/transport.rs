//! Scripted message transport.

use futures::StreamExt;
use futures::stream;
use order_mirror_core::transport::{
    Message, MessageSource, MessageStream, StartPosition, TransportError,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// [`MessageSource`] replaying a fixed list of deliveries.
///
/// A subscription starting after position `P` skips scripted messages at or
/// before `P`, like a real log would. By default the stream ends after the
/// script; [`ScriptedMessageSource::keep_open`] makes it stay pending
/// instead, so the consumer only stops on shutdown.
#[derive(Debug)]
pub struct ScriptedMessageSource {
    channel: String,
    script: Vec<Result<Message, TransportError>>,
    keep_open: bool,
    fail_subscribe: bool,
    starts: Mutex<Vec<StartPosition>>,
}

impl ScriptedMessageSource {
    /// Create a source for `channel` with an empty script.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            script: Vec::new(),
            keep_open: false,
            fail_subscribe: false,
            starts: Mutex::new(Vec::new()),
        }
    }

    /// Append a delivery.
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.script.push(Ok(message));
        self
    }

    /// Append a receive error.
    #[must_use]
    pub fn with_error(mut self, error: TransportError) -> Self {
        self.script.push(Err(error));
        self
    }

    /// Keep the stream pending once the script is exhausted.
    #[must_use]
    pub const fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    /// Make `subscribe` fail.
    #[must_use]
    pub const fn unreachable(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Start positions of every subscription opened so far.
    #[must_use]
    pub fn starts(&self) -> Vec<StartPosition> {
        self.starts.lock().unwrap().clone()
    }
}

impl MessageSource for ScriptedMessageSource {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn subscribe(
        &self,
        start: StartPosition,
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, TransportError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_subscribe {
                return Err(TransportError::SubscriptionFailed {
                    channel: self.channel.clone(),
                    reason: "transport unreachable".to_string(),
                });
            }

            self.starts.lock().unwrap().push(start);

            let deliveries: Vec<_> = self
                .script
                .iter()
                .filter(|delivery| match (start, delivery) {
                    (StartPosition::After(after), Ok(message)) => message.position > after,
                    _ => true,
                })
                .cloned()
                .collect();

            let scripted = stream::iter(deliveries);
            let stream: MessageStream = if self.keep_open {
                Box::pin(scripted.chain(stream::pending()))
            } else {
                Box::pin(scripted)
            };

            Ok(stream)
        })
    }
}
