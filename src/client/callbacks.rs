//! Event callbacks consumed by the application layer

use crate::ConnectionError;

type ConnectFn = Box<dyn FnMut() + Send>;
type MessageFn = Box<dyn FnMut(&str) + Send>;
type ErrorFn = Box<dyn FnMut(&ConnectionError) + Send>;
type DisconnectFn = Box<dyn FnMut() + Send>;

/// Four optional handlers invoked from the connection thread.
///
/// Handlers never run concurrently with each other and never after
/// [`ConnectionManager::disconnect`](crate::client::ConnectionManager::disconnect)
/// returns. The message handler receives a view that is only valid for the
/// duration of the call.
///
/// # Examples
///
/// ```
/// use globalchat_wire::client::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .on_connect(|| println!("connected"))
///     .on_message(|text| println!("<- {}", text))
///     .on_error(|err| eprintln!("{} failed: {}", err.stage(), err.detail()))
///     .on_disconnect(|| println!("disconnected"));
/// ```
#[derive(Default)]
pub struct Callbacks {
    on_connect: Option<ConnectFn>,
    on_message: Option<MessageFn>,
    on_error: Option<ErrorFn>,
    on_disconnect: Option<DisconnectFn>,
}

impl Callbacks {
    /// Create an empty handler set
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler fired once the message channel is open
    pub fn on_connect(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_connect = Some(Box::new(f));
        self
    }

    /// Handler fired for each inbound message, in wire order
    pub fn on_message(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// Handler fired for each stage failure
    pub fn on_error(mut self, f: impl FnMut(&ConnectionError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Handler fired when the connection thread's run loop exits
    pub fn on_disconnect(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_disconnect = Some(Box::new(f));
        self
    }

    pub(crate) fn connected(&mut self) {
        if let Some(f) = self.on_connect.as_mut() {
            f();
        }
    }

    pub(crate) fn message(&mut self, text: &str) {
        if let Some(f) = self.on_message.as_mut() {
            f(text);
        }
    }

    pub(crate) fn error(&mut self, err: &ConnectionError) {
        if let Some(f) = self.on_error.as_mut() {
            f(err);
        }
    }

    pub(crate) fn disconnected(&mut self) {
        if let Some(f) = self.on_disconnect.as_mut() {
            f();
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .finish()
    }
}
