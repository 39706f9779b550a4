use tup_message::Message;

use crate::context::Context;
use crate::error::ContextError;

/// Receives frames the context could not match to an outstanding command.
///
/// Calls happen synchronously on the thread running `process_fd` or
/// `wait_and_process`. The message is only borrowed for the call; copy it to
/// keep it. While a callback runs the observer is detached from the context,
/// so processing started from inside the callback drops unsolicited frames
/// instead of re-entering.
pub trait Observer: Send {
    fn on_unsolicited(&mut self, ctx: &mut Context, msg: &Message);

    /// Called with each correlated response as it is extracted, in wire order
    /// with unsolicited frames. The response is still returned to the caller
    /// of the processing call.
    fn on_response(&mut self, _ctx: &mut Context, _msg: &Message) {}

    /// Called when the receive path hits a corrupt frame or a link failure.
    fn on_error(&mut self, _ctx: &mut Context, _err: &ContextError) {}
}

impl<F> Observer for F
where
    F: FnMut(&mut Context, &Message) + Send,
{
    fn on_unsolicited(&mut self, ctx: &mut Context, msg: &Message) {
        self(ctx, msg)
    }
}
