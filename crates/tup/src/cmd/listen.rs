use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tup_context::{Context, ContextError};
use tup_message::Message;

use crate::cmd::{connect, ListenArgs};
use crate::exit::{context_error, CliError, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

/// Bound on each wait so Ctrl-C is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let printed = Arc::new(AtomicUsize::new(0));
    let counter = printed.clone();
    let limit = args.count;
    let observer = move |_ctx: &mut Context, msg: &Message| {
        if limit.is_some_and(|limit| counter.load(Ordering::SeqCst) >= limit) {
            return;
        }
        print_message(msg, format);
        counter.fetch_add(1, Ordering::SeqCst);
    };

    let mut ctx = connect(Context::new().with_observer(observer), &args.device)?;

    while running.load(Ordering::SeqCst) {
        match ctx.wait_and_process(Some(POLL_INTERVAL)) {
            Ok(_) | Err(ContextError::Timeout(_)) => {}
            Err(err @ ContextError::CorruptFrame(_)) => {
                tracing::warn!(error = %err, "dropped corrupt input");
            }
            Err(err) => return Err(context_error("receive failed", err)),
        }

        if let Some(count) = limit {
            if printed.load(Ordering::SeqCst) >= count {
                break;
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
