use std::fs;

use tup_context::Context;
use tup_message::MessageType;

use crate::cmd::{connect, UploadArgs};
use crate::exit::{context_error, io_error, CliResult, SUCCESS};
use crate::output::{print_ack, OutputFormat};

pub fn run(args: UploadArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.device.timeout()?;
    let blob = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;

    let mut ctx = connect(Context::new(), &args.device)?;
    ctx.upload_effect(args.effect, &blob, timeout)
        .map_err(|err| context_error("upload failed", err))?;

    print_ack(MessageType::EndEffectUpload, format);
    Ok(SUCCESS)
}
