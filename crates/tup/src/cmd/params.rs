use tup_context::Context;
use tup_message::{Message, MessageType};

use crate::cmd::{connect, run_command, GetValuesArgs, SetValuesArgs};
use crate::exit::{codec_error, context_error, CliResult, SUCCESS};
use crate::output::{print_values, OutputFormat};

/// `GetParameters` or `GetInputs`, printed as an id/value listing.
pub fn get(kind: MessageType, args: GetValuesArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.device.timeout()?;
    let mut msg = Message::new();
    let label = if kind == MessageType::GetInputs {
        msg.init_get_inputs(args.effect, &args.ids)
            .map_err(|err| codec_error("invalid ids", err))?;
        "inputs"
    } else {
        msg.init_get_parameters(args.effect, &args.ids)
            .map_err(|err| codec_error("invalid ids", err))?;
        "parameters"
    };

    let mut ctx = connect(Context::new(), &args.device)?;
    let response = ctx
        .request(&msg, timeout)
        .map_err(|err| context_error(&format!("{kind} failed"), err))?;
    let values = if kind == MessageType::GetInputs {
        response.parse_resp_inputs()
    } else {
        response.parse_resp_parameters()
    }
    .map_err(|err| codec_error(&format!("{kind} failed"), err))?;

    print_values(label, &values, format);
    Ok(SUCCESS)
}

/// `SetParameters` or `SetInputs`.
pub fn set(kind: MessageType, args: SetValuesArgs, format: OutputFormat) -> CliResult<i32> {
    let mut msg = Message::new();
    let built = if kind == MessageType::SetInputs {
        msg.init_set_inputs(args.effect, &args.entries)
    } else {
        msg.init_set_parameters(args.effect, &args.entries)
    };
    built.map_err(|err| codec_error("invalid values", err))?;
    run_command(&args.device, &msg, format)
}
