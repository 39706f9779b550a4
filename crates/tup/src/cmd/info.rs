use tup_context::Context;
use tup_message::Message;

use crate::cmd::{connect, DeviceArgs};
use crate::exit::{codec_error, context_error, CliResult, SUCCESS};
use crate::output::{print_device_info, DeviceInfo, OutputFormat};

pub fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.timeout()?;
    let line = args.line_config()?;
    let mut ctx = connect(Context::new(), &args)?;

    let mut msg = Message::new();
    msg.init_get_version();
    let version = ctx
        .request(&msg, timeout)
        .map_err(|err| context_error("version query failed", err))?
        .parse_resp_version()
        .map_err(|err| codec_error("version query failed", err))?;

    msg.init_get_build_info();
    let build_info = ctx
        .request(&msg, timeout)
        .map_err(|err| context_error("build info query failed", err))?
        .parse_resp_build_info()
        .map_err(|err| codec_error("build info query failed", err))?;

    let info = DeviceInfo {
        path: args.path,
        line: line.to_string(),
        version,
        build_info,
    };
    print_device_info(&info, format);
    Ok(SUCCESS)
}
