use tup_message::{Message, BINDING_ACTUATOR_1, BINDING_ACTUATOR_2};

use crate::cmd::{run_command, BindArgs, LoadArgs, SlotArgs};
use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub fn load(args: LoadArgs, format: OutputFormat) -> CliResult<i32> {
    let mut msg = Message::new();
    msg.init_load(args.slot, args.effect);
    run_command(&args.device, &msg, format)
}

pub fn play(args: SlotArgs, format: OutputFormat) -> CliResult<i32> {
    let mut msg = Message::new();
    msg.init_play(args.slot);
    run_command(&args.device, &msg, format)
}

pub fn stop(args: SlotArgs, format: OutputFormat) -> CliResult<i32> {
    let mut msg = Message::new();
    msg.init_stop(args.slot);
    run_command(&args.device, &msg, format)
}

pub fn bind(args: BindArgs, format: OutputFormat) -> CliResult<i32> {
    let flags = binding_flags(&args.actuators)?;
    let mut msg = Message::new();
    msg.init_bind_effect(args.slot, flags);
    run_command(&args.device, &msg, format)
}

fn binding_flags(actuators: &[u8]) -> CliResult<u8> {
    actuators.iter().try_fold(0u8, |flags, actuator| match actuator {
        1 => Ok(flags | BINDING_ACTUATOR_1),
        2 => Ok(flags | BINDING_ACTUATOR_2),
        other => Err(CliError::new(
            USAGE,
            format!("unknown actuator {other}, expected 1 or 2"),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actuators_map_to_flags() {
        assert_eq!(binding_flags(&[1]).unwrap(), 0x1);
        assert_eq!(binding_flags(&[2, 1]).unwrap(), 0x3);
        assert_eq!(binding_flags(&[]).unwrap(), 0);
        assert_eq!(binding_flags(&[3]).unwrap_err().code, USAGE);
    }
}
