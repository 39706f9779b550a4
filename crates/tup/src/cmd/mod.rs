use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use tracing::debug;
use tup_context::Context;
use tup_message::{Entry, Message, MessageType};
use tup_transport::{Baudrate, Parity, SerialConfig};

use crate::exit::{context_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_ack, OutputFormat};

pub mod info;
pub mod listen;
pub mod params;
pub mod playback;
pub mod upload;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information.
    Version(VersionArgs),
    /// Query firmware version and build info from a device.
    Info(DeviceArgs),
    /// Load an effect into a playback slot.
    Load(LoadArgs),
    /// Start playback of a slot.
    Play(SlotArgs),
    /// Stop playback of a slot.
    Stop(SlotArgs),
    /// Bind a slot to actuators.
    Bind(BindArgs),
    /// Read effect parameters.
    GetParams(GetValuesArgs),
    /// Write effect parameters.
    SetParams(SetValuesArgs),
    /// Read effect inputs.
    GetInputs(GetValuesArgs),
    /// Write effect inputs.
    SetInputs(SetValuesArgs),
    /// Upload an effect blob.
    Upload(UploadArgs),
    /// Print unsolicited device messages.
    Listen(ListenArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::Info(args) => info::run(args, format),
        Command::Load(args) => playback::load(args, format),
        Command::Play(args) => playback::play(args, format),
        Command::Stop(args) => playback::stop(args, format),
        Command::Bind(args) => playback::bind(args, format),
        Command::GetParams(args) => params::get(MessageType::GetParameters, args, format),
        Command::SetParams(args) => params::set(MessageType::SetParameters, args, format),
        Command::GetInputs(args) => params::get(MessageType::GetInputs, args, format),
        Command::SetInputs(args) => params::set(MessageType::SetInputs, args, format),
        Command::Upload(args) => upload::run(args, format),
        Command::Listen(args) => listen::run(args, format),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ParityArg {
    None,
    Odd,
    Even,
}

impl From<ParityArg> for Parity {
    fn from(value: ParityArg) -> Self {
        match value {
            ParityArg::None => Parity::None,
            ParityArg::Odd => Parity::Odd,
            ParityArg::Even => Parity::Even,
        }
    }
}

/// Device path and line settings shared by every device command.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Serial device path, or `unix:<path>` for a socket bridge.
    pub path: String,
    /// Line speed in bits per second.
    #[arg(long, env = "TUP_BAUDRATE", default_value_t = 115_200)]
    pub baudrate: u32,
    /// Parity mode.
    #[arg(long, env = "TUP_PARITY", value_enum, default_value = "none")]
    pub parity: ParityArg,
    /// Enable RTS/CTS flow control.
    #[arg(long, env = "TUP_FLOW_CONTROL")]
    pub flow_control: bool,
    /// Response timeout (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

impl DeviceArgs {
    pub fn line_config(&self) -> CliResult<SerialConfig> {
        let baudrate = Baudrate::from_bps(self.baudrate)
            .map_err(|err| transport_error("invalid line settings", err))?;
        Ok(SerialConfig::new(
            baudrate,
            self.parity.into(),
            self.flow_control,
        ))
    }

    pub fn timeout(&self) -> CliResult<Duration> {
        parse_duration(&self.timeout)
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct SlotArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Playback slot.
    #[arg(long, short = 's', default_value_t = 0)]
    pub slot: u8,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Playback slot.
    #[arg(long, short = 's', default_value_t = 0)]
    pub slot: u8,
    /// Effect to load.
    #[arg(long, short = 'e')]
    pub effect: u16,
}

#[derive(Args, Debug)]
pub struct BindArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Playback slot.
    #[arg(long, short = 's', default_value_t = 0)]
    pub slot: u8,
    /// Actuators to drive (comma-separated, 1 and/or 2).
    #[arg(long, short = 'a', value_delimiter = ',', default_value = "1")]
    pub actuators: Vec<u8>,
}

#[derive(Args, Debug)]
pub struct GetValuesArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Effect to query.
    #[arg(long, short = 'e')]
    pub effect: u8,
    /// Ids to read (comma-separated). Default: all the device reports.
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<u8>,
}

#[derive(Args, Debug)]
pub struct SetValuesArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Effect to update.
    #[arg(long, short = 'e')]
    pub effect: u8,
    /// Values to write as `id=value`.
    #[arg(required = true, value_name = "ID=VALUE")]
    pub entries: Vec<Entry>,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Effect id to store the blob under.
    #[arg(long, short = 'e')]
    pub effect: u16,
    /// Effect blob to upload.
    #[arg(long, short = 'f')]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

/// Open and configure the device described by `args`.
pub fn connect(ctx: Context, args: &DeviceArgs) -> CliResult<Context> {
    let line = args.line_config()?;
    let mut ctx = ctx;
    ctx.open(&args.path)
        .map_err(|err| context_error(&format!("open {} failed", args.path), err))?;
    ctx.set_config(line)
        .map_err(|err| context_error("configure failed", err))?;
    debug!(path = %args.path, %line, "device ready");
    Ok(ctx)
}

/// Send one acknowledged command and report it.
pub fn run_command(args: &DeviceArgs, msg: &Message, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.timeout()?;
    let mut ctx = connect(Context::new(), args)?;
    let kind = msg
        .kind()
        .ok_or_else(|| CliError::new(crate::exit::INTERNAL, "empty command"))?;
    ctx.command(msg, timeout)
        .map_err(|err| context_error(&format!("{kind} failed"), err))?;
    print_ack(kind, format);
    Ok(SUCCESS)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
