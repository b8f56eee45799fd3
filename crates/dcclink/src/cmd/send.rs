use std::fs;
use std::time::Duration;

use dcclink_relay::connect;

use crate::cmd::SendArgs;
use crate::exit::{relay_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let mut client =
        connect(args.addr.as_str(), timeout).map_err(|err| relay_error("connect failed", err))?;
    client
        .send(&payload)
        .map_err(|err| relay_error("send failed", err))?;

    if args.wait {
        let reply = client
            .recv_until(payload.len().max(1), wait_timeout)
            .map_err(|err| relay_error("receive failed", err))?;
        if reply.is_empty() {
            return Err(CliError::new(
                TIMEOUT,
                format!("no reply within {}ms", wait_timeout.as_millis()),
            ));
        }
        print_reply(&reply, &args.addr, format);
    }

    client.close();
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Err(CliError::new(USAGE, "one of --data or --file is required"))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
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
