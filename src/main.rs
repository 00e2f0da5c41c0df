use std::io::Read;
use std::process::ExitCode;

use log::{debug, error, info};
use sml_codec::sml::boxing;
use sml_codec::{Reader, SmlConfig};

/// Read a hex dump from the first argument or stdin. Whitespace is ignored.
fn read_input() -> Result<Vec<u8>, String> {
    let text = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("unable to read stdin: {e}"))?;
            text
        }
    };

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|e| format!("invalid hex input: {e}"))
}

fn main() -> ExitCode {
    let default_filter = std::env::var("SML_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match SmlConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let data = match read_input() {
        Ok(data) => data,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!("Read {} bytes of input", data.len());

    let messages = match boxing::unboxing(&data, config.framing.verify_crc) {
        Ok(messages) => messages,
        Err(e) => {
            error!("Unable to decode SML file: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Decoded {} SML messages", messages.len());

    /* a broken message is reported and skipped, the rest of the file is still read */
    let mut reader = Reader::new(&config.reader);
    let mut failed = 0;
    for message in &messages {
        match reader.read_message(message) {
            Ok(readout) => println!("{}", readout.to_json()),
            Err(e) => {
                error!("Skipping message: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
