use firegrid_board::{BoardDecoder, DecoderConfig};
use firegrid_transport::DatagramSocket;
use tracing::{info, warn};

use crate::cmd::SendArgs;
use crate::exit::{decode_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let payload = args.input.read()?;
    check(&payload, args.unchecked)?;

    let socket = DatagramSocket::unbound().map_err(|err| transport_error("socket failed", err))?;
    if payload.len() > socket.max_datagram() {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "message is {} bytes, bridge accepts at most {}",
                payload.len(),
                socket.max_datagram()
            ),
        ));
    }

    let sent = socket
        .send_to(&payload, args.addr.as_str())
        .map_err(|err| transport_error("send failed", err))?;
    info!(addr = %args.addr, bytes = sent, "board sent");

    Ok(SUCCESS)
}

fn check(payload: &[u8], unchecked: bool) -> CliResult<()> {
    match BoardDecoder::new(DecoderConfig::default()).parse(payload) {
        Ok(_) => Ok(()),
        Err(err) if unchecked => {
            warn!(%err, "sending board that will be rejected");
            Ok(())
        }
        Err(err) => Err(decode_error("invalid board", err)),
    }
}
