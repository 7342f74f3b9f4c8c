use firegrid_board::{BoardDecoder, BoardSource, Decoded, DecoderConfig};
use firegrid_bridge::Dispatch;
use tracing::debug;

use crate::cmd::serve::checksum_mode;
use crate::cmd::EncodeArgs;
use crate::exit::{decode_error, CliResult, SUCCESS};
use crate::output::{print_dispatch, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = args.input.read()?;
    let dispatch = encode(&raw, &args)?;
    debug!(framed = %dispatch.framed_hex(), "encoded board");
    print_dispatch(&dispatch, format);
    Ok(SUCCESS)
}

/// Validate and frame one message exactly as the bridge would for a live
/// board. Idle substitution never applies to a single message.
fn encode(raw: &[u8], args: &EncodeArgs) -> CliResult<Dispatch> {
    let decoder = BoardDecoder::new(DecoderConfig {
        supports_victory_flag: !args.no_victory,
        supports_interstitials: false,
        ..DecoderConfig::default()
    });
    let board = decoder
        .parse(raw)
        .map_err(|err| decode_error("invalid board", err))?;

    let decoded = Decoded {
        board,
        source: BoardSource::Live,
    };
    Ok(Dispatch::build(decoded, checksum_mode(args.escape_checksum)))
}
