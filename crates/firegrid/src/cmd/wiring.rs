use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_wiring, OutputFormat};

pub fn run(format: OutputFormat) -> CliResult<i32> {
    print_wiring(format);
    Ok(SUCCESS)
}
