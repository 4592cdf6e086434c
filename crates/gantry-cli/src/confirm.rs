//! Confirmation prompts for destructive commands.

use std::io::{BufRead, Write};

use crate::error::CliError;

/// Ask `prompt [y/N]` and read one answer line.
///
/// Only `y`/`yes` (any case) confirm. Anything else, including end of
/// input, declines with [`CliError::Cancelled`].
pub fn confirm<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> Result<(), CliError> {
    write!(output, "{prompt} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        _ => Err(CliError::Cancelled),
    }
}

/// Confirm unless `assume_yes` is set.
pub fn confirm_unless<R: BufRead, W: Write>(
    assume_yes: bool,
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<(), CliError> {
    if assume_yes {
        return Ok(());
    }
    confirm(prompt, input, output)
}
