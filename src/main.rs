use miette::Diagnostic;
use std::process;
use thiserror::Error;

mod apply;
mod cli;
mod log;

fn main() -> process::ExitCode {
  use cli::CommandKind::*;

  log::init();
  let result = <cli::Args as clap::Parser>::try_parse()
    .map_err(Error::from)
    .and_then(|args| match args.command {
      Apply(args) => args.call().map_err(Error::from),
    });
  match result {
    Ok(()) => process::ExitCode::SUCCESS,
    Err(Error::CliError(err)) => {
      // clap formats its own help and usage output.
      let _ = err.print();
      process::ExitCode::from(if err.use_stderr() { 1 } else { 0 })
    }
    Err(err) => {
      let code = err.exit_code();
      eprintln!("{:?}", miette::Report::new(err));
      process::ExitCode::from(code)
    }
  }
}

#[non_exhaustive]
#[derive(Debug, Error, Diagnostic)]
enum Error {
  #[error(transparent)]
  CliError(#[from] clap::error::Error),
  #[error(transparent)]
  #[diagnostic(transparent)]
  ApplyPatchError(#[from] apply::Error),
}

impl Error {
  fn exit_code(&self) -> u8 {
    use apply::ErrorKind as K;
    match self {
      Error::CliError(_) => 1,
      Error::ApplyPatchError(err) => match err.get_kind() {
        K::IOError => 2,
        K::NoPatchFound => 3,
        K::Corrupt => 4,
        K::Capacity => 5,
        K::WrongInputFile => 6,
      },
    }
  }
}
