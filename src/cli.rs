use crate::apply;

#[derive(Clone, Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(subcommand)]
  pub command: CommandKind,
}

#[derive(Clone, Debug, clap::Subcommand)]
#[command(about)]
pub enum CommandKind {
  /// Apply an IPS or UPS patch to a ROM.
  Apply(apply::Args),
}
