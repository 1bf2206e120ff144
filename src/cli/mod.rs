mod add;
mod apikey;
pub mod server;
mod show;
mod stats;

pub use add::*;
pub use apikey::*;
pub use server::*;
pub use show::*;
pub use stats::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
