use crate::bmc::BmcVersion;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "SAT-based sequential hardware model checker for AIGER circuits"
)]
pub struct Config {
    /// model in plain or gzipped aiger
    pub model: PathBuf,

    /// result output file
    pub result: Option<PathBuf>,

    /// bmc variant: 0 basic, 1 simplifying, 2 simplifying-v2
    #[arg(long = "bv", default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=2))]
    pub bv: u32,

    /// maximal depth of unrolling
    #[arg(long)]
    pub k: Option<usize>,

    /// check only this safety property
    #[arg(long)]
    pub safe: Option<usize>,

    /// check only this liveness property
    #[arg(long)]
    pub live: Option<usize>,

    /// liveness sub-algorithm: 1 selects the stable-live embedding
    #[arg(long, default_value_t = 0)]
    pub kind: usize,

    /// verbosity level
    #[arg(long = "verb", default_value_t = 1, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub verb: u32,

    /// semantic constraint extraction: 0 off, 1 minimize, 2 sequential
    #[arg(long = "sce", default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=2))]
    pub sce: u32,

    /// initial cone-of-influence reduction
    #[arg(long = "coif", action = ArgAction::Set, default_value_t = true)]
    pub coif: bool,

    /// temporal decomposition
    #[arg(long = "td", action = ArgAction::Set, default_value_t = false)]
    pub td: bool,

    /// extract extra safety properties from outputs
    #[arg(long = "xsafe", action = ArgAction::Set, default_value_t = false)]
    pub xsafe: bool,

    /// top-level engine
    #[arg(long = "alg", value_enum, default_value = "bmc")]
    pub alg: Alg,

    /// use exit() in the signal handler to help profilers
    #[arg(long = "prof", action = ArgAction::Set, default_value_t = false)]
    pub prof: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alg {
    /// bounded model checking of safety properties
    Bmc,
    /// lasso-search bounded checking of liveness properties
    Live,
}

impl Config {
    pub fn bmc_version(&self) -> BmcVersion {
        match self.bv {
            0 => BmcVersion::Basic,
            1 => BmcVersion::Simp,
            _ => BmcVersion::Simp2,
        }
    }

    pub fn stop_cycle(&self) -> usize {
        self.k.unwrap_or(usize::MAX)
    }
}
