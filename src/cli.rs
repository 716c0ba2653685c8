use crate::config::{Alg, Config};
use crate::seqcirc::{PropStatus, SeqCirc};
use crate::{live, reduce, sce};
use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

// set once before the handler is installed, never mutated again
static USE_BAD_EXIT: AtomicBool = AtomicBool::new(false);

fn install_signal_handler() {
    let _ = ctrlc::set_handler(|| {
        println!();
        println!("*** INTERRUPTED***");
        let _ = std::io::stdout().flush();
        if USE_BAD_EXIT.load(Ordering::Relaxed) {
            println!("*** WARNING: calling exit() in signal handler, may dead-lock");
            std::process::exit(1);
        }
        // the solver may be mid-allocation; skip allocator teardown
        unsafe { libc::_exit(1) }
    });
}

fn logger_init(verb: u32) {
    let mut builder = if std::env::var("RUST_LOG").is_ok() {
        env_logger::Builder::from_default_env()
    } else {
        let level = match verb {
            0 => LevelFilter::Error,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        let mut b = env_logger::Builder::new();
        b.filter_level(level);
        b
    };
    builder.format_timestamp(None).format_target(false).init();
}

fn mark_proved(sc: &mut SeqCirc) {
    for p in sc.safe_props.iter_mut() {
        if p.stat == PropStatus::Unknown {
            p.stat = PropStatus::Proved;
        }
    }
    for p in sc.live_props.iter_mut() {
        if p.stat == PropStatus::Unknown {
            p.stat = PropStatus::Proved;
        }
    }
}

pub fn cli_main() -> Result<()> {
    let cfg = Config::parse();
    logger_init(cfg.verb);
    USE_BAD_EXIT.store(cfg.prof, Ordering::Relaxed);
    install_signal_handler();

    info!("checking {}", cfg.model.display());
    let mut sc = SeqCirc::read_aiger(&cfg.model)?;
    sc.stats();

    if cfg.xsafe {
        reduce::extract_safety(&mut sc);
    }

    live::embed_fairness(&mut sc, cfg.kind == 1);
    sc.stats();

    if let Some(i) = cfg.safe {
        sc.sel_safe(i);
    }
    if let Some(i) = cfg.live {
        sc.sel_live(i);
    }

    if cfg.coif {
        reduce::remove_unused(&mut sc);
        sc.stats();
    }

    if cfg.sce > 0 {
        sce::sce(&mut sc, cfg.sce == 1, false);
        sc.stats();
        if sc.cnstrs.inconsistent() {
            info!("constraints inconsistent: every unresolved property holds");
            mark_proved(&mut sc);
        } else {
            reduce::substitute_constraints(&mut sc);
            reduce::remove_unused(&mut sc);
            sc.stats();
        }
    }

    if cfg.td {
        reduce::temporal_decomposition(&mut sc);
        sc.stats();
    }

    match cfg.alg {
        Alg::Bmc => sc.bmc(0, cfg.stop_cycle(), cfg.bmc_version()),
        Alg::Live => live::check_liveness(&mut sc, cfg.stop_cycle()),
    }

    sc.print_results();

    if let Some(res) = &cfg.result {
        let mut f = std::fs::File::create(res)
            .with_context(|| format!("cannot open results file {}", res.display()))?;
        sc.write_results_aiger(&mut f)?;
    }
    Ok(())
}
