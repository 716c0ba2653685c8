mod equivs;
mod trace;

pub use equivs::Equivs;
pub use trace::{AigerInitAdaptor, FrameSplitAdaptor, Trace, TraceAdaptor};

use crate::cir::{Cir, Gate, Sig};
use giputils::hash::GHashMap;
use log::info;
use std::ops::Index;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PropStatus {
    Unknown,
    Proved,
    Falsified,
    /// Deselected by `sel_safe`/`sel_live`; engines skip it, the result
    /// writer reports it as unknown.
    Skipped,
}

/// Safety property. `sig` lives in `main` and is the *good* polarity: the
/// property is falsified in a state where `sig` is false.
#[derive(Clone, Debug)]
pub struct SafeProp {
    pub sig: Sig,
    pub stat: PropStatus,
    pub cex: Option<usize>,
}

/// Liveness property: a counter-example is an infinite run visiting every
/// signal in `sigs` infinitely often. Fairness embedding collapses `sigs`
/// to a single accept signal.
#[derive(Clone, Debug)]
pub struct LiveProp {
    pub sigs: Vec<Sig>,
    pub stat: PropStatus,
    pub cex: Option<usize>,
}

#[derive(Clone, Copy, Debug)]
pub struct FlopDef {
    pub init: Sig,
    pub next: Sig,
}

/// Ordered flop table. The k-th flop owns the k-th AIGER latch slot; `init`
/// signals live in the `init` arena, `next` signals in `main`.
#[derive(Clone, Default, Debug)]
pub struct Flops {
    gates: Vec<Gate>,
    defs: GHashMap<Gate, FlopDef>,
}

impl Flops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flop with a zero-initialised state.
    pub fn define(&mut self, g: Gate, next: Sig) {
        self.define_init(g, next, Sig::FALSE);
    }

    pub fn define_init(&mut self, g: Gate, next: Sig, init: Sig) {
        debug_assert!(!self.defs.contains_key(&g));
        self.gates.push(g);
        self.defs.insert(g, FlopDef { init, next });
    }

    #[inline]
    pub fn next(&self, g: Gate) -> Sig {
        self.defs[&g].next
    }

    #[inline]
    pub fn init(&self, g: Gate) -> Sig {
        self.defs[&g].init
    }

    pub fn set_init(&mut self, g: Gate, init: Sig) {
        self.defs.get_mut(&g).unwrap().init = init;
    }

    #[inline]
    pub fn is_flop(&self, g: Gate) -> bool {
        self.defs.contains_key(&g)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Gate> + '_ {
        self.gates.iter().copied()
    }
}

impl Index<usize> for Flops {
    type Output = Gate;

    #[inline]
    fn index(&self, i: usize) -> &Gate {
        &self.gates[i]
    }
}

/// A sequential circuit under verification: the combinational initial
/// circuit, the next-state function, the flop table, and everything the
/// engines accumulate around them (properties, traces, constraints,
/// trace adaptors).
#[derive(Default)]
pub struct SeqCirc {
    pub init: Cir,
    pub main: Cir,
    pub flops: Flops,
    pub safe_props: Vec<SafeProp>,
    pub live_props: Vec<LiveProp>,
    pub fairs: Vec<Sig>,
    /// AIGER outputs stashed when explicit bad-state properties exist; see
    /// `extract_safety`.
    pub outputs: Vec<Sig>,
    pub cnstrs: Equivs,
    pub traces: Vec<Trace>,
    /// Original AIGER input/latch counts, fixed at read time; witness
    /// emission is padded to these widths even after reductions.
    pub num_aiger_inputs: u32,
    pub num_aiger_latches: u32,
    adaptors: Vec<TraceAdaptor>,
}

impl SeqCirc {
    pub fn new() -> Self {
        Self {
            init: Cir::new(),
            main: Cir::new(),
            ..Default::default()
        }
    }

    pub fn new_safe_prop(&mut self, sig: Sig) -> usize {
        self.safe_props.push(SafeProp {
            sig,
            stat: PropStatus::Unknown,
            cex: None,
        });
        self.safe_props.len() - 1
    }

    pub fn new_live_prop(&mut self, sigs: Vec<Sig>) -> usize {
        self.live_props.push(LiveProp {
            sigs,
            stat: PropStatus::Unknown,
            cex: None,
        });
        self.live_props.len() - 1
    }

    pub fn new_trace(&mut self, trace: Trace) -> usize {
        self.traces.push(trace);
        self.traces.len() - 1
    }

    /// Install a trace adaptor at the head of the chain. `adapt` applies the
    /// most recently installed patcher first, undoing transformations in
    /// reverse order.
    pub fn push_adaptor(&mut self, adaptor: TraceAdaptor) {
        self.adaptors.push(adaptor);
    }

    pub fn adapt(&self, frames: &mut Vec<Vec<Option<bool>>>) {
        for a in self.adaptors.iter().rev() {
            a.patch(frames);
        }
    }

    /// Keep only safety property `i`; the rest go from Unknown to Skipped.
    pub fn sel_safe(&mut self, i: usize) {
        assert!(i < self.safe_props.len(), "no safety property {i}");
        for (j, p) in self.safe_props.iter_mut().enumerate() {
            if j != i && p.stat == PropStatus::Unknown {
                p.stat = PropStatus::Skipped;
            }
        }
        for p in self.live_props.iter_mut() {
            if p.stat == PropStatus::Unknown {
                p.stat = PropStatus::Skipped;
            }
        }
    }

    pub fn sel_live(&mut self, i: usize) {
        assert!(i < self.live_props.len(), "no liveness property {i}");
        for (j, p) in self.live_props.iter_mut().enumerate() {
            if j != i && p.stat == PropStatus::Unknown {
                p.stat = PropStatus::Skipped;
            }
        }
        for p in self.safe_props.iter_mut() {
            if p.stat == PropStatus::Unknown {
                p.stat = PropStatus::Skipped;
            }
        }
    }

    pub fn num_unknown_safe(&self) -> usize {
        self.safe_props
            .iter()
            .filter(|p| p.stat == PropStatus::Unknown)
            .count()
    }

    pub fn num_unknown_live(&self) -> usize {
        self.live_props
            .iter()
            .filter(|p| p.stat == PropStatus::Unknown)
            .count()
    }

    pub fn stats(&self) {
        info!(
            "circuit: {} gates ({} ands), {} inputs, {} flops, init {} gates",
            self.main.num_gates(),
            self.main.num_ands(),
            self.main.inputs().len() - self.flops.len(),
            self.flops.len(),
            self.init.num_gates(),
        );
        info!(
            "properties: {} safety, {} liveness, {} fairness signals, {} constraint classes",
            self.safe_props.len(),
            self.live_props.len(),
            self.fairs.len(),
            self.cnstrs.num_classes(),
        );
    }

    pub fn print_results(&self) {
        for (i, p) in self.safe_props.iter().enumerate() {
            info!("safety property {i}: {:?}", p.stat);
        }
        for (i, p) in self.live_props.iter().enumerate() {
            info!("liveness property {i}: {:?}", p.stat);
        }
    }
}
