use crate::cir::{Cir, GMap, Gate, Sig};
use crate::clausify::Clausify;
use crate::seqcirc::{PropStatus, SeqCirc, Trace};
use crate::unroll::{IFrame, SimpUnroller, UnrollCirc};
use log::{debug, info};
use logicrs::{Lit, Var, satif::Satif};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BmcVersion {
    Basic,
    Simp,
    Simp2,
}

/// Bind every constraint class in this frame of the unrolled arena; class
/// members collapse onto their representative's literal, constants become
/// unit clauses.
pub(crate) fn assert_cnstrs<S: Satif + ?Sized>(
    sc: &SeqCirc,
    cl: &mut Clausify,
    solver: &mut S,
    ucir: &Cir,
    umap: &GMap<Sig>,
) {
    for class in sc.cnstrs.classes() {
        let rep = cl.clausify(ucir, solver, umap.sig(class[0]));
        for &m in &class[1..] {
            cl.clausify_as(ucir, solver, umap.sig(m), rep);
        }
    }
}

pub(crate) fn gate_frames<S: Satif + ?Sized>(
    cl: &Clausify,
    solver: &S,
    frames: &[IFrame],
) -> Vec<Vec<Option<bool>>> {
    frames
        .iter()
        .map(|f| {
            f.iter()
                .map(|&g| {
                    if g == Gate::UNDEF {
                        None
                    } else {
                        cl.lookup(g.sig()).and_then(|l| solver.sat_value(l))
                    }
                })
                .collect()
        })
        .collect()
}

fn lit_frames<S: Satif + ?Sized>(solver: &S, frames: &[Vec<Option<Lit>>]) -> Vec<Vec<Option<bool>>> {
    frames
        .iter()
        .map(|f| {
            f.iter()
                .map(|l| l.and_then(|l| solver.sat_value(l)))
                .collect()
        })
        .collect()
}

fn falsify(sc: &mut SeqCirc, prop: usize, mut frames: Vec<Vec<Option<bool>>>, depth: usize) {
    sc.adapt(&mut frames);
    let cex = sc.new_trace(Trace::new(frames));
    let p = &mut sc.safe_props[prop];
    p.stat = PropStatus::Falsified;
    p.cex = Some(cex);
    info!("safety property {prop} falsified in depth {depth}, trace {cex}");
}

/// Plain-solver BMC: one clausifier over the growing unrolled arena, no
/// simplification between cycles.
pub fn basic_bmc(sc: &mut SeqCirc, begin_cycle: usize, stop_cycle: usize) {
    let mut solver = cadical::Solver::new();
    let mut cl = Clausify::new();
    let mut unroll = UnrollCirc::new(sc, true);
    let mut umap = GMap::new();
    for i in 0..stop_cycle {
        unroll.step(sc, &mut umap);
        assert_cnstrs(sc, &mut cl, &mut solver, &unroll.ucir, &umap);
        if i < begin_cycle {
            continue;
        }
        info!("bmc depth: {i}");
        let mut unresolved = 0usize;
        for j in 0..sc.safe_props.len() {
            if sc.safe_props[j].stat != PropStatus::Unknown {
                continue;
            }
            let psig = umap.sig(sc.safe_props[j].sig);
            let bad = cl.clausify_assume(&unroll.ucir, &mut solver, !psig);
            if solver.solve(&[bad]) {
                let frames = gate_frames(&cl, &solver, &unroll.frames);
                falsify(sc, j, frames, i);
            } else {
                unresolved += 1;
            }
        }
        if unresolved == 0 {
            break;
        }
    }
    info!(
        "bmc done, {} safety properties left unresolved",
        sc.num_unknown_safe()
    );
}

/// BMC over a preprocessing solver, eliminating variables between cycles.
/// The unroller freezes the flop frontier and the cycle's property
/// literals; everything else is fair game for the preprocessor.
pub fn simp_bmc(sc: &mut SeqCirc, begin_cycle: usize, stop_cycle: usize) {
    let mut solver = cadical::Solver::new();
    let mut unroll = SimpUnroller::new(sc, &mut solver);
    for i in 0..stop_cycle {
        unroll.step(sc, &mut solver);
        if i < begin_cycle {
            continue;
        }
        if let Some(false) = solver.simplify() {
            debug!("unrolling simplified to unsat in depth {i}");
        }
        info!("bmc depth: {i}");
        let mut unresolved = 0usize;
        for (j, bad) in unroll.bad_lits().to_vec() {
            if sc.safe_props[j].stat != PropStatus::Unknown {
                continue;
            }
            if solver.solve(&[bad]) {
                let frames = lit_frames(&solver, &unroll.frames);
                falsify(sc, j, frames, i);
            } else {
                unresolved += 1;
            }
        }
        unroll.thaw_props(&mut solver);
        if unresolved == 0 {
            break;
        }
    }
    info!(
        "bmc done, {} safety properties left unresolved",
        sc.num_unknown_safe()
    );
}

/// Second simplifying variant: the arena unroller feeds a preprocessing
/// solver, so circuit-level sharing and CNF-level elimination compose.
pub fn simp_bmc2(sc: &mut SeqCirc, begin_cycle: usize, stop_cycle: usize) {
    let mut solver = cadical::Solver::new();
    let mut cl = Clausify::new();
    let mut unroll = UnrollCirc::new(sc, true);
    let mut umap = GMap::new();
    let mut front_frozen: Vec<Var> = Vec::new();
    for i in 0..stop_cycle {
        unroll.step(sc, &mut umap);
        assert_cnstrs(sc, &mut cl, &mut solver, &unroll.ucir, &umap);
        let mut new_frozen = Vec::new();
        for &s in unroll.frontier() {
            let l = cl.clausify(&unroll.ucir, &mut solver, s);
            solver.set_frozen(l.var(), true);
            new_frozen.push(l.var());
        }
        let mut bad_lits = Vec::new();
        for j in 0..sc.safe_props.len() {
            if sc.safe_props[j].stat != PropStatus::Unknown {
                continue;
            }
            let psig = umap.sig(sc.safe_props[j].sig);
            let bad = cl.clausify_assume(&unroll.ucir, &mut solver, !psig);
            solver.set_frozen(bad.var(), true);
            bad_lits.push((j, bad));
        }
        for v in front_frozen.drain(..) {
            solver.set_frozen(v, false);
        }
        front_frozen = new_frozen;
        if i < begin_cycle {
            for (_, bad) in bad_lits {
                solver.set_frozen(bad.var(), false);
            }
            continue;
        }
        if let Some(false) = solver.simplify() {
            debug!("unrolling simplified to unsat in depth {i}");
        }
        info!("bmc depth: {i}");
        let mut unresolved = 0usize;
        for &(j, bad) in bad_lits.iter() {
            if sc.safe_props[j].stat != PropStatus::Unknown {
                continue;
            }
            if solver.solve(&[bad]) {
                let frames = gate_frames(&cl, &solver, &unroll.frames);
                falsify(sc, j, frames, i);
            } else {
                unresolved += 1;
            }
        }
        for (_, bad) in bad_lits {
            solver.set_frozen(bad.var(), false);
        }
        if unresolved == 0 {
            break;
        }
    }
    info!(
        "bmc done, {} safety properties left unresolved",
        sc.num_unknown_safe()
    );
}

impl SeqCirc {
    pub fn bmc(&mut self, begin_cycle: usize, stop_cycle: usize, ver: BmcVersion) {
        match ver {
            BmcVersion::Basic => basic_bmc(self, begin_cycle, stop_cycle),
            BmcVersion::Simp => simp_bmc(self, begin_cycle, stop_cycle),
            BmcVersion::Simp2 => simp_bmc2(self, begin_cycle, stop_cycle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // flop.init = 0, flop.next = flop ^ input0, safety !flop
    fn toggle_unsafe() -> SeqCirc {
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        let i = sc.main.numbered_input(0);
        let next = sc.main.xnor(f, !i);
        sc.flops.define(f.gate(), next);
        sc.new_safe_prop(!f);
        sc.num_aiger_inputs = 1;
        sc.num_aiger_latches = 1;
        sc
    }

    // flop.init = 0, flop.next = flop, safety !flop
    fn hold_safe() -> SeqCirc {
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        sc.main.numbered_input(0);
        sc.flops.define(f.gate(), f);
        sc.new_safe_prop(!f);
        sc
    }

    fn check_falsified_toggle(sc: &SeqCirc) {
        let p = &sc.safe_props[0];
        assert_eq!(p.stat, PropStatus::Falsified);
        let t = &sc.traces[p.cex.unwrap()];
        // init frame plus two input frames; the first cycle sets the flop
        assert_eq!(t.frames.len(), 3);
        assert_eq!(t.frames[1], vec![Some(true)]);
    }

    #[test]
    fn basic_bmc_falsifies_the_toggle() {
        let mut sc = toggle_unsafe();
        basic_bmc(&mut sc, 0, 2);
        check_falsified_toggle(&sc);
    }

    #[test]
    fn simp_bmc_agrees_with_basic() {
        let mut sc = toggle_unsafe();
        simp_bmc(&mut sc, 0, 2);
        check_falsified_toggle(&sc);
        let mut sc = toggle_unsafe();
        simp_bmc2(&mut sc, 0, 2);
        check_falsified_toggle(&sc);
    }

    #[test]
    fn safe_circuit_stays_unknown() {
        for ver in [BmcVersion::Basic, BmcVersion::Simp, BmcVersion::Simp2] {
            let mut sc = hold_safe();
            sc.bmc(0, 8, ver);
            assert_eq!(sc.safe_props[0].stat, PropStatus::Unknown);
        }
    }

    #[test]
    fn constraints_prune_counter_examples() {
        // the constraint input0 == false removes the only falsifying path
        let mut sc = toggle_unsafe();
        let i = sc.main.inputs()[1];
        sc.cnstrs.merge(i.sig(), Sig::FALSE);
        basic_bmc(&mut sc, 0, 8);
        assert_eq!(sc.safe_props[0].stat, PropStatus::Unknown);
    }

    #[test]
    fn begin_cycle_skips_early_tests() {
        let mut sc = toggle_unsafe();
        basic_bmc(&mut sc, 3, 5);
        let p = &sc.safe_props[0];
        assert_eq!(p.stat, PropStatus::Falsified);
        // first test only at cycle 3: init frame plus four input frames
        assert_eq!(sc.traces[p.cex.unwrap()].frames.len(), 5);
    }
}
