use crate::cir::{GMap, Sig};
use crate::clausify::Clausify;
use crate::seqcirc::{PropStatus, SeqCirc};
use crate::unroll::UnrollCirc;
use giputils::hash::GHashMap;
use log::{debug, info};
use logicrs::{Lit, satif::Satif};

/// Find a model of `assumps` minimising the number of true literals among
/// `ps`, by iterated solving with blocking clauses. Returns the values of
/// `ps` under the minimum model, or `None` when `assumps` is unsatisfiable.
/// A `trigger` literal lets a caller disable the learned blocking clauses
/// later.
fn solve_minimum<S: Satif + ?Sized>(
    solver: &mut S,
    assumps: &[Lit],
    ps: &[Lit],
    trigger: Option<Lit>,
) -> Option<Vec<Option<bool>>> {
    let mut best = None;
    let mut assume = assumps.to_vec();
    loop {
        let mut a = assume.clone();
        if let Some(t) = trigger {
            a.push(t);
        }
        if !solver.solve(&a) {
            break;
        }
        let model: Vec<Option<bool>> = ps.iter().map(|&p| solver.sat_value(p)).collect();
        assume = assumps.to_vec();
        let mut blocking = Vec::new();
        for (i, &p) in ps.iter().enumerate() {
            if model[i] == Some(false) {
                assume.push(!p);
            } else {
                blocking.push(!p);
            }
        }
        if let Some(t) = trigger {
            blocking.push(!t);
        }
        best = Some(model);
        if blocking.is_empty() {
            // nothing left to minimise
            break;
        }
        solver.add_clause(&blocking);
    }
    best
}

/// Build the shared base-phase SAT instance: the property cones (and, unless
/// `only_coi`, every flop's next-state cone), plus the assertion that some
/// property is falsified. Candidates are the gate polarities true in the
/// first model; returns `None` when no property can be falsified at all.
fn initialize_cands<S: Satif + ?Sized>(
    sc: &SeqCirc,
    solver: &mut S,
    cl: &mut Clausify,
    only_coi: bool,
) -> Option<Vec<Sig>> {
    if !only_coi {
        for f in sc.flops.iter() {
            cl.clausify(&sc.main, solver, sc.flops.next(f));
        }
    }
    let mut some_bad = Vec::new();
    for p in sc.safe_props.iter() {
        if p.stat == PropStatus::Unknown {
            some_bad.push(!cl.clausify(&sc.main, solver, p.sig));
        }
    }
    for p in sc.live_props.iter() {
        if p.stat == PropStatus::Unknown {
            // sound but weaker than what liveness would allow
            for &s in p.sigs.iter() {
                some_bad.push(cl.clausify(&sc.main, solver, s));
            }
        }
    }
    solver.add_clause(&some_bad);

    if !solver.solve(&[]) {
        return None;
    }
    let mut cands = Vec::new();
    let mut n_skipped = 0usize;
    let mut scratch = GHashMap::new();
    for g in sc.main.gates() {
        match cl.model_value(&sc.main, solver, g.sig(), &mut scratch) {
            Some(v) => cands.push(g.sig().not_if(!v)),
            None => n_skipped += 1,
        }
    }
    debug!(
        "[sce] prepared {} initial constraint candidates, skipping {}",
        cands.len(),
        n_skipped
    );
    Some(cands)
}

/// Sequential base refinement: keep a candidate only when it is implied by
/// the some-property-falsified assertion; every refuting model also prunes
/// the other candidates it falsifies.
fn refine_cands_base_seq(sc: &SeqCirc, cands: &mut Vec<Sig>, only_coi: bool) -> bool {
    let mut solver = cadical::Solver::new();
    let mut cl = Clausify::new();
    let Some(init) = initialize_cands(sc, &mut solver, &mut cl, only_coi) else {
        return false;
    };
    *cands = init;
    let mut i = 0;
    while i < cands.len() {
        debug!("[sce] base refinement: {} candidates, at {}", cands.len(), i);
        let refute = cl.clausify_assume(&sc.main, &mut solver, !cands[i]);
        if solver.solve(&[refute]) {
            let dropped = cands[i];
            let mut scratch = GHashMap::new();
            cands.retain(|&c| {
                c != dropped
                    && cl.model_value(&sc.main, &solver, c, &mut scratch) != Some(false)
            });
        } else {
            i += 1;
        }
    }
    debug!("[sce] base refinement kept {} candidates", cands.len());
    true
}

/// Minimize-style base refinement: repeatedly ask for a model with as few
/// true candidates as possible and drop everything false under it.
fn refine_cands_base_min(sc: &SeqCirc, cands: &mut Vec<Sig>, only_coi: bool) -> bool {
    let mut solver = cadical::Solver::new();
    let mut cl = Clausify::exact();
    let Some(init) = initialize_cands(sc, &mut solver, &mut cl, only_coi) else {
        return false;
    };
    *cands = init;
    for class in sc.cnstrs.classes() {
        let rep = cl.clausify(&sc.main, &mut solver, class[0]);
        for &m in &class[1..] {
            cl.clausify_as(&sc.main, &mut solver, m, rep);
        }
    }
    while !cands.is_empty() {
        debug!("[sce] base minimize: {} candidates", cands.len());
        let lits: Vec<Lit> = cands
            .iter()
            .map(|&c| cl.clausify(&sc.main, &mut solver, c))
            .collect();
        let Some(model) = solve_minimum(&mut solver, &[], &lits, None) else {
            break;
        };
        let before = cands.len();
        let mut keep = model.iter().map(|&v| v != Some(false));
        cands.retain(|_| keep.next().unwrap());
        if cands.len() == before {
            break;
        }
    }
    debug!("[sce] base minimize kept {} candidates", cands.len());
    true
}

fn unroll_two_frames(sc: &SeqCirc) -> (UnrollCirc, GMap<Sig>, GMap<Sig>) {
    let mut u = UnrollCirc::new(sc, false);
    let mut umap0 = GMap::new();
    let mut umap1 = GMap::new();
    u.step(sc, &mut umap0);
    u.step(sc, &mut umap1);
    (u, umap0, umap1)
}

/// Step refinement: a surviving candidate may never hold in one state and
/// fail in the successor; refuting models prune in bulk.
fn refine_cands_step_seq(sc: &SeqCirc, cands: &mut Vec<Sig>) {
    let (u, umap0, umap1) = unroll_two_frames(sc);
    let mut solver = cadical::Solver::new();
    let mut cl = Clausify::new();
    // pre-clausify both copies so candidates have defined values in models
    for &c in cands.iter() {
        cl.clausify(&u.ucir, &mut solver, umap0.sig(c));
        cl.clausify(&u.ucir, &mut solver, umap1.sig(c));
    }
    let mut i = 0;
    while i < cands.len() {
        debug!("[sce] step refinement: {} candidates, at {}", cands.len(), i);
        let l0 = cl.lookup(umap0.sig(cands[i])).unwrap();
        let l1 = cl.lookup(umap1.sig(cands[i])).unwrap();
        if solver.solve(&[!l0, l1]) {
            let dropped = cands[i];
            let mut scratch = GHashMap::new();
            cands.retain(|&c| {
                c != dropped && {
                    let v0 = cl.model_value(&u.ucir, &solver, umap0.sig(c), &mut scratch);
                    let v1 = cl.model_value(&u.ucir, &solver, umap1.sig(c), &mut scratch);
                    !(v0 == Some(false) && v1 == Some(true))
                }
            });
        } else {
            i += 1;
        }
    }
    debug!("[sce] step refinement kept {} proper constraints", cands.len());
}

fn refine_cands_step_min(sc: &SeqCirc, cands: &mut Vec<Sig>) {
    let (u, umap0, umap1) = unroll_two_frames(sc);
    let mut solver = cadical::Solver::new();
    let mut cl = Clausify::exact();
    for class in sc.cnstrs.classes() {
        let rep0 = cl.clausify(&u.ucir, &mut solver, umap0.sig(class[0]));
        let rep1 = cl.clausify(&u.ucir, &mut solver, umap1.sig(class[0]));
        for &m in &class[1..] {
            cl.clausify_as(&u.ucir, &mut solver, umap0.sig(m), rep0);
            cl.clausify_as(&u.ucir, &mut solver, umap1.sig(m), rep1);
        }
    }
    while !cands.is_empty() {
        debug!("[sce] step minimize: {} candidates", cands.len());
        // hold every candidate in the second frame, minimise them in the
        // first: survivors of the minimum model are the stable ones
        let mut assumps = Vec::new();
        let mut mins = Vec::new();
        for &c in cands.iter() {
            mins.push(cl.clausify(&u.ucir, &mut solver, umap0.sig(c)));
            assumps.push(cl.clausify(&u.ucir, &mut solver, umap1.sig(c)));
        }
        let Some(model) = solve_minimum(&mut solver, &assumps, &mins, None) else {
            break;
        };
        let before = cands.len();
        let mut keep = model.iter().map(|&v| v != Some(false));
        cands.retain(|_| keep.next().unwrap());
        if cands.len() == before {
            break;
        }
    }
    debug!("[sce] step minimize kept {} proper constraints", cands.len());
}

/// Semantic constraint extraction: infer signal equivalences that hold
/// along every property-falsifying path and merge them into `sc.cnstrs`.
/// When even the base instance is unsatisfiable, every property is
/// combinationally dead; this is signalled by making the constraint
/// relation inconsistent.
pub fn sce(sc: &mut SeqCirc, use_minimize_alg: bool, only_coi: bool) {
    let mut cands = Vec::new();
    let ok = if use_minimize_alg {
        refine_cands_base_min(sc, &mut cands, only_coi)
    } else {
        refine_cands_base_seq(sc, &mut cands, only_coi)
    };
    if !ok {
        info!("all properties combinationally proved, setting constraint true == false");
        sc.cnstrs.merge(Sig::FALSE, Sig::TRUE);
        return;
    }
    if use_minimize_alg {
        refine_cands_step_min(sc, &mut cands);
    } else {
        refine_cands_step_seq(sc, &mut cands);
    }
    for &c in cands.iter() {
        sc.cnstrs.merge(Sig::TRUE, c);
    }
    info!(
        "sce extracted {} constraints in {} classes",
        cands.len(),
        sc.cnstrs.num_classes()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    // f holds its initial zero forever; y == f by construction; a second
    // flop g keeps y inside the clausified next-state logic
    fn held_flop() -> (SeqCirc, Sig, Sig) {
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        let g = sc.main.input();
        let c = sc.main.numbered_input(0);
        let f_or_c = sc.main.or(f, c);
        let y = sc.main.and(f, f_or_c);
        sc.flops.define(f.gate(), f);
        sc.flops.define(g.gate(), y);
        sc.new_safe_prop(!f);
        (sc, f, y)
    }

    #[test]
    fn equal_wires_end_up_in_one_class() {
        for minimize in [true, false] {
            let (mut sc, f, y) = held_flop();
            sce(&mut sc, minimize, false);
            assert!(!sc.cnstrs.inconsistent());
            // every falsifying path keeps f high, and y follows f
            assert_eq!(sc.cnstrs.rep(f), Sig::TRUE);
            assert_eq!(sc.cnstrs.rep(y), Sig::TRUE);
            assert_eq!(sc.cnstrs.rep(f), sc.cnstrs.rep(y));
        }
    }

    #[test]
    fn sce_is_idempotent() {
        let (mut sc, ..) = held_flop();
        sce(&mut sc, true, false);
        let classes: Vec<Vec<Sig>> = sc.cnstrs.classes().map(|c| c.to_vec()).collect();
        sce(&mut sc, true, false);
        let again: Vec<Vec<Sig>> = sc.cnstrs.classes().map(|c| c.to_vec()).collect();
        assert_eq!(classes.len(), again.len());
        for (a, b) in classes.iter().zip(again.iter()) {
            assert_eq!(a[0], b[0]);
        }
    }

    #[test]
    fn dead_properties_poison_the_constraints() {
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        sc.flops.define(f.gate(), f);
        // the bad state is unsatisfiable outright
        sc.new_safe_prop(Sig::TRUE);
        sce(&mut sc, true, false);
        assert!(sc.cnstrs.inconsistent());
    }

    #[test]
    fn extracted_constraints_survive_bmc() {
        // after sce, bmc with the learned constraints still refutes nothing
        let (mut sc, ..) = held_flop();
        sce(&mut sc, false, false);
        crate::bmc::basic_bmc(&mut sc, 0, 6);
        assert_eq!(sc.safe_props[0].stat, PropStatus::Unknown);
    }
}
