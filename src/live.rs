use crate::bmc::{assert_cnstrs, gate_frames};
use crate::cir::{GMap, Sig};
use crate::clausify::Clausify;
use crate::seqcirc::{PropStatus, SeqCirc, Trace};
use crate::unroll::UnrollCirc;
use giputils::hash::GHashMap;
use log::info;
use logicrs::satif::Satif;

/// Rewrite every unresolved liveness property into a single-signal one.
///
/// The standard embedding gives each trigger a memory flop that latches
/// once its signal has been seen; `accept` fires when all have been seen
/// since the last reset, and an extra input lets the solver choose when to
/// reset. The stable-live embedding instead waits for a nondeterministic
/// challenge and accepts when every trigger holds and can no longer break.
/// Afterwards the global fairness list is folded in and cleared.
pub fn embed_fairness(sc: &mut SeqCirc, stable_live: bool) {
    info!("embedding fairness constraints");
    for i in 0..sc.live_props.len() {
        if sc.live_props[i].stat != PropStatus::Unknown {
            continue;
        }
        let mut fairs = sc.fairs.clone();
        fairs.extend(sc.live_props[i].sigs.iter().copied());
        let n = fairs.len();
        info!("joining {n} triggers for liveness property {i}");

        let accept;
        if stable_live {
            // TODO: add a reset signal so that counter-examples can be
            // found too, not only proofs
            let challenge = sc.main.input();
            let pre_challenged = sc.main.input();
            let challenged = sc.main.or(challenge, pre_challenged);
            sc.flops.define(pre_challenged.gate(), challenged);

            let mut stable_justs = Vec::new();
            for &f in fairs.iter() {
                let pre_broken = sc.main.input();
                let miss = sc.main.and(!f, challenged);
                let broken = sc.main.or(miss, pre_broken);
                sc.flops.define(pre_broken.gate(), broken);

                let holds = sc.main.and(f, !broken);
                stable_justs.push(sc.main.and(challenged, holds));
            }
            accept = sc.main.ands(stable_justs);
        } else if n != 1 {
            // also covers n == 0, where accept collapses to true
            let flops: Vec<Sig> = (0..n).map(|_| sc.main.input()).collect();
            let mut triggers = Vec::new();
            let mut acc = Sig::TRUE;
            for (&f, &m) in fairs.iter().zip(flops.iter()) {
                let t = sc.main.or(f, m);
                triggers.push(t);
                acc = sc.main.and(acc, t);
            }
            let extra = sc.main.input();
            let reset = sc.main.or(extra, acc);
            for (&m, &t) in flops.iter().zip(triggers.iter()) {
                let next = sc.main.and(!reset, t);
                sc.flops.define(m.gate(), next);
            }
            accept = acc;
        } else {
            accept = fairs[0];
        }

        sc.live_props[i].sigs = vec![accept];
    }
    sc.fairs.clear();
}

/// Lasso-search BMC for embedded liveness properties: at depth k, ask the
/// solver for an earlier frame with an identical flop frontier and an
/// accept inside the loop. Only falsifies; absence of a lasso up to
/// `stop_cycle` leaves the property Unknown.
pub fn check_liveness(sc: &mut SeqCirc, stop_cycle: usize) {
    let mut solver = cadical::Solver::new();
    let mut cl = Clausify::new();
    let mut unroll = UnrollCirc::new(sc, true);
    let mut umap = GMap::new();
    // flop frontier at the start of each cycle, and per property the
    // unrolled accept signal of each cycle
    let mut states: Vec<Vec<Sig>> = vec![unroll.frontier().to_vec()];
    let mut accepts: Vec<Vec<Sig>> = vec![Vec::new(); sc.live_props.len()];

    for i in 0..stop_cycle {
        unroll.step(sc, &mut umap);
        assert_cnstrs(sc, &mut cl, &mut solver, &unroll.ucir, &umap);
        states.push(unroll.frontier().to_vec());
        for (j, p) in sc.live_props.iter().enumerate() {
            if p.stat == PropStatus::Unknown {
                debug_assert_eq!(p.sigs.len(), 1, "liveness property not embedded");
                accepts[j].push(umap.sig(p.sigs[0]));
            }
        }
        info!("liveness bmc depth: {i}");
        let mut unresolved = 0usize;
        for j in 0..sc.live_props.len() {
            if sc.live_props[j].stat != PropStatus::Unknown {
                continue;
            }
            // loop candidates: state l equals state i+1, accept somewhere
            // in cycles l..=i
            let mut cands = Vec::new();
            let mut acc_suffix = Sig::FALSE;
            for l in (0..=i).rev() {
                acc_suffix = unroll.ucir.or(acc_suffix, accepts[j][l]);
                let eq = {
                    let pairs: Vec<Sig> = states[l]
                        .iter()
                        .zip(states[i + 1].iter())
                        .map(|(&a, &b)| unroll.ucir.xnor(a, b))
                        .collect();
                    unroll.ucir.ands(pairs)
                };
                cands.push((l, unroll.ucir.and(eq, acc_suffix)));
            }
            let lasso = unroll.ucir.ors(cands.iter().map(|&(_, c)| c));
            let llit = cl.clausify_assume(&unroll.ucir, &mut solver, lasso);
            if solver.solve(&[llit]) {
                let mut scratch = GHashMap::new();
                // earliest frame whose loop candidate holds in the model
                let looped = cands
                    .iter()
                    .rev()
                    .find(|&&(_, c)| {
                        cl.model_value(&unroll.ucir, &solver, c, &mut scratch) == Some(true)
                    })
                    .map(|&(l, _)| l)
                    .unwrap_or(0);
                let mut frames = gate_frames(&cl, &solver, &unroll.frames);
                sc.adapt(&mut frames);
                let mut trace = Trace::new(frames);
                // frame 0 is the initial state; cycle l's inputs sit at
                // index l + 1
                trace.loop_frame = Some(looped + 1);
                let cex = sc.new_trace(trace);
                let p = &mut sc.live_props[j];
                p.stat = PropStatus::Falsified;
                p.cex = Some(cex);
                info!(
                    "liveness property {j} falsified in depth {i}, lasso from frame {}",
                    looped + 1
                );
            } else {
                unresolved += 1;
            }
        }
        if unresolved == 0 {
            break;
        }
    }
    info!(
        "liveness bmc done, {} properties left unresolved",
        sc.num_unknown_live()
    );
}
