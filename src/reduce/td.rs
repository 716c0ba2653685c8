use crate::bmc::{assert_cnstrs, gate_frames};
use crate::cir::{Cir, CirNode, GMap, Gate, Sig, copy_cir};
use crate::clausify::Clausify;
use crate::seqcirc::{FrameSplitAdaptor, PropStatus, SeqCirc, Trace, TraceAdaptor};
use log::info;
use logicrs::satif::Satif;

fn number_space(cir: &Cir) -> u32 {
    cir.inputs()
        .iter()
        .filter_map(|&g| cir.input_number(g))
        .map(|n| n + 1)
        .max()
        .unwrap_or(0)
}

/// Temporal decomposition: peel the first cycle off the front of the
/// circuit. The new init arena is the old one composed with one copy of
/// `main`; the peeled cycle's inputs are renumbered behind the existing
/// frame-0 inputs and a frame-split adaptor restores the original shape.
/// Properties are checked in the peeled frame first, so a depth-0
/// counter-example is reported rather than shifted out of reach.
pub fn temporal_decomposition(sc: &mut SeqCirc) {
    info!("temporal decomposition: peeling one cycle");
    let x_count = number_space(&sc.init);
    let width = number_space(&sc.main);

    let mut peeled = Cir::new();
    let mut imap = GMap::new();
    copy_cir(&sc.init, &mut peeled, &mut imap, None);

    let mut cmap = GMap::with_last(sc.main.last_gate());
    cmap[Sig::TRUE.gate()] = Sig::TRUE;
    for f in sc.flops.iter() {
        cmap[f] = imap.sig(sc.flops.init(f));
    }
    for g in sc.main.gates() {
        if cmap[g] != Sig::UNDEF {
            continue;
        }
        cmap[g] = match sc.main.node(g) {
            CirNode::True => Sig::TRUE,
            CirNode::Input { number } => match number {
                Some(n) => peeled.numbered_input(x_count + n),
                None => peeled.input(),
            },
            CirNode::And(a, b) => {
                let a = cmap.sig(a);
                let b = cmap.sig(b);
                peeled.and(a, b)
            }
        };
    }

    sc.push_adaptor(TraceAdaptor::FrameSplit(FrameSplitAdaptor {
        at: x_count as usize,
        width: width as usize,
    }));

    // depth-0 check in the peeled frame
    let mut solver = cadical::Solver::new();
    let mut cl = Clausify::new();
    assert_cnstrs(sc, &mut cl, &mut solver, &peeled, &cmap);
    for j in 0..sc.safe_props.len() {
        if sc.safe_props[j].stat != PropStatus::Unknown {
            continue;
        }
        let bad = cl.clausify_assume(&peeled, &mut solver, !cmap.sig(sc.safe_props[j].sig));
        if solver.solve(&[bad]) {
            let mut frame = Vec::new();
            for &inp in peeled.inputs() {
                if let Some(n) = peeled.input_number(inp) {
                    if frame.len() <= n as usize {
                        frame.resize(n as usize + 1, Gate::UNDEF);
                    }
                    frame[n as usize] = inp;
                }
            }
            let mut frames = gate_frames(&cl, &solver, &[frame]);
            sc.adapt(&mut frames);
            let cex = sc.new_trace(Trace::new(frames));
            let p = &mut sc.safe_props[j];
            p.stat = PropStatus::Falsified;
            p.cex = Some(cex);
            info!("safety property {j} falsified in the peeled cycle, trace {cex}");
        }
    }

    for f in sc.flops.iter().collect::<Vec<_>>() {
        let init = cmap.sig(sc.flops.next(f));
        sc.flops.set_init(f, init);
    }
    sc.init = peeled;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bmc::basic_bmc;

    // flop starts 0, rises one cycle after input0; property falls with it
    fn delayed() -> SeqCirc {
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        let i = sc.main.numbered_input(0);
        sc.flops.define(f.gate(), i);
        sc.new_safe_prop(!f);
        sc.num_aiger_inputs = 1;
        sc.num_aiger_latches = 1;
        sc
    }

    #[test]
    fn peeled_circuit_finds_the_same_trace_one_cycle_earlier() {
        let mut plain = delayed();
        basic_bmc(&mut plain, 0, 4);
        let plain_cex = &plain.traces[plain.safe_props[0].cex.unwrap()];

        let mut sc = delayed();
        temporal_decomposition(&mut sc);
        basic_bmc(&mut sc, 0, 4);
        assert_eq!(sc.safe_props[0].stat, PropStatus::Falsified);
        let cex = &sc.traces[sc.safe_props[0].cex.unwrap()];
        // adapted back to original coordinates: same length, same trigger
        assert_eq!(cex.frames.len(), plain_cex.frames.len());
        assert_eq!(cex.frames[1][0], Some(true));
    }

    #[test]
    fn depth_zero_violations_survive_peeling() {
        // bad already in the initial state via an x-initialised flop
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        let x = sc.init.numbered_input(0);
        sc.main.numbered_input(0);
        sc.flops.define_init(f.gate(), f, x);
        sc.new_safe_prop(!f);
        temporal_decomposition(&mut sc);
        assert_eq!(sc.safe_props[0].stat, PropStatus::Falsified);
        let t = &sc.traces[sc.safe_props[0].cex.unwrap()];
        // the x-input had to be driven high
        assert_eq!(t.frames[0][0], Some(true));
    }
}
