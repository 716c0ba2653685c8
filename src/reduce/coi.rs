use crate::cir::{Cir, CirNode, GMap, Gate, Sig};
use crate::seqcirc::{Flops, PropStatus, SeqCirc};
use log::info;

fn mark_cone(cir: &Cir, marked: &mut GMap<bool>, mut stack: Vec<Gate>, flops: Option<&Flops>) {
    marked.grow_to(cir.last_gate());
    while let Some(g) = stack.pop() {
        if marked[g] {
            continue;
        }
        marked[g] = true;
        match cir.node(g) {
            CirNode::True => (),
            CirNode::Input { .. } => {
                if let Some(flops) = flops
                    && flops.is_flop(g)
                {
                    stack.push(flops.next(g).gate());
                }
            }
            CirNode::And(a, b) => {
                stack.push(a.gate());
                stack.push(b.gate());
            }
        }
    }
}

fn rebuild(cir: &Cir, marked: &GMap<bool>) -> (Cir, GMap<Sig>) {
    let mut out = Cir::new();
    let mut map = GMap::with_last(cir.last_gate());
    map[Gate::TRUE] = Sig::TRUE;
    for g in cir.gates() {
        if !marked[g] {
            continue;
        }
        map[g] = match cir.node(g) {
            CirNode::True => Sig::TRUE,
            CirNode::Input { number } => match number {
                Some(n) => out.numbered_input(n),
                None => out.input(),
            },
            CirNode::And(a, b) => {
                let a = map.sig(a);
                let b = map.sig(b);
                out.and(a, b)
            }
        };
    }
    (out, map)
}

/// Cone-of-influence pruning: keep only logic reachable from the
/// unresolved properties, the constraints and the fairness signals,
/// chasing flop next-state cones to a fixed point. Input numbers are
/// preserved, so traces need no adaptor; pruned inputs read back as x.
pub fn remove_unused(sc: &mut SeqCirc) {
    let mut roots = Vec::new();
    for p in sc.safe_props.iter() {
        if p.stat == PropStatus::Unknown {
            roots.push(p.sig.gate());
        }
    }
    for p in sc.live_props.iter() {
        if p.stat == PropStatus::Unknown {
            roots.extend(p.sigs.iter().map(|s| s.gate()));
        }
    }
    roots.extend(sc.fairs.iter().map(|s| s.gate()));
    for class in sc.cnstrs.classes() {
        roots.extend(class.iter().map(|s| s.gate()));
    }

    let mut marked = GMap::new();
    mark_cone(&sc.main, &mut marked, roots, Some(&sc.flops));
    let (new_main, map) = rebuild(&sc.main, &marked);

    let kept: Vec<Gate> = sc.flops.iter().filter(|&f| marked[f]).collect();
    let mut imarked = GMap::new();
    let iroots = kept.iter().map(|&f| sc.flops.init(f).gate()).collect();
    mark_cone(&sc.init, &mut imarked, iroots, None);
    let (new_init, imap) = rebuild(&sc.init, &imarked);

    let mut flops = Flops::new();
    for f in kept {
        flops.define_init(
            map[f].gate(),
            map.sig(sc.flops.next(f)),
            imap.sig(sc.flops.init(f)),
        );
    }

    let remap = |s: Sig| {
        if marked.has(s.gate()) && marked[s.gate()] {
            Some(map.sig(s))
        } else {
            None
        }
    };
    for p in sc.safe_props.iter_mut() {
        p.sig = remap(p.sig).unwrap_or(Sig::FALSE);
    }
    for p in sc.live_props.iter_mut() {
        p.sigs = p.sigs.iter().filter_map(|&s| remap(s)).collect();
    }
    sc.fairs = sc.fairs.iter().filter_map(|&s| remap(s)).collect();
    sc.outputs.clear();
    sc.cnstrs = sc.cnstrs.remap(remap);

    info!(
        "coi: {} -> {} gates, {} -> {} flops",
        sc.main.num_gates(),
        new_main.num_gates(),
        sc.flops.len(),
        flops.len(),
    );
    sc.main = new_main;
    sc.init = new_init;
    sc.flops = flops;
}
