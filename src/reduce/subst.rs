use crate::cir::{Cir, CirNode, GMap, Sig};
use crate::seqcirc::{Equivs, Flops, SeqCirc};
use log::info;

/// Rewrite `main` so every use of a constrained signal goes through its
/// class representative. Each member's own definition is still built (over
/// the rewritten children) and the constraint classes are re-expressed
/// over those definitions, so the engines keep asserting the original
/// per-frame equalities and no counter-example path is gained or lost.
/// Flops whose output gate was routed away are dropped; their users now
/// see the representative.
pub fn substitute_constraints(sc: &mut SeqCirc) {
    if sc.cnstrs.num_classes() == 0 {
        return;
    }
    let mut new_main = Cir::new();
    // use-routing map, and each gate's own rebuilt definition
    let mut map = GMap::with_last(sc.main.last_gate());
    let mut def = GMap::with_last(sc.main.last_gate());
    map[Sig::TRUE.gate()] = Sig::TRUE;
    def[Sig::TRUE.gate()] = Sig::TRUE;
    for g in sc.main.gates() {
        let own = match sc.main.node(g) {
            CirNode::True => Sig::TRUE,
            CirNode::Input { number } => match number {
                Some(n) => new_main.numbered_input(n),
                None => new_main.input(),
            },
            CirNode::And(a, b) => {
                let a = map.sig(a);
                let b = map.sig(b);
                new_main.and(a, b)
            }
        };
        def[g] = own;
        let rep = sc.cnstrs.rep(g.sig());
        map[g] = if rep == g.sig() {
            own
        } else if rep.is_constant() {
            rep
        } else if rep.gate() < g && map[rep.gate()] != Sig::UNDEF {
            map.sig(rep)
        } else {
            // representative not available yet in topological order
            own
        };
    }

    let mut flops = Flops::new();
    let mut dropped = 0usize;
    for f in sc.flops.iter() {
        let own = def[f];
        if map[f] != own || !new_main.is_input(own.gate()) {
            dropped += 1;
            continue;
        }
        flops.define_init(own.gate(), map.sig(sc.flops.next(f)), sc.flops.init(f));
    }

    for p in sc.safe_props.iter_mut() {
        p.sig = map.sig(p.sig);
    }
    for p in sc.live_props.iter_mut() {
        p.sigs = p.sigs.iter().map(|&s| map.sig(s)).collect();
    }
    sc.fairs = sc.fairs.iter().map(|&s| map.sig(s)).collect();
    sc.outputs = sc.outputs.iter().map(|&s| map.sig(s)).collect();

    let mut cnstrs = Equivs::new();
    for class in sc.cnstrs.classes() {
        let rep = map.sig(class[0]);
        for &m in &class[1..] {
            cnstrs.merge(rep, def.sig(m));
        }
    }
    if sc.cnstrs.inconsistent() {
        cnstrs.merge(Sig::TRUE, Sig::FALSE);
    }

    info!(
        "substitute: {} -> {} gates, dropped {} flops",
        sc.main.num_gates(),
        new_main.num_gates(),
        dropped,
    );
    sc.main = new_main;
    sc.flops = flops;
    sc.cnstrs = cnstrs;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bmc::basic_bmc;
    use crate::seqcirc::PropStatus;

    #[test]
    fn constant_constraints_fold_their_users() {
        // f == true on every counter-example path, so the property cone
        // collapses to a constant after substitution
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        let i = sc.main.numbered_input(0);
        let bad = sc.main.and(f, i);
        sc.flops.define(f.gate(), f);
        sc.new_safe_prop(!bad);
        sc.cnstrs.merge(f, Sig::TRUE);
        substitute_constraints(&mut sc);
        assert_eq!(sc.flops.len(), 0);
        // bad = f & i collapsed to i, so the property is now !i
        let i = sc
            .main
            .inputs()
            .iter()
            .find(|&&g| sc.main.input_number(g) == Some(0))
            .copied()
            .unwrap();
        assert_eq!(sc.safe_props[0].sig, !i.sig());
        // the original equality is still recorded against f's definition
        assert_eq!(sc.cnstrs.num_classes(), 1);
    }

    #[test]
    fn substitution_keeps_verdicts() {
        // y == x always; merging them and substituting must not change bmc
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        let i = sc.main.numbered_input(0);
        let x = sc.main.and(f, i);
        let cone = sc.main.or(f, i);
        let y = sc.main.and(x, cone);
        let next = sc.main.or(i, y);
        sc.flops.define(f.gate(), next);
        sc.new_safe_prop(!y);
        sc.cnstrs.merge(x, y);
        substitute_constraints(&mut sc);
        basic_bmc(&mut sc, 0, 3);
        assert_eq!(sc.safe_props[0].stat, PropStatus::Falsified);
    }
}
