use super::{Cir, CirNode, GMap, Gate, Sig};

/// Copy `src` into `dst` up to and including `stop` (or all of `src`),
/// recording the translation in `map`. Entries already present in `map` are
/// kept, which is how callers substitute flop outputs before copying.
/// Inputs keep their external number; shared structure stays shared in `dst`.
pub fn copy_cir(src: &Cir, dst: &mut Cir, map: &mut GMap<Sig>, stop: Option<Gate>) {
    let stop = stop.unwrap_or(src.last_gate());
    map.grow_to(src.last_gate());
    map[Gate::TRUE] = Sig::TRUE;
    for g in src.gates() {
        if g > stop {
            break;
        }
        if map[g] != Sig::UNDEF {
            continue;
        }
        map[g] = match src.node(g) {
            CirNode::True => Sig::TRUE,
            CirNode::Input { number } => match number {
                Some(n) => dst.numbered_input(n),
                None => dst.input(),
            },
            CirNode::And(a, b) => {
                let a = map.sig(a);
                let b = map.sig(b);
                dst.and(a, b)
            }
        };
    }
}
