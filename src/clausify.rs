use crate::cir::{Cir, CirNode, GMap, Gate, Sig};
use giputils::hash::GHashMap;
use logicrs::{Lit, satif::Satif};

// encoded implication sides of a gate's definition
const IMP: u8 = 1; // lit -> cone
const PMI: u8 = 2; // cone -> lit
const BOTH: u8 = IMP | PMI;

/// Lazy gate-to-literal mapping with Tseitin encoding into a SAT backend.
/// The arena and the solver are borrowed per operation; the cache persists
/// across calls so cones are emitted once.
///
/// Two behaviors can be switched off: polarity-directed encoding (only the
/// implication sides a request needs, via `clausify_assume`) and structural
/// sharing of AND literals across top-level requests. Every configuration
/// yields equisatisfiable CNF; exact model reads go through `model_value`,
/// which re-evaluates the cone from the input variables.
pub struct Clausify {
    vmap: GMap<Option<Lit>>,
    sides: GMap<u8>,
    vgen: GMap<u32>,
    r#gen: u32,
    pub pol: bool,
    pub share: bool,
}

impl Clausify {
    pub fn new() -> Self {
        Self {
            vmap: GMap::new(),
            sides: GMap::new(),
            vgen: GMap::new(),
            r#gen: 0,
            pol: true,
            share: true,
        }
    }

    /// Exact mode: full two-sided encoding, one literal per gate for the
    /// whole lifetime. Model-based pruning wants this.
    pub fn exact() -> Self {
        Self {
            pol: false,
            ..Self::new()
        }
    }

    fn grow(&mut self, cir: &Cir) {
        self.vmap.grow_to(cir.last_gate());
        self.sides.grow_to(cir.last_gate());
        self.vgen.grow_to(cir.last_gate());
    }

    fn cached(&self, cir: &Cir, g: Gate) -> Option<Lit> {
        let l = self.vmap[g]?;
        if !self.share && matches!(cir.node(g), CirNode::And(..)) && self.vgen[g] != self.r#gen {
            return None;
        }
        Some(l)
    }

    fn gate_lit<S: Satif + ?Sized>(&mut self, cir: &Cir, solver: &mut S, g: Gate) -> Lit {
        if let Some(l) = self.cached(cir, g) {
            return l;
        }
        let l = solver.new_var().lit();
        self.vmap[g] = Some(l);
        self.sides[g] = 0;
        self.vgen[g] = self.r#gen;
        if let CirNode::True = cir.node(g) {
            solver.add_clause(&[l]);
            self.sides[g] = BOTH;
        }
        l
    }

    // side a child must provide for one side of its parent
    fn child_need(parent_side: u8, child: Sig) -> u8 {
        let mut need = 0;
        if parent_side & IMP != 0 {
            need |= if child.sign() { PMI } else { IMP };
        }
        if parent_side & PMI != 0 {
            need |= if child.sign() { IMP } else { PMI };
        }
        need
    }

    fn encode<S: Satif + ?Sized>(&mut self, cir: &Cir, solver: &mut S, root: Gate, need: u8) {
        self.grow(cir);
        let mut stack = vec![(root, need)];
        while let Some(&(g, need)) = stack.last() {
            self.gate_lit(cir, solver, g);
            let missing = need & !self.sides[g];
            if missing == 0 {
                stack.pop();
                continue;
            }
            match cir.node(g) {
                CirNode::True => unreachable!(),
                CirNode::Input { .. } => {
                    self.sides[g] |= need;
                    stack.pop();
                }
                CirNode::And(a, b) => {
                    let na = Self::child_need(missing, a);
                    let nb = Self::child_need(missing, b);
                    let mut ready = true;
                    for (c, n) in [(a, na), (b, nb)] {
                        let cg = c.gate();
                        if self.cached(cir, cg).is_none() || n & !self.sides[cg] != 0 {
                            ready = false;
                            stack.push((cg, n));
                        }
                    }
                    if !ready {
                        continue;
                    }
                    let v = self.vmap[g].unwrap();
                    let la = self.vmap[a.gate()].unwrap().not_if(a.sign());
                    let lb = self.vmap[b.gate()].unwrap().not_if(b.sign());
                    if missing & IMP != 0 {
                        solver.add_clause(&[!v, la]);
                        solver.add_clause(&[!v, lb]);
                    }
                    if missing & PMI != 0 {
                        solver.add_clause(&[v, !la, !lb]);
                    }
                    self.sides[g] |= missing;
                    stack.pop();
                }
            }
        }
    }

    fn request<S: Satif + ?Sized>(&mut self, cir: &Cir, solver: &mut S, s: Sig, need: u8) -> Lit {
        if !self.share {
            self.r#gen += 1;
        }
        self.encode(cir, solver, s.gate(), need);
        self.vmap[s.gate()].unwrap().not_if(s.sign())
    }

    /// Full encoding of the cone of `s`; the returned literal may be used in
    /// either polarity.
    pub fn clausify<S: Satif + ?Sized>(&mut self, cir: &Cir, solver: &mut S, s: Sig) -> Lit {
        self.request(cir, solver, s, BOTH)
    }

    /// Encoding sufficient for assuming or asserting `s` true. With the
    /// polarity optimisation off this is `clausify`.
    pub fn clausify_assume<S: Satif + ?Sized>(
        &mut self,
        cir: &Cir,
        solver: &mut S,
        s: Sig,
    ) -> Lit {
        let need = if self.pol {
            if s.sign() { PMI } else { IMP }
        } else {
            BOTH
        };
        self.request(cir, solver, s, need)
    }

    /// Bind `s` to an externally chosen literal. Unclausified inputs adopt
    /// the literal directly (how flop frontiers thread between cycles);
    /// anything else gets equivalence clauses.
    pub fn clausify_as<S: Satif + ?Sized>(
        &mut self,
        cir: &Cir,
        solver: &mut S,
        s: Sig,
        target: Lit,
    ) {
        self.grow(cir);
        let g = s.gate();
        if self.vmap[g].is_none() && cir.is_input(g) {
            self.vmap[g] = Some(target.not_if(s.sign()));
            self.sides[g] = BOTH;
            self.vgen[g] = self.r#gen;
            return;
        }
        let l = self.clausify(cir, solver, s);
        if l != target {
            solver.add_clause(&[!l, target]);
            solver.add_clause(&[l, !target]);
        }
    }

    pub fn lookup(&self, s: Sig) -> Option<Lit> {
        let l = (*self.vmap.get(s.gate())?)?;
        Some(l.not_if(s.sign()))
    }

    /// Ternary read of `s` under the solver's most recent model, computed
    /// from the input variables so one-sided encodings stay faithful.
    pub fn model_value<S: Satif + ?Sized>(
        &self,
        cir: &Cir,
        solver: &S,
        s: Sig,
        scratch: &mut GHashMap<Gate, Option<bool>>,
    ) -> Option<bool> {
        cir.eval(
            s,
            &mut |g| {
                let l = (*self.vmap.get(g)?)?;
                solver.sat_value(l)
            },
            scratch,
        )
    }
}

impl Default for Clausify {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadical::Solver;

    fn assignments(n: usize) -> impl Iterator<Item = Vec<bool>> {
        (0..1usize << n).map(move |m| (0..n).map(|i| m >> i & 1 != 0).collect())
    }

    fn check_equisat(pol: bool, share: bool, assume_mode: bool) {
        let mut cir = Cir::new();
        let a = cir.input();
        let b = cir.input();
        let c = cir.input();
        let ab = cir.and(a, !b);
        let root = cir.or(ab, c);
        for inputs in assignments(3) {
            for phase in [false, true] {
                let mut solver = Solver::new();
                let mut cl = Clausify::new();
                cl.pol = pol;
                cl.share = share;
                let s = root.not_if(phase);
                let lit = if assume_mode {
                    cl.clausify_assume(&cir, &mut solver, s)
                } else {
                    cl.clausify(&cir, &mut solver, s)
                };
                for (sig, v) in [a, b, c].into_iter().zip(inputs.iter()) {
                    let il = cl.lookup(sig).unwrap();
                    solver.add_clause(&[il.not_if(!v)]);
                }
                let mut scratch = GHashMap::new();
                let expect = cir
                    .eval(s, &mut |g| [a, b, c].iter().position(|s| s.gate() == g).map(|i| inputs[i]), &mut scratch)
                    .unwrap();
                assert_eq!(solver.solve(&[lit]), expect);
            }
        }
    }

    #[test]
    fn full_encoding_matches_circuit() {
        check_equisat(false, false, false);
    }

    #[test]
    fn polarity_encoding_matches_circuit_under_assumption() {
        check_equisat(true, true, true);
    }

    #[test]
    fn unshared_encoding_matches_circuit() {
        check_equisat(true, false, true);
    }

    #[test]
    fn clausify_as_binds_inputs_and_cones() {
        let mut cir = Cir::new();
        let f = cir.input();
        let i = cir.input();
        let next = cir.xnor(f, i);
        let mut solver = Solver::new();
        let ext = solver.new_var().lit();
        let mut cl = Clausify::new();
        cl.clausify_as(&cir, &mut solver, f, ext);
        assert_eq!(cl.lookup(f), Some(ext));
        let nl = cl.clausify(&cir, &mut solver, next);
        // force f=1, i=0 -> next must be 0
        let il = cl.lookup(i).unwrap();
        assert!(solver.solve(&[ext, !il, !nl]));
        assert!(!solver.solve(&[ext, !il, nl]));
    }

    #[test]
    fn model_value_recomputes_from_inputs() {
        let mut cir = Cir::new();
        let a = cir.input();
        let b = cir.input();
        let x = cir.and(a, b);
        let mut solver = Solver::new();
        let mut cl = Clausify::new();
        let xl = cl.clausify_assume(&cir, &mut solver, x);
        assert!(solver.solve(&[xl]));
        let mut scratch = GHashMap::new();
        assert_eq!(cl.model_value(&cir, &solver, x, &mut scratch), Some(true));
        assert_eq!(cl.model_value(&cir, &solver, !x, &mut scratch), Some(false));
    }
}
