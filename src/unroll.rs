use crate::cir::{Cir, GMap, Gate, Sig, copy_cir};
use crate::clausify::Clausify;
use crate::seqcirc::{PropStatus, SeqCirc};
use logicrs::{Lit, Var, satif::Satif};

/// Input gates of one unrolled frame, indexed by external AIGER input
/// number, `Gate::UNDEF` where no such input exists.
pub type IFrame = Vec<Gate>;

fn record_input(frame: &mut IFrame, num: u32, g: Gate) {
    if frame.len() <= num as usize {
        frame.resize(num as usize + 1, Gate::UNDEF);
    }
    frame[num as usize] = g;
}

/// Builds time-frame copies of `main` into one growing arena, threading
/// each flop's output to the next frame's flop input. After k steps,
/// `frontier()[i]` is flop i's value at the start of cycle k.
pub struct UnrollCirc {
    pub ucir: Cir,
    pub frames: Vec<IFrame>,
    flop_front: Vec<Sig>,
    last_gate: Gate,
}

impl UnrollCirc {
    /// `reset` starts from the initial circuit; otherwise every flop starts
    /// from a fresh unconstrained input.
    pub fn new(sc: &SeqCirc, reset: bool) -> Self {
        let mut u = Self {
            ucir: Cir::new(),
            frames: Vec::new(),
            flop_front: Vec::new(),
            last_gate: sc.main.last_gate(),
        };
        if reset {
            u.init_reset(sc);
        } else {
            u.init_random(sc);
        }
        u
    }

    fn init_reset(&mut self, sc: &SeqCirc) {
        let mut init_map = GMap::new();
        copy_cir(&sc.init, &mut self.ucir, &mut init_map, None);
        let mut frame = IFrame::new();
        for &inp in sc.init.inputs() {
            if let Some(num) = sc.init.input_number(inp) {
                debug_assert!(!init_map[inp].sign());
                record_input(&mut frame, num, init_map[inp].gate());
            }
        }
        self.frames.push(frame);
        for f in sc.flops.iter() {
            self.flop_front.push(init_map.sig(sc.flops.init(f)));
        }
    }

    fn init_random(&mut self, sc: &SeqCirc) {
        self.frames.push(IFrame::new());
        for _ in sc.flops.iter() {
            let s = self.ucir.input();
            self.flop_front.push(s);
        }
    }

    /// Emit one more cycle. `umap` is reused across calls and maps this
    /// frame's `main` gates into the unrolled arena.
    pub fn step(&mut self, sc: &SeqCirc, umap: &mut GMap<Sig>) {
        umap.clear();
        umap.grow_to(self.last_gate);
        for (i, f) in sc.flops.iter().enumerate() {
            umap[f] = self.flop_front[i];
        }
        copy_cir(&sc.main, &mut self.ucir, umap, Some(self.last_gate));

        let mut frame = IFrame::new();
        for &inp in sc.main.inputs() {
            if inp > self.last_gate {
                continue;
            }
            if let Some(num) = sc.main.input_number(inp) {
                debug_assert!(!umap[inp].sign());
                record_input(&mut frame, num, umap[inp].gate());
            }
        }
        self.frames.push(frame);

        for (i, f) in sc.flops.iter().enumerate() {
            self.flop_front[i] = umap.sig(sc.flops.next(f));
        }
    }

    #[inline]
    pub fn frontier(&self) -> &[Sig] {
        &self.flop_front
    }

    /// Completed cycles (the initial frame is not a cycle).
    #[inline]
    pub fn num_cycles(&self) -> usize {
        self.frames.len() - 1
    }
}

/// CNF-level unroller: each cycle clausifies `main` directly into a
/// preprocessing solver, binding the previous flop frontier with
/// `clausify_as` and freezing everything the next cycle still depends on.
pub struct SimpUnroller {
    flop_front: Vec<Lit>,
    pub frames: Vec<Vec<Option<Lit>>>,
    bad_lits: Vec<(usize, Lit)>,
    prop_frozen: Vec<Var>,
}

impl SimpUnroller {
    pub fn new<S: Satif + ?Sized>(sc: &SeqCirc, solver: &mut S) -> Self {
        let mut u = Self {
            flop_front: Vec::new(),
            frames: Vec::new(),
            bad_lits: Vec::new(),
            prop_frozen: Vec::new(),
        };
        let mut cl = Clausify::new();
        for f in sc.flops.iter() {
            let l = cl.clausify(&sc.init, solver, sc.flops.init(f));
            solver.set_frozen(l.var(), true);
            u.flop_front.push(l);
        }
        let mut frame = Vec::new();
        for &inp in sc.init.inputs() {
            if let Some(num) = sc.init.input_number(inp) {
                if frame.len() <= num as usize {
                    frame.resize(num as usize + 1, None);
                }
                frame[num as usize] = cl.lookup(inp.sig());
            }
        }
        u.frames.push(frame);
        u
    }

    /// Clausify the next cycle. Afterwards `bad_lits` holds one assumption
    /// literal per unresolved safety property; the caller runs its SAT
    /// tests and then calls `thaw_props`.
    pub fn step<S: Satif + ?Sized>(&mut self, sc: &SeqCirc, solver: &mut S) {
        let mut cl = Clausify::new();
        // bind the stored frontier to this cycle's flop outputs, then let
        // the preprocessor at the old boundary go
        for (i, f) in sc.flops.iter().enumerate() {
            cl.clausify_as(&sc.main, solver, f.sig(), self.flop_front[i]);
        }
        for l in self.flop_front.iter() {
            solver.set_frozen(l.var(), false);
        }

        for class in sc.cnstrs.classes() {
            let rep = cl.clausify(&sc.main, solver, class[0]);
            for &m in &class[1..] {
                cl.clausify_as(&sc.main, solver, m, rep);
            }
        }

        for (i, f) in sc.flops.iter().enumerate() {
            let l = cl.clausify(&sc.main, solver, sc.flops.next(f));
            solver.set_frozen(l.var(), true);
            self.flop_front[i] = l;
        }

        self.bad_lits.clear();
        for (j, p) in sc.safe_props.iter().enumerate() {
            if p.stat != PropStatus::Unknown {
                continue;
            }
            let l = cl.clausify_assume(&sc.main, solver, !p.sig);
            solver.set_frozen(l.var(), true);
            self.prop_frozen.push(l.var());
            self.bad_lits.push((j, l));
        }

        let mut frame = Vec::new();
        for &inp in sc.main.inputs() {
            if let Some(num) = sc.main.input_number(inp) {
                if frame.len() <= num as usize {
                    frame.resize(num as usize + 1, None);
                }
                frame[num as usize] = cl.lookup(inp.sig());
            }
        }
        self.frames.push(frame);
    }

    #[inline]
    pub fn bad_lits(&self) -> &[(usize, Lit)] {
        &self.bad_lits
    }

    pub fn thaw_props<S: Satif + ?Sized>(&mut self, solver: &mut S) {
        for v in self.prop_frozen.drain(..) {
            solver.set_frozen(v, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cir::CirNode;
    use cadical::Solver;

    // one flop toggled by input 0, starting at 0
    fn toggle() -> SeqCirc {
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        let i = sc.main.numbered_input(0);
        let next = sc.main.xnor(f, !i);
        sc.flops.define(f.gate(), next);
        sc.new_safe_prop(!f);
        sc
    }

    #[test]
    fn reset_frame_zero_exposes_init_inputs() {
        // one arbitrary-initialised flop holding its value
        let mut sc = SeqCirc::new();
        let f = sc.main.input();
        let x = sc.init.numbered_input(0);
        sc.flops.define_init(f.gate(), f, x);
        sc.new_safe_prop(!f);
        let u = UnrollCirc::new(&sc, true);
        assert_eq!(u.frames.len(), 1);
        assert_eq!(u.frames[0].len(), 1);
        let g = u.frames[0][0];
        assert!(matches!(u.ucir.node(g), CirNode::Input { number: Some(0) }));
        assert_eq!(u.frontier()[0], g.sig());
    }

    #[test]
    fn frontier_tracks_the_flop_value() {
        let sc = toggle();
        let mut u = UnrollCirc::new(&sc, true);
        let mut umap = GMap::new();
        let mut solver = Solver::new();
        let mut cl = Clausify::new();
        u.step(&sc, &mut umap);
        u.step(&sc, &mut umap);
        // force input0 = 1 in both cycles; flop must be 0, 1, 0
        let fronts: Vec<_> = (0..2)
            .map(|k| {
                let g = u.frames[k + 1][0];
                cl.clausify(&u.ucir, &mut solver, g.sig())
            })
            .collect();
        let f2 = cl.clausify(&u.ucir, &mut solver, u.frontier()[0]);
        for l in fronts.iter() {
            solver.add_clause(&[*l]);
        }
        assert!(solver.solve(&[]));
        assert_eq!(solver.sat_value(f2), Some(false));
    }

    #[test]
    fn unroll_stops_at_the_recorded_last_gate() {
        let mut sc = toggle();
        let mut u = UnrollCirc::new(&sc, true);
        let before = sc.main.num_gates();
        // mutate main after the unroller snapshot; new logic is not copied
        let a = sc.main.numbered_input(7);
        let b = sc.main.input();
        sc.main.and(a, b);
        let mut umap = GMap::new();
        u.step(&sc, &mut umap);
        assert!(sc.main.num_gates() > before);
        for f in u.frames.iter() {
            assert!(f.len() <= 1);
        }
    }

    #[test]
    fn simp_unroller_threads_the_frontier() {
        let sc = toggle();
        let mut solver = Solver::new();
        let mut u = SimpUnroller::new(&sc, &mut solver);
        u.step(&sc, &mut solver);
        u.step(&sc, &mut solver);
        assert_eq!(u.frames.len(), 3);
        let (_, bad) = u.bad_lits()[0];
        // two cycles with input0 = 1 reach flop = 1
        let i0 = u.frames[1][0].unwrap();
        let i1 = u.frames[2][0].unwrap();
        assert!(solver.solve(&[bad, i0, i1]));
        // but flop stays 0 if the input is held low
        assert!(!solver.solve(&[bad, !i0, !i1]));
        u.thaw_props(&mut solver);
    }

    #[test]
    fn random_mode_frees_the_initial_state() {
        let sc = toggle();
        let mut u = UnrollCirc::new(&sc, false);
        let mut umap = GMap::new();
        u.step(&sc, &mut umap);
        let mut solver = Solver::new();
        let mut cl = Clausify::new();
        let p = umap.sig(sc.safe_props[0].sig);
        let bad = cl.clausify_assume(&u.ucir, &mut solver, !p);
        // bad is reachable at cycle 0 from an arbitrary initial state
        assert!(solver.solve(&[bad]));
    }
}
