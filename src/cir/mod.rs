mod copy;
mod gmap;

pub use copy::copy_cir;
pub use gmap::GMap;

use giputils::hash::GHashMap;
use std::fmt::{self, Debug};
use std::ops::Not;

/// A node handle inside one arena. Gate 0 is the true constant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Gate(u32);

impl Gate {
    pub const TRUE: Gate = Gate(0);
    pub const UNDEF: Gate = Gate(u32::MAX >> 1);

    #[inline]
    pub fn sig(self) -> Sig {
        Sig::new(self, false)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Gate::UNDEF {
            write!(f, "g?")
        } else {
            write!(f, "g{}", self.0)
        }
    }
}

/// A gate with an inversion flag, packed into one word.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sig(u32);

impl Sig {
    pub const TRUE: Sig = Sig(0);
    pub const FALSE: Sig = Sig(1);
    pub const UNDEF: Sig = Sig(u32::MAX & !1);

    #[inline]
    pub fn new(gate: Gate, sign: bool) -> Self {
        Sig((gate.0 << 1) | sign as u32)
    }

    #[inline]
    pub fn gate(self) -> Gate {
        Gate(self.0 >> 1)
    }

    #[inline]
    pub fn sign(self) -> bool {
        self.0 & 1 != 0
    }

    #[inline]
    pub fn not_if(self, c: bool) -> Self {
        Sig(self.0 ^ c as u32)
    }

    #[inline]
    pub fn is_constant(self) -> bool {
        self.gate() == Gate::TRUE
    }
}

impl Not for Sig {
    type Output = Sig;

    #[inline]
    fn not(self) -> Self {
        Sig(self.0 ^ 1)
    }
}

impl Default for Sig {
    #[inline]
    fn default() -> Self {
        Sig::UNDEF
    }
}

impl Debug for Sig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign() {
            write!(f, "!{:?}", self.gate())
        } else {
            write!(f, "{:?}", self.gate())
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CirNode {
    True,
    Input { number: Option<u32> },
    And(Sig, Sig),
}

/// One AIG arena: gates in topological order with structural hashing.
#[derive(Clone, Debug)]
pub struct Cir {
    nodes: Vec<CirNode>,
    strash: GHashMap<(Sig, Sig), Gate>,
    inputs: Vec<Gate>,
}

impl Default for Cir {
    fn default() -> Self {
        Self::new()
    }
}

impl Cir {
    pub fn new() -> Self {
        Self {
            nodes: vec![CirNode::True],
            strash: GHashMap::new(),
            inputs: Vec::new(),
        }
    }

    fn push(&mut self, node: CirNode) -> Gate {
        let g = Gate(self.nodes.len() as u32);
        self.nodes.push(node);
        g
    }

    /// Allocate an input without an external number (flop outputs, auxiliary
    /// inputs introduced by transformations).
    pub fn input(&mut self) -> Sig {
        let g = self.push(CirNode::Input { number: None });
        self.inputs.push(g);
        g.sig()
    }

    /// Allocate an input carrying an external AIGER number.
    pub fn numbered_input(&mut self, number: u32) -> Sig {
        let g = self.push(CirNode::Input {
            number: Some(number),
        });
        self.inputs.push(g);
        g.sig()
    }

    pub fn and(&mut self, a: Sig, b: Sig) -> Sig {
        debug_assert!(a != Sig::UNDEF && b != Sig::UNDEF);
        if a == b {
            return a;
        }
        if a == !b || a == Sig::FALSE || b == Sig::FALSE {
            return Sig::FALSE;
        }
        if a == Sig::TRUE {
            return b;
        }
        if b == Sig::TRUE {
            return a;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&g) = self.strash.get(&key) {
            return g.sig();
        }
        let g = self.push(CirNode::And(key.0, key.1));
        self.strash.insert(key, g);
        g.sig()
    }

    #[inline]
    pub fn or(&mut self, a: Sig, b: Sig) -> Sig {
        !self.and(!a, !b)
    }

    pub fn ands(&mut self, sigs: impl IntoIterator<Item = Sig>) -> Sig {
        sigs.into_iter().fold(Sig::TRUE, |acc, s| self.and(acc, s))
    }

    pub fn ors(&mut self, sigs: impl IntoIterator<Item = Sig>) -> Sig {
        sigs.into_iter().fold(Sig::FALSE, |acc, s| self.or(acc, s))
    }

    pub fn xnor(&mut self, a: Sig, b: Sig) -> Sig {
        let both = self.and(a, b);
        let neither = self.and(!a, !b);
        self.or(both, neither)
    }

    #[inline]
    pub fn node(&self, g: Gate) -> CirNode {
        self.nodes[g.index()]
    }

    #[inline]
    pub fn is_input(&self, g: Gate) -> bool {
        matches!(self.node(g), CirNode::Input { .. })
    }

    #[inline]
    pub fn input_number(&self, g: Gate) -> Option<u32> {
        match self.node(g) {
            CirNode::Input { number } => number,
            _ => None,
        }
    }

    /// Gates in topological order, constant excluded.
    pub fn gates(&self) -> impl Iterator<Item = Gate> + use<> {
        (1..self.nodes.len() as u32).map(Gate)
    }

    #[inline]
    pub fn last_gate(&self) -> Gate {
        Gate(self.nodes.len() as u32 - 1)
    }

    #[inline]
    pub fn num_gates(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_ands(&self) -> usize {
        self.nodes.len() - 1 - self.inputs.len()
    }

    #[inline]
    pub fn inputs(&self) -> &[Gate] {
        &self.inputs
    }

    /// Ternary evaluation of a cone under an input assignment.
    pub fn eval(
        &self,
        s: Sig,
        input_value: &mut impl FnMut(Gate) -> Option<bool>,
        scratch: &mut GHashMap<Gate, Option<bool>>,
    ) -> Option<bool> {
        let v = self.eval_gate(s.gate(), input_value, scratch);
        v.map(|v| v ^ s.sign())
    }

    fn eval_gate(
        &self,
        g: Gate,
        input_value: &mut impl FnMut(Gate) -> Option<bool>,
        scratch: &mut GHashMap<Gate, Option<bool>>,
    ) -> Option<bool> {
        if let Some(&v) = scratch.get(&g) {
            return v;
        }
        let v = match self.node(g) {
            CirNode::True => Some(true),
            CirNode::Input { .. } => input_value(g),
            CirNode::And(a, b) => {
                let va = self.eval(a, input_value, scratch);
                let vb = self.eval(b, input_value, scratch);
                match (va, vb) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            }
        };
        scratch.insert(g, v);
        v
    }
}
