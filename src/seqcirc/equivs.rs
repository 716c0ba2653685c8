use crate::cir::{Gate, Sig};
use giputils::hash::GHashMap;

/// An equivalence relation over signals, kept as explicit classes with a
/// distinguished representative (`class[0]`). Merging only ever grows the
/// relation; merging a signal with its own negation marks the whole
/// relation inconsistent, which the engines read as "no counter-example
/// path exists at all".
#[derive(Clone, Default, Debug)]
pub struct Equivs {
    classes: Vec<Vec<Sig>>,
    // gate -> (class index, sign of the stored signal for that gate)
    pos: GHashMap<Gate, (usize, bool)>,
    inconsistent: bool,
}

impl Equivs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where a signal sits: `(class, rel)` with `s == rep.not_if(rel)`.
    fn find(&self, s: Sig) -> Option<(usize, bool)> {
        let (k, stored_sign) = *self.pos.get(&s.gate())?;
        Some((k, s.sign() ^ stored_sign))
    }

    fn insert(&mut self, k: usize, s: Sig) {
        self.pos.insert(s.gate(), (k, s.sign()));
        self.classes[k].push(s);
    }

    pub fn merge(&mut self, a: Sig, b: Sig) {
        if a == b {
            return;
        }
        if a == !b {
            self.inconsistent = true;
            return;
        }
        match (self.find(a), self.find(b)) {
            (None, None) => {
                // constants make the better representative
                let (rep, other) = if b.is_constant() { (b, a) } else { (a, b) };
                let k = self.classes.len();
                self.classes.push(Vec::new());
                self.insert(k, rep);
                self.insert(k, other);
            }
            (Some((k, rel)), None) => {
                // b == a == rep.not_if(rel)
                self.insert(k, b.not_if(rel));
            }
            (None, Some((k, rel))) => {
                self.insert(k, a.not_if(rel));
            }
            (Some((ka, ra)), Some((kb, rb))) => {
                if ka == kb {
                    if ra != rb {
                        self.inconsistent = true;
                    }
                    return;
                }
                // rep_b == rep_a.not_if(ra ^ rb); fold kb into ka
                let flip = ra ^ rb;
                let moved = std::mem::take(&mut self.classes[kb]);
                for s in moved {
                    self.pos.insert(s.gate(), (ka, s.sign() ^ flip));
                    self.classes[ka].push(s.not_if(flip));
                }
            }
        }
    }

    /// The representative of the class `s` belongs to, adjusted for sign;
    /// `s` itself when unconstrained.
    pub fn rep(&self, s: Sig) -> Sig {
        match self.find(s) {
            Some((k, rel)) => self.classes[k][0].not_if(rel),
            None => s,
        }
    }

    /// Non-empty classes, representative first.
    pub fn classes(&self) -> impl Iterator<Item = &[Sig]> {
        self.classes
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.as_slice())
    }

    pub fn num_classes(&self) -> usize {
        self.classes.iter().filter(|c| !c.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.num_classes() == 0 && !self.inconsistent
    }

    pub fn inconsistent(&self) -> bool {
        self.inconsistent
    }

    /// Rebuild the relation through a signal translation; classes whose
    /// members did not all survive keep the survivors.
    pub fn remap(&self, f: impl Fn(Sig) -> Option<Sig>) -> Equivs {
        let mut out = Equivs::new();
        out.inconsistent = self.inconsistent;
        for class in self.classes() {
            let Some(rep) = f(class[0]) else { continue };
            for &s in &class[1..] {
                if let Some(s) = f(s) {
                    out.merge(rep, s);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cir::Cir;

    #[test]
    fn merge_builds_signed_classes() {
        let mut c = Cir::new();
        let a = c.input();
        let b = c.input();
        let x = c.input();
        let mut eq = Equivs::new();
        eq.merge(a, !b);
        eq.merge(b, x);
        assert_eq!(eq.num_classes(), 1);
        assert_eq!(eq.rep(a), eq.rep(!b));
        assert_eq!(eq.rep(a), eq.rep(!x));
        assert_eq!(eq.rep(!a), eq.rep(x));
        assert!(!eq.inconsistent());
    }

    #[test]
    fn constants_become_representatives() {
        let mut c = Cir::new();
        let a = c.input();
        let mut eq = Equivs::new();
        eq.merge(a, Sig::TRUE);
        assert_eq!(eq.rep(a), Sig::TRUE);
        assert_eq!(eq.rep(!a), Sig::FALSE);
    }

    #[test]
    fn contradiction_marks_inconsistent() {
        let mut c = Cir::new();
        let a = c.input();
        let b = c.input();
        let mut eq = Equivs::new();
        eq.merge(Sig::TRUE, Sig::FALSE);
        assert!(eq.inconsistent());
        let mut eq = Equivs::new();
        eq.merge(a, b);
        eq.merge(a, !b);
        assert!(eq.inconsistent());
    }
}
